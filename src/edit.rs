use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The rewrite primitive: byte-span replacement with verification.
///
/// Every rule match compiles down to one splice against the text it was
/// matched on. Splices never touch the file system; [`persist`] writes the
/// final buffer once per file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Splice does nothing until applied with apply_splices()"]
pub struct Splice {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to insert at [byte_start, byte_end)
    pub new_text: String,
    /// What we expect to find at the span before replacing it
    pub expected_before: SpliceVerification,
}

/// Verification strategy for splice safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (used for large spans)
    Hash(u64),
}

impl SpliceVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            SpliceVerification::ExactMatch(expected) => text == expected,
            SpliceVerification::Hash(expected_hash) => fingerprint(text) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            SpliceVerification::Hash(fingerprint(text))
        } else {
            SpliceVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Before-text verification failed at byte {byte_start}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in text of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("Byte offset {offset} is not on a UTF-8 character boundary")]
    NotCharBoundary { offset: usize },

    #[error("Overlapping splices: [{first_start}, {first_end}) and [{second_start}, {second_end})")]
    Overlap {
        first_start: usize,
        first_end: usize,
        second_start: usize,
        second_end: usize,
    },

    #[error("File I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Splice {
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: &str,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: SpliceVerification::from_text(expected_before),
        }
    }

    /// True when applying this splice would not change the text.
    pub fn is_noop(&self, text: &str) -> bool {
        text.get(self.byte_start..self.byte_end) == Some(self.new_text.as_str())
    }

    fn validate(&self, text: &str) -> Result<(), EditError> {
        if self.byte_start > self.byte_end || self.byte_end > text.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                len: text.len(),
            });
        }
        for offset in [self.byte_start, self.byte_end] {
            if !text.is_char_boundary(offset) {
                return Err(EditError::NotCharBoundary { offset });
            }
        }

        let current = &text[self.byte_start..self.byte_end];
        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                found: current.to_string(),
            });
        }
        Ok(())
    }
}

/// Apply a batch of splices computed against `text`.
///
/// All splices are validated against the original text before any is
/// applied; spans must be pairwise disjoint. Splices are applied
/// bottom-to-top so earlier offsets stay valid.
pub fn apply_splices(text: &str, mut splices: Vec<Splice>) -> Result<String, EditError> {
    if splices.is_empty() {
        return Ok(text.to_string());
    }

    for splice in &splices {
        splice.validate(text)?;
    }

    splices.sort_by(|a, b| b.byte_start.cmp(&a.byte_start).then(b.byte_end.cmp(&a.byte_end)));

    // Sorted descending: `later` starts at or after `earlier`.
    for window in splices.windows(2) {
        let (later, earlier) = (&window[0], &window[1]);
        if earlier.byte_end > later.byte_start {
            return Err(EditError::Overlap {
                first_start: earlier.byte_start,
                first_end: earlier.byte_end,
                second_start: later.byte_start,
                second_end: later.byte_end,
            });
        }
    }

    let mut out = text.to_string();
    for splice in &splices {
        if splice.is_noop(&out) {
            continue;
        }
        out.replace_range(splice.byte_start..splice.byte_end, &splice.new_text);
    }
    Ok(out)
}

/// xxh3 fingerprint of a text buffer.
pub fn fingerprint(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

/// Persist `content` to `path` atomically and bump its mtime.
///
/// Uses tempfile + fsync + rename so a concurrent reader sees either the
/// old or the new content, never a torn write.
pub fn persist(path: &Path, content: &str) -> Result<(), EditError> {
    let io_err = |source: std::io::Error| EditError::Io {
        path: path.to_path_buf(),
        source,
    };

    atomic_write(path, content.as_bytes()).map_err(io_err)?;

    // Invalidate incremental compilation of the rewritten crate
    filetime::set_file_mtime(path, filetime::FileTime::now()).map_err(io_err)?;
    Ok(())
}

fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // Same directory keeps the rename on one filesystem
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    // Keep the original file's permissions
    if let Ok(meta) = fs::metadata(path) {
        temp.as_file().set_permissions(meta.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
