//! Batch driver: fold one rule set over an ordered file list.
//!
//! Files are processed one at a time in list order. A file no rule matches
//! is left alone. The first read, write or guard failure aborts the run;
//! files already written stay written.

use crate::edit::{fingerprint, persist, EditError};
use crate::rule::RuleSet;
use crate::safety::{SafetyError, WorkspaceGuard};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    NotUtf8 { path: PathBuf },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: EditError,
    },

    #[error("refusing to touch {path}: {source}")]
    Unsafe {
        path: PathBuf,
        #[source]
        source: SafetyError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Compute rewrites without writing them
    pub dry_run: bool,
    /// Reject paths outside a workspace
    pub guard: Option<WorkspaceGuard>,
    /// Keep before/after text of modified files for diffing
    pub capture_text: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum FileStatus {
    Unchanged,
    Modified,
    Failed { reason: String },
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Unchanged => write!(f, "unchanged"),
            FileStatus::Modified => write!(f, "modified"),
            FileStatus::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleHit {
    pub rule: String,
    pub hits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPair {
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    /// Per-rule hit counts, in rule order
    pub hits: Vec<RuleHit>,
    /// Whether new content reached disk
    pub written: bool,
    pub before_fingerprint: Option<u64>,
    pub after_fingerprint: Option<u64>,
    #[serde(skip)]
    pub text: Option<TextPair>,
}

impl FileReport {
    fn failed(path: &Path, error: &DriverError) -> Self {
        Self {
            path: path.to_path_buf(),
            status: FileStatus::Failed {
                reason: error.to_string(),
            },
            hits: Vec::new(),
            written: false,
            before_fingerprint: None,
            after_fingerprint: None,
            text: None,
        }
    }

    pub fn total_hits(&self) -> usize {
        self.hits.iter().map(|h| h.hits).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Name of the rule set that ran
    pub pass: String,
    pub dry_run: bool,
    pub files: Vec<FileReport>,
    /// Set when a failure stopped the run early
    pub aborted: bool,
    /// Files never reached because of the abort
    pub skipped: Vec<PathBuf>,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.status)).count()
    }

    pub fn modified(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Modified))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Unchanged))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed { .. }))
    }

    pub fn total_hits(&self) -> usize {
        self.files.iter().map(FileReport::total_hits).sum()
    }

    pub fn is_success(&self) -> bool {
        !self.aborted && self.failed() == 0
    }
}

/// Run `rules` over `files`, writing changes in place.
pub fn run<P: AsRef<Path>>(files: &[P], rules: &RuleSet) -> RunReport {
    run_with(files, rules, &RunOptions::default())
}

pub fn run_with<P: AsRef<Path>>(files: &[P], rules: &RuleSet, options: &RunOptions) -> RunReport {
    let mut report = RunReport {
        pass: rules.name().to_string(),
        dry_run: options.dry_run,
        files: Vec::with_capacity(files.len()),
        aborted: false,
        skipped: Vec::new(),
    };

    for (idx, path) in files.iter().enumerate() {
        let path = path.as_ref();
        tracing::info!(pass = rules.name(), path = %path.display(), "processing");

        match process_file(path, rules, options) {
            Ok(file) => {
                tracing::info!(
                    path = %path.display(),
                    status = %file.status,
                    hits = file.total_hits(),
                    "done"
                );
                report.files.push(file);
            }
            Err(error) => {
                tracing::error!(path = %path.display(), %error, "aborting run");
                report.files.push(FileReport::failed(path, &error));
                report.aborted = true;
                report.skipped = files[idx + 1..]
                    .iter()
                    .map(|p| p.as_ref().to_path_buf())
                    .collect();
                break;
            }
        }
    }

    report
}

fn process_file(
    path: &Path,
    rules: &RuleSet,
    options: &RunOptions,
) -> Result<FileReport, DriverError> {
    let unsafe_path = |source| DriverError::Unsafe {
        path: path.to_path_buf(),
        source,
    };

    // Persist renames over the target, so a symlink must resolve to the
    // file it points at first
    let target = match &options.guard {
        Some(guard) => guard.validate_path(path).map_err(unsafe_path)?,
        None => fs::canonicalize(path).map_err(|source| DriverError::Read {
            path: path.to_path_buf(),
            source,
        })?,
    };

    let bytes = fs::read(&target).map_err(|source| DriverError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let original = String::from_utf8(bytes).map_err(|_| DriverError::NotUtf8 {
        path: path.to_path_buf(),
    })?;

    let outcome = rules.apply(&original);
    for (rule, hits) in outcome.hits.iter().filter(|(_, n)| *n > 0) {
        tracing::debug!(path = %path.display(), rule = %rule, hits, "rule matched");
    }
    let hits = outcome
        .hits
        .iter()
        .map(|(rule, hits)| RuleHit {
            rule: rule.clone(),
            hits: *hits,
        })
        .collect();

    let before_fingerprint = fingerprint(&original);
    if outcome.text == original {
        return Ok(FileReport {
            path: path.to_path_buf(),
            status: FileStatus::Unchanged,
            hits,
            written: false,
            before_fingerprint: Some(before_fingerprint),
            after_fingerprint: Some(before_fingerprint),
            text: None,
        });
    }

    let after_fingerprint = fingerprint(&outcome.text);
    let mut written = false;
    if !options.dry_run {
        if let Some(guard) = &options.guard {
            guard.revalidate(&target).map_err(unsafe_path)?;
        }
        persist(&target, &outcome.text).map_err(|source| DriverError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        written = true;
    }

    Ok(FileReport {
        path: path.to_path_buf(),
        status: FileStatus::Modified,
        hits,
        written,
        before_fingerprint: Some(before_fingerprint),
        after_fingerprint: Some(after_fingerprint),
        text: options.capture_text.then(|| TextPair {
            before: original,
            after: outcome.text,
        }),
    })
}
