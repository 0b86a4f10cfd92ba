//! Lightweight delimiter scanning over raw source text.
//!
//! Not a parser: it knows just enough about string, char and comment
//! syntax to find where a bracketed list ends and to split it at its
//! top-level commas.

/// Find the byte offset of the delimiter that closes a list whose open
/// delimiter is the byte right before `from`.
///
/// Returns `None` when the text ends first or a closing delimiter of the
/// wrong kind shows up at depth zero.
pub fn find_close(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let open = *bytes.get(from.checked_sub(1)?)?;
    if !matches!(open, b'(' | b'[' | b'{') {
        return None;
    }
    let mut stack: Vec<u8> = Vec::new();
    let mut i = from;

    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => stack.push(bytes[i]),
            b')' | b']' | b'}' => match stack.pop() {
                Some(open) if closes(open, bytes[i]) => {}
                Some(_) => return None,
                None if closes(open, bytes[i]) => return Some(i),
                None => return None,
            },
            b'"' => {
                i = skip_string(bytes, i + 1, 0, false)?;
                continue;
            }
            b'r' if is_raw_string_start(bytes, i) => {
                i = skip_raw_string(bytes, i)?;
                continue;
            }
            b'\'' => {
                i = skip_char_literal(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = skip_line_comment(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_block_comment(bytes, i + 2)?;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split a bracketed list body at top-level commas.
///
/// Segments are trimmed and empty ones (a trailing comma, an empty list)
/// are dropped. With `angle_brackets`, `<...>` nests too, which is right for
/// parameter lists (`HashMap<K, V>`) and wrong for argument lists (`a < b`).
pub fn split_top_level(list: &str, angle_brackets: bool) -> Vec<&str> {
    let bytes = list.as_bytes();
    let mut depth: usize = 0;
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'<' if angle_brackets => depth += 1,
            // `->` in fn-pointer types is not a closing angle
            b'>' if angle_brackets && (i == 0 || bytes[i - 1] != b'-') => {
                depth = depth.saturating_sub(1)
            }
            b'"' => {
                i = skip_string(bytes, i + 1, 0, false).unwrap_or(bytes.len());
                continue;
            }
            b'r' if is_raw_string_start(bytes, i) => {
                i = skip_raw_string(bytes, i).unwrap_or(bytes.len());
                continue;
            }
            b'\'' => {
                i = skip_char_literal(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = skip_line_comment(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_block_comment(bytes, i + 2).unwrap_or(bytes.len());
                continue;
            }
            b',' if depth == 0 => {
                segments.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&list[start..]);

    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn closes(open: u8, close: u8) -> bool {
    matches!((open, close), (b'(', b')') | (b'[', b']') | (b'{', b'}'))
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Returns the offset just past the closing quote. `hashes` is the number
/// of `#` that must follow the quote (raw strings).
fn skip_string(bytes: &[u8], mut i: usize, hashes: usize, raw: bool) -> Option<usize> {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if !raw => i += 2,
            b'"' => {
                let tail = &bytes[i + 1..];
                if tail.len() >= hashes && tail[..hashes].iter().all(|&b| b == b'#') {
                    return Some(i + 1 + hashes);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

fn is_raw_string_start(bytes: &[u8], i: usize) -> bool {
    if i > 0 && is_ident_byte(bytes[i - 1]) {
        return false;
    }
    let mut j = i + 1;
    while bytes.get(j) == Some(&b'#') {
        j += 1;
    }
    bytes.get(j) == Some(&b'"')
}

fn skip_raw_string(bytes: &[u8], i: usize) -> Option<usize> {
    let mut j = i + 1;
    let mut hashes = 0;
    while bytes.get(j) == Some(&b'#') {
        hashes += 1;
        j += 1;
    }
    skip_string(bytes, j + 1, hashes, true)
}

/// Char literals (`'('`, `'\''`, `'\u{28}'`) are skipped whole; a lone
/// quote is a lifetime or label and only the quote itself is skipped.
fn skip_char_literal(bytes: &[u8], i: usize) -> usize {
    if bytes.get(i + 1) == Some(&b'\\') {
        let mut j = i + 3;
        while j < bytes.len() && j < i + 12 {
            if bytes[j] == b'\'' {
                return j + 1;
            }
            j += 1;
        }
        return i + 1;
    }
    // One (possibly multi-byte) character followed by a quote
    let Some(&lead) = bytes.get(i + 1) else {
        return i + 1;
    };
    let width = match lead {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    };
    if bytes.get(i + 1 + width) == Some(&b'\'') {
        i + 2 + width
    } else {
        i + 1
    }
}

fn skip_line_comment(bytes: &[u8], i: usize) -> usize {
    bytes[i..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| i + p)
}

fn skip_block_comment(bytes: &[u8], mut i: usize) -> Option<usize> {
    let mut depth = 1;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'/', b'*') => {
                depth += 1;
                i += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}
