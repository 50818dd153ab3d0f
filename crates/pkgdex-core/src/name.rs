//! Canonical package names.
//!
//! This is the only place names are normalized. Everything that stores or
//! compares a package name goes through [`canonicalize`].

/// Lowercase `name` and collapse every run of `-`, `_` and `.` into one `-`.
///
/// Surrounding whitespace is dropped. The function is idempotent.
pub fn canonicalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator_run = false;
    for ch in name.trim().chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !in_separator_run {
                out.push('-');
                in_separator_run = true;
            }
        } else {
            out.extend(ch.to_lowercase());
            in_separator_run = false;
        }
    }
    out
}

/// Whether `name` is a syntactically valid distribution name: ASCII letters,
/// digits, `-`, `_`, `.`, starting and ending with a letter or digit.
pub fn is_valid(name: &str) -> bool {
    let bytes = name.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}
