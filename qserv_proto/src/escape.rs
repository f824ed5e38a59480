//! Escaping for rows streamed in MySQL `LOAD DATA INFILE` format, matching
//! `RowBuffer::escapeString` exactly: a fixed set of control bytes map to a
//! backslash followed by a letter, and a lone `0x1A` (the DOS end-of-file
//! byte) maps to the two-character sequence `\Z` because it would otherwise
//! terminate the stream early on some platforms. A SQL `NULL` is written as
//! the separate two-byte token `\N` by the caller; this module only escapes
//! cell contents, not nullness.

/// Escape `field` for inclusion in an infile-formatted row.
pub fn escape_field(field: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(field.len());
    for &b in field {
        match b {
            0x00 => out.extend_from_slice(b"\\0"),
            0x08 => out.extend_from_slice(b"\\b"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x1A => out.extend_from_slice(b"\\Z"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            _ => out.push(b),
        }
    }
    out
}

/// Reverse [`escape_field`], turning an infile-escaped cell back into raw
/// bytes.
pub fn unescape_field(field: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(field.len());
    let mut it = field.iter().copied();
    while let Some(b) = it.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match it.next() {
            Some(b'0') => out.push(0x00),
            Some(b'b') => out.push(0x08),
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b't') => out.push(b'\t'),
            Some(b'Z') => out.push(0x1A),
            Some(b'\\') => out.push(b'\\'),
            Some(other) => out.push(other),
            None => out.push(b'\\'),
        }
    }
    out
}

/// The reserved token for a SQL `NULL` cell in an infile row.
pub const NULL_TOKEN: &[u8] = b"\\N";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_control_bytes() {
        assert_eq!(escape_field(b"a\0b"), b"a\\0b");
        assert_eq!(escape_field(b"a\nb"), b"a\\nb");
        assert_eq!(escape_field(b"a\tb"), b"a\\tb");
        assert_eq!(escape_field(&[b'a', 0x1A, b'b']), b"a\\Zb");
    }

    #[test]
    fn round_trips_arbitrary_bytes() {
        let original: &[u8] = b"line1\nline2\ttab\0nul\x1aend\\slash";
        let escaped = escape_field(original);
        assert_eq!(unescape_field(&escaped), original);
    }

    #[test]
    fn plain_ascii_is_unchanged() {
        assert_eq!(escape_field(b"hello world"), b"hello world");
    }
}
