//! Value conversions shared by the typed getters.

use bstr::ByteSlice;

/// git's boolean spellings, case-insensitive. Empty means false.
pub fn parse_bool(value: &[u8]) -> Option<bool> {
    let lower = value.trim().to_ascii_lowercase();
    match lower.as_slice() {
        b"true" | b"yes" | b"on" | b"1" => Some(true),
        b"false" | b"no" | b"off" | b"0" | b"" => Some(false),
        _ => None,
    }
}

/// Decimal integer with an optional `k`, `m` or `g` (binary) suffix.
pub fn parse_int(value: &[u8]) -> Option<i64> {
    let value = std::str::from_utf8(value).ok()?.trim();
    let (digits, scale) = match value.as_bytes().last()? {
        b'k' | b'K' => (&value[..value.len() - 1], 1i64 << 10),
        b'm' | b'M' => (&value[..value.len() - 1], 1 << 20),
        b'g' | b'G' => (&value[..value.len() - 1], 1 << 30),
        _ => (value, 1),
    };
    digits.parse::<i64>().ok()?.checked_mul(scale)
}

/// Quote a value for writing if it would not survive parsing bare.
pub fn quote(value: &str) -> String {
    let needs_quotes = value.starts_with([' ', '\t'])
        || value.ends_with([' ', '\t'])
        || value.contains(['#', ';']);
    let mut out = String::with_capacity(value.len() + 2);
    if needs_quotes {
        out.push('"');
    }
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    if needs_quotes {
        out.push('"');
    }
    out
}

pub fn escape_subsection(sub: &[u8]) -> String {
    let mut out = String::with_capacity(sub.len());
    for c in String::from_utf8_lossy(sub).chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans() {
        assert_eq!(parse_bool(b"Yes"), Some(true));
        assert_eq!(parse_bool(b"off"), Some(false));
        assert_eq!(parse_bool(b""), Some(false));
        assert_eq!(parse_bool(b"maybe"), None);
    }

    #[test]
    fn integers_with_suffixes() {
        assert_eq!(parse_int(b"42"), Some(42));
        assert_eq!(parse_int(b"-3"), Some(-3));
        assert_eq!(parse_int(b"8k"), Some(8192));
        assert_eq!(parse_int(b"2m"), Some(2 * 1024 * 1024));
        assert_eq!(parse_int(b"1g"), Some(1 << 30));
        assert_eq!(parse_int(b"x"), None);
        assert_eq!(parse_int(b""), None);
    }

    #[test]
    fn quoting_round_trips_through_parser() {
        let tricky = " lead # hash \"quoted\" back\\slash";
        let text = format!("[a]\n\tk = {}\n", quote(tricky));
        let file = crate::ConfigFile::parse(text.as_bytes()).unwrap();
        assert_eq!(file.get_string("a.k").unwrap().as_deref(), Some(tricky));
    }
}
