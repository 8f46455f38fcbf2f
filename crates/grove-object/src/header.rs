//! `"<kind> <decimal length>\0"`, the prefix hashed and stored with every object.

use crate::{ObjectError, ObjectKind};

/// Longest header accepted: `"commit "` plus twenty digits and the NUL.
pub const MAX_HEADER_LEN: usize = 32;

pub fn encode(kind: ObjectKind, len: usize) -> Vec<u8> {
    format!("{} {}\0", kind, len).into_bytes()
}

/// Returns `(kind, payload length, header length including NUL)`.
pub fn parse(data: &[u8]) -> Result<(ObjectKind, usize, usize), ObjectError> {
    let window = &data[..data.len().min(MAX_HEADER_LEN)];
    let nul = window
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ObjectError::BadHeader("no NUL terminator".into()))?;
    let space = window[..nul]
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| ObjectError::BadHeader("no space after kind".into()))?;
    let kind = ObjectKind::from_bytes(&window[..space])?;
    let digits = &window[space + 1..nul];
    if digits.is_empty()
        || !digits.iter().all(u8::is_ascii_digit)
        || (digits.len() > 1 && digits[0] == b'0')
    {
        return Err(ObjectError::BadHeader(format!(
            "bad length {:?}",
            String::from_utf8_lossy(digits)
        )));
    }
    let size = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| ObjectError::BadHeader("length overflow".into()))?;
    Ok((kind, size, nul + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let hdr = encode(ObjectKind::Commit, 1234);
        assert_eq!(hdr, b"commit 1234\0");
        assert_eq!(parse(&hdr).unwrap(), (ObjectKind::Commit, 1234, hdr.len()));
    }

    #[test]
    fn leading_zero_rejected() {
        assert!(parse(b"blob 05\0hello").is_err());
    }

    #[test]
    fn missing_nul_rejected() {
        assert!(parse(b"blob 5hello").is_err());
    }

    #[test]
    fn unknown_kind_rejected() {
        assert!(matches!(
            parse(b"blub 0\0"),
            Err(ObjectError::UnknownKind(_))
        ));
    }
}
