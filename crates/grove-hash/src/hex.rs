//! Lowercase hex codec used for ids on disk and on the wire.

use crate::HashError;

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// Encode `bytes` into `out`, which must be exactly twice as long.
pub fn encode_into(bytes: &[u8], out: &mut [u8]) {
    debug_assert_eq!(out.len(), bytes.len() * 2);
    for (i, b) in bytes.iter().enumerate() {
        out[i * 2] = HEX_CHARS[(b >> 4) as usize];
        out[i * 2 + 1] = HEX_CHARS[(b & 0x0f) as usize];
    }
}

pub fn encode(bytes: &[u8]) -> String {
    let mut out = vec![0u8; bytes.len() * 2];
    encode_into(bytes, &mut out);
    // Only ASCII hex digits were written.
    String::from_utf8(out).unwrap_or_default()
}

fn nibble(c: u8) -> Result<u8, HashError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(HashError::InvalidHex(c as char)),
    }
}

/// Decode hex text into `out`. Accepts either case.
pub fn decode_into(hex: &[u8], out: &mut [u8]) -> Result<(), HashError> {
    if hex.len() != out.len() * 2 {
        return Err(HashError::InvalidHexLength {
            expected: out.len() * 2,
            actual: hex.len(),
        });
    }
    for (i, pair) in hex.chunks_exact(2).enumerate() {
        out[i] = (nibble(pair[0])? << 4) | nibble(pair[1])?;
    }
    Ok(())
}

pub fn is_hex(s: &[u8]) -> bool {
    s.iter().all(u8::is_ascii_hexdigit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_known_bytes() {
        assert_eq!(encode(&[0x00, 0xab, 0xff]), "00abff");
    }

    #[test]
    fn decode_rejects_bad_char() {
        let mut out = [0u8; 1];
        assert!(matches!(
            decode_into(b"zz", &mut out),
            Err(HashError::InvalidHex('z'))
        ));
    }

    #[test]
    fn decode_accepts_uppercase() {
        let mut out = [0u8; 2];
        decode_into(b"ABcd", &mut out).unwrap();
        assert_eq!(out, [0xab, 0xcd]);
    }
}
