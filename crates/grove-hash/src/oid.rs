use std::fmt;
use std::str::FromStr;

use crate::{hex, HashError, HEX_LEN, RAW_LEN};

/// A 20-byte SHA-1 object id.
///
/// Ordering is byte-wise, which is also the order used by pack indexes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; RAW_LEN]);

impl ObjectId {
    /// The all-zero id, used on the wire for "no object".
    pub const NULL: ObjectId = ObjectId([0u8; RAW_LEN]);

    pub const fn new(bytes: [u8; RAW_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        let raw: [u8; RAW_LEN] = bytes.try_into().map_err(|_| HashError::InvalidLength {
            expected: RAW_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(raw))
    }

    pub fn from_hex(hex: impl AsRef<[u8]>) -> Result<Self, HashError> {
        let hex = hex.as_ref();
        let mut raw = [0u8; RAW_LEN];
        hex::decode_into(hex, &mut raw)?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; RAW_LEN] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; RAW_LEN]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Write the 40 hex digits into a caller-provided buffer.
    pub fn write_hex(&self, out: &mut [u8; HEX_LEN]) {
        hex::encode_into(&self.0, out);
    }

    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    /// Relative path of the loose object: `xx/yyyy...`.
    pub fn loose_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}", &hex[..2], &hex[2..])
    }

    /// Abbreviated hex form, at least 4 and at most 40 digits.
    pub fn short(&self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len.clamp(4, HEX_LEN));
        hex
    }
}

impl FromStr for ObjectId {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0u8; HEX_LEN];
        self.write_hex(&mut buf);
        f.write_str(std::str::from_utf8(&buf).map_err(|_| fmt::Error)?)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short(8))
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; RAW_LEN]> for ObjectId {
    fn from(raw: [u8; RAW_LEN]) -> Self {
        Self(raw)
    }
}
