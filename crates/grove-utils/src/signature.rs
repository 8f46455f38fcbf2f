//! Identity lines as they appear in commit and tag headers:
//! `Name <email> <seconds> <+hhmm>`.

use std::fmt;

use bstr::{BStr, BString, ByteSlice};
use chrono::{Local, Offset};

use crate::error::UtilError;

/// Seconds since the epoch plus the author's UTC offset in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Time {
    pub seconds: i64,
    pub offset_minutes: i32,
}

impl Time {
    pub fn new(seconds: i64, offset_minutes: i32) -> Self {
        Self {
            seconds,
            offset_minutes,
        }
    }

    pub fn now() -> Self {
        let now = Local::now();
        Self {
            seconds: now.timestamp(),
            offset_minutes: now.offset().fix().local_minus_utc() / 60,
        }
    }

    /// Parse `"<seconds> <+hhmm>"`. A missing zone means UTC.
    pub fn parse(input: &[u8]) -> Result<Self, UtilError> {
        let input = input.trim();
        let text = std::str::from_utf8(input)
            .map_err(|_| UtilError::Signature("non-UTF-8 timestamp".into()))?;
        let mut parts = text.split_ascii_whitespace();
        let seconds = parts
            .next()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| UtilError::Signature(format!("bad timestamp in '{}'", text)))?;
        let offset_minutes = match parts.next() {
            None => 0,
            Some(zone) => parse_zone(zone)
                .ok_or_else(|| UtilError::Signature(format!("bad zone '{}'", zone)))?,
        };
        Ok(Self::new(seconds, offset_minutes))
    }
}

fn parse_zone(zone: &str) -> Option<i32> {
    let (sign, digits) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => (1, zone),
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hhmm: i32 = digits.parse().ok()?;
    Some(sign * ((hhmm / 100) * 60 + hhmm % 100))
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.unsigned_abs();
        write!(f, "{} {}{:02}{:02}", self.seconds, sign, abs / 60, abs % 60)
    }
}

/// An author, committer or tagger line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    pub when: Time,
}

impl Signature {
    pub fn new(name: impl Into<BString>, email: impl Into<BString>, when: Time) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    pub fn parse(input: &BStr) -> Result<Self, UtilError> {
        let bytes = input.as_bytes();
        let gt = bytes
            .rfind_byte(b'>')
            .ok_or_else(|| UtilError::Signature("missing '>'".into()))?;
        let lt = bytes[..gt]
            .rfind_byte(b'<')
            .ok_or_else(|| UtilError::Signature("missing '<'".into()))?;
        Ok(Self {
            name: bytes[..lt].trim().into(),
            email: bytes[lt + 1..gt].into(),
            when: Time::parse(&bytes[gt + 1..])?,
        })
    }

    pub fn to_bytes(&self) -> BString {
        let mut out = BString::from(Vec::with_capacity(self.name.len() + self.email.len() + 32));
        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(self.when.to_string().as_bytes());
        out
    }
}
