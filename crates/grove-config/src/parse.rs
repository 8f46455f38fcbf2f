//! Event parser for git's INI dialect.
//!
//! Every byte of the input ends up in exactly one event's `raw` text, so
//! concatenating the raws reproduces the file; edits only replace the raw
//! text of the events they touch.

use bstr::{BString, ByteVec};

use crate::error::ConfigError;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

#[derive(Debug, Clone)]
pub enum Event {
    /// `[section]` or `[section "subsection"]`.
    Section {
        raw: BString,
        section: BString,
        subsection: Option<BString>,
    },
    /// `name = value`, or a bare `name` (value `None`).
    Entry {
        raw: BString,
        name: BString,
        value: Option<BString>,
        line: usize,
    },
    /// Comments, blank lines and the BOM.
    Other(BString),
}

impl Event {
    pub fn raw(&self) -> &[u8] {
        match self {
            Event::Section { raw, .. } | Event::Entry { raw, .. } | Event::Other(raw) => raw,
        }
    }
}

pub fn parse(input: &[u8]) -> Result<Vec<Event>, ConfigError> {
    let mut events = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    if input.starts_with(UTF8_BOM) {
        events.push(Event::Other(UTF8_BOM.into()));
        pos = UTF8_BOM.len();
    }

    while pos < input.len() {
        let start = pos;
        let mut p = skip_blanks(input, pos);
        match input.get(p) {
            None | Some(b'\n') | Some(b'\r') | Some(b'#') | Some(b';') => {
                p = line_end(input, p);
                pos = after_newline(input, p);
                events.push(Event::Other(input[start..pos].into()));
                line += 1;
            }
            Some(b'[') => {
                let (section, subsection, end) = section_header(input, p, line)?;
                pos = after_newline(input, end);
                events.push(Event::Section {
                    raw: input[start..pos].into(),
                    section,
                    subsection,
                });
                line += 1;
            }
            Some(_) => {
                let (name, value, end, lines) = entry(input, p, line)?;
                events.push(Event::Entry {
                    raw: input[start..end].into(),
                    name,
                    value,
                    line,
                });
                pos = end;
                line += lines;
            }
        }
    }
    Ok(events)
}

fn err(line: usize, message: impl Into<String>) -> ConfigError {
    ConfigError::Parse {
        line,
        message: message.into(),
    }
}

fn skip_blanks(input: &[u8], mut pos: usize) -> usize {
    while matches!(input.get(pos), Some(b' ' | b'\t')) {
        pos += 1;
    }
    pos
}

fn line_end(input: &[u8], mut pos: usize) -> usize {
    while pos < input.len() && input[pos] != b'\n' && input[pos] != b'\r' {
        pos += 1;
    }
    pos
}

fn after_newline(input: &[u8], pos: usize) -> usize {
    match input.get(pos) {
        Some(b'\r') if input.get(pos + 1) == Some(&b'\n') => pos + 2,
        Some(b'\r' | b'\n') => pos + 1,
        _ => pos,
    }
}

fn is_section_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'.'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-'
}

fn section_header(
    input: &[u8],
    open: usize,
    line: usize,
) -> Result<(BString, Option<BString>, usize), ConfigError> {
    let mut pos = open + 1;
    let name_start = pos;
    while pos < input.len() && is_section_char(input[pos]) {
        pos += 1;
    }
    if pos == name_start {
        return Err(err(line, "empty section name"));
    }
    let section = BString::from(input[name_start..pos].to_ascii_lowercase());

    let mut subsection = None;
    if matches!(input.get(pos), Some(b' ' | b'\t')) {
        pos = skip_blanks(input, pos);
        if input.get(pos) != Some(&b'"') {
            return Err(err(line, "expected '\"' before subsection"));
        }
        pos += 1;
        let mut sub = BString::default();
        loop {
            match input.get(pos) {
                None | Some(b'\n') | Some(b'\r') => return Err(err(line, "unterminated subsection")),
                Some(b'"') => break,
                Some(b'\\') => {
                    let Some(&escaped) = input.get(pos + 1) else {
                        return Err(err(line, "unterminated escape in subsection"));
                    };
                    sub.push_byte(escaped);
                    pos += 2;
                }
                Some(&b) => {
                    sub.push_byte(b);
                    pos += 1;
                }
            }
        }
        pos += 1;
        subsection = Some(sub);
    }

    if input.get(pos) != Some(&b']') {
        return Err(err(line, "expected ']' to close section header"));
    }
    pos = skip_blanks(input, pos + 1);
    match input.get(pos) {
        None | Some(b'\n') | Some(b'\r') => Ok((section, subsection, pos)),
        Some(b'#' | b';') => Ok((section, subsection, line_end(input, pos))),
        Some(&other) => Err(err(
            line,
            format!("unexpected {:?} after section header", other as char),
        )),
    }
}

/// Returns the name, the value, the end offset (past the newline) and how
/// many lines the entry spanned.
fn entry(
    input: &[u8],
    start: usize,
    line: usize,
) -> Result<(BString, Option<BString>, usize, usize), ConfigError> {
    let mut pos = start;
    while pos < input.len() && is_name_char(input[pos]) {
        pos += 1;
    }
    if pos == start || !input[start].is_ascii_alphabetic() {
        return Err(err(line, "invalid variable name"));
    }
    let name = BString::from(input[start..pos].to_ascii_lowercase());

    pos = skip_blanks(input, pos);
    match input.get(pos) {
        None | Some(b'\n') | Some(b'\r') | Some(b'#') | Some(b';') => {
            let end = after_newline(input, line_end(input, pos));
            return Ok((name, None, end, 1));
        }
        Some(b'=') => pos += 1,
        Some(&other) => return Err(err(line, format!("expected '=' after name, got {:?}", other as char))),
    }
    pos = skip_blanks(input, pos);

    let mut value = Vec::new();
    // Length of `value` up to the last byte that must survive trimming.
    let mut keep = 0;
    let mut quoted = false;
    let mut lines = 1;
    loop {
        match input.get(pos) {
            None => break,
            Some(b'\n' | b'\r') => {
                if quoted {
                    return Err(err(line + lines - 1, "newline inside quoted value"));
                }
                pos = after_newline(input, pos);
                break;
            }
            Some(b'"') => {
                quoted = !quoted;
                keep = value.len();
                pos += 1;
            }
            Some(b'#' | b';') if !quoted => {
                pos = after_newline(input, line_end(input, pos));
                break;
            }
            Some(b'\\') => {
                let escaped = match input.get(pos + 1) {
                    Some(b'\n') => {
                        pos += 2;
                        lines += 1;
                        continue;
                    }
                    Some(b'\r') => {
                        pos = after_newline(input, pos + 1);
                        lines += 1;
                        continue;
                    }
                    Some(b'n') => b'\n',
                    Some(b't') => b'\t',
                    Some(b'b') => b'\x08',
                    Some(b'\\') => b'\\',
                    Some(b'"') => b'"',
                    Some(&other) => return Err(err(line, format!("invalid escape \\{}", other as char))),
                    None => return Err(err(line, "backslash at end of input")),
                };
                value.push(escaped);
                keep = value.len();
                pos += 2;
            }
            Some(&b) => {
                value.push(b);
                if quoted || (b != b' ' && b != b'\t') {
                    keep = value.len();
                }
                pos += 1;
            }
        }
    }
    if quoted {
        return Err(err(line, "unterminated quoted value"));
    }
    value.truncate(keep);
    Ok((name, Some(value.into()), pos, lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(input: &str) -> Vec<(String, Option<String>)> {
        parse(input.as_bytes())
            .unwrap()
            .into_iter()
            .filter_map(|e| match e {
                Event::Entry { name, value, .. } => {
                    Some((name.to_string(), value.map(|v| v.to_string())))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn raw_text_is_preserved() {
        let input = "# top\n[core]\n\tbare = false ; trailing\n\n[remote \"origin\"]\n\turl = x\n";
        let events = parse(input.as_bytes()).unwrap();
        let joined: Vec<u8> = events.iter().flat_map(|e| e.raw().to_vec()).collect();
        assert_eq!(joined, input.as_bytes());
    }

    #[test]
    fn values_are_unquoted_and_unescaped() {
        let got = entries("[a]\n x = \"  padded  \"\n y = one\\ttwo\n z = keep \"#\" this # not this\n");
        assert_eq!(got[0].1.as_deref(), Some("  padded  "));
        assert_eq!(got[1].1.as_deref(), Some("one\ttwo"));
        assert_eq!(got[2].1.as_deref(), Some("keep # this"));
    }

    #[test]
    fn bare_name_has_no_value() {
        let got = entries("[core]\n\tbare\n");
        assert_eq!(got, vec![("bare".to_string(), None)]);
    }

    #[test]
    fn continuation_joins_lines() {
        let got = entries("[a]\n k = one \\\ntwo\n");
        assert_eq!(got[0].1.as_deref(), Some("one two"));
    }

    #[test]
    fn subsection_keeps_case_and_escapes() {
        let events = parse(b"[Remote \"Up\\\"stream\"]\n").unwrap();
        match &events[0] {
            Event::Section { section, subsection, .. } => {
                assert_eq!(section, "remote");
                assert_eq!(subsection.as_ref().unwrap(), "Up\"stream");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_lines_report_line_number() {
        let e = parse(b"[core]\n\tok = 1\n\t= nope\n").unwrap_err();
        assert!(matches!(e, ConfigError::Parse { line: 3, .. }));
        assert!(parse(b"[core\n").is_err());
        assert!(parse(b"[a]\n k = \"open\n").is_err());
    }
}
