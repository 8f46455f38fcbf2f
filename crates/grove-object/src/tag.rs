use bstr::BString;
use grove_hash::ObjectId;
use grove_utils::Signature;

use crate::commit::{parse_signature, split_headers, write_header};
use crate::{ObjectError, ObjectKind};

/// An annotated tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub target: ObjectId,
    pub target_kind: ObjectKind,
    pub name: BString,
    pub tagger: Option<Signature>,
    pub message: BString,
}

fn missing(field: &'static str) -> ObjectError {
    ObjectError::MissingField {
        kind: ObjectKind::Tag,
        field,
    }
}

impl Tag {
    pub fn parse(data: &[u8]) -> Result<Self, ObjectError> {
        let (headers, message) = split_headers(data);
        let mut target = None;
        let mut target_kind = None;
        let mut name = None;
        let mut tagger = None;
        for (key, value) in headers {
            match key {
                b"object" => {
                    target = Some(ObjectId::from_hex(&value).map_err(|_| ObjectError::BadField {
                        kind: ObjectKind::Tag,
                        line: value.clone().into(),
                    })?)
                }
                b"type" => target_kind = Some(ObjectKind::from_bytes(&value)?),
                b"tag" => name = Some(BString::from(value)),
                b"tagger" => tagger = Some(parse_signature(&value)?),
                _ => {}
            }
        }
        Ok(Self {
            target: target.ok_or_else(|| missing("object"))?,
            target_kind: target_kind.ok_or_else(|| missing("type"))?,
            name: name.ok_or_else(|| missing("tag"))?,
            tagger,
            message: message.into(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.message.len());
        write_header(&mut out, b"object", self.target.to_hex().as_bytes());
        write_header(&mut out, b"type", self.target_kind.as_str().as_bytes());
        write_header(&mut out, b"tag", &self.name);
        if let Some(tagger) = &self.tagger {
            write_header(&mut out, b"tagger", &tagger.to_bytes());
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }
}
