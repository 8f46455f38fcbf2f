//! Delta streams: `<source size> <target size>` as base-128 varints, then
//! instructions. A copy instruction has its high bit set and selects which
//! offset (bits 0-3) and size (bits 4-6) bytes follow; a zero size means
//! 0x10000. Any other non-zero byte inserts that many literal bytes.

use std::collections::HashMap;

use crate::PackError;

const BLOCK: usize = 16;
const MAX_INSERT: usize = 0x7f;
const MAX_COPY: usize = 0x00ff_ffff;

fn bad(reason: impl Into<String>) -> PackError {
    PackError::BadDelta(reason.into())
}

/// Read one varint; returns `(value, bytes consumed)`.
pub fn read_varint(data: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        if shift > 63 {
            return None;
        }
        value |= ((byte & 0x7f) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// `(source size, target size, instructions start)` of a delta stream.
pub fn sizes(delta: &[u8]) -> Result<(u64, u64, usize), PackError> {
    let (source, a) = read_varint(delta).ok_or_else(|| bad("truncated source size"))?;
    let (target, b) = read_varint(&delta[a..]).ok_or_else(|| bad("truncated target size"))?;
    Ok((source, target, a + b))
}

/// Rebuild the target from `base` and `delta`, bounds-checking every copy.
pub fn apply(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, PackError> {
    let (source_size, target_size, mut pos) = sizes(delta)?;
    if source_size != base.len() as u64 {
        return Err(bad(format!(
            "base is {} bytes, delta expects {}",
            base.len(),
            source_size
        )));
    }
    let target_size = usize::try_from(target_size).map_err(|_| bad("target too large"))?;
    // The declared size is untrusted; the output is checked against it below.
    let mut out = Vec::with_capacity(target_size.min(1 << 24));

    while pos < delta.len() {
        let op = delta[pos];
        pos += 1;
        if op & 0x80 != 0 {
            let mut fields = [0usize; 2];
            let mut bit = 0;
            for (field, width) in fields.iter_mut().zip([4usize, 3]) {
                for i in 0..width {
                    if op & (1 << bit) != 0 {
                        let byte = *delta.get(pos).ok_or_else(|| bad("truncated copy"))?;
                        *field |= (byte as usize) << (8 * i);
                        pos += 1;
                    }
                    bit += 1;
                }
            }
            let [offset, mut size] = fields;
            if size == 0 {
                size = 0x10000;
            }
            let end = offset
                .checked_add(size)
                .filter(|&end| end <= base.len())
                .ok_or_else(|| bad(format!("copy {}+{} past base end {}", offset, size, base.len())))?;
            out.extend_from_slice(&base[offset..end]);
        } else if op != 0 {
            let n = op as usize;
            let lit = delta
                .get(pos..pos + n)
                .ok_or_else(|| bad("truncated insert"))?;
            out.extend_from_slice(lit);
            pos += n;
        } else {
            return Err(bad("reserved opcode 0"));
        }
        if out.len() > target_size {
            return Err(bad("output exceeds declared target size"));
        }
    }

    if out.len() != target_size {
        return Err(bad(format!(
            "produced {} bytes, expected {}",
            out.len(),
            target_size
        )));
    }
    Ok(out)
}

/// Compute a delta turning `source` into `target`.
///
/// Source blocks are indexed at fixed `BLOCK`-byte boundaries; the target is
/// scanned byte by byte, and each hit is extended forward as a copy.
pub fn compute(source: &[u8], target: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(target.len() / 4 + 16);
    write_varint(&mut out, source.len() as u64);
    write_varint(&mut out, target.len() as u64);

    let mut blocks: HashMap<&[u8], usize> = HashMap::new();
    if source.len() >= BLOCK {
        for start in (0..=source.len() - BLOCK).step_by(BLOCK) {
            blocks.entry(&source[start..start + BLOCK]).or_insert(start);
        }
    }

    let mut literal_start = 0;
    let mut pos = 0;
    while pos < target.len() {
        let hit = target
            .get(pos..pos + BLOCK)
            .and_then(|window| blocks.get(window).copied());
        match hit {
            Some(src) => {
                let mut len = BLOCK;
                while src + len < source.len()
                    && pos + len < target.len()
                    && source[src + len] == target[pos + len]
                {
                    len += 1;
                }
                push_literals(&mut out, &target[literal_start..pos]);
                push_copy(&mut out, src, len);
                pos += len;
                literal_start = pos;
            }
            None => pos += 1,
        }
    }
    push_literals(&mut out, &target[literal_start..]);
    out
}

fn push_literals(out: &mut Vec<u8>, mut data: &[u8]) {
    while !data.is_empty() {
        let n = data.len().min(MAX_INSERT);
        out.push(n as u8);
        out.extend_from_slice(&data[..n]);
        data = &data[n..];
    }
}

fn push_copy(out: &mut Vec<u8>, mut offset: usize, mut len: usize) {
    while len > 0 {
        let chunk = len.min(MAX_COPY);
        let op_pos = out.len();
        out.push(0x80);
        let mut op = 0x80u8;
        for i in 0..4 {
            let byte = ((offset >> (8 * i)) & 0xff) as u8;
            if byte != 0 {
                op |= 1 << i;
                out.push(byte);
            }
        }
        for i in 0..3 {
            let byte = ((chunk >> (8 * i)) & 0xff) as u8;
            if byte != 0 {
                op |= 1 << (4 + i);
                out.push(byte);
            }
        }
        out[op_pos] = op;
        offset += chunk;
        len -= chunk;
    }
}
