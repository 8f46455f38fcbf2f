//! Want/have negotiation, client side.

use std::io::{self, Read};

use bstr::ByteSlice;
use grove_hash::ObjectId;
use grove_transport::Transport;

use crate::capability::Capabilities;
use crate::pktline::{PktLineReader, PktLineWriter};
use crate::sideband::SidebandReader;
use crate::{chomp, ProtocolError};

/// Haves sent between two flushes.
pub const HAVE_BATCH: usize = 32;

/// The pack stream that follows negotiation.
pub enum PackReader<'a> {
    Raw(&'a mut dyn Read),
    Sideband(SidebandReader<&'a mut dyn Read>),
}

impl Read for PackReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PackReader::Raw(r) => r.read(buf),
            PackReader::Sideband(r) => r.read(buf),
        }
    }
}

/// A server reply to a flush or to `done`: the common commit it
/// acknowledged, or `None` for `NAK`.
fn read_ack(transport: &mut dyn Transport) -> Result<Option<ObjectId>, ProtocolError> {
    let line = PktLineReader::new(transport.reader())
        .read_line()?
        .ok_or_else(|| ProtocolError::UnexpectedPacket("flush instead of ACK/NAK".into()))?;
    let line = chomp(&line);
    if line == b"NAK" {
        return Ok(None);
    }
    if let Some(rest) = line.strip_prefix(b"ACK ") {
        let hex = rest.split_str(" ").next().unwrap_or(rest);
        return Ok(Some(ObjectId::from_hex(hex)?));
    }
    if let Some(message) = line.strip_prefix(b"ERR ") {
        return Err(ProtocolError::Remote(message.to_str_lossy().into_owned()));
    }
    Err(ProtocolError::UnexpectedPacket(line.to_str_lossy().into_owned()))
}

/// Ask for `wants`, telling the server about `haves`, and return the pack
/// stream that follows.
///
/// Haves go out in batches of [`HAVE_BATCH`], each closed by a flush and
/// answered with one `ACK` or `NAK`. The first `ACK` ends the have phase,
/// and `done` is only answered when nothing was acknowledged.
/// With no wants only a flush is sent and `None` is returned.
pub fn negotiate<'a>(
    transport: &'a mut dyn Transport,
    server: &Capabilities,
    wants: &[ObjectId],
    haves: &[ObjectId],
) -> Result<Option<PackReader<'a>>, ProtocolError> {
    let request = server.client_request();
    {
        let mut out = PktLineWriter::new(transport.writer());
        for (i, want) in wants.iter().enumerate() {
            if i == 0 {
                out.write_text(&format!("want {} {}", want, request))?;
            } else {
                out.write_text(&format!("want {}", want))?;
            }
        }
        out.write_flush()?;
        out.flush()?;
    }
    if wants.is_empty() {
        tracing::debug!("nothing to fetch");
        return Ok(None);
    }

    let mut common = None;
    let mut sent = 0;
    for batch in haves.chunks(HAVE_BATCH) {
        {
            let mut out = PktLineWriter::new(transport.writer());
            for have in batch {
                out.write_text(&format!("have {}", have))?;
            }
            out.write_flush()?;
            out.flush()?;
        }
        sent += batch.len();
        if let Some(id) = read_ack(transport)? {
            common = Some(id);
            break;
        }
    }

    {
        let mut out = PktLineWriter::new(transport.writer());
        out.write_text("done")?;
        out.flush()?;
    }
    // Once a have was acknowledged the pack follows `done` without a reply.
    if common.is_none() {
        common = read_ack(transport)?;
    }
    tracing::debug!(
        wants = wants.len(),
        haves_sent = sent,
        common = ?common,
        "negotiated"
    );

    let reader = transport.reader();
    Ok(Some(if request.has("side-band-64k") {
        PackReader::Sideband(SidebandReader::new(reader))
    } else {
        PackReader::Raw(reader)
    }))
}
