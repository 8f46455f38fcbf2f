//! Side-band multiplexing.
//!
//! With `side-band-64k` the pack travels inside pkt-lines whose first byte
//! names a channel: 1 carries pack data, 2 progress text, 3 a fatal error.

use std::io::{self, Read, Write};

use crate::pktline::{PktLine, PktLineReader, PktLineWriter, MAX_PKT_DATA_LEN};
use crate::{ProtocolError, RemoteMessage};

/// Largest band-1 payload per packet.
pub const MAX_BAND_DATA_LEN: usize = MAX_PKT_DATA_LEN - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Data = 1,
    Progress = 2,
    Error = 3,
}

/// Demultiplexes band 1 into a plain byte stream.
///
/// Progress is logged. A band-3 message surfaces as an `io::Error`
/// wrapping [`RemoteMessage`]. A flush packet ends the stream.
pub struct SidebandReader<R> {
    reader: PktLineReader<R>,
    buf: Vec<u8>,
    pos: usize,
    done: bool,
}

impl<R: Read> SidebandReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: PktLineReader::new(reader),
            buf: Vec::new(),
            pos: 0,
            done: false,
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        while self.pos == self.buf.len() && !self.done {
            let pkt = self.reader.read_pkt().map_err(into_io)?;
            let data = match pkt {
                PktLine::Data(data) => data,
                PktLine::Flush | PktLine::Delimiter | PktLine::ResponseEnd => {
                    self.done = true;
                    break;
                }
            };
            let Some((&band, payload)) = data.split_first() else {
                continue;
            };
            match band {
                1 => {
                    self.buf = data;
                    self.pos = 1;
                }
                2 => {
                    let text = String::from_utf8_lossy(payload);
                    tracing::debug!(progress = %text.trim_end(), "remote");
                }
                3 => {
                    let text = String::from_utf8_lossy(payload).trim_end().to_owned();
                    return Err(io::Error::new(io::ErrorKind::Other, RemoteMessage(text)));
                }
                other => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unknown side-band channel {}", other),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for SidebandReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        self.fill()?;
        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn into_io(err: ProtocolError) -> io::Error {
    match err {
        ProtocolError::Io(e) => e,
        ProtocolError::UnexpectedEof => io::Error::from(io::ErrorKind::UnexpectedEof),
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    }
}

/// Frames everything written to it as band-1 packets.
///
/// Each `write` becomes at most one packet, so wrap it in a
/// `BufWriter` with [`MAX_BAND_DATA_LEN`] capacity to fill packets.
pub struct SidebandWriter<W> {
    writer: PktLineWriter<W>,
}

impl<W: Write> SidebandWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: PktLineWriter::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> Write for SidebandWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = buf.len().min(MAX_BAND_DATA_LEN);
        write_band(&mut self.writer, Band::Data, &buf[..n]).map_err(into_io)?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush().map_err(into_io)
    }
}

/// Send `data` on `band`, split across as many packets as needed.
pub fn write_band<W: Write>(
    writer: &mut PktLineWriter<W>,
    band: Band,
    data: &[u8],
) -> Result<(), ProtocolError> {
    for chunk in data.chunks(MAX_BAND_DATA_LEN) {
        let mut pkt = Vec::with_capacity(1 + chunk.len());
        pkt.push(band as u8);
        pkt.extend_from_slice(chunk);
        writer.write_line(&pkt)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn framed(packets: &[(u8, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut w = PktLineWriter::new(&mut buf);
        for (band, data) in packets {
            let mut pkt = vec![*band];
            pkt.extend_from_slice(data);
            w.write_line(&pkt).unwrap();
        }
        w.write_flush().unwrap();
        buf
    }

    #[test]
    fn data_is_joined_and_progress_skipped() {
        let input = framed(&[(1, b"PA"), (2, b"Counting objects\n"), (1, b"CK")]);
        let mut out = Vec::new();
        SidebandReader::new(Cursor::new(input)).read_to_end(&mut out).unwrap();
        assert_eq!(out, b"PACK");
    }

    #[test]
    fn stops_at_flush() {
        let mut input = framed(&[(1, b"abc")]);
        input.extend_from_slice(b"trailing");
        let mut reader = SidebandReader::new(Cursor::new(input));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn error_band_becomes_remote_message() {
        let input = framed(&[(1, b"ab"), (3, b"pack-objects died\n")]);
        let mut out = Vec::new();
        let err = SidebandReader::new(Cursor::new(input)).read_to_end(&mut out).unwrap_err();
        let converted = ProtocolError::from(err);
        assert!(matches!(converted, ProtocolError::Remote(m) if m == "pack-objects died"));
    }

    #[test]
    fn unknown_band_is_invalid_data() {
        let input = framed(&[(7, b"??")]);
        let err = SidebandReader::new(Cursor::new(input)).read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn writer_splits_large_payloads() {
        let payload = vec![7u8; MAX_BAND_DATA_LEN * 2 + 10];
        let mut buf = Vec::new();
        {
            let mut w = io::BufWriter::with_capacity(MAX_BAND_DATA_LEN, SidebandWriter::new(&mut buf));
            w.write_all(&payload).unwrap();
            w.flush().unwrap();
        }
        PktLineWriter::new(&mut buf).write_flush().unwrap();

        let mut r = PktLineReader::new(Cursor::new(&buf));
        let mut packets = 0;
        while let Some(pkt) = r.read_line().unwrap() {
            assert_eq!(pkt[0], Band::Data as u8);
            assert!(pkt.len() <= MAX_PKT_DATA_LEN);
            packets += 1;
        }
        assert_eq!(packets, 3);

        let mut out = Vec::new();
        SidebandReader::new(Cursor::new(buf)).read_to_end(&mut out).unwrap();
        assert_eq!(out, payload);
    }
}
