//! An in-process byte pipe, for running both ends of a protocol in one
//! process (typically on two threads).

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};

use crate::StreamTransport;

/// Receiving half. Reads return end-of-file once every matching
/// [`PipeWriter`] is dropped.
#[derive(Debug)]
pub struct PipeReader {
    rx: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

/// Sending half.
#[derive(Debug, Clone)]
pub struct PipeWriter {
    tx: Sender<Vec<u8>>,
}

pub type PipeTransport = StreamTransport<PipeReader, PipeWriter>;

/// A one-directional pipe.
pub fn pipe() -> (PipeReader, PipeWriter) {
    let (tx, rx) = mpsc::channel();
    (
        PipeReader {
            rx,
            chunk: Vec::new(),
            pos: 0,
        },
        PipeWriter { tx },
    )
}

/// Two connected transports: what one writes, the other reads.
pub fn duplex() -> (PipeTransport, PipeTransport) {
    let (a_reader, b_writer) = pipe();
    let (b_reader, a_writer) = pipe();
    (
        StreamTransport::new(a_reader, a_writer),
        StreamTransport::new(b_reader, b_writer),
    )
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos == self.chunk.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transport;

    #[test]
    fn bytes_cross_in_both_directions() {
        let (mut a, mut b) = duplex();
        a.writer().write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        b.reader().read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        b.writer().write_all(b"pong").unwrap();
        a.reader().read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn dropping_the_writer_ends_the_stream() {
        let (mut reader, mut writer) = pipe();
        writer.write_all(b"last").unwrap();
        drop(writer);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"last");
    }

    #[test]
    fn small_reads_split_chunks() {
        let (mut reader, mut writer) = pipe();
        writer.write_all(b"abcdef").unwrap();
        let mut two = [0u8; 2];
        reader.read_exact(&mut two).unwrap();
        assert_eq!(&two, b"ab");
        reader.read_exact(&mut two).unwrap();
        assert_eq!(&two, b"cd");
    }
}
