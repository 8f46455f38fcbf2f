use std::io::{Read, Write};

use crate::{Transport, TransportError};

/// A transport over any reader and writer pair.
#[derive(Debug)]
pub struct StreamTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> StreamTransport<R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R, W> Transport for StreamTransport<R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    fn reader(&mut self) -> &mut dyn Read {
        &mut self.reader
    }

    fn writer(&mut self) -> &mut dyn Write {
        &mut self.writer
    }

    fn close(mut self: Box<Self>) -> Result<(), TransportError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_and_writes_through() {
        let mut t = StreamTransport::new(Cursor::new(b"abc".to_vec()), Vec::new());
        let mut buf = String::new();
        t.reader().read_to_string(&mut buf).unwrap();
        t.writer().write_all(b"xyz").unwrap();
        assert_eq!(buf, "abc");
        let (_, written) = t.into_inner();
        assert_eq!(written, b"xyz");
    }
}
