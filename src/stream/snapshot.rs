use super::chars::{CharRead, narrow};
use crate::Result;
use std::{io, sync::Arc};

/**
    Reads a window of a materialized binary value.

    The reader keeps the buffer that was current when it was created. Writes to the value
    install a new buffer and are not visible through readers created before them.
*/
pub struct SnapshotReader {
    buf: Arc<[u8]>,
    pos: usize,
    end: usize,
}

impl SnapshotReader {
    pub(crate) fn new(buf: Arc<[u8]>, start: usize, end: usize) -> Self {
        let end = end.min(buf.len());
        Self { buf, pos: start.min(end), end }
    }

    /// Returns the number of bytes that remain to be read.
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// Releases the buffer. The reader is at its end afterwards.
    pub fn close(&mut self) {
        self.buf = Arc::from(Vec::new());
        self.pos = 0;
        self.end = 0;
    }

    pub(crate) fn read_slice(&mut self, buf: &mut [u8]) -> usize {
        let num_bytes = buf.len().min(self.remaining());
        buf[..num_bytes].copy_from_slice(&self.buf[self.pos..self.pos + num_bytes]);
        self.pos += num_bytes;
        num_bytes
    }
}

impl io::Read for SnapshotReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok( self.read_slice(buf) )
    }
}

/**
    Reads characters copied out of a materialized character value.

    As a byte stream it produces one byte per character: characters up to U+00FF
    become that byte and all others become `?`.
*/
pub struct CharsReader {
    chars: Vec<char>,
    pos: usize,
}

impl CharsReader {
    pub(crate) fn new(text: &str) -> Self {
        Self { chars: text.chars().collect(), pos: 0 }
    }

    /// Returns the number of characters that remain to be read.
    pub fn remaining(&self) -> usize {
        self.chars.len() - self.pos
    }

    /// Releases the characters. The reader is at its end afterwards.
    pub fn close(&mut self) {
        self.chars = Vec::new();
        self.pos = 0;
    }
}

impl CharRead for CharsReader {
    fn read_chars(&mut self, buf: &mut [char]) -> Result<usize> {
        let num_chars = buf.len().min(self.remaining());
        buf[..num_chars].copy_from_slice(&self.chars[self.pos..self.pos + num_chars]);
        self.pos += num_chars;
        Ok(num_chars)
    }
}

impl io::Read for CharsReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let num_chars = buf.len().min(self.remaining());
        for (byte, &c) in buf.iter_mut().zip(&self.chars[self.pos..self.pos + num_chars]) {
            *byte = narrow(c);
        }
        self.pos += num_chars;
        Ok(num_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn snapshot_window() {
        let buf : Arc<[u8]> = Arc::from(&b"..hello world"[..]);
        let mut reader = SnapshotReader::new(buf, 2, 7);
        let mut data = Vec::new();
        reader.read_to_end(&mut data).expect("in-memory read");
        assert_eq!(data, b"hello");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn closed_snapshot_is_at_end() {
        let buf : Arc<[u8]> = Arc::from(&b"data"[..]);
        let mut reader = SnapshotReader::new(buf, 0, 4);
        reader.close();
        let mut data = [0u8; 4];
        assert_eq!(reader.read(&mut data).expect("in-memory read"), 0);
    }

    #[test]
    fn chars_as_bytes() {
        let mut reader = CharsReader::new("Øre €5");
        let mut data = Vec::new();
        reader.read_to_end(&mut data).expect("in-memory read");
        assert_eq!(data, [0xD8, b'r', b'e', b' ', b'?', b'5']);
    }

    #[test]
    fn chars_in_pieces() -> Result<()> {
        let mut reader = CharsReader::new("añb€");
        assert_eq!(reader.read_char()?, Some('a'));
        let mut buf = ['\0'; 2];
        assert_eq!(reader.read_chars(&mut buf)?, 2);
        assert_eq!(buf, ['ñ', 'b']);
        let mut text = String::new();
        assert_eq!(reader.read_text(&mut text)?, 1);
        assert_eq!(text, "€");
        assert_eq!(reader.read_char()?, None);
        Ok(())
    }
}
