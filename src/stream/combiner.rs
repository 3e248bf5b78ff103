use crate::{Error, Result};
use std::{collections::VecDeque, io};

/**
    Presents an ordered list of byte fragments as one sequential stream of exactly the
    declared length.

    Fragments are consumed front to back. Each fragment is released as soon as it has
    been read completely.

    # Example
    ```
    use std::io::Read;
    use lobstream::FragmentStream;

    let fragments = vec![ b"Tyger".to_vec(), b" Tyger, ".to_vec(), b"burning bright".to_vec() ];
    let mut stream = FragmentStream::new(fragments, 20)?;
    assert_eq!(stream.available(), 20);

    let mut text = String::new();
    stream.read_to_string(&mut text)?;
    assert_eq!(text, "Tyger Tyger, burning");
    assert_eq!(stream.available(), 0);
    # Ok::<(),Box<dyn std::error::Error>>(())
    ```
*/
pub struct FragmentStream {
    fragments: VecDeque<Vec<u8>>,
    /// Read position inside the front fragment
    pos: usize,
    len: usize,
    consumed: usize,
}

impl FragmentStream {
    /**
        Creates a stream of `len` bytes from `fragments`.

        Fragments after the one that reaches `len` are dropped, and that last fragment is
        cut to fit.

        # Failures
        Returns `Error::InsufficientData` when the fragments hold fewer than `len` bytes.
    */
    pub fn new(fragments: Vec<Vec<u8>>, len: usize) -> Result<Self> {
        let mut kept = VecDeque::with_capacity(fragments.len());
        let mut remaining = len;
        if len > 0 {
            for fragment in fragments {
                if fragment.len() <= remaining {
                    remaining -= fragment.len();
                    if !fragment.is_empty() {
                        kept.push_back(fragment);
                    }
                } else {
                    log::trace!("last fragment of {} bytes is cut to {}", fragment.len(), remaining);
                    kept.push_back(fragment[..remaining].to_vec());
                    remaining = 0;
                }
                if remaining == 0 {
                    break;
                }
            }
        }
        if remaining > 0 {
            return Err( Error::InsufficientData { declared: len, missing: remaining } );
        }
        Ok( Self { fragments: kept, pos: 0, len, consumed: 0 } )
    }

    /// Returns the number of bytes that remain to be read.
    pub fn available(&self) -> usize {
        self.len - self.consumed
    }

    /// Returns the declared length of the stream.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the stream was declared empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads a single byte. Returns `None` when all fragments have been consumed.
    pub fn read_byte(&mut self) -> Option<u8> {
        let fragment = self.fragments.front()?;
        let byte = fragment[self.pos];
        self.advance(1);
        Some(byte)
    }

    /**
        Copies up to `len` bytes into `buf[off..off + len]`, crossing as many fragment
        boundaries as needed. Returns the number of bytes copied, which is 0 at the end
        of the stream.

        # Failures
        - `Error::NullArgument` if `buf` is absent
        - `Error::OutOfRange` if the range does not fit `buf`
    */
    pub fn read_into(&mut self, buf: Option<&mut [u8]>, off: usize, len: usize) -> Result<usize> {
        let buf = buf.ok_or(Error::NullArgument("buffer"))?;
        crate::lob::check_range(buf.len(), off, len)?;
        Ok( self.copy_to(&mut buf[off..off + len]) )
    }

    fn copy_to(&mut self, buf: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < buf.len() {
            let fragment = match self.fragments.front() {
                Some(fragment) => fragment,
                None => break,
            };
            let num_bytes = (fragment.len() - self.pos).min(buf.len() - copied);
            buf[copied..copied + num_bytes].copy_from_slice(&fragment[self.pos..self.pos + num_bytes]);
            copied += num_bytes;
            self.advance(num_bytes);
        }
        copied
    }

    fn advance(&mut self, num_bytes: usize) {
        self.pos += num_bytes;
        self.consumed += num_bytes;
        if let Some(fragment) = self.fragments.front() {
            if self.pos == fragment.len() {
                self.fragments.pop_front();
                self.pos = 0;
            }
        }
    }
}

impl io::Read for FragmentStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok( self.copy_to(buf) )
    }
}

impl io::BufRead for FragmentStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self.fragments.front() {
            Some(fragment) => Ok( &fragment[self.pos..] ),
            None => Ok( &[][..] ),
        }
    }

    fn consume(&mut self, amt: usize) {
        let amt = match self.fragments.front() {
            Some(fragment) => amt.min(fragment.len() - self.pos),
            None => 0,
        };
        if amt > 0 {
            self.advance(amt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, Read};

    const PAYLOAD : &[u8] = b"0123456789";

    fn drain(mut stream: FragmentStream) -> Vec<u8> {
        let mut data = Vec::new();
        stream.read_to_end(&mut data).expect("in-memory read");
        data
    }

    #[test]
    fn fragment_split_does_not_change_content() -> Result<()> {
        let uneven = vec![ PAYLOAD[..3].to_vec(), Vec::new(), PAYLOAD[3..].to_vec() ];
        let single_bytes = PAYLOAD.iter().map(|&b| vec![b]).collect();

        let uneven = drain(FragmentStream::new(uneven, 10)?);
        let single_bytes = drain(FragmentStream::new(single_bytes, 10)?);
        assert_eq!(uneven, PAYLOAD);
        assert_eq!(single_bytes, PAYLOAD);
        Ok(())
    }

    #[test]
    fn short_fragments_fail() {
        let res = FragmentStream::new(vec![ PAYLOAD[..4].to_vec(), PAYLOAD[4..7].to_vec() ], 10);
        match res {
            Err(Error::InsufficientData { declared, missing }) => {
                assert_eq!(declared, 10);
                assert_eq!(missing, 3);
            }
            Err(err) => panic!("unexpected error: {:?}", err),
            Ok(_) => panic!("stream was created from insufficient data"),
        }
    }

    #[test]
    fn last_fragment_is_cut() -> Result<()> {
        let fragments = vec![ PAYLOAD[..4].to_vec(), PAYLOAD[4..].to_vec(), b"extra".to_vec() ];
        let stream = FragmentStream::new(fragments, 6)?;
        assert_eq!(stream.fragments.len(), 2);
        assert_eq!(stream.fragments[1], b"45");
        assert_eq!(drain(stream), b"012345");
        Ok(())
    }

    #[test]
    fn empty_streams() -> Result<()> {
        let mut stream = FragmentStream::new(vec![ PAYLOAD.to_vec() ], 0)?;
        assert!(stream.is_empty());
        assert_eq!(stream.read_byte(), None);
        assert_eq!(stream.available(), 0);

        let mut stream = FragmentStream::new(Vec::new(), 0)?;
        assert_eq!(stream.read_byte(), None);

        assert!(FragmentStream::new(Vec::new(), 1).is_err());
        Ok(())
    }

    #[test]
    fn single_byte_reads_release_fragments() -> Result<()> {
        let mut stream = FragmentStream::new(vec![ b"ab".to_vec(), b"c".to_vec() ], 3)?;
        assert_eq!(stream.read_byte(), Some(b'a'));
        assert_eq!(stream.fragments.len(), 2);
        assert_eq!(stream.read_byte(), Some(b'b'));
        assert_eq!(stream.fragments.len(), 1);
        assert_eq!(stream.available(), 1);
        assert_eq!(stream.read_byte(), Some(b'c'));
        assert!(stream.fragments.is_empty());
        assert_eq!(stream.read_byte(), None);
        Ok(())
    }

    #[test]
    fn bulk_read_crosses_fragments() -> Result<()> {
        let fragments = vec![ PAYLOAD[..2].to_vec(), PAYLOAD[2..5].to_vec(), PAYLOAD[5..].to_vec() ];
        let mut stream = FragmentStream::new(fragments, 10)?;
        let mut buf = [0u8; 12];

        let num_read = stream.read_into(Some(&mut buf[..]), 1, 7)?;
        assert_eq!(num_read, 7);
        assert_eq!(&buf[1..8], b"0123456");
        assert_eq!(stream.available(), 3);

        let num_read = stream.read_into(Some(&mut buf[..]), 0, 12)?;
        assert_eq!(num_read, 3);
        assert_eq!(&buf[..3], b"789");

        assert_eq!(stream.read_into(Some(&mut buf[..]), 0, 12)?, 0);
        Ok(())
    }

    #[test]
    fn bulk_read_arguments() -> Result<()> {
        let mut stream = FragmentStream::new(vec![ PAYLOAD.to_vec() ], 10)?;
        let mut buf = [0u8; 4];
        assert_eq!(stream.read_into(None, 0, 1), Err(Error::NullArgument("buffer")));
        assert!(stream.read_into(Some(&mut buf[..]), 2, 3).is_err());
        assert!(stream.read_into(Some(&mut buf[..]), usize::MAX, 2).is_err());
        assert_eq!(stream.available(), 10);
        Ok(())
    }

    #[test]
    fn buffered_reads() -> Result<()> {
        let mut stream = FragmentStream::new(vec![ b"one\ntw".to_vec(), b"o\nthree".to_vec() ], 13)?;
        let lines : Vec<String> = (&mut stream).lines().collect::<std::io::Result<_>>().expect("in-memory lines");
        assert_eq!(lines, ["one", "two", "three"]);
        Ok(())
    }
}
