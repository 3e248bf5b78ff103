use super::{chars::CharRead, locator::{ByteLocatorReader, CharLocatorReader, LocatorKind}};
use crate::{Error, Result, conn::Connection, lob::LobValue};
use std::io;

/**
    A locator stream that can be created anew at a given position.
*/
pub trait Reposition : Sized {
    /// Returns the current version stamp of the value the stream reads.
    fn update_count(&self) -> u64;

    /**
        Creates a new stream over the same value starting at `pos`. When `len` is given
        the new stream is bounded to `len` units.
    */
    fn reopen(&self, pos: u64, len: Option<u64>) -> Result<Self>;
}

/**
    Locator stream that never returns data of an outdated version of the value.

    Before every read the version stamp of the value is compared with the one the current
    stream was created at. When they differ the stream is discarded and a new one is created
    at the same position with the remaining part of the window. Only then is the read
    delegated.

    # Example
    ```
    use lobstream::{CharRead, Clob};
    # use lobstream::{Connection, Locator, Pattern, Result};
    # use std::cell::RefCell;
    # struct Server(RefCell<Vec<char>>);
    # impl Connection for Server {
    #     fn fetch_substring(&self, _: Locator, pos: u64, len: usize) -> Result<String> {
    #         Ok(self.0.borrow().iter().skip(pos as usize - 1).take(len).collect())
    #     }
    #     fn fetch_bytes(&self, _: Locator, _: u64, _: usize) -> Result<Vec<u8>> { unimplemented!() }
    #     fn lob_length(&self, _: Locator) -> Result<u64> { Ok(self.0.borrow().len() as u64) }
    #     fn set_bytes(&self, _: Locator, _: u64, _: &[u8]) -> Result<()> { unimplemented!() }
    #     fn set_string(&self, _: Locator, pos: u64, text: &str) -> Result<()> {
    #         let mut chars = self.0.borrow_mut();
    #         for (i, c) in text.chars().enumerate() { chars[pos as usize - 1 + i] = c; }
    #         Ok(())
    #     }
    #     fn truncate(&self, _: Locator, _: u64) -> Result<()> { unimplemented!() }
    #     fn position(&self, _: Locator, _: Pattern, _: u64) -> Result<Option<u64>> { unimplemented!() }
    #     fn release_locator(&self, _: Locator) -> Result<()> { unimplemented!() }
    # }
    # let conn = Server(RefCell::new("Tiger, tiger, burning bright".chars().collect()));
    let lob = Clob::from_locator(&conn, Locator::new(1))?;
    let mut reader = lob.character_stream()?;

    let mut buf = ['\0'; 7];
    reader.read_chars(&mut buf)?;
    assert_eq!(buf.iter().collect::<String>(), "Tiger, ");

    lob.set_string(8, "TIGER")?;

    let mut text = String::new();
    reader.read_text(&mut text)?;
    assert_eq!(text, "TIGER, burning bright");
    # Ok::<(),Box<dyn std::error::Error>>(())
    ```
*/
pub struct UpdateSensitive<R> {
    reader: Option<R>,
    snapshot: u64,
    pos: u64,
    end: Option<u64>,
}

impl<R: Reposition> UpdateSensitive<R> {
    /// `end` is the last position of the window, fixed when the stream is created.
    fn wrap(reader: R, snapshot: u64, pos: u64, end: Option<u64>) -> Self {
        Self { reader: Some(reader), snapshot, pos, end }
    }

    /// Returns the 1-based position of the next unit.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Releases the underlying stream. Closing it again has no effect.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            log::trace!("update sensitive stream closed at {}", self.pos);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Returns the underlying stream, recreated first if the value has changed since it was created.
    fn current(&mut self) -> Result<&mut R> {
        let reader = self.reader.as_ref().ok_or(Error::ClosedStream)?;
        let update_count = reader.update_count();
        if update_count != self.snapshot {
            let remaining = self.end.map(|end| end.saturating_add(1).saturating_sub(self.pos));
            log::debug!("value changed (version {} -> {}), stream is reopened at {}", self.snapshot, update_count, self.pos);
            let fresh = reader.reopen(self.pos, remaining)?;
            self.reader = Some(fresh);
            self.snapshot = update_count;
        }
        self.reader.as_mut().ok_or(Error::ClosedStream)
    }
}

/// Last position of a bounded window. It never extends past the length the value has now.
fn window_end(value: &dyn LobValue, pos: u64, len: Option<u64>) -> Option<u64> {
    len.map(|len| value.sql_length().min((pos - 1).saturating_add(len)))
}

impl<'a> UpdateSensitive<ByteLocatorReader<'a>> {
    /**
        Creates an update sensitive byte stream over a locator-backed value.

        # Failures
        - `Error::StaleLocator` if the value is not locator-backed
        - `Error::OutOfRange` if `pos` is 0
    */
    pub fn bytes(conn: &'a dyn Connection, value: &'a dyn LobValue, kind: LocatorKind, pos: u64, len: Option<u64>) -> Result<Self> {
        value.check_locator()?;
        let snapshot = value.update_count();
        let reader = ByteLocatorReader::with_window(conn, value, kind, pos, len)?;
        Ok( Self::wrap(reader, snapshot, pos, window_end(value, pos, len)) )
    }

    /// Reads a single byte. Returns `None` at the end of the stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.current()?.read_byte()?;
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    /// Reads up to `len` bytes into `buf[off..off + len]`.
    pub fn read_into(&mut self, buf: Option<&mut [u8]>, off: usize, len: usize) -> Result<usize> {
        let num_read = self.current()?.read_into(buf, off, len)?;
        self.pos += num_read as u64;
        Ok(num_read)
    }
}

impl io::Read for UpdateSensitive<ByteLocatorReader<'_>> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len();
        Ok( self.read_into(Some(buf), 0, len)? )
    }
}

impl<'a> UpdateSensitive<CharLocatorReader<'a>> {
    /**
        Creates an update sensitive character stream over a locator-backed value.

        # Failures
        - `Error::StaleLocator` if the value is not locator-backed
        - `Error::OutOfRange` if `pos` is 0
    */
    pub fn chars(conn: &'a dyn Connection, value: &'a dyn LobValue, pos: u64, len: Option<u64>) -> Result<Self> {
        value.check_locator()?;
        let snapshot = value.update_count();
        let reader = CharLocatorReader::with_window(conn, value, pos, len)?;
        Ok( Self::wrap(reader, snapshot, pos, window_end(value, pos, len)) )
    }
}

impl CharRead for UpdateSensitive<CharLocatorReader<'_>> {
    fn check_open(&self) -> Result<()> {
        if self.is_closed() { Err( Error::ClosedStream ) } else { Ok(()) }
    }

    fn read_chars(&mut self, buf: &mut [char]) -> Result<usize> {
        let num_read = self.current()?.read_chars(buf)?;
        self.pos += num_read as u64;
        Ok(num_read)
    }
}
