use super::{chars::{CharRead, narrow}, sensitive::Reposition};
use crate::{Error, Result, conn::{Connection, Locator}, lob::{LobValue, check_write_position}};
use std::{fmt, io};

/// How the bytes of a locator byte stream are obtained from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    /// Raw bytes of a binary LOB
    Binary,
    /// Characters of a character LOB, one byte per character
    Ascii,
}

/**
    Position and upper bound of a locator stream.

    Without an explicit window the bound follows the live length of the value.
*/
struct Window<'a> {
    conn: &'a dyn Connection,
    value: &'a dyn LobValue,
    locator: Locator,
    pos: u64,
    end: Option<u64>,
}

impl<'a> Window<'a> {
    fn new(conn: &'a dyn Connection, value: &'a dyn LobValue, pos: u64, len: Option<u64>) -> Result<Self> {
        let locator = value.check_locator()?;
        if pos == 0 {
            return Err( Error::out_of_range("stream position must be at least 1".to_string()) );
        }
        let end = len.map(|len| value.sql_length().min((pos - 1).saturating_add(len)));
        Ok( Self { conn, value, locator, pos, end } )
    }

    fn limit(&self) -> u64 {
        match self.end {
            Some(end) => end,
            None => self.value.sql_length(),
        }
    }

    /// Returns how many of the `requested` units can be read at the current position, 0 at the end.
    fn next_len(&self, requested: usize) -> usize {
        let limit = self.limit();
        if requested == 0 || self.pos > limit {
            return 0;
        }
        (limit - self.pos + 1).min(requested as u64) as usize
    }
}

impl fmt::Debug for Window<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Window")
            .field("locator", &self.locator)
            .field("pos", &self.pos)
            .field("end", &self.end)
            .finish()
    }
}

/**
    Byte stream over a locator-backed value that fetches data on demand.

    Every non-empty `read` is exactly one round trip for at most the requested number of
    bytes. Nothing is cached between calls.
*/
#[derive(Debug)]
pub struct ByteLocatorReader<'a> {
    window: Window<'a>,
    kind: LocatorKind,
}

impl<'a> ByteLocatorReader<'a> {
    /// Creates a reader of the whole value that follows its live length.
    pub fn new(conn: &'a dyn Connection, value: &'a dyn LobValue, kind: LocatorKind) -> Result<Self> {
        Self::with_window(conn, value, kind, 1, None)
    }

    /**
        Creates a reader that starts at `pos`. When `len` is given the reader never returns
        data past `min(pos + len - 1, current length)`.

        # Failures
        - `Error::StaleLocator` if the value is not locator-backed
        - `Error::OutOfRange` if `pos` is 0
    */
    pub fn with_window(conn: &'a dyn Connection, value: &'a dyn LobValue, kind: LocatorKind, pos: u64, len: Option<u64>) -> Result<Self> {
        let window = Window::new(conn, value, pos, len)?;
        log::debug!("{:?} byte reader of {} at {} up to {:?}", kind, window.locator, pos, window.end);
        Ok( Self { window, kind } )
    }

    /// Returns the 1-based position of the next byte.
    pub fn position(&self) -> u64 {
        self.window.pos
    }

    /// Reads a single byte. Returns `None` at the end of the stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8];
        let num_read = self.fetch(&mut buf)?;
        Ok( if num_read == 0 { None } else { Some(buf[0]) } )
    }

    /**
        Reads up to `len` bytes into `buf[off..off + len]`.

        # Failures
        - `Error::NullArgument` if `buf` is absent
        - `Error::OutOfRange` if the range does not fit `buf`
        - `Error::RemoteFetch` if the server call fails
    */
    pub fn read_into(&mut self, buf: Option<&mut [u8]>, off: usize, len: usize) -> Result<usize> {
        let buf = buf.ok_or(Error::NullArgument("buffer"))?;
        crate::lob::check_range(buf.len(), off, len)?;
        self.fetch(&mut buf[off..off + len])
    }

    /// Does nothing. The reader stays usable after it is closed.
    pub fn close(&mut self) {
        log::trace!("byte reader of {} closed at {}", self.window.locator, self.window.pos);
    }

    fn fetch(&mut self, buf: &mut [u8]) -> Result<usize> {
        let num_bytes = self.window.next_len(buf.len());
        if num_bytes == 0 {
            return Ok(0);
        }
        let Window { conn, locator, pos, .. } = self.window;
        log::trace!("fetch {} bytes of {} at {}", num_bytes, locator, pos);
        let num_read = match self.kind {
            LocatorKind::Binary => {
                let bytes = conn.fetch_bytes(locator, pos, num_bytes).map_err(Error::remote)?;
                let num_read = bytes.len().min(num_bytes);
                buf[..num_read].copy_from_slice(&bytes[..num_read]);
                num_read
            }
            LocatorKind::Ascii => {
                let text = conn.fetch_substring(locator, pos, num_bytes).map_err(Error::remote)?;
                let mut num_read = 0;
                for (byte, c) in buf[..num_bytes].iter_mut().zip(text.chars()) {
                    *byte = narrow(c);
                    num_read += 1;
                }
                num_read
            }
        };
        self.window.pos += num_read as u64;
        Ok(num_read)
    }
}

impl io::Read for ByteLocatorReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok( self.fetch(buf)? )
    }
}

impl<'a> Reposition for ByteLocatorReader<'a> {
    fn update_count(&self) -> u64 {
        self.window.value.update_count()
    }

    fn reopen(&self, pos: u64, len: Option<u64>) -> Result<Self> {
        Self::with_window(self.window.conn, self.window.value, self.kind, pos, len)
    }
}

/**
    Character stream over a locator-backed character value that fetches data on demand.

    Every non-empty read is exactly one round trip. Once closed, the reader fails every
    operation with `Error::ClosedStream`.
*/
#[derive(Debug)]
pub struct CharLocatorReader<'a> {
    window: Window<'a>,
    closed: bool,
}

impl<'a> CharLocatorReader<'a> {
    /// Creates a reader of the whole value that follows its live length.
    pub fn new(conn: &'a dyn Connection, value: &'a dyn LobValue) -> Result<Self> {
        Self::with_window(conn, value, 1, None)
    }

    /**
        Creates a reader that starts at `pos`. When `len` is given the reader never returns
        characters past `min(pos + len - 1, current length)`.
    */
    pub fn with_window(conn: &'a dyn Connection, value: &'a dyn LobValue, pos: u64, len: Option<u64>) -> Result<Self> {
        let window = Window::new(conn, value, pos, len)?;
        log::debug!("character reader of {} at {} up to {:?}", window.locator, pos, window.end);
        Ok( Self { window, closed: false } )
    }

    /// Returns the 1-based position of the next character.
    pub fn position(&self) -> u64 {
        self.window.pos
    }

    /// Closes the reader. Closing it again has no effect.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl CharRead for CharLocatorReader<'_> {
    fn check_open(&self) -> Result<()> {
        if self.closed { Err( Error::ClosedStream ) } else { Ok(()) }
    }

    fn read_chars(&mut self, buf: &mut [char]) -> Result<usize> {
        self.check_open()?;
        let num_chars = self.window.next_len(buf.len());
        if num_chars == 0 {
            return Ok(0);
        }
        let Window { conn, locator, pos, .. } = self.window;
        log::trace!("fetch {} characters of {} at {}", num_chars, locator, pos);
        let text = conn.fetch_substring(locator, pos, num_chars).map_err(Error::remote)?;
        let mut num_read = 0;
        for (dst, c) in buf[..num_chars].iter_mut().zip(text.chars()) {
            *dst = c;
            num_read += 1;
        }
        self.window.pos += num_read as u64;
        Ok(num_read)
    }
}

impl<'a> Reposition for CharLocatorReader<'a> {
    fn update_count(&self) -> u64 {
        self.window.value.update_count()
    }

    fn reopen(&self, pos: u64, len: Option<u64>) -> Result<Self> {
        Self::with_window(self.window.conn, self.window.value, pos, len)
    }
}

/**
    Writer that overwrites a locator-backed value on the server starting at a position.

    Each write is one round trip. Writing past the end extends the value. Unlike the
    materialized writers, content after the written range is kept.
*/
pub struct LocatorWriter<'a> {
    conn: &'a dyn Connection,
    value: &'a dyn LobValue,
    kind: LocatorKind,
    locator: Locator,
    pos: u64,
}

impl<'a> LocatorWriter<'a> {
    /**
        Creates a writer positioned at `pos`.

        # Failures
        - `Error::StaleLocator` if the value is not locator-backed
        - `Error::OutOfRange` if `pos` is 0 or past the end of the value plus one
    */
    pub fn new(conn: &'a dyn Connection, value: &'a dyn LobValue, kind: LocatorKind, pos: u64) -> Result<Self> {
        let locator = value.check_locator()?;
        check_write_position(pos, value.sql_length())?;
        log::debug!("{:?} locator writer of {} at {}", kind, locator, pos);
        Ok( Self { conn, value, kind, locator, pos } )
    }

    /// Returns the position of the next unit to be written.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /**
        Writes bytes at the current position. Bytes written to a character value are
        taken as Latin-1 characters.
    */
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        match self.kind {
            LocatorKind::Binary => {
                log::trace!("write {} bytes to {} at {}", bytes.len(), self.locator, self.pos);
                self.conn.set_bytes(self.locator, self.pos, bytes).map_err(Error::remote)?;
                self.advance(bytes.len() as u64);
                Ok(())
            }
            LocatorKind::Ascii => {
                let text : String = bytes.iter().map(|&b| char::from(b)).collect();
                self.write_str(&text)
            }
        }
    }

    /// Writes text at the current position of a character value.
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        if self.kind == LocatorKind::Binary {
            return Err( Error::new("cannot write characters to a binary LOB") );
        }
        if text.is_empty() {
            return Ok(());
        }
        let num_chars = super::char_len(text);
        log::trace!("write {} characters to {} at {}", num_chars, self.locator, self.pos);
        self.conn.set_string(self.locator, self.pos, text).map_err(Error::remote)?;
        self.advance(num_chars);
        Ok(())
    }

    fn advance(&mut self, num_units: u64) {
        let last = self.pos + num_units - 1;
        if last > self.value.sql_length() {
            self.value.set_sql_length(last);
        }
        self.value.increment_update_count();
        self.pos += num_units;
    }
}

impl io::Write for LocatorWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Write for LocatorWriter<'_> {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        LocatorWriter::write_str(self, text).map_err(|_| fmt::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::Pattern;
    use std::cell::Cell;

    struct Value {
        len: Cell<u64>,
        locator: Option<Locator>,
    }

    impl LobValue for Value {
        fn sql_length(&self) -> u64 { self.len.get() }
        fn set_sql_length(&self, len: u64) { self.len.set(len) }
        fn locator(&self) -> Option<Locator> { self.locator }
        fn update_count(&self) -> u64 { 0 }
        fn increment_update_count(&self) {}
    }

    struct NoServer;

    impl Connection for NoServer {
        fn fetch_substring(&self, _: Locator, _: u64, _: usize) -> Result<String> { Err(Error::new("offline")) }
        fn fetch_bytes(&self, _: Locator, _: u64, _: usize) -> Result<Vec<u8>> { Err(Error::new("offline")) }
        fn lob_length(&self, _: Locator) -> Result<u64> { Err(Error::new("offline")) }
        fn set_bytes(&self, _: Locator, _: u64, _: &[u8]) -> Result<()> { Err(Error::new("offline")) }
        fn set_string(&self, _: Locator, _: u64, _: &str) -> Result<()> { Err(Error::new("offline")) }
        fn truncate(&self, _: Locator, _: u64) -> Result<()> { Err(Error::new("offline")) }
        fn position(&self, _: Locator, _: Pattern, _: u64) -> Result<Option<u64>> { Err(Error::new("offline")) }
        fn release_locator(&self, _: Locator) -> Result<()> { Err(Error::new("offline")) }
    }

    fn value(len: u64) -> Value {
        Value { len: Cell::new(len), locator: Some(Locator::new(1)) }
    }

    #[test]
    fn bounded_window() -> Result<()> {
        let value = value(10);
        let window = Window::new(&NoServer, &value, 3, Some(4))?;
        assert_eq!(window.end, Some(6));
        assert_eq!(window.next_len(100), 4);
        assert_eq!(window.next_len(3), 3);
        assert_eq!(window.next_len(0), 0);

        let window = Window::new(&NoServer, &value, 8, Some(10))?;
        assert_eq!(window.end, Some(10));
        assert_eq!(window.next_len(100), 3);
        Ok(())
    }

    #[test]
    fn unbounded_window_follows_length() -> Result<()> {
        let value = value(10);
        let window = Window::new(&NoServer, &value, 9, None)?;
        assert_eq!(window.next_len(100), 2);
        value.set_sql_length(20);
        assert_eq!(window.next_len(100), 12);
        value.set_sql_length(5);
        assert_eq!(window.next_len(100), 0);
        Ok(())
    }

    #[test]
    fn window_needs_locator() {
        let value = Value { len: Cell::new(3), locator: None };
        let res = Window::new(&NoServer, &value, 1, None).map(|_| ());
        assert_eq!(res, Err(Error::StaleLocator));
    }

    #[test]
    fn end_of_stream_makes_no_call() -> Result<()> {
        let value = value(0);
        let mut reader = ByteLocatorReader::new(&NoServer, &value, LocatorKind::Ascii)?;
        let mut buf = [0u8; 8];
        assert_eq!(reader.read_into(Some(&mut buf[..]), 0, 8)?, 0);
        assert_eq!(reader.read_byte()?, None);
        Ok(())
    }

    #[test]
    fn failed_fetch_is_wrapped() -> Result<()> {
        let value = value(4);
        let mut reader = CharLocatorReader::new(&NoServer, &value)?;
        let mut buf = ['\0'; 2];
        assert_eq!(reader.read_chars(&mut buf), Err(Error::RemoteFetch(Box::new(Error::new("offline")))));
        assert_eq!(reader.position(), 1);
        Ok(())
    }
}
