use super::{Content, Lob, LobValue, Repr, TextValue, check_range, check_search_start, check_write_position, find};
use crate::{Error, Result, conn::{Connection, Pattern}};
use crate::stream::{
    ByteLocatorReader, CharLocatorReader, CharRead, CharsReader, ClobWriter, LocatorKind, LocatorWriter, UpdateSensitive,
    char_len, substr,
};
use std::{fmt, io::{self, Read, Write}, sync::Arc};

/**
    Materialized content of a character LOB. Lengths and positions count characters.
*/
#[derive(Debug, Clone)]
pub struct Text {
    string: Arc<str>,
    len: u64,
}

impl Text {
    pub(crate) fn new(text: String) -> Self {
        let len = char_len(&text);
        Self { string: Arc::from(text), len }
    }

    pub fn as_str(&self) -> &str {
        &self.string
    }
}

impl Content for Text {
    fn len(&self) -> u64 {
        self.len
    }
}

impl<'a> Lob<'a, Text> {
    /**
        Creates a materialized character value.

        # Example
        ```
        use lobstream::Clob;
        # use lobstream::{Connection, Locator, Pattern, Result};
        # struct Offline;
        # impl Connection for Offline {
        #     fn fetch_substring(&self, _: Locator, _: u64, _: usize) -> Result<String> { unimplemented!() }
        #     fn fetch_bytes(&self, _: Locator, _: u64, _: usize) -> Result<Vec<u8>> { unimplemented!() }
        #     fn lob_length(&self, _: Locator) -> Result<u64> { unimplemented!() }
        #     fn set_bytes(&self, _: Locator, _: u64, _: &[u8]) -> Result<()> { unimplemented!() }
        #     fn set_string(&self, _: Locator, _: u64, _: &str) -> Result<()> { unimplemented!() }
        #     fn truncate(&self, _: Locator, _: u64) -> Result<()> { unimplemented!() }
        #     fn position(&self, _: Locator, _: Pattern, _: u64) -> Result<Option<u64>> { unimplemented!() }
        #     fn release_locator(&self, _: Locator) -> Result<()> { unimplemented!() }
        # }
        # let conn = Offline;
        let lob = Clob::new(&conn, "Hold Infinity in the palm of your hand");

        assert_eq!(lob.sub_string(6, 8)?, "Infinity");

        lob.set_string(15, "a grain of sand")?;
        assert_eq!(lob.sub_string(1, lob.len() as usize)?, "Hold Infinity a grain of sand");
        # Ok::<(),Box<dyn std::error::Error>>(())
        ```
    */
    pub fn new(conn: &'a dyn Connection, text: &str) -> Self {
        Self::make(conn, Text::new(text.to_string()))
    }

    /**
        Returns `len` characters starting at the 1-based position `pos`.

        A locator-backed value is read with a single round trip.

        # Failures
        - `Error::OutOfRange` if the window does not fit the value
        - the connection error if the server call fails
    */
    pub fn sub_string(&self, pos: u64, len: usize) -> Result<String> {
        self.check_pos_and_len(pos, len as u64)?;
        if len == 0 {
            return Ok(String::new());
        }
        match self.current().0 {
            Repr::Materialized(text) => Ok( substr(text.as_str(), (pos - 1) as usize, len).to_string() ),
            Repr::Locator(locator) => {
                log::trace!("fetch {} characters of {} at {}", len, locator, pos);
                let text = self.conn().fetch_substring(locator, pos, len)?;
                Ok( substr(&text, 0, len).to_string() )
            }
        }
    }

    /**
        Writes `text` at the 1-based position `pos` and returns the number of characters written.

        On a materialized value the content after the written characters is dropped. On a
        locator-backed value the characters overwrite the server-side value in place and the
        rest of it is kept.

        # Failures
        - `Error::OutOfRange` if `pos` is 0 or would leave a gap after the end of the value
        - the connection error if the server call fails
    */
    pub fn set_string(&self, pos: u64, text: &str) -> Result<usize> {
        self.check_valid()?;
        check_write_position(pos, self.len())?;
        let num_chars = char_len(text);
        if num_chars == 0 {
            return Ok(0);
        }
        match self.current().0 {
            Repr::Materialized(_) => {
                ClobWriter::new(self, pos)?.write_str(text)?;
            }
            Repr::Locator(locator) => {
                log::trace!("write {} characters to {} at {}", num_chars, locator, pos);
                self.conn().set_string(locator, pos, text)?;
                let last = pos - 1 + num_chars;
                if last > self.len() {
                    self.set_sql_length(last);
                }
                self.increment_update_count();
            }
        }
        Ok(num_chars as usize)
    }

    /**
        Writes `len` characters of `text` starting at character `off` at the 1-based
        position `pos`. Otherwise works as `set_string`.

        # Failures
        `Error::OutOfRange` if `pos` is not a valid write position or the range does not fit `text`
    */
    pub fn set_string_range(&self, pos: u64, text: &str, off: usize, len: usize) -> Result<usize> {
        self.check_valid()?;
        check_write_position(pos, self.len())?;
        check_range(char_len(text) as usize, off, len)?;
        self.set_string(pos, substr(text, off, len))
    }

    /**
        Returns the 1-based position of the first occurrence of `pattern` at or after `start`,
        or `None` if there is none. Positions count characters.

        A locator-backed value is searched by the server in a single round trip.

        # Failures
        - `Error::OutOfRange` if `start` is 0
        - the connection error if the server call fails
    */
    pub fn position(&self, pattern: &str, start: u64) -> Result<Option<u64>> {
        self.check_valid()?;
        check_search_start(start)?;
        match self.current().0 {
            Repr::Materialized(text) => {
                let chars : Vec<char> = text.as_str().chars().collect();
                let pattern : Vec<char> = pattern.chars().collect();
                Ok( find(&chars[..], &pattern[..], start) )
            }
            Repr::Locator(locator) => {
                log::trace!("search {} characters in {} from {}", char_len(pattern), locator, start);
                self.conn().position(locator, Pattern::Text(pattern), start)
            }
        }
    }

    /**
        Returns the 1-based position of the first occurrence of the content of `pattern`
        at or after `start`, or `None` if there is none.

        When both values are locator-backed the server compares them without transferring
        the pattern. Otherwise the content of `pattern` is read first.

        # Failures
        - `Error::OutOfRange` if `start` is 0
        - `Error::Freed` if either value has been freed
        - the connection error if a server call fails
    */
    pub fn position_of(&self, pattern: &Lob<'_, Text>, start: u64) -> Result<Option<u64>> {
        self.check_valid()?;
        pattern.check_valid()?;
        check_search_start(start)?;
        if pattern.len() > self.len() {
            return Ok(None);
        }
        match (self.current().0, pattern.locator()) {
            (Repr::Locator(locator), Some(pattern_locator)) => {
                log::trace!("search {} in {} from {}", pattern_locator, locator, start);
                self.conn().position(locator, Pattern::Locator(pattern_locator), start)
            }
            _ => {
                let text = pattern.sub_string(1, pattern.len() as usize)?;
                self.position(&text, start)
            }
        }
    }

    /**
        Shortens the value to `len` characters.

        # Failures
        - `Error::OutOfRange` if `len` exceeds the current length
        - the connection error if the server call fails
    */
    pub fn truncate(&self, len: u64) -> Result<()> {
        if !self.check_truncate_len(len)? {
            return Ok(());
        }
        match self.current().0 {
            Repr::Materialized(text) => {
                let text = substr(text.as_str(), 0, len as usize).to_string();
                self.install(Repr::Materialized(Text::new(text)), len);
            }
            Repr::Locator(locator) => {
                log::trace!("truncate {} to {}", locator, len);
                self.conn().truncate(locator, len)?;
                self.install(Repr::Locator(locator), len);
            }
        }
        Ok(())
    }

    /**
        Replaces the locator of the value with its content.

        The content is fetched in windows of `chunk_size` characters. Does nothing when the
        value is already materialized.

        # Failures
        - `Error::InsufficientData` if the server returns fewer characters than the value's length
        - the connection error if a server call fails
    */
    pub fn materialize(&self) -> Result<()> {
        self.check_valid()?;
        let (repr, len) = self.current();
        let locator = match repr {
            Repr::Locator(locator) => locator,
            Repr::Materialized(_) => return Ok(()),
        };
        let chunk_size = self.chunk_size() as u64;
        let mut text = String::new();
        let mut pos = 1;
        while pos <= len {
            let num_chars = chunk_size.min(len - pos + 1);
            log::trace!("fetch {} characters of {} at {}", num_chars, locator, pos);
            let chunk = self.conn().fetch_substring(locator, pos, num_chars as usize)?;
            let chunk = substr(&chunk, 0, num_chars as usize);
            if chunk.is_empty() {
                break;
            }
            pos += char_len(chunk);
            text.push_str(chunk);
        }
        if pos <= len {
            return Err( Error::InsufficientData { declared: len as usize, missing: (len - pos + 1) as usize } );
        }
        log::debug!("materialized {} characters of {}", len, locator);
        self.install(Repr::Materialized(Text::new(text)), len);
        Ok(())
    }

    /**
        Returns a character stream of the whole value.

        Over a locator-backed value the stream fetches characters on demand, follows the live
        length of the value and picks up changes made to it. Over a materialized value the
        stream reads the content as it was when the stream was created.
    */
    pub fn character_stream(&self) -> Result<CharacterStream<'_>> {
        self.check_valid()?;
        match self.current().0 {
            Repr::Locator(_) => Ok( CharacterStream::Locator(UpdateSensitive::<CharLocatorReader>::chars(self.conn(), self, 1, None)?) ),
            Repr::Materialized(text) => Ok( CharacterStream::Snapshot(CharsReader::new(text.as_str())) ),
        }
    }

    /**
        Returns a character stream of `len` characters starting at the 1-based position `pos`.

        # Failures
        `Error::OutOfRange` if the window does not fit the value
    */
    pub fn character_stream_at(&self, pos: u64, len: u64) -> Result<CharacterStream<'_>> {
        self.check_pos_and_len(pos, len)?;
        match self.current().0 {
            Repr::Locator(_) => Ok( CharacterStream::Locator(UpdateSensitive::<CharLocatorReader>::chars(self.conn(), self, pos, Some(len))?) ),
            Repr::Materialized(text) => {
                let window = substr(text.as_str(), (pos - 1) as usize, len as usize);
                Ok( CharacterStream::Snapshot(CharsReader::new(window)) )
            }
        }
    }

    /**
        Returns a byte stream of the whole value with one byte per character. Characters
        above U+00FF are read as `?`.
    */
    pub fn ascii_stream(&self) -> Result<AsciiStream<'_>> {
        self.check_valid()?;
        match self.current().0 {
            Repr::Locator(_) => {
                let reader = UpdateSensitive::<ByteLocatorReader>::bytes(self.conn(), self, LocatorKind::Ascii, 1, None)?;
                Ok( AsciiStream::Locator(reader) )
            }
            Repr::Materialized(text) => Ok( AsciiStream::Snapshot(CharsReader::new(text.as_str())) ),
        }
    }

    /**
        Returns a character writer that starts at the 1-based position `pos`.

        Over a materialized value every write drops the content after the written characters.
        Over a locator-backed value writes overwrite the server-side value in place.

        # Failures
        `Error::OutOfRange` if `pos` is 0 or would leave a gap after the end of the value
    */
    pub fn set_character_stream(&self, pos: u64) -> Result<CharacterWriter<'_>> {
        self.check_valid()?;
        match self.current().0 {
            Repr::Locator(_) => Ok( CharacterWriter::Locator(LocatorWriter::new(self.conn(), self, LocatorKind::Ascii, pos)?) ),
            Repr::Materialized(_) => Ok( CharacterWriter::Materialized(ClobWriter::new(self, pos)?) ),
        }
    }

    /**
        Returns a writer that starts at the 1-based position `pos` and takes every written
        byte as a Latin-1 character.
    */
    pub fn set_ascii_stream(&self, pos: u64) -> Result<CharacterWriter<'_>> {
        self.set_character_stream(pos)
    }

    /// Returns the materialized content, or `None` when the value is locator-backed.
    pub fn text(&self) -> Option<Text> {
        self.content()
    }
}

impl TextValue for Lob<'_, Text> {
    fn text(&self) -> Option<Text> {
        self.content()
    }

    fn replace_text(&self, text: String) {
        let text = Text::new(text);
        let len = text.len();
        self.install(Repr::Materialized(text), len);
    }
}

/// Character read handle of a character LOB.
pub enum CharacterStream<'a> {
    Snapshot(CharsReader),
    Locator(UpdateSensitive<CharLocatorReader<'a>>),
}

impl CharacterStream<'_> {
    /// Releases the stream. Locator streams fail every read after that.
    pub fn close(&mut self) {
        match self {
            CharacterStream::Snapshot(reader) => reader.close(),
            CharacterStream::Locator(reader) => reader.close(),
        }
    }
}

impl CharRead for CharacterStream<'_> {
    fn check_open(&self) -> Result<()> {
        match self {
            CharacterStream::Snapshot(reader) => reader.check_open(),
            CharacterStream::Locator(reader) => reader.check_open(),
        }
    }

    fn read_chars(&mut self, buf: &mut [char]) -> Result<usize> {
        match self {
            CharacterStream::Snapshot(reader) => reader.read_chars(buf),
            CharacterStream::Locator(reader) => reader.read_chars(buf),
        }
    }
}

/// Byte read handle of a character LOB.
pub enum AsciiStream<'a> {
    Snapshot(CharsReader),
    Locator(UpdateSensitive<ByteLocatorReader<'a>>),
}

impl AsciiStream<'_> {
    /// Releases the stream. Locator streams fail every read after that.
    pub fn close(&mut self) {
        match self {
            AsciiStream::Snapshot(reader) => reader.close(),
            AsciiStream::Locator(reader) => reader.close(),
        }
    }
}

impl io::Read for AsciiStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            AsciiStream::Snapshot(reader) => reader.read(buf),
            AsciiStream::Locator(reader) => reader.read(buf),
        }
    }
}

/// Write handle of a character LOB.
pub enum CharacterWriter<'a> {
    Materialized(ClobWriter<'a>),
    Locator(LocatorWriter<'a>),
}

impl CharacterWriter<'_> {
    /// Returns the position of the next character to be written.
    pub fn position(&self) -> u64 {
        match self {
            CharacterWriter::Materialized(writer) => writer.position(),
            CharacterWriter::Locator(writer) => writer.position(),
        }
    }

    /// Writes `text` at the current position.
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        match self {
            CharacterWriter::Materialized(writer) => writer.write_str(text),
            CharacterWriter::Locator(writer) => writer.write_str(text),
        }
    }

    /**
        Writes `buf[off..off + len]` at the current position.

        # Failures
        - `Error::NullArgument` if `buf` is absent and `len` is not 0
        - `Error::OutOfRange` if the range does not fit `buf`
    */
    pub fn write_chars(&mut self, buf: Option<&[char]>, off: usize, len: usize) -> Result<()> {
        match self {
            CharacterWriter::Materialized(writer) => writer.write_chars(buf, off, len),
            CharacterWriter::Locator(writer) => {
                if len == 0 {
                    return Ok(());
                }
                let buf = buf.ok_or(Error::NullArgument("buffer"))?;
                check_range(buf.len(), off, len)?;
                let text : String = buf[off..off + len].iter().collect();
                writer.write_str(&text)
            }
        }
    }

    /// Writes `len` characters of `text` starting at character `off`.
    pub fn write_substr(&mut self, text: &str, off: usize, len: usize) -> Result<()> {
        match self {
            CharacterWriter::Materialized(writer) => writer.write_substr(text, off, len),
            CharacterWriter::Locator(writer) => {
                if len == 0 {
                    return Ok(());
                }
                check_range(text.chars().count(), off, len)?;
                writer.write_str(substr(text, off, len))
            }
        }
    }
}

impl io::Write for CharacterWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CharacterWriter::Materialized(writer) => writer.write(buf),
            CharacterWriter::Locator(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Write for CharacterWriter<'_> {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        CharacterWriter::write_str(self, text).map_err(|_| fmt::Error)
    }
}
