use super::chars::substr;
use crate::{Error, Result, lob::{BinaryValue, TextValue, check_range, check_write_position}};
use std::{fmt, io};

/**
    Positional writer over a materialized binary value.

    Every write replaces the content from the writer's position onwards: bytes before the
    position are kept, the new bytes are appended after them and whatever followed the
    position before the write is dropped. The value's buffer is never changed in place -
    each write installs a new one.

    # Example
    ```
    use std::io::Write;
    use lobstream::Blob;
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
    let lob = Blob::new(&conn, b"ABCDEF".to_vec());

    let mut writer = lob.set_binary_stream(3)?;
    writer.write_all(b"xy")?;
    assert_eq!(lob.get_bytes(1, 4)?, b"ABxy");
    # Ok::<(),Box<dyn std::error::Error>>(())
    ```
*/
pub struct BlobWriter<'a> {
    value: &'a dyn BinaryValue,
    pos: u64,
}

impl<'a> BlobWriter<'a> {
    /**
        Creates a writer positioned at `pos`.

        # Failures
        - `Error::OutOfRange` if `pos` is 0 or `pos - 1` exceeds the current length
        - `Error::Interface` if the value is not materialized
    */
    pub fn new(value: &'a dyn BinaryValue, pos: u64) -> Result<Self> {
        check_write_position(pos, value.sql_length())?;
        if value.binary().is_none() {
            return Err( Error::new("value is not materialized") );
        }
        log::debug!("materialized byte writer at {}", pos);
        Ok( Self { value, pos } )
    }

    /// Returns the position of the next byte to be written.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /**
        Writes `buf[off..off + len]` at the current position and moves past it.

        # Failures
        - `Error::NullArgument` if `buf` is absent and `len` is not 0
        - `Error::OutOfRange` if the range does not fit `buf`
    */
    pub fn write_range(&mut self, buf: Option<&[u8]>, off: usize, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let buf = buf.ok_or(Error::NullArgument("buffer"))?;
        check_range(buf.len(), off, len)?;

        let current = self.value.binary().ok_or_else(|| Error::new("value is not materialized"))?;
        let data_offset = current.data_offset();
        let prefix = (self.pos - 1) as usize + data_offset;
        if prefix > current.raw().len() {
            return Err( Error::out_of_range(format!("write position {} is past the end of the value of length {}", self.pos, self.value.sql_length())) );
        }
        let mut new_buf = Vec::with_capacity(prefix + len);
        new_buf.extend_from_slice(&current.raw()[..prefix]);
        new_buf.extend_from_slice(&buf[off..off + len]);
        self.value.replace_binary(new_buf, data_offset);
        self.pos += len as u64;
        Ok(())
    }

    /// Writes a single byte at the current position.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_range(Some(&[byte][..]), 0, 1)
    }
}

impl io::Write for BlobWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_range(Some(buf), 0, buf.len())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/**
    Positional writer over a materialized character value.

    Each write replaces the content from the writer's position onwards with the written
    characters, so whatever followed the position before the write is dropped. Bytes
    written through `std::io::Write` are taken as Latin-1 characters.
*/
pub struct ClobWriter<'a> {
    value: &'a dyn TextValue,
    pos: u64,
}

impl<'a> ClobWriter<'a> {
    /**
        Creates a writer positioned at `pos`.

        # Failures
        - `Error::OutOfRange` if `pos` is 0 or `pos - 1` exceeds the current length
        - `Error::Interface` if the value is not materialized
    */
    pub fn new(value: &'a dyn TextValue, pos: u64) -> Result<Self> {
        check_write_position(pos, value.sql_length())?;
        if value.text().is_none() {
            return Err( Error::new("value is not materialized") );
        }
        log::debug!("materialized character writer at {}", pos);
        Ok( Self { value, pos } )
    }

    /// Returns the position of the next character to be written.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /**
        Writes `buf[off..off + len]` at the current position.

        # Failures
        - `Error::NullArgument` if `buf` is absent and `len` is not 0
        - `Error::OutOfRange` if the range does not fit `buf`
    */
    pub fn write_chars(&mut self, buf: Option<&[char]>, off: usize, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let buf = buf.ok_or(Error::NullArgument("buffer"))?;
        check_range(buf.len(), off, len)?;
        let text : String = buf[off..off + len].iter().collect();
        self.replace_tail(&text)
    }

    /// Writes the whole `text` at the current position.
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.replace_tail(text)
    }

    /**
        Writes `len` characters of `text` starting at character `off`.

        # Failures
        `Error::OutOfRange` if the characters are not all in `text`
    */
    pub fn write_substr(&mut self, text: &str, off: usize, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let num_chars = text.chars().count();
        check_range(num_chars, off, len)?;
        self.replace_tail(substr(text, off, len))
    }

    /// Writes a single character at the current position.
    pub fn write_char(&mut self, c: char) -> Result<()> {
        let mut buf = [0u8; 4];
        self.replace_tail(c.encode_utf8(&mut buf))
    }

    fn replace_tail(&mut self, text: &str) -> Result<()> {
        let current = self.value.text().ok_or_else(|| Error::new("value is not materialized"))?;
        let keep = self.pos - 1;
        if keep > self.value.sql_length() {
            return Err( Error::out_of_range(format!("write position {} is past the end of the value of length {}", self.pos, self.value.sql_length())) );
        }
        let prefix = substr(current.as_str(), 0, keep as usize);
        let mut new_text = String::with_capacity(prefix.len() + text.len());
        new_text.push_str(prefix);
        new_text.push_str(text);
        self.value.replace_text(new_text);
        self.pos = self.value.sql_length() + 1;
        Ok(())
    }
}

impl io::Write for ClobWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !buf.is_empty() {
            let text : String = buf.iter().map(|&b| char::from(b)).collect();
            self.replace_tail(&text)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Write for ClobWriter<'_> {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        ClobWriter::write_str(self, text).map_err(|_| fmt::Error)
    }
}
