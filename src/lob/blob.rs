use super::{BinaryValue, Content, Lob, LobValue, Repr, check_range, check_search_start, check_write_position, find};
use crate::{Error, Result, conn::{Connection, Pattern}};
use crate::stream::{BlobWriter, ByteLocatorReader, FragmentStream, LocatorKind, LocatorWriter, SnapshotReader, UpdateSensitive};
use std::{io::{self, Read, Write}, sync::Arc};

/**
    Materialized content of a binary LOB.

    The buffer may start with `data_offset` header bytes that are not part of the value.
    Buffers are shared and never modified - changes install a new one.
*/
#[derive(Debug, Clone)]
pub struct Binary {
    buf: Arc<[u8]>,
    data_offset: usize,
}

impl Binary {
    pub(crate) fn new(buf: Vec<u8>, data_offset: usize) -> Self {
        let data_offset = data_offset.min(buf.len());
        Self { buf: Arc::from(buf), data_offset }
    }

    /// Returns the bytes of the value.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.data_offset..]
    }

    /// Returns the whole buffer including the header.
    pub fn raw(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of header bytes that precede the value in the buffer.
    pub fn data_offset(&self) -> usize {
        self.data_offset
    }

    fn shared(&self) -> Arc<[u8]> {
        self.buf.clone()
    }
}

impl Content for Binary {
    fn len(&self) -> u64 {
        (self.buf.len() - self.data_offset) as u64
    }
}

impl<'a> Lob<'a, Binary> {
    /**
        Creates a materialized binary value.

        # Example
        ```
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
        let lob = Blob::new(&conn, vec![1, 2, 3, 4]);

        assert_eq!(lob.len(), 4);
        assert_eq!(lob.get_bytes(2, 2)?, [2, 3]);
        # Ok::<(),Box<dyn std::error::Error>>(())
        ```
    */
    pub fn new(conn: &'a dyn Connection, bytes: Vec<u8>) -> Self {
        Self::make(conn, Binary::new(bytes, 0))
    }

    /**
        Creates a materialized binary value from a buffer whose first `header_len` bytes
        are not part of the value. The header is kept in front of the value by all writes.

        # Failures
        `Error::OutOfRange` if the buffer is shorter than the header
    */
    pub fn with_header(conn: &'a dyn Connection, buf: Vec<u8>, header_len: usize) -> Result<Self> {
        if header_len > buf.len() {
            return Err( Error::out_of_range(format!("header of {} bytes does not fit the buffer of {}", header_len, buf.len())) );
        }
        Ok( Self::make(conn, Binary::new(buf, header_len)) )
    }

    /**
        Returns `len` bytes starting at the 1-based position `pos`.

        A locator-backed value is read with a single round trip.

        # Failures
        - `Error::OutOfRange` if the window does not fit the value
        - the connection error if the server call fails
    */
    pub fn get_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        self.check_pos_and_len(pos, len as u64)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        match self.current().0 {
            Repr::Materialized(binary) => {
                let start = (pos - 1) as usize;
                Ok( binary.as_bytes()[start..start + len].to_vec() )
            }
            Repr::Locator(locator) => {
                log::trace!("fetch {} bytes of {} at {}", len, locator, pos);
                let mut bytes = self.conn().fetch_bytes(locator, pos, len)?;
                bytes.truncate(len);
                Ok(bytes)
            }
        }
    }

    /**
        Writes `bytes` at the 1-based position `pos`, overwriting what is there and extending
        the value when the write goes past its end. Content after the written range is kept.

        Returns the number of bytes written.

        # Failures
        - `Error::OutOfRange` if `pos` is 0 or would leave a gap after the end of the value
        - the connection error if the server call fails
    */
    pub fn set_bytes(&self, pos: u64, bytes: &[u8]) -> Result<usize> {
        self.check_valid()?;
        check_write_position(pos, self.len())?;
        if bytes.is_empty() {
            return Ok(0);
        }
        let mut state = self.state.write();
        match &state.repr {
            Repr::Materialized(binary) => {
                let start = binary.data_offset + (pos - 1) as usize;
                let raw = binary.raw();
                let mut buf = Vec::with_capacity(raw.len().max(start + bytes.len()));
                buf.extend_from_slice(&raw[..start]);
                buf.extend_from_slice(bytes);
                if raw.len() > buf.len() {
                    buf.extend_from_slice(&raw[buf.len()..]);
                }
                let binary = Binary::new(buf, binary.data_offset);
                state.len = binary.len();
                state.repr = Repr::Materialized(binary);
            }
            &Repr::Locator(locator) => {
                log::trace!("write {} bytes to {} at {}", bytes.len(), locator, pos);
                self.conn().set_bytes(locator, pos, bytes)?;
                state.len = state.len.max(pos - 1 + bytes.len() as u64);
            }
        }
        self.increment_update_count();
        Ok(bytes.len())
    }

    /**
        Writes `len` bytes of `bytes` starting at `off` at the 1-based position `pos`.
        Otherwise works as `set_bytes`.

        # Failures
        - `Error::OutOfRange` if `pos` is not a valid write position or the range does not fit `bytes`
        - `Error::NullArgument` if `bytes` is absent and `len` is not 0
        - the connection error if the server call fails
    */
    pub fn set_bytes_range(&self, pos: u64, bytes: Option<&[u8]>, off: usize, len: usize) -> Result<usize> {
        self.check_valid()?;
        check_write_position(pos, self.len())?;
        if len == 0 {
            return Ok(0);
        }
        let bytes = bytes.ok_or(Error::NullArgument("buffer"))?;
        check_range(bytes.len(), off, len)?;
        self.set_bytes(pos, &bytes[off..off + len])
    }

    /**
        Returns the 1-based position of the first occurrence of `pattern` at or after `start`,
        or `None` if there is none.

        A locator-backed value is searched by the server in a single round trip.

        # Failures
        - `Error::OutOfRange` if `start` is 0
        - the connection error if the server call fails

        # Example
        ```
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
        let lob = Blob::new(&conn, b"\x89PNG\r\n\x1a\nIHDR".to_vec());

        assert_eq!(lob.position(b"IHDR", 1)?, Some(9));
        assert_eq!(lob.position(b"PNG", 3)?, None);
        # Ok::<(),Box<dyn std::error::Error>>(())
        ```
    */
    pub fn position(&self, pattern: &[u8], start: u64) -> Result<Option<u64>> {
        self.check_valid()?;
        check_search_start(start)?;
        match self.current().0 {
            Repr::Materialized(binary) => Ok( find(binary.as_bytes(), pattern, start) ),
            Repr::Locator(locator) => {
                log::trace!("search {} bytes in {} from {}", pattern.len(), locator, start);
                self.conn().position(locator, Pattern::Bytes(pattern), start)
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
    pub fn position_of(&self, pattern: &Lob<'_, Binary>, start: u64) -> Result<Option<u64>> {
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
                let bytes = pattern.get_bytes(1, pattern.len() as usize)?;
                self.position(&bytes, start)
            }
        }
    }

    /**
        Shortens the value to `len` bytes.

        # Failures
        - `Error::OutOfRange` if `len` exceeds the current length
        - the connection error if the server call fails
    */
    pub fn truncate(&self, len: u64) -> Result<()> {
        if !self.check_truncate_len(len)? {
            return Ok(());
        }
        match self.current().0 {
            Repr::Materialized(binary) => {
                let end = binary.data_offset + len as usize;
                let buf = binary.raw()[..end].to_vec();
                self.install(Repr::Materialized(Binary::new(buf, binary.data_offset)), len);
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

        The content is fetched in windows of `chunk_size` bytes. Does nothing when the value
        is already materialized.

        # Failures
        - `Error::InsufficientData` if the server returns fewer bytes than the value's length
        - the connection error if a server call fails
    */
    pub fn materialize(&self) -> Result<()> {
        self.check_valid()?;
        let (repr, len) = self.current();
        let locator = match repr {
            Repr::Locator(locator) => locator,
            Repr::Materialized(_) => return Ok(()),
        };
        let len = len as usize;
        let chunk_size = self.chunk_size() as usize;
        let mut fragments = Vec::with_capacity(len / chunk_size + 1);
        let mut pos = 1;
        while pos <= len {
            let num_bytes = chunk_size.min(len - pos + 1);
            log::trace!("fetch {} bytes of {} at {}", num_bytes, locator, pos);
            let fragment = self.conn().fetch_bytes(locator, pos as u64, num_bytes)?;
            if fragment.is_empty() {
                break;
            }
            pos += fragment.len();
            fragments.push(fragment);
        }
        let mut stream = FragmentStream::new(fragments, len)?;
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let num_read = stream.read_into(Some(&mut buf[filled..]), 0, len - filled)?;
            if num_read == 0 {
                break;
            }
            filled += num_read;
        }
        log::debug!("materialized {} bytes of {}", len, locator);
        self.install(Repr::Materialized(Binary::new(buf, 0)), len as u64);
        Ok(())
    }

    /**
        Returns a stream of the whole value.

        Over a locator-backed value the stream fetches data on demand, follows the live length
        of the value and picks up changes made to it. Over a materialized value the stream
        reads the content as it was when the stream was created.
    */
    pub fn binary_stream(&self) -> Result<BinaryStream<'_>> {
        self.check_valid()?;
        match self.current() {
            (Repr::Locator(_), _) => {
                let reader = UpdateSensitive::<ByteLocatorReader>::bytes(self.conn(), self, LocatorKind::Binary, 1, None)?;
                Ok( BinaryStream::Locator(reader) )
            }
            (Repr::Materialized(binary), _) => {
                let buf = binary.shared();
                let end = buf.len();
                Ok( BinaryStream::Snapshot(SnapshotReader::new(buf, binary.data_offset, end)) )
            }
        }
    }

    /**
        Returns a stream of `len` bytes starting at the 1-based position `pos`.

        # Failures
        `Error::OutOfRange` if the window does not fit the value
    */
    pub fn binary_stream_at(&self, pos: u64, len: u64) -> Result<BinaryStream<'_>> {
        self.check_pos_and_len(pos, len)?;
        match self.current().0 {
            Repr::Locator(_) => {
                let reader = UpdateSensitive::<ByteLocatorReader>::bytes(self.conn(), self, LocatorKind::Binary, pos, Some(len))?;
                Ok( BinaryStream::Locator(reader) )
            }
            Repr::Materialized(binary) => {
                let start = binary.data_offset + (pos - 1) as usize;
                let end = start + len as usize;
                Ok( BinaryStream::Snapshot(SnapshotReader::new(binary.shared(), start, end)) )
            }
        }
    }

    /**
        Returns a writer that starts at the 1-based position `pos`.

        Over a materialized value every write drops the content after the written bytes.
        Over a locator-backed value writes overwrite the server-side value in place.

        # Failures
        `Error::OutOfRange` if `pos` is 0 or would leave a gap after the end of the value
    */
    pub fn set_binary_stream(&self, pos: u64) -> Result<BinaryWriter<'_>> {
        self.check_valid()?;
        match self.current().0 {
            Repr::Locator(_) => Ok( BinaryWriter::Locator(LocatorWriter::new(self.conn(), self, LocatorKind::Binary, pos)?) ),
            Repr::Materialized(_) => Ok( BinaryWriter::Materialized(BlobWriter::new(self, pos)?) ),
        }
    }

    /// Returns the materialized content, or `None` when the value is locator-backed.
    pub fn bytes(&self) -> Option<Binary> {
        self.content()
    }
}

impl BinaryValue for Lob<'_, Binary> {
    fn binary(&self) -> Option<Binary> {
        self.content()
    }

    fn replace_binary(&self, buf: Vec<u8>, data_offset: usize) {
        let binary = Binary::new(buf, data_offset);
        let len = binary.len();
        self.install(Repr::Materialized(binary), len);
    }
}

/// Read handle of a binary LOB.
pub enum BinaryStream<'a> {
    Snapshot(SnapshotReader),
    Locator(UpdateSensitive<ByteLocatorReader<'a>>),
}

impl BinaryStream<'_> {
    /**
        Reads up to `len` bytes into `buf[off..off + len]`.

        # Failures
        - `Error::NullArgument` if `buf` is absent
        - `Error::OutOfRange` if the range does not fit `buf`
    */
    pub fn read_into(&mut self, buf: Option<&mut [u8]>, off: usize, len: usize) -> Result<usize> {
        match self {
            BinaryStream::Locator(reader) => reader.read_into(buf, off, len),
            BinaryStream::Snapshot(reader) => {
                let buf = buf.ok_or(Error::NullArgument("buffer"))?;
                check_range(buf.len(), off, len)?;
                Ok( reader.read_slice(&mut buf[off..off + len]) )
            }
        }
    }

    /// Releases the stream. Locator streams fail every read after that.
    pub fn close(&mut self) {
        match self {
            BinaryStream::Locator(reader) => reader.close(),
            BinaryStream::Snapshot(reader) => reader.close(),
        }
    }
}

impl io::Read for BinaryStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BinaryStream::Snapshot(reader) => reader.read(buf),
            BinaryStream::Locator(reader) => reader.read(buf),
        }
    }
}

/// Write handle of a binary LOB.
pub enum BinaryWriter<'a> {
    Materialized(BlobWriter<'a>),
    Locator(LocatorWriter<'a>),
}

impl BinaryWriter<'_> {
    /// Returns the position of the next byte to be written.
    pub fn position(&self) -> u64 {
        match self {
            BinaryWriter::Materialized(writer) => writer.position(),
            BinaryWriter::Locator(writer) => writer.position(),
        }
    }

    /**
        Writes `buf[off..off + len]` at the current position.

        # Failures
        - `Error::NullArgument` if `buf` is absent and `len` is not 0
        - `Error::OutOfRange` if the range does not fit `buf`
    */
    pub fn write_range(&mut self, buf: Option<&[u8]>, off: usize, len: usize) -> Result<()> {
        match self {
            BinaryWriter::Materialized(writer) => writer.write_range(buf, off, len),
            BinaryWriter::Locator(writer) => {
                if len == 0 {
                    return Ok(());
                }
                let buf = buf.ok_or(Error::NullArgument("buffer"))?;
                check_range(buf.len(), off, len)?;
                writer.write_bytes(&buf[off..off + len])
            }
        }
    }
}

impl io::Write for BinaryWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BinaryWriter::Materialized(writer) => writer.write(buf),
            BinaryWriter::Locator(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
