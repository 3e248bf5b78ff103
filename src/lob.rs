//! Large object (BLOB and CLOB) values.

mod blob;
mod clob;

pub use blob::{Binary, BinaryStream, BinaryWriter};
pub use clob::{Text, CharacterStream, AsciiStream, CharacterWriter};

use crate::{Error, Result, conn::{Connection, Locator}};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Default number of units fetched per round trip when a locator-backed value is materialized.
pub const DEFAULT_CHUNK_SIZE : u32 = 32 * 1024;

/**
    The part of a LOB value that streams depend on.

    Streams hold a shared reference to the value and never own it. Every change of the value's
    content or representation increments its update counter, which lets readers detect that
    the value they stream has changed between two calls.
*/
pub trait LobValue {
    /// Returns the current logical length - characters for character LOBs, bytes for binary ones.
    fn sql_length(&self) -> u64;

    /// Records the new logical length after a server-side change made through the locator.
    fn set_sql_length(&self, len: u64);

    /// Returns `true` when the value is represented by a server-side locator.
    fn is_locator(&self) -> bool {
        self.locator().is_some()
    }

    /// Returns the locator of a locator-backed value.
    fn locator(&self) -> Option<Locator>;

    /// Returns the locator or fails with `Error::StaleLocator` when the value is not locator-backed.
    fn check_locator(&self) -> Result<Locator> {
        self.locator().ok_or(Error::StaleLocator)
    }

    /// Returns the monotonic version stamp of the value.
    fn update_count(&self) -> u64;

    /// Bumps the version stamp after a change made through the locator.
    fn increment_update_count(&self);
}

/// Binary LOB value surface used by the materialized byte writer.
pub trait BinaryValue : LobValue {
    /// Returns the current materialized buffer, or `None` when the value is locator-backed.
    fn binary(&self) -> Option<Binary>;

    /**
        Atomically installs a new materialized buffer, which starts with `data_offset` header
        bytes that are not part of the value, and recomputes the logical length.
    */
    fn replace_binary(&self, buf: Vec<u8>, data_offset: usize);
}

/// Character LOB value surface used by the materialized character writer.
pub trait TextValue : LobValue {
    /// Returns the current materialized text, or `None` when the value is locator-backed.
    fn text(&self) -> Option<Text>;

    /// Atomically installs new materialized text and recomputes the logical length.
    fn replace_text(&self, text: String);
}

/// Materialized content of a LOB value.
pub trait Content : Clone {
    /// Logical length of the content in units.
    fn len(&self) -> u64;
}

#[derive(Clone)]
pub(crate) enum Repr<T> {
    Materialized(T),
    Locator(Locator),
}

pub(crate) struct State<T> {
    repr: Repr<T>,
    len: u64,
}

/**
    LOB value - either a materialized buffer or a locator of the value on the server.

    All methods take `&self`. The value may be changed through one handle while streams
    created earlier from it are still in use. Those streams observe the change on their
    next call.
*/
pub struct Lob<'a, T: Content> {
    conn: &'a dyn Connection,
    state: RwLock<State<T>>,
    update_count: AtomicU64,
    chunk_size: AtomicU32,
    freed: AtomicBool,
}

impl<'a, T: Content> Lob<'a, T> {
    pub(crate) fn make(conn: &'a dyn Connection, content: T) -> Self {
        let len = content.len();
        Self {
            conn,
            state: RwLock::new(State { repr: Repr::Materialized(content), len }),
            update_count: AtomicU64::new(0),
            chunk_size: AtomicU32::new(DEFAULT_CHUNK_SIZE),
            freed: AtomicBool::new(false),
        }
    }

    /**
        Creates a locator-backed value. Its length is requested from the server.

        # Failures
        Returns the error reported by the connection when the length cannot be obtained.
    */
    pub fn from_locator(conn: &'a dyn Connection, locator: Locator) -> Result<Self> {
        let len = conn.lob_length(locator)?;
        log::debug!("new locator-backed LOB {} of length {}", locator, len);
        Ok( Self {
            conn,
            state: RwLock::new(State { repr: Repr::Locator(locator), len }),
            update_count: AtomicU64::new(0),
            chunk_size: AtomicU32::new(DEFAULT_CHUNK_SIZE),
            freed: AtomicBool::new(false),
        } )
    }

    pub(crate) fn conn(&self) -> &'a dyn Connection {
        self.conn
    }

    /// Returns the current representation and length as one consistent snapshot.
    pub(crate) fn current(&self) -> (Repr<T>, u64) {
        let state = self.state.read();
        (state.repr.clone(), state.len)
    }

    /// Returns the materialized content, or `None` when the value is locator-backed.
    pub(crate) fn content(&self) -> Option<T> {
        match &self.state.read().repr {
            Repr::Materialized(content) => Some(content.clone()),
            Repr::Locator(_) => None,
        }
    }

    pub(crate) fn install(&self, repr: Repr<T>, len: u64) {
        let mut state = self.state.write();
        state.repr = repr;
        state.len = len;
        self.update_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the logical length of the value.
    pub fn len(&self) -> u64 {
        self.state.read().len
    }

    /// Returns `true` if the value has no content.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of units fetched per round trip when this value is materialized.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size.load(Ordering::Relaxed)
    }

    /// Sets the number of units fetched per round trip when this value is materialized.
    pub fn set_chunk_size(&self, size: u32) -> Result<()> {
        if size == 0 {
            return Err( Error::out_of_range("chunk size must be positive".to_string()) );
        }
        self.chunk_size.store(size, Ordering::Relaxed);
        Ok(())
    }

    /**
        Makes this value refer to another server-side value.

        The length of the new value is requested from the server. Streams that were created
        before the switch notice it on their next read and continue from their current
        position in the new value.
    */
    pub fn replace_locator(&self, locator: Locator) -> Result<()> {
        self.check_valid()?;
        let len = self.conn.lob_length(locator)?;
        log::debug!("LOB now refers to {} of length {}", locator, len);
        self.install(Repr::Locator(locator), len);
        Ok(())
    }

    /**
        Releases the value. A locator-backed value releases its locator on the server.

        Every later accessor call fails with `Error::Freed`. Freeing the value again has no
        effect. Streams created before keep reading through the locator and fail once the
        server no longer knows it.

        # Failures
        Returns the connection error if the locator cannot be released. The value stays freed.
    */
    pub fn free(&self) -> Result<()> {
        if self.freed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.current().0 {
            Repr::Locator(locator) => {
                log::debug!("release {}", locator);
                self.conn.release_locator(locator)
            }
            Repr::Materialized(_) => {
                log::debug!("materialized LOB of length {} freed", self.len());
                Ok(())
            }
        }
    }

    /// Returns `true` once the value has been freed.
    pub fn is_freed(&self) -> bool {
        self.freed.load(Ordering::Acquire)
    }

    pub(crate) fn check_valid(&self) -> Result<()> {
        if self.is_freed() { Err( Error::Freed ) } else { Ok(()) }
    }

    /**
        Validates a 1-based window `[pos, pos + len - 1]` against the current length.
    */
    pub(crate) fn check_pos_and_len(&self, pos: u64, len: u64) -> Result<()> {
        self.check_valid()?;
        if pos == 0 {
            return Err( Error::out_of_range(format!("position {} is before the first unit", pos)) );
        }
        let sql_len = self.len();
        if pos > sql_len + 1 {
            return Err( Error::out_of_range(format!("position {} is past the end of the value of length {}", pos, sql_len)) );
        }
        match (pos - 1).checked_add(len) {
            Some(end) if end <= sql_len => Ok(()),
            _ => Err( Error::out_of_range(format!("window of {} units at position {} exceeds the value length {}", len, pos, sql_len)) )
        }
    }

    pub(crate) fn check_truncate_len(&self, len: u64) -> Result<bool> {
        self.check_valid()?;
        let sql_len = self.len();
        if len > sql_len {
            return Err( Error::out_of_range(format!("cannot truncate the value of length {} to {}", sql_len, len)) );
        }
        Ok( len < sql_len )
    }
}

impl<T: Content> LobValue for Lob<'_, T> {
    fn sql_length(&self) -> u64 {
        self.len()
    }

    fn set_sql_length(&self, len: u64) {
        self.state.write().len = len;
    }

    fn locator(&self) -> Option<Locator> {
        match self.state.read().repr {
            Repr::Locator(locator) => Some(locator),
            Repr::Materialized(_) => None,
        }
    }

    fn update_count(&self) -> u64 {
        self.update_count.load(Ordering::Acquire)
    }

    fn increment_update_count(&self) {
        self.update_count.fetch_add(1, Ordering::AcqRel);
    }
}

/// Checks that a writer may start at `pos`, i.e. that writing there leaves no gap.
pub(crate) fn check_write_position(pos: u64, sql_len: u64) -> Result<()> {
    if pos == 0 {
        return Err( Error::out_of_range("write position must be at least 1".to_string()) );
    }
    if pos - 1 > sql_len {
        return Err( Error::out_of_range(format!("write position {} leaves a gap after the value of length {}", pos, sql_len)) );
    }
    Ok(())
}

/// Validates the `off` and `len` of a bulk call against a buffer of `size` units.
pub(crate) fn check_range(size: usize, off: usize, len: usize) -> Result<()> {
    match off.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err( Error::out_of_range(format!("range of {} units at offset {} does not fit the buffer of {}", len, off, size)) )
    }
}

/// Checks the 1-based start of a search.
pub(crate) fn check_search_start(start: u64) -> Result<()> {
    if start == 0 {
        return Err( Error::out_of_range("search must start at position 1 or later".to_string()) );
    }
    Ok(())
}

/**
    Returns the 1-based position of the first occurrence of `pattern` in `data` at or after
    `start`. An empty pattern is found at `start` unless `start` is past the end plus one.
*/
pub(crate) fn find<T: PartialEq>(data: &[T], pattern: &[T], start: u64) -> Option<u64> {
    if start == 0 || start - 1 > data.len() as u64 {
        return None;
    }
    if pattern.is_empty() {
        return Some(start);
    }
    let from = (start - 1) as usize;
    data[from..].windows(pattern.len())
        .position(|window| window == pattern)
        .map(|ix| (from + ix + 1) as u64)
}
