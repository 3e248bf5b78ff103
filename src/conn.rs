//! Server side of LOB locators

use crate::Result;
use std::fmt;

/// Opaque server-side handle of a LOB value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locator(u32);

impl Locator {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LOC#{}", self.0)
    }
}

/// What a server-side search looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern<'p> {
    /// Bytes searched for in a binary LOB
    Bytes(&'p [u8]),
    /// Characters searched for in a character LOB
    Text(&'p str),
    /// Content of another server-side LOB of the same kind
    Locator(Locator),
}

/**
    Locator procedures a connection provides to LOB values and their streams.

    Every method is a single blocking round trip to the server. Positions are 1-based.
    Implementations report server and transport failures as errors and never retry;
    the streams wrap those errors exactly once as `Error::RemoteFetch`.
*/
pub trait Connection {
    /// Returns up to `len` characters of a character LOB starting at `pos`.
    fn fetch_substring(&self, locator: Locator, pos: u64, len: usize) -> Result<String>;

    /// Returns up to `len` bytes of a binary LOB starting at `pos`.
    fn fetch_bytes(&self, locator: Locator, pos: u64, len: usize) -> Result<Vec<u8>>;

    /// Returns the length of the LOB - characters for character LOBs, bytes for binary ones.
    fn lob_length(&self, locator: Locator) -> Result<u64>;

    /// Overwrites bytes of a binary LOB starting at `pos`, extending it when needed.
    fn set_bytes(&self, locator: Locator, pos: u64, bytes: &[u8]) -> Result<()>;

    /// Overwrites characters of a character LOB starting at `pos`, extending it when needed.
    fn set_string(&self, locator: Locator, pos: u64, text: &str) -> Result<()>;

    /// Trims the LOB to `len` units.
    fn truncate(&self, locator: Locator, len: u64) -> Result<()>;

    /**
        Returns the 1-based position of the first occurrence of `pattern` at or after `start`,
        or `None` when the pattern does not occur there.
    */
    fn position(&self, locator: Locator, pattern: Pattern<'_>, start: u64) -> Result<Option<u64>>;

    /// Releases the locator. The server may reuse it afterwards.
    fn release_locator(&self, locator: Locator) -> Result<()>;
}
