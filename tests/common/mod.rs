#![allow(dead_code)]

use lobstream::{Connection, Error, Locator, Pattern, Result};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const POEM : &str = "Tyger Tyger, burning bright,\nIn the forests of the night;\nWhat immortal hand or eye,\nCould frame thy fearful symmetry?\n";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

enum Stored {
    Bytes(Vec<u8>),
    Chars(Vec<char>),
}

impl Stored {
    fn len(&self) -> usize {
        match self {
            Stored::Bytes(bytes) => bytes.len(),
            Stored::Chars(chars) => chars.len(),
        }
    }
}

struct Entry {
    data: Stored,
    /// Extra units reported by `lob_length` that the server cannot deliver
    overstated: u64,
}

/**
    In-memory stand-in for a database server.

    Every call of a `Connection` method counts as one round trip.
*/
pub struct MemoryServer {
    lobs: Mutex<HashMap<u32, Entry>>,
    next_id: Mutex<u32>,
    calls: AtomicUsize,
    failure: Mutex<Option<i32>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self {
            lobs: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
            calls: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    fn store(&self, data: Stored) -> Locator {
        let mut next_id = self.next_id.lock();
        let id = *next_id;
        *next_id += 1;
        self.lobs.lock().insert(id, Entry { data, overstated: 0 });
        Locator::new(id)
    }

    pub fn create_blob(&self, bytes: &[u8]) -> Locator {
        self.store(Stored::Bytes(bytes.to_vec()))
    }

    pub fn create_clob(&self, text: &str) -> Locator {
        self.store(Stored::Chars(text.chars().collect()))
    }

    /// Returns the current server-side content of a binary LOB.
    pub fn bytes(&self, locator: Locator) -> Vec<u8> {
        match &self.lobs.lock()[&locator.id()].data {
            Stored::Bytes(bytes) => bytes.clone(),
            Stored::Chars(_) => panic!("{} is a CLOB", locator),
        }
    }

    /// Returns the current server-side content of a character LOB.
    pub fn text(&self, locator: Locator) -> String {
        match &self.lobs.lock()[&locator.id()].data {
            Stored::Chars(chars) => chars.iter().collect(),
            Stored::Bytes(_) => panic!("{} is a BLOB", locator),
        }
    }

    /// Replaces the content of a character LOB behind the back of its readers.
    pub fn replace_text(&self, locator: Locator, text: &str) {
        if let Some(entry) = self.lobs.lock().get_mut(&locator.id()) {
            entry.data = Stored::Chars(text.chars().collect());
        }
    }

    /// Makes `lob_length` report `extra` more units than the server has.
    pub fn overstate_length(&self, locator: Locator, extra: u64) {
        if let Some(entry) = self.lobs.lock().get_mut(&locator.id()) {
            entry.overstated = extra;
        }
    }

    /// Returns `true` while the server knows the locator.
    pub fn has_locator(&self, locator: Locator) -> bool {
        self.lobs.lock().contains_key(&locator.id())
    }

    /// Number of round trips made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes the next call fail with the server error `code`.
    pub fn fail_next(&self, code: i32) {
        *self.failure.lock() = Some(code);
    }

    fn call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().take() {
            Some(code) => Err(Error::Server(code, "injected failure".to_string())),
            None => Ok(()),
        }
    }

    fn missing(locator: Locator) -> Error {
        Error::Server(22275, format!("invalid LOB locator {}", locator))
    }

    fn wrong_type() -> Error {
        Error::Server(932, "inconsistent datatypes".to_string())
    }
}

fn window<T: Clone>(data: &[T], pos: u64, len: usize) -> Vec<T> {
    let start = (pos as usize - 1).min(data.len());
    let end = (start + len).min(data.len());
    data[start..end].to_vec()
}

fn overwrite<T: Clone + Default>(data: &mut Vec<T>, pos: u64, src: &[T]) {
    let start = pos as usize - 1;
    if data.len() < start + src.len() {
        data.resize(start + src.len(), T::default());
    }
    data[start..start + src.len()].clone_from_slice(src);
}

fn find<T: PartialEq>(data: &[T], pattern: &[T], start: u64) -> Option<u64> {
    let from = start as usize - 1;
    if from > data.len() {
        return None;
    }
    if pattern.is_empty() {
        return Some(start);
    }
    data[from..].windows(pattern.len()).position(|w| w == pattern).map(|ix| (from + ix + 1) as u64)
}

impl Connection for MemoryServer {
    fn fetch_substring(&self, locator: Locator, pos: u64, len: usize) -> Result<String> {
        self.call()?;
        match self.lobs.lock().get(&locator.id()).map(|entry| &entry.data) {
            Some(Stored::Chars(chars)) => Ok( window(chars, pos, len).into_iter().collect() ),
            Some(Stored::Bytes(_)) => Err( Self::wrong_type() ),
            None => Err( Self::missing(locator) ),
        }
    }

    fn fetch_bytes(&self, locator: Locator, pos: u64, len: usize) -> Result<Vec<u8>> {
        self.call()?;
        match self.lobs.lock().get(&locator.id()).map(|entry| &entry.data) {
            Some(Stored::Bytes(bytes)) => Ok( window(bytes, pos, len) ),
            Some(Stored::Chars(_)) => Err( Self::wrong_type() ),
            None => Err( Self::missing(locator) ),
        }
    }

    fn lob_length(&self, locator: Locator) -> Result<u64> {
        self.call()?;
        match self.lobs.lock().get(&locator.id()) {
            Some(entry) => Ok( entry.data.len() as u64 + entry.overstated ),
            None => Err( Self::missing(locator) ),
        }
    }

    fn set_bytes(&self, locator: Locator, pos: u64, bytes: &[u8]) -> Result<()> {
        self.call()?;
        match self.lobs.lock().get_mut(&locator.id()).map(|entry| &mut entry.data) {
            Some(Stored::Bytes(data)) => { overwrite(data, pos, bytes); Ok(()) }
            Some(Stored::Chars(_)) => Err( Self::wrong_type() ),
            None => Err( Self::missing(locator) ),
        }
    }

    fn set_string(&self, locator: Locator, pos: u64, text: &str) -> Result<()> {
        self.call()?;
        match self.lobs.lock().get_mut(&locator.id()).map(|entry| &mut entry.data) {
            Some(Stored::Chars(data)) => {
                let chars : Vec<char> = text.chars().collect();
                overwrite(data, pos, &chars);
                Ok(())
            }
            Some(Stored::Bytes(_)) => Err( Self::wrong_type() ),
            None => Err( Self::missing(locator) ),
        }
    }

    fn truncate(&self, locator: Locator, len: u64) -> Result<()> {
        self.call()?;
        match self.lobs.lock().get_mut(&locator.id()).map(|entry| &mut entry.data) {
            Some(Stored::Bytes(data)) => { data.truncate(len as usize); Ok(()) }
            Some(Stored::Chars(data)) => { data.truncate(len as usize); Ok(()) }
            None => Err( Self::missing(locator) ),
        }
    }

    fn position(&self, locator: Locator, pattern: Pattern<'_>, start: u64) -> Result<Option<u64>> {
        self.call()?;
        let lobs = self.lobs.lock();
        let data = &lobs.get(&locator.id()).ok_or_else(|| Self::missing(locator))?.data;
        match (data, pattern) {
            (Stored::Bytes(bytes), Pattern::Bytes(pattern)) => Ok( find(&bytes[..], &pattern[..], start) ),
            (Stored::Chars(chars), Pattern::Text(pattern)) => {
                let pattern : Vec<char> = pattern.chars().collect();
                Ok( find(&chars[..], &pattern[..], start) )
            }
            (_, Pattern::Locator(other)) => {
                match (data, &lobs.get(&other.id()).ok_or_else(|| Self::missing(other))?.data) {
                    (Stored::Bytes(bytes), Stored::Bytes(pattern)) => Ok( find(&bytes[..], &pattern[..], start) ),
                    (Stored::Chars(chars), Stored::Chars(pattern)) => Ok( find(&chars[..], &pattern[..], start) ),
                    _ => Err( Self::wrong_type() ),
                }
            }
            _ => Err( Self::wrong_type() ),
        }
    }

    fn release_locator(&self, locator: Locator) -> Result<()> {
        self.call()?;
        match self.lobs.lock().remove(&locator.id()) {
            Some(_) => Ok(()),
            None => Err( Self::missing(locator) ),
        }
    }
}

/// Read-only server shared by tests that do not count round trips. It holds `POEM` as
/// a CLOB (locator 1) and as a BLOB (locator 2).
pub fn shared_server() -> &'static MemoryServer {
    static SERVER : OnceCell<MemoryServer> = OnceCell::new();
    SERVER.get_or_init(|| {
        let server = MemoryServer::new();
        server.create_clob(POEM);
        server.create_blob(POEM.as_bytes());
        server
    })
}

pub const POEM_CLOB : u32 = 1;
pub const POEM_BLOB : u32 = 2;
