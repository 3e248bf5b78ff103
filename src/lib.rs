/*!
Streaming access to BLOB and CLOB values of a database client.

A LOB value is either materialized - its content is held in memory - or represented by
a locator, an opaque handle of the value on the server. Values of both kinds offer the
same accessors and the same read and write handles:

- over a locator-backed value readers fetch data on demand, one round trip per read, and
  never return data of a version of the value that has been replaced since the previous read;
- over a materialized value readers read a snapshot and writers truncate the value after
  the written range.

Server calls are made through a [`Connection`] implementation that the client provides.

# Example
```
use lobstream::{Blob, CharRead, Clob, Connection, Locator, Result};
# use lobstream::Pattern;
use std::io::Read;
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
let lob = Clob::new(&conn, "Tyger Tyger, burning bright");
let mut text = String::new();
lob.character_stream_at(7, 5)?.read_text(&mut text)?;
assert_eq!(text, "Tyger");

let lob = Blob::new(&conn, b"In the forests of the night".to_vec());
let mut data = Vec::new();
lob.binary_stream_at(8, 7)?.read_to_end(&mut data)?;
assert_eq!(data, b"forests");
# Ok::<(),Box<dyn std::error::Error>>(())
```
*/

mod err;
mod conn;
mod lob;
mod stream;

pub use err::Error;
pub use conn::{Connection, Locator, Pattern};
pub use lob::{
    Lob, LobValue, BinaryValue, TextValue, Content, DEFAULT_CHUNK_SIZE,
    Binary, BinaryStream, BinaryWriter, Text, CharacterStream, AsciiStream, CharacterWriter,
};
pub use stream::{
    CharRead, FragmentStream, LocatorKind, ByteLocatorReader, CharLocatorReader, LocatorWriter,
    Reposition, UpdateSensitive, SnapshotReader, CharsReader, BlobWriter, ClobWriter,
};

pub type Result<T> = std::result::Result<T, Error>;
pub type Blob<'a>  = lob::Lob<'a, lob::Binary>;
pub type Clob<'a>  = lob::Lob<'a, lob::Text>;
