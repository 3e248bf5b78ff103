//! Read and write handles over LOB values.

mod chars;
mod combiner;
mod locator;
mod sensitive;
mod snapshot;
mod writer;

pub use chars::CharRead;
pub use combiner::FragmentStream;
pub use locator::{LocatorKind, ByteLocatorReader, CharLocatorReader, LocatorWriter};
pub use sensitive::{Reposition, UpdateSensitive};
pub use snapshot::{SnapshotReader, CharsReader};
pub use writer::{BlobWriter, ClobWriter};

pub(crate) use chars::{substr, char_len};
