//! A segmented hash map for very large entry counts: entries are
//! serialized into manually managed byte regions (fixed-size slots in a
//! per-segment slab, or dedicated overflow blocks) instead of being held
//! as materialized objects. One exclusive lock per segment; operations
//! on different segments run fully in parallel.

pub mod codec;
pub mod config;
pub mod error;
mod index;
pub mod map;
pub mod region;
mod segment;

pub use codec::{Bytes, BytesMarshallable, Hash64, Hashed, KeyCodec, Marshal, Native, Str, ValueCodec};
pub use config::HugeConfig;
pub use error::{Error, Result};
pub use map::{HugeMap, StrBytesMap, StrMap, U64Map};
pub use region::{ByteReader, ByteWriter, Region};
