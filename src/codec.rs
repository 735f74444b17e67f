//! Type-level codec markers deciding how keys and values move through a
//! cursor, and how keys hash and compare against their stored form.
//!
//! The marker carried in the map's type parameters picks the key kind
//! once at construction; the storage engine only ever talks to the two
//! traits and stays agnostic to the encoding in play.

use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use bytemuck::Pod;
use rustc_hash::FxHasher;

use crate::error::Result;
use crate::region::{ByteReader, ByteWriter};

/// Hashing, encoding, and stored-form comparison for key types.
pub trait KeyCodec {
    type Key: Clone + Eq + Hash;

    /// 64-bit hash of the key, before avalanche mixing.
    fn hash64(key: &Self::Key) -> u64;

    fn encode(key: &Self::Key, out: &mut ByteWriter<'_>) -> Result<()>;

    /// Compare `key` against the encoded key under the cursor, consuming
    /// it. On a match the cursor is left at the start of the value.
    fn matches(key: &Self::Key, src: &mut ByteReader<'_>) -> Result<bool>;
}

/// Encoding and decoding for value types. `decode` may fill a
/// caller-supplied instance instead of allocating a fresh one when the
/// codec supports it.
pub trait ValueCodec {
    type Value: PartialEq;

    fn encode(value: &Self::Value, out: &mut ByteWriter<'_>) -> Result<()>;

    fn decode(src: &mut ByteReader<'_>, reuse: Option<Self::Value>) -> Result<Self::Value>;
}

/// Key types carrying their own 64-bit hash, used through the
/// [`Hashed`] marker instead of the generic content hash.
pub trait Hash64 {
    fn hash64(&self) -> u64;
}

/// A value type's own binary representation, preferred over the generic
/// codecs through the [`Marshal`] marker.
pub trait BytesMarshallable: Sized {
    /// Construct an instance for decode to fill. Types without a
    /// sensible empty state report [`crate::Error::Instantiation`].
    fn blank() -> Result<Self>;

    fn write_marshallable(&self, out: &mut ByteWriter<'_>) -> Result<()>;

    fn read_marshallable(&mut self, src: &mut ByteReader<'_>) -> Result<()>;
}

/// Textual keys and values: stop-bit length-prefixed UTF-8, hashed and
/// compared by character content rather than decoded-object identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Str;

impl KeyCodec for Str {
    type Key = String;

    fn hash64(key: &String) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write(key.as_bytes());
        hasher.finish()
    }

    fn encode(key: &String, out: &mut ByteWriter<'_>) -> Result<()> {
        out.write_str(key)
    }

    fn matches(key: &String, src: &mut ByteReader<'_>) -> Result<bool> {
        Ok(src.read_str()? == key.as_str())
    }
}

impl ValueCodec for Str {
    type Value = String;

    fn encode(value: &String, out: &mut ByteWriter<'_>) -> Result<()> {
        out.write_str(value)
    }

    fn decode(src: &mut ByteReader<'_>, reuse: Option<String>) -> Result<String> {
        let text = src.read_str()?;
        match reuse {
            Some(mut out) => {
                out.clear();
                out.push_str(text);
                Ok(out)
            }
            None => Ok(text.to_owned()),
        }
    }
}

/// Generic fixed-width serialization for Pod types; the native hash
/// widened to 64 bits.
#[derive(Debug, Clone, Copy)]
pub struct Native<T>(PhantomData<T>);

impl<T> Default for Native<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T> KeyCodec for Native<T>
where
    T: Pod + Clone + Eq + Hash,
{
    type Key = T;

    fn hash64(key: &T) -> u64 {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn encode(key: &T, out: &mut ByteWriter<'_>) -> Result<()> {
        out.write_pod(key)
    }

    fn matches(key: &T, src: &mut ByteReader<'_>) -> Result<bool> {
        Ok(src.read_pod::<T>()? == *key)
    }
}

impl<T> ValueCodec for Native<T>
where
    T: Pod + PartialEq,
{
    type Value = T;

    fn encode(value: &T, out: &mut ByteWriter<'_>) -> Result<()> {
        out.write_pod(value)
    }

    fn decode(src: &mut ByteReader<'_>, _reuse: Option<T>) -> Result<T> {
        src.read_pod()
    }
}

/// Raw byte-string keys and values, stop-bit length-prefixed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bytes;

impl KeyCodec for Bytes {
    type Key = Vec<u8>;

    fn hash64(key: &Vec<u8>) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write(key);
        hasher.finish()
    }

    fn encode(key: &Vec<u8>, out: &mut ByteWriter<'_>) -> Result<()> {
        out.write_stop_bit(key.len() as u64)?;
        out.write_bytes(key)
    }

    fn matches(key: &Vec<u8>, src: &mut ByteReader<'_>) -> Result<bool> {
        let len = src.read_stop_bit()? as usize;
        Ok(src.read_bytes(len)? == key.as_slice())
    }
}

impl ValueCodec for Bytes {
    type Value = Vec<u8>;

    fn encode(value: &Vec<u8>, out: &mut ByteWriter<'_>) -> Result<()> {
        out.write_stop_bit(value.len() as u64)?;
        out.write_bytes(value)
    }

    fn decode(src: &mut ByteReader<'_>, reuse: Option<Vec<u8>>) -> Result<Vec<u8>> {
        let len = src.read_stop_bit()? as usize;
        let bytes = src.read_bytes(len)?;
        match reuse {
            Some(mut out) => {
                out.clear();
                out.extend_from_slice(bytes);
                Ok(out)
            }
            None => Ok(bytes.to_vec()),
        }
    }
}

/// Keys supplying their own 64-bit hash via [`Hash64`], Pod-encoded.
#[derive(Debug, Clone, Copy)]
pub struct Hashed<K>(PhantomData<K>);

impl<K> Default for Hashed<K> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<K> KeyCodec for Hashed<K>
where
    K: Hash64 + Pod + Clone + Eq + Hash,
{
    type Key = K;

    fn hash64(key: &K) -> u64 {
        key.hash64()
    }

    fn encode(key: &K, out: &mut ByteWriter<'_>) -> Result<()> {
        out.write_pod(key)
    }

    fn matches(key: &K, src: &mut ByteReader<'_>) -> Result<bool> {
        Ok(src.read_pod::<K>()? == *key)
    }
}

/// Values using their own [`BytesMarshallable`] routines. Decoding fills
/// the caller's reusable instance when one is given, otherwise a blank
/// one from `blank()`.
#[derive(Debug, Clone, Copy)]
pub struct Marshal<V>(PhantomData<V>);

impl<V> Default for Marshal<V> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<V> ValueCodec for Marshal<V>
where
    V: BytesMarshallable + PartialEq,
{
    type Value = V;

    fn encode(value: &V, out: &mut ByteWriter<'_>) -> Result<()> {
        value.write_marshallable(out)
    }

    fn decode(src: &mut ByteReader<'_>, reuse: Option<V>) -> Result<V> {
        let mut value = match reuse {
            Some(value) => value,
            None => V::blank()?,
        };
        value.read_marshallable(src)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::region::Region;

    fn round_trip_value<C: ValueCodec>(value: &C::Value) -> C::Value {
        let mut region = Region::alloc(256);
        let end = {
            let mut w = region.writer(0, 256).unwrap();
            C::encode(value, &mut w).unwrap();
            w.position()
        };
        C::decode(&mut region.reader(0, end).unwrap(), None).unwrap()
    }

    #[test]
    fn test_str_value_round_trip() {
        let value = "some text".to_string();
        assert_eq!(round_trip_value::<Str>(&value), value);
    }

    #[test]
    fn test_native_value_round_trip() {
        assert_eq!(round_trip_value::<Native<u64>>(&u64::MAX), u64::MAX);
        assert_eq!(round_trip_value::<Native<i32>>(&-7), -7);
    }

    #[test]
    fn test_bytes_value_round_trip() {
        let value = vec![0u8, 255, 128, 3];
        assert_eq!(round_trip_value::<Bytes>(&value), value);
    }

    #[test]
    fn test_key_matches_consumes_key() {
        let key = "the-key".to_string();
        let mut region = Region::alloc(64);
        let end = {
            let mut w = region.writer(0, 64).unwrap();
            <Str as KeyCodec>::encode(&key, &mut w).unwrap();
            <Str as ValueCodec>::encode(&"v".to_string(), &mut w).unwrap();
            w.position()
        };

        let mut r = region.reader(0, end).unwrap();
        assert!(<Str as KeyCodec>::matches(&key, &mut r).unwrap());
        // cursor now sits at the value
        assert_eq!(<Str as ValueCodec>::decode(&mut r, None).unwrap(), "v");

        let mut r = region.reader(0, end).unwrap();
        assert!(!<Str as KeyCodec>::matches(&"other".to_string(), &mut r).unwrap());
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl BytesMarshallable for Point {
        fn blank() -> Result<Self> {
            Ok(Self::default())
        }

        fn write_marshallable(&self, out: &mut ByteWriter<'_>) -> Result<()> {
            out.write_pod(&self.x)?;
            out.write_pod(&self.y)
        }

        fn read_marshallable(&mut self, src: &mut ByteReader<'_>) -> Result<()> {
            self.x = src.read_pod()?;
            self.y = src.read_pod()?;
            Ok(())
        }
    }

    #[test]
    fn test_marshal_round_trip_and_reuse() {
        let value = Point { x: 3, y: -9 };
        assert_eq!(round_trip_value::<Marshal<Point>>(&value), value);

        let mut region = Region::alloc(64);
        let end = {
            let mut w = region.writer(0, 64).unwrap();
            <Marshal<Point> as ValueCodec>::encode(&value, &mut w).unwrap();
            w.position()
        };
        let reuse = Point { x: 100, y: 100 };
        let decoded =
            <Marshal<Point> as ValueCodec>::decode(&mut region.reader(0, end).unwrap(), Some(reuse))
                .unwrap();
        assert_eq!(decoded, value);
    }

    #[derive(Debug, PartialEq)]
    struct NoBlank;

    impl BytesMarshallable for NoBlank {
        fn blank() -> Result<Self> {
            Err(Error::Instantiation("NoBlank"))
        }

        fn write_marshallable(&self, _out: &mut ByteWriter<'_>) -> Result<()> {
            Ok(())
        }

        fn read_marshallable(&mut self, _src: &mut ByteReader<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_marshal_blank_failure() {
        let region = Region::alloc(8);
        let err = <Marshal<NoBlank> as ValueCodec>::decode(&mut region.reader(0, 8).unwrap(), None)
            .unwrap_err();
        assert!(matches!(err, Error::Instantiation("NoBlank")));
    }
}
