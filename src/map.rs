use parking_lot::Mutex;
use tracing::debug;

use crate::codec::{Bytes, KeyCodec, Native, Str, ValueCodec};
use crate::config::HugeConfig;
use crate::error::{Error, Result};
use crate::segment::Segment;

/// Cache padding so neighbouring segment locks do not share a line.
#[repr(align(64))]
struct CachePadded<T> {
    value: T,
}

impl<T> CachePadded<T> {
    fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> std::ops::Deref for CachePadded<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// String-to-string map.
pub type StrMap = HugeMap<Str, Str>;
/// String keys, raw byte values.
pub type StrBytesMap = HugeMap<Str, Bytes>;
/// Fixed-width u64 keys and values.
pub type U64Map = HugeMap<Native<u64>, Native<u64>>;

/// A segmented hash map storing serialized entries in manually managed
/// byte regions instead of materialized objects.
///
/// Every key is mixed into a 64-bit hash whose low bits pick one
/// segment and whose remaining bits index within it. Each operation
/// locks exactly that segment, so operations on different segments run
/// fully in parallel while same-segment operations serialize.
///
/// The codec markers `KC` and `VC` fix the key kind and value encoding
/// at the type level; see [`crate::codec`].
pub struct HugeMap<KC: KeyCodec, VC: ValueCodec> {
    segments: Box<[CachePadded<Mutex<Segment<KC, VC>>>]>,
    segment_mask: u64,
    segment_shift: u32,
}

impl<KC: KeyCodec, VC: ValueCodec> HugeMap<KC, VC> {
    /// Create a map, eagerly allocating every segment's slab and scratch
    /// buffer for the map's fixed lifetime.
    pub fn new(config: HugeConfig) -> Self {
        let segments = (0..config.segment_count())
            .map(|_| CachePadded::new(Mutex::new(Segment::new(&config))))
            .collect();
        debug!(
            segments = config.segment_count(),
            entries_per_segment = config.entries_per_segment(),
            small_entry_size = config.small_entry_size(),
            "created segmented map"
        );
        Self {
            segments,
            segment_mask: config.segment_mask(),
            segment_shift: config.segment_shift(),
        }
    }

    /// Avalanche mix so closely related key hashes still spread across
    /// segments and index slots.
    fn mix(mut h: u64) -> u64 {
        h = h.wrapping_add((h >> 42).wrapping_sub(h >> 21));
        h = h.wrapping_add((h >> 14).wrapping_sub(h >> 7));
        h
    }

    /// Segment id and intra-segment hash for a key. Pure, so a key
    /// always routes to the same segment.
    fn locate(&self, key: &KC::Key) -> (usize, u64) {
        let h = Self::mix(KC::hash64(key));
        ((h & self.segment_mask) as usize, h >> self.segment_shift)
    }

    /// Unconditional upsert.
    pub fn insert(&self, key: &KC::Key, value: &VC::Value) -> Result<()> {
        let (seg, h) = self.locate(key);
        self.segments[seg].lock().put(h, key, value, true, true)
    }

    /// Insert only when the key is absent.
    pub fn insert_if_absent(&self, key: &KC::Key, value: &VC::Value) -> Result<()> {
        let (seg, h) = self.locate(key);
        self.segments[seg].lock().put(h, key, value, false, true)
    }

    /// Overwrite only when the key is present.
    pub fn replace(&self, key: &KC::Key, value: &VC::Value) -> Result<()> {
        let (seg, h) = self.locate(key);
        self.segments[seg].lock().put(h, key, value, true, false)
    }

    pub fn get(&self, key: &KC::Key) -> Result<Option<VC::Value>> {
        let (seg, h) = self.locate(key);
        self.segments[seg].lock().get(h, key, None)
    }

    /// Like [`get`](Self::get), but decodes into the caller-supplied
    /// instance when the value codec supports reuse.
    pub fn get_using(&self, key: &KC::Key, reuse: VC::Value) -> Result<Option<VC::Value>> {
        let (seg, h) = self.locate(key);
        self.segments[seg].lock().get(h, key, Some(reuse))
    }

    pub fn contains_key(&self, key: &KC::Key) -> Result<bool> {
        let (seg, h) = self.locate(key);
        self.segments[seg].lock().contains_key(h, key)
    }

    /// Remove the entry for `key`, reporting whether anything was
    /// removed.
    pub fn remove(&self, key: &KC::Key) -> Result<bool> {
        let (seg, h) = self.locate(key);
        self.segments[seg].lock().remove(h, key)
    }

    /// Remove only when the stored value equals `expected`. The owning
    /// segment's lock is held across the read and the removal, so the
    /// check-then-act is atomic.
    pub fn remove_if(&self, key: &KC::Key, expected: &VC::Value) -> Result<bool> {
        let (seg, h) = self.locate(key);
        let mut segment = self.segments[seg].lock();
        match segment.get(h, key, None)? {
            Some(current) if current == *expected => {
                segment.remove(h, key)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Overwrite only when the stored value equals `old`, under one lock
    /// acquisition.
    pub fn replace_if(&self, key: &KC::Key, old: &VC::Value, new: &VC::Value) -> Result<bool> {
        let (seg, h) = self.locate(key);
        let mut segment = self.segments[seg].lock();
        match segment.get(h, key, None)? {
            Some(current) if current == *old => {
                segment.put(h, key, new, true, true)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|seg| seg.lock().size() == 0)
    }

    /// Number of live entries, saturating at `usize::MAX`.
    pub fn len(&self) -> usize {
        let total = self
            .segments
            .iter()
            .fold(0u64, |acc, seg| acc.saturating_add(seg.lock().size()));
        usize::try_from(total).unwrap_or(usize::MAX)
    }

    /// Bytes held by slabs, scratch buffers, and overflow blocks across
    /// all segments.
    pub fn bytes_used(&self) -> u64 {
        self.segments
            .iter()
            .map(|seg| seg.lock().bytes_used())
            .sum()
    }

    /// Clear every segment in turn. Each segment is cleared under its
    /// own lock, but the sweep as a whole is not atomic: callers wanting
    /// a quiescent point must stop concurrent writers themselves.
    pub fn clear(&self) {
        for seg in self.segments.iter() {
            seg.lock().clear();
        }
        debug!("cleared all segments");
    }

    /// Entry enumeration is not implemented: slots and overflow blocks
    /// have no cheap stable ordering short of a full scan.
    pub fn iter(&self) -> Result<std::iter::Empty<(KC::Key, VC::Value)>> {
        Err(Error::Unsupported("entry iteration"))
    }
}
