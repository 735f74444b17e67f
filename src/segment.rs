use std::collections::HashMap;
use std::marker::PhantomData;

use rustc_hash::FxBuildHasher;
use tracing::trace;

use crate::codec::{KeyCodec, ValueCodec};
use crate::config::HugeConfig;
use crate::error::Result;
use crate::index::HashPosIndex;
use crate::region::{ByteReader, Region};

/// Scratch buffer size, in maximum-size small entries. Entries whose
/// serialized form exceeds this many small entries are rejected with an
/// out-of-bounds error.
const SCRATCH_SLOTS: usize = 64;

/// Slot occupancy: one bit per slot, bit set while the slot holds a
/// live entry.
struct Bitmap {
    words: Box<[u64]>,
    bits: usize,
}

impl Bitmap {
    fn new(bits: usize) -> Self {
        Self {
            words: vec![0u64; bits.div_ceil(64)].into_boxed_slice(),
            bits,
        }
    }

    fn set(&mut self, bit: usize) {
        self.words[bit / 64] |= 1 << (bit % 64);
    }

    fn clear(&mut self, bit: usize) {
        self.words[bit / 64] &= !(1 << (bit % 64));
    }

    fn get(&self, bit: usize) -> bool {
        self.words[bit / 64] & (1 << (bit % 64)) != 0
    }

    /// First clear bit scanning forward from `start` with wraparound, or
    /// `None` when every bit is set.
    fn next_clear(&self, start: usize) -> Option<usize> {
        (start..self.bits)
            .chain(0..start)
            .find(|&bit| !self.get(bit))
    }

    fn clear_all(&mut self) {
        self.words.fill(0);
    }
}

/// One independently locked shard of the map: a slab of fixed-size
/// slots, a position index over them, and overflow blocks for entries a
/// slot cannot hold.
///
/// Every method is called by [`crate::HugeMap`] with this segment's lock
/// held, which makes each probe-then-act sequence atomic and lets the
/// scratch buffer be reused across calls.
pub(crate) struct Segment<KC: KeyCodec, VC: ValueCodec> {
    slab: Region,
    scratch: Region,
    index: HashPosIndex,
    overflow: HashMap<KC::Key, Region, FxBuildHasher>,
    used: Bitmap,
    entries_per_segment: usize,
    small_entry_size: usize,
    size: u64,
    bytes_used: u64,
    _marker: PhantomData<VC>,
}

impl<KC: KeyCodec, VC: ValueCodec> Segment<KC, VC> {
    pub(crate) fn new(config: &HugeConfig) -> Self {
        let entries_per_segment = config.entries_per_segment();
        let small_entry_size = config.small_entry_size();
        let slab = Region::alloc(entries_per_segment * small_entry_size);
        let scratch = Region::alloc(SCRATCH_SLOTS * small_entry_size);
        let bytes_used = (slab.capacity() + scratch.capacity()) as u64;
        Self {
            slab,
            scratch,
            index: HashPosIndex::with_capacity_for(entries_per_segment),
            overflow: HashMap::default(),
            used: Bitmap::new(entries_per_segment),
            entries_per_segment,
            small_entry_size,
            size: 0,
            bytes_used,
            _marker: PhantomData,
        }
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn bytes_used(&self) -> u64 {
        self.bytes_used
    }

    fn slot_reader(&self, pos: u32) -> Result<ByteReader<'_>> {
        self.slab
            .reader(pos as usize * self.small_entry_size, self.small_entry_size)
    }

    /// Probe the index for a slot whose stored key matches.
    fn find_slot(&self, hash: u64, key: &KC::Key) -> Result<Option<u32>> {
        let mut search = self.index.start_search(hash);
        while let Some(pos) = self.index.next_pos(&mut search) {
            let mut reader = self.slot_reader(pos)?;
            if KC::matches(key, &mut reader)? {
                return Ok(Some(pos));
            }
        }
        Ok(None)
    }

    pub(crate) fn put(
        &mut self,
        hash: u64,
        key: &KC::Key,
        value: &VC::Value,
        if_present: bool,
        if_absent: bool,
    ) -> Result<()> {
        let found_small = self.find_slot(hash, key)?;
        let mut found_large = found_small.is_none() && self.overflow.contains_key(key);

        // Policy gate, before any mutation.
        let found = found_small.is_some() || found_large;
        if !found && if_present && !if_absent {
            return Ok(());
        }
        if found && if_absent && !if_present {
            return Ok(());
        }

        // Serialize [key][value] into the scratch buffer.
        let (total, value_at) = {
            let capacity = self.scratch.capacity();
            let mut writer = self.scratch.writer(0, capacity)?;
            KC::encode(key, &mut writer)?;
            let value_at = writer.position();
            VC::encode(value, &mut writer)?;
            (writer.position(), value_at)
        };

        if total <= self.small_entry_size {
            if let Some(pos) = found_small {
                // same residency, overwrite in place; no index or count change
                let offset = pos as usize * self.small_entry_size;
                self.slab.as_mut()[offset..offset + total]
                    .copy_from_slice(&self.scratch.as_ref()[..total]);
                return Ok(());
            }
            if found_large {
                // the entry is gone from overflow now; if no free slot
                // turns up below, it re-enters overflow as a fresh block
                self.remove_overflow(key);
                found_large = false;
            }
            let start = (hash as usize) & (self.entries_per_segment - 1);
            if let Some(free) = self.used.next_clear(start) {
                let offset = free * self.small_entry_size;
                self.slab.as_mut()[offset..offset + total]
                    .copy_from_slice(&self.scratch.as_ref()[..total]);
                self.index.put(hash, free as u32);
                self.used.set(free);
                self.size += 1;
                debug_assert_eq!(self.index.len() + self.overflow.len(), self.size as usize);
                return Ok(());
            }
            // no free slot; store the entry as overflow instead
        }

        if let Some(pos) = found_small {
            self.used.clear(pos as usize);
            self.index.remove(hash, pos);
            self.size -= 1;
        } else if found_large {
            let value_len = total - value_at;
            let block = self.overflow.get_mut(key).expect("overflow entry probed above");
            let capacity = block.capacity();
            // exact fits always reuse; otherwise tolerate waste below
            // 1/8 of the new size
            if capacity == value_len
                || (capacity > value_len && capacity - value_len < value_len / 8)
            {
                block.as_mut()[..value_len]
                    .copy_from_slice(&self.scratch.as_ref()[value_at..total]);
                return Ok(());
            }
            self.remove_overflow(key);
        }

        let value_len = total - value_at;
        let mut block = Region::alloc(value_len);
        block
            .as_mut()
            .copy_from_slice(&self.scratch.as_ref()[value_at..total]);
        trace!(bytes = value_len, "allocated overflow block");
        self.bytes_used += block.capacity() as u64;
        self.overflow.insert(key.clone(), block);
        self.size += 1;
        debug_assert_eq!(self.index.len() + self.overflow.len(), self.size as usize);
        Ok(())
    }

    fn remove_overflow(&mut self, key: &KC::Key) -> bool {
        match self.overflow.remove(key) {
            Some(block) => {
                trace!(bytes = block.capacity(), "freed overflow block");
                self.bytes_used -= block.capacity() as u64;
                self.size -= 1;
                true
            }
            None => false,
        }
    }

    pub(crate) fn get(
        &self,
        hash: u64,
        key: &KC::Key,
        reuse: Option<VC::Value>,
    ) -> Result<Option<VC::Value>> {
        let mut search = self.index.start_search(hash);
        while let Some(pos) = self.index.next_pos(&mut search) {
            let mut reader = self.slot_reader(pos)?;
            if KC::matches(key, &mut reader)? {
                // matches() left the cursor at the value
                return VC::decode(&mut reader, reuse).map(Some);
            }
        }
        match self.overflow.get(key) {
            Some(block) => {
                let mut reader = block.reader(0, block.capacity())?;
                VC::decode(&mut reader, reuse).map(Some)
            }
            None => Ok(None),
        }
    }

    pub(crate) fn contains_key(&self, hash: u64, key: &KC::Key) -> Result<bool> {
        if self.find_slot(hash, key)?.is_some() {
            return Ok(true);
        }
        Ok(self.overflow.contains_key(key))
    }

    pub(crate) fn remove(&mut self, hash: u64, key: &KC::Key) -> Result<bool> {
        let mut found = false;
        if let Some(pos) = self.find_slot(hash, key)? {
            self.used.clear(pos as usize);
            self.index.remove(hash, pos);
            self.size -= 1;
            found = true;
        }
        // a key should only ever live in one place, but check the
        // overflow side regardless
        if self.remove_overflow(key) {
            found = true;
        }
        debug_assert_eq!(self.index.len() + self.overflow.len(), self.size as usize);
        Ok(found)
    }

    /// Drops every overflow block and resets bitmap and index. The slab
    /// and scratch buffer are kept for reuse.
    pub(crate) fn clear(&mut self) {
        self.used.clear_all();
        self.index.clear();
        self.overflow.clear();
        self.size = 0;
        self.bytes_used = (self.slab.capacity() + self.scratch.capacity()) as u64;
    }
}
