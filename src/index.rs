use bytemuck::{Pod, Zeroable};

/// One record of the position index. `state` is zero for an empty slot,
/// so a zeroed table starts out fully empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
struct IndexSlot {
    hash: u64,
    pos: u32,
    state: u32,
}

const OCCUPIED: u32 = 1;

/// Fixed-capacity open-addressing multi-map from an intra-segment hash
/// to the slot positions ever inserted under it.
///
/// Linear probing from `hash & mask`; a search enumerates every position
/// sharing the searched hash until it reaches an empty slot. Removal
/// uses backward-shift compaction so probe chains through the removed
/// record stay reachable. Capacity is fixed at twice the segment's slot
/// count (rounded to a power of two), so with insertions bounded by the
/// slot count the table can never fill.
pub(crate) struct HashPosIndex {
    slots: Box<[IndexSlot]>,
    mask: usize,
    len: usize,
}

/// Search cursor handed out by [`HashPosIndex::start_search`]. Holds no
/// borrow of the index, so the caller can interleave slot reads.
pub(crate) struct Search {
    hash: u64,
    slot: usize,
    remaining: usize,
}

impl HashPosIndex {
    pub(crate) fn with_capacity_for(entries: usize) -> Self {
        let capacity = (entries.max(1) * 2).next_power_of_two();
        Self {
            slots: vec![IndexSlot::zeroed(); capacity].into_boxed_slice(),
            mask: capacity - 1,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn start_search(&self, hash: u64) -> Search {
        Search {
            hash,
            slot: (hash as usize) & self.mask,
            remaining: self.slots.len(),
        }
    }

    /// Next candidate position for the searched hash, or `None` once the
    /// probe chain is exhausted.
    pub(crate) fn next_pos(&self, search: &mut Search) -> Option<u32> {
        while search.remaining > 0 {
            let slot = self.slots[search.slot];
            search.slot = (search.slot + 1) & self.mask;
            search.remaining -= 1;
            if slot.state != OCCUPIED {
                return None;
            }
            if slot.hash == search.hash {
                return Some(slot.pos);
            }
        }
        None
    }

    pub(crate) fn put(&mut self, hash: u64, pos: u32) {
        debug_assert!(self.len < self.slots.len());
        let mut i = (hash as usize) & self.mask;
        while self.slots[i].state == OCCUPIED {
            i = (i + 1) & self.mask;
        }
        self.slots[i] = IndexSlot {
            hash,
            pos,
            state: OCCUPIED,
        };
        self.len += 1;
    }

    /// Remove the exact (hash, pos) record. Returns false when the pair
    /// was never inserted.
    pub(crate) fn remove(&mut self, hash: u64, pos: u32) -> bool {
        let mut i = (hash as usize) & self.mask;
        let mut remaining = self.slots.len();
        loop {
            if remaining == 0 {
                return false;
            }
            let slot = self.slots[i];
            if slot.state != OCCUPIED {
                return false;
            }
            if slot.hash == hash && slot.pos == pos {
                break;
            }
            i = (i + 1) & self.mask;
            remaining -= 1;
        }

        // Backward-shift compaction: pull later cluster members into the
        // hole whenever their home position lies at or before it.
        let mut hole = i;
        let mut j = (i + 1) & self.mask;
        while self.slots[j].state == OCCUPIED {
            let home = (self.slots[j].hash as usize) & self.mask;
            if (j.wrapping_sub(home) & self.mask) >= (j.wrapping_sub(hole) & self.mask) {
                self.slots[hole] = self.slots[j];
                hole = j;
            }
            j = (j + 1) & self.mask;
        }
        self.slots[hole] = IndexSlot::zeroed();
        self.len -= 1;
        true
    }

    pub(crate) fn clear(&mut self) {
        self.slots.fill(IndexSlot::zeroed());
        self.len = 0;
    }
}
