use std::sync::OnceLock;

/// Sizing of a [`crate::HugeMap`], fixed for the map's lifetime.
///
/// Construction normalizes the raw numbers: segment and slot counts are
/// rounded up to powers of two (segment routing and the first-free-slot
/// probe both mask with `n - 1`), and the small-entry size is rounded up
/// to the next multiple of 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HugeConfig {
    segment_count: usize,
    entries_per_segment: usize,
    small_entry_size: usize,
}

fn default_segment_count() -> usize {
    static DEFAULT_SEGMENT_COUNT: OnceLock<usize> = OnceLock::new();
    *DEFAULT_SEGMENT_COUNT.get_or_init(|| {
        (std::thread::available_parallelism().map_or(1, usize::from) * 4).next_power_of_two()
    })
}

impl Default for HugeConfig {
    fn default() -> Self {
        Self::new(default_segment_count(), 1024, 256)
    }
}

impl HugeConfig {
    pub fn new(segment_count: usize, entries_per_segment: usize, small_entry_size: usize) -> Self {
        Self {
            segment_count: segment_count.max(1).next_power_of_two(),
            entries_per_segment: entries_per_segment.max(1).next_power_of_two(),
            small_entry_size: (small_entry_size.max(1) + 7) & !7,
        }
    }

    pub fn with_segments(self, segment_count: usize) -> Self {
        Self::new(segment_count, self.entries_per_segment, self.small_entry_size)
    }

    pub fn with_entries_per_segment(self, entries_per_segment: usize) -> Self {
        Self::new(self.segment_count, entries_per_segment, self.small_entry_size)
    }

    pub fn with_small_entry_size(self, small_entry_size: usize) -> Self {
        Self::new(self.segment_count, self.entries_per_segment, small_entry_size)
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    pub fn entries_per_segment(&self) -> usize {
        self.entries_per_segment
    }

    pub fn small_entry_size(&self) -> usize {
        self.small_entry_size
    }

    /// Total entry capacity of the slot slabs, before overflow blocks.
    pub fn slot_capacity(&self) -> usize {
        self.segment_count * self.entries_per_segment
    }

    pub(crate) fn segment_mask(&self) -> u64 {
        self.segment_count as u64 - 1
    }

    pub(crate) fn segment_shift(&self) -> u32 {
        self.segment_count.trailing_zeros()
    }
}
