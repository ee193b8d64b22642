//! Read request planning
//!
//! Groups the register ranges of a [`DeviceDescriptor`] into as few read
//! requests as possible. Every request stays within the configured message
//! size and every field lies entirely inside exactly one request, so its words
//! can be decoded without stitching.

use crate::error::{MeterError, Result};
use crate::register_map::DeviceDescriptor;

/// One read request: `count` words starting at `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadChunk {
    pub start: u16,
    pub count: u16,
}

impl ReadChunk {
    pub fn end(&self) -> u32 {
        u32::from(self.start) + u32::from(self.count)
    }
}

/// Where a field's words are found in the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldSlot {
    pub chunk: usize,
    pub offset: u16,
}

/// Ordered read requests plus the slot of every field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    chunks: Vec<ReadChunk>,
    slots: Vec<FieldSlot>,
}

impl ChunkPlan {
    /// Read requests in issue order (ascending address)
    pub fn chunks(&self) -> &[ReadChunk] {
        &self.chunks
    }

    /// Slots indexed by the field's declaration position
    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }

    pub fn slot(&self, field_index: usize) -> Option<FieldSlot> {
        self.slots.get(field_index).copied()
    }

    /// Total number of words requested per cycle, gaps included
    pub fn total_words(&self) -> u32 {
        self.chunks.iter().map(|c| u32::from(c.count)).sum()
    }
}

/// Greedy chunk planner bounded by a maximum message size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlanner {
    max_chunk_words: u16,
    max_gap_words: Option<u16>,
}

impl ChunkPlanner {
    pub fn new(max_chunk_words: u16) -> Self {
        Self {
            max_chunk_words,
            max_gap_words: None,
        }
    }

    /// Never bridge more than `words` unused registers inside one request
    pub fn with_max_gap(mut self, words: u16) -> Self {
        self.max_gap_words = Some(words);
        self
    }

    pub fn max_chunk_words(&self) -> u16 {
        self.max_chunk_words
    }

    /// Build the read plan for `descriptor`
    pub fn plan(&self, descriptor: &DeviceDescriptor) -> Result<ChunkPlan> {
        if self.max_chunk_words == 0 {
            return Err(MeterError::config("max_chunk_words must be at least 1"));
        }
        let max = u32::from(self.max_chunk_words);

        let fields = descriptor.fields();
        if let Some(field) = fields.iter().find(|f| u32::from(f.word_count) > max) {
            return Err(MeterError::chunk_too_large(
                field.name.clone(),
                field.word_count,
                self.max_chunk_words,
            ));
        }

        // Stable sort keeps declaration order for equal addresses
        let mut order: Vec<usize> = (0..fields.len()).collect();
        order.sort_by_key(|&i| fields[i].address);

        let mut chunks: Vec<ReadChunk> = Vec::new();
        let mut slots = vec![FieldSlot { chunk: 0, offset: 0 }; fields.len()];
        let mut current: Option<(u32, u32)> = None;

        for i in order {
            let field = &fields[i];
            let f_start = u32::from(field.address);
            let f_end = field.end_address();

            let (start, end) = match current {
                Some((start, end)) if self.can_extend(start, end, f_start, f_end) => {
                    (start, end.max(f_end))
                }
                Some(open) => {
                    chunks.push(close_chunk(open));
                    (f_start, f_end)
                }
                None => (f_start, f_end),
            };
            current = Some((start, end));

            slots[i] = FieldSlot {
                chunk: chunks.len(),
                offset: (f_start - start) as u16,
            };
        }
        if let Some(open) = current {
            chunks.push(close_chunk(open));
        }

        Ok(ChunkPlan { chunks, slots })
    }

    fn can_extend(&self, start: u32, end: u32, f_start: u32, f_end: u32) -> bool {
        if f_end.max(end) - start > u32::from(self.max_chunk_words) {
            return false;
        }
        match self.max_gap_words {
            Some(gap) => f_start.saturating_sub(end) <= u32::from(gap),
            None => true,
        }
    }
}

fn close_chunk((start, end): (u32, u32)) -> ReadChunk {
    // Bounded by max_chunk_words and the validated register space
    ReadChunk {
        start: start as u16,
        count: (end - start) as u16,
    }
}
