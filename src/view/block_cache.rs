use std::collections::HashMap;

use crate::model::SharedPhoto;

/// Rows fetched from a materialized table per round trip.
pub const BLOCK_SIZE: usize = 100;

/// Fixed-size row blocks of one materialization, keyed by block offset.
#[derive(Default)]
pub struct BlockCache {
    blocks: HashMap<usize, Vec<SharedPhoto>>,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_offset(index: usize) -> usize {
        index - index % BLOCK_SIZE
    }

    /// Non-faulting probe: `None` when the block holding `index` is not
    /// resident.
    pub fn get(&self, index: usize) -> Option<SharedPhoto> {
        let offset = Self::block_offset(index);
        self.blocks
            .get(&offset)
            .and_then(|block| block.get(index - offset))
            .cloned()
    }

    pub fn contains_block(&self, index: usize) -> bool {
        self.blocks.contains_key(&Self::block_offset(index))
    }

    pub fn insert_block(&mut self, offset: usize, photos: Vec<SharedPhoto>) {
        debug_assert_eq!(offset % BLOCK_SIZE, 0);
        self.blocks.insert(offset, photos);
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Resident blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
