//! Process-wide state (spec.md §9 "Global mutable state"): the three
//! handle registries plus the shared write-buffer pool accounting,
//! gathered into a single struct instead of free-standing globals.
//!
//! Reference: `pio_lists.c` (the three linked lists), `pio_darray.c`
//! (`pio_buffer_size_limit`, `maxusage`).

use crate::file::File;
use crate::iodesc::IoDesc;
use crate::iosystem::IoSystem;
use crate::registry::{HandleTable, IosystemRegistry, FILE_HANDLE_BASE, IODESC_HANDLE_BASE};

/// Default ceiling on the shared write-buffer pool: 10 MiB, matching
/// `PIOc_set_buffer_size_limit`'s compiled-in default.
pub const DEFAULT_BUFFER_SIZE_LIMIT: usize = 10 * 1024 * 1024;

pub struct BufferPool {
    pub size_limit: usize,
    pub current_usage: usize,
    /// High-water mark of `current_usage`, retained for diagnostics.
    pub maxusage: usize,
}

impl Default for BufferPool {
    fn default() -> Self {
        BufferPool { size_limit: DEFAULT_BUFFER_SIZE_LIMIT, current_usage: 0, maxusage: 0 }
    }
}

impl BufferPool {
    pub fn maxfree(&self) -> usize {
        self.size_limit.saturating_sub(self.current_usage)
    }

    pub fn grow(&mut self, bytes: usize) {
        self.current_usage += bytes;
        self.maxusage = self.maxusage.max(self.current_usage);
    }

    pub fn release(&mut self, bytes: usize) {
        self.current_usage = self.current_usage.saturating_sub(bytes);
    }

    pub fn set_size_limit(&mut self, limit: usize) {
        self.size_limit = limit;
    }
}

pub struct PioContext {
    pub iosystems: IosystemRegistry<IoSystem>,
    pub files: HandleTable<File>,
    pub iodescs: HandleTable<IoDesc>,
    pub buffer_pool: BufferPool,
}

impl Default for PioContext {
    fn default() -> Self {
        PioContext {
            iosystems: IosystemRegistry::new(),
            files: HandleTable::new(FILE_HANDLE_BASE),
            iodescs: HandleTable::new(IODESC_HANDLE_BASE),
            buffer_pool: BufferPool::default(),
        }
    }
}

impl PioContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_has_no_open_handles() {
        let ctx = PioContext::new();
        assert_eq!(ctx.file_count(), 0);
        assert!(ctx.iodescs.is_empty());
    }

    #[test]
    fn buffer_pool_tracks_high_water_mark() {
        let mut pool = BufferPool::default();
        pool.grow(1000);
        pool.grow(2000);
        pool.release(500);
        assert_eq!(pool.current_usage, 2500);
        assert_eq!(pool.maxusage, 3000);
    }
}
