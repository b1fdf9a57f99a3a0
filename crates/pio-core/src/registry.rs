//! Registry & lifecycle (C11): process-wide handle tables for open
//! files, decompositions and I/O systems.
//!
//! Reference: `pio_lists.c`. The original keeps three singly-linked
//! lists, each with a "current" pointer used as a cache for repeat
//! lookups of the same handle. A `BTreeMap` plus a cached last-hit
//! handle reproduces that behavior without pointer-chasing.
//!
//! Handle numbering bands are preserved verbatim per spec §9: file
//! handles start at 16, iodesc handles start at 512, and IOSystem
//! handles are `i << 16` with `i` starting at 1 — which caps the
//! library at 2^15 live IOSystems before the shifted value collides
//! with the file/iodesc handle space. That ceiling is inherited, not
//! fixed, here.

use crate::error::PioError;

pub type Handle = i32;

pub const FILE_HANDLE_BASE: Handle = 16;
pub const IODESC_HANDLE_BASE: Handle = 512;

/// A handle table that reuses the lowest free slot at or above `base`,
/// matching the "imax tracks next free slot" bookkeeping used for the
/// file and iodesc lists.
pub struct HandleTable<T> {
    base: Handle,
    entries: std::collections::BTreeMap<Handle, T>,
    current: Option<Handle>,
}

impl<T> HandleTable<T> {
    pub fn new(base: Handle) -> Self {
        HandleTable { base, entries: Default::default(), current: None }
    }

    /// Insert `value`, assigning it the lowest unused handle `>= base`.
    pub fn insert(&mut self, value: T) -> Handle {
        let mut h = self.base;
        while self.entries.contains_key(&h) {
            h += 1;
        }
        self.entries.insert(h, value);
        self.current = Some(h);
        h
    }

    pub fn get(&mut self, handle: Handle) -> Result<&T, PioError> {
        if self.entries.contains_key(&handle) {
            self.current = Some(handle);
        }
        self.entries.get(&handle).ok_or(PioError::BadHandle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut T, PioError> {
        if self.entries.contains_key(&handle) {
            self.current = Some(handle);
        }
        self.entries.get_mut(&handle).ok_or(PioError::BadHandle)
    }

    /// Fast path for repeat operations on the most recently touched
    /// handle, mirroring the original's "current" pointer shortcut.
    pub fn current(&self) -> Option<&Handle> {
        self.current.as_ref()
    }

    pub fn remove(&mut self, handle: Handle) -> Result<T, PioError> {
        let v = self.entries.remove(&handle).ok_or(PioError::BadHandle)?;
        if self.current == Some(handle) {
            self.current = None;
        }
        Ok(v)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// IOSystem handles never reuse a freed slot: `i` only increases, so a
/// destroyed-then-recreated IOSystem never collides with a handle a
/// caller might still (incorrectly) be holding.
pub struct IosystemRegistry<T> {
    entries: std::collections::BTreeMap<Handle, T>,
    current: Option<Handle>,
    next_i: i32,
}

impl<T> Default for IosystemRegistry<T> {
    fn default() -> Self {
        IosystemRegistry { entries: Default::default(), current: None, next_i: 1 }
    }
}

impl<T> IosystemRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> Handle {
        let handle = self.next_i << 16;
        self.next_i += 1;
        self.entries.insert(handle, value);
        self.current = Some(handle);
        handle
    }

    pub fn get(&mut self, handle: Handle) -> Result<&T, PioError> {
        if self.entries.contains_key(&handle) {
            self.current = Some(handle);
        }
        self.entries.get(&handle).ok_or(PioError::BadHandle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut T, PioError> {
        if self.entries.contains_key(&handle) {
            self.current = Some(handle);
        }
        self.entries.get_mut(&handle).ok_or(PioError::BadHandle)
    }

    pub fn current(&self) -> Option<&Handle> {
        self.current.as_ref()
    }

    pub fn remove(&mut self, handle: Handle) -> Result<T, PioError> {
        let v = self.entries.remove(&handle).ok_or(PioError::BadHandle)?;
        if self.current == Some(handle) {
            self.current = None;
        }
        Ok(v)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_handles_start_at_band_base() {
        let mut t: HandleTable<&str> = HandleTable::new(FILE_HANDLE_BASE);
        assert_eq!(t.insert("a"), 16);
        assert_eq!(t.insert("b"), 17);
    }

    #[test]
    fn handle_table_reuses_freed_slot() {
        let mut t: HandleTable<&str> = HandleTable::new(FILE_HANDLE_BASE);
        let h1 = t.insert("a");
        let _h2 = t.insert("b");
        t.remove(h1).unwrap();
        let h3 = t.insert("c");
        assert_eq!(h3, h1, "lowest free slot should be reused");
    }

    #[test]
    fn bad_handle_after_remove() {
        let mut t: HandleTable<&str> = HandleTable::new(FILE_HANDLE_BASE);
        let h = t.insert("a");
        t.remove(h).unwrap();
        assert_eq!(t.get(h).unwrap_err(), PioError::BadHandle);
    }

    #[test]
    fn iodesc_handles_start_at_512() {
        let mut t: HandleTable<u32> = HandleTable::new(IODESC_HANDLE_BASE);
        assert_eq!(t.insert(0), 512);
    }

    #[test]
    fn iosystem_handle_is_shifted_and_monotonic() {
        let mut r: IosystemRegistry<&str> = IosystemRegistry::new();
        let h1 = r.insert("sys1");
        let h2 = r.insert("sys2");
        assert_eq!(h1, 1 << 16);
        assert_eq!(h2, 2 << 16);
    }

    #[test]
    fn iosystem_handle_never_reused() {
        let mut r: IosystemRegistry<&str> = IosystemRegistry::new();
        let h1 = r.insert("sys1");
        r.remove(h1).unwrap();
        let h2 = r.insert("sys2");
        assert_ne!(h1, h2);
        assert_eq!(h2, 2 << 16);
    }

    #[test]
    fn current_cache_cleared_on_remove() {
        let mut t: HandleTable<&str> = HandleTable::new(FILE_HANDLE_BASE);
        let h = t.insert("a");
        assert_eq!(t.current(), Some(&h));
        t.remove(h).unwrap();
        assert_eq!(t.current(), None);
    }
}
