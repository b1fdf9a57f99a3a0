//! WriteMultiBuffer (C8 data shape): a per-(file, iodesc, record-ness)
//! node aggregating writes from multiple variables that share a
//! decomposition, so one rearrange + one back-end call realizes all of
//! them at once.
//!
//! Reference: spec.md §3 "WriteMultiBuffer", §4.7. The flush
//! orchestration (deciding *when* and invoking the back-end) lives in
//! `pio-io`; this module only owns the buffer shape and the pure
//! `needsflush` threshold math, which the original computes the same
//! way regardless of which back-end ends up writing the data.

use crate::elem_type::ElemType;

pub struct WriteMultiBuffer {
    pub ioid: i32,
    pub is_record: bool,
    pub arraylen: usize,
    pub elem_type: ElemType,
    pub vid: Vec<i32>,
    pub frame: Vec<i32>,
    pub fillvalue: Vec<Option<Vec<u8>>>,
    /// Packed storage: `validvars` consecutive blocks of `arraylen`
    /// elements each, in `elem_type`'s native width.
    pub data: Vec<u8>,
}

impl WriteMultiBuffer {
    pub fn new(ioid: i32, is_record: bool, arraylen: usize, elem_type: ElemType) -> Self {
        WriteMultiBuffer {
            ioid,
            is_record,
            arraylen,
            elem_type,
            vid: Vec::new(),
            frame: Vec::new(),
            fillvalue: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn validvars(&self) -> usize {
        self.vid.len()
    }

    pub fn append(&mut self, vid: i32, frame: i32, fillvalue: Option<Vec<u8>>, bytes: &[u8]) {
        debug_assert_eq!(bytes.len(), self.arraylen * self.elem_type.size());
        self.vid.push(vid);
        self.frame.push(frame);
        self.fillvalue.push(fillvalue);
        self.data.extend_from_slice(bytes);
    }

    pub fn clear(&mut self) {
        self.vid.clear();
        self.frame.clear();
        self.fillvalue.clear();
        self.data.clear();
    }
}

/// Factor carried over verbatim from `pio_darray.c`; unexplained there
/// and preserved as-is per spec §9 rather than guessed at.
pub const NEEDSFLUSH_FACTOR: f64 = 1.1;

/// `needsflush`: true when appending one more variable of `arraylen`
/// elements at `tsize` bytes each would leave less than `maxfree` bytes
/// of headroom in the shared buffer pool, scaled by
/// [`NEEDSFLUSH_FACTOR`]. A local (single-rank) computation; the
/// caller all-reduces the flag with MAX across the compute communicator
/// so the flush decision is unanimous.
pub fn needsflush(maxfree: usize, validvars: usize, arraylen: usize, tsize: usize) -> bool {
    let projected = (1 + validvars) as f64 * arraylen as f64 * tsize as f64;
    (maxfree as f64) <= NEEDSFLUSH_FACTOR * projected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_tracks_validvars_and_packs_data() {
        let mut wmb = WriteMultiBuffer::new(7, false, 4, ElemType::I32);
        let bytes = 42i32.to_le_bytes().repeat(4);
        wmb.append(1, -1, None, &bytes);
        assert_eq!(wmb.validvars(), 1);
        assert_eq!(wmb.data.len(), 16);
        wmb.append(2, -1, None, &bytes);
        assert_eq!(wmb.validvars(), 2);
        assert_eq!(wmb.data.len(), 32);
    }

    #[test]
    fn needsflush_true_when_buffer_nearly_full() {
        // arraylen=100, tsize=4 -> one more var costs 400 bytes;
        // 1.1 * 1 * 400 = 440, so maxfree=430 must trip the flush.
        assert!(needsflush(430, 0, 100, 4));
        assert!(!needsflush(1_000_000, 0, 100, 4));
    }

    #[test]
    fn needsflush_scales_with_validvars() {
        // Second variable added (validvars=1 already buffered): cost
        // doubles to (1+1)*100*4 = 800, *1.1 = 880.
        assert!(needsflush(870, 1, 100, 4));
        assert!(!needsflush(900, 1, 100, 4));
    }
}
