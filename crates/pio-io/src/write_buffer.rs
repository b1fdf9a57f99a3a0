//! Multi-variable write buffer orchestration (C8): decide when to
//! flush a [`WriteMultiBuffer`] and drive the back-end once it does.
//!
//! Reference: spec.md §4.7, `pio_darray.c` (`PIOc_write_darray`,
//! `PIOc_write_darray_multi`). The rearrange (one all-to-all for every
//! buffered variable) happens once per flush regardless of
//! `validvars`; only the back-end `put_vars` calls are per-variable,
//! matching how the original still issues one `nc_put_vara` per
//! variable even after a combined rearrange.

use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use pio_backend::{BackendHandle, IoBackend};
use pio_core::context::BufferPool;
use pio_core::error::PioError;
use pio_core::region::Region;
use pio_core::write_buffer::{needsflush, WriteMultiBuffer};

/// Collective `needsflush` test: every rank computes its local flag
/// from its own buffer-pool headroom, then the result is all-reduced
/// with MAX so every rank of `comm` makes the same flush decision.
pub fn needsflush_collective(
    comm: &SimpleCommunicator,
    pool: &BufferPool,
    wmb: &WriteMultiBuffer,
    arraylen: usize,
) -> bool {
    let tsize = wmb.elem_type.size();
    let local = needsflush(pool.maxfree(), wmb.validvars(), arraylen, tsize) as i32;
    let mut global = 0i32;
    comm.all_reduce_into(&local, &mut global, mpi::collective::SystemOperation::max());
    global != 0
}

/// Flush every buffered variable in `wmb` to the back-end through a
/// single region (this I/O task's tile), then clear the buffer and
/// release its bytes back to the pool. `transfer_count`, when
/// supplied, is incremented exactly once per flush — the rearrange the
/// real all-to-all would need, batched across every buffered variable.
pub fn flush(
    backend: &dyn IoBackend,
    handle: BackendHandle,
    region: &Region,
    wmb: &mut WriteMultiBuffer,
    pool: &mut BufferPool,
    transfer_count: Option<&mut usize>,
) -> Result<(), PioError> {
    if let Some(c) = transfer_count {
        *c += 1;
    }
    log::debug!("flushing write buffer: ioid={} validvars={}", wmb.ioid, wmb.validvars());
    let esize = wmb.elem_type.size();
    let stride = wmb.arraylen * esize;
    for i in 0..wmb.validvars() {
        let bytes = &wmb.data[i * stride..(i + 1) * stride];
        backend.put_vars(handle, wmb.vid[i], wmb.elem_type, &region.start, &region.count, wmb.frame[i], bytes)?;
    }
    pool.release(wmb.data.len());
    wmb.clear();
    Ok(())
}

/// Append one variable's data to `wmb`, flushing first if the
/// collective `needsflush` test says so. This is the per-write entry
/// point `PIOc_write_darray` funnels every variable write through.
#[allow(clippy::too_many_arguments)]
pub fn append_with_flush(
    comm: &SimpleCommunicator,
    backend: &dyn IoBackend,
    handle: BackendHandle,
    region: &Region,
    wmb: &mut WriteMultiBuffer,
    pool: &mut BufferPool,
    vid: i32,
    frame: i32,
    fillvalue: Option<Vec<u8>>,
    bytes: &[u8],
    transfer_count: Option<&mut usize>,
) -> Result<(), PioError> {
    if needsflush_collective(comm, pool, wmb, wmb.arraylen) {
        flush(backend, handle, region, wmb, pool, transfer_count)?;
    }
    wmb.append(vid, frame, fillvalue, bytes);
    pool.grow(bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pio_backend::mock::MockBackend;
    use pio_core::elem_type::ElemType;

    #[test]
    fn flush_writes_every_buffered_variable_in_one_transfer() {
        let backend = MockBackend::new();
        let handle = backend.create("mem://wmb", true).unwrap();
        let d0 = backend.def_dim(handle, "x", Some(4)).unwrap();
        let v0 = backend.def_var(handle, "a", ElemType::I32, &[d0]).unwrap();
        let v1 = backend.def_var(handle, "b", ElemType::I32, &[d0]).unwrap();

        let mut wmb = WriteMultiBuffer::new(1, false, 4, ElemType::I32);
        let bytes0: Vec<u8> = [1i32, 2, 3, 4].iter().flat_map(|x| x.to_le_bytes()).collect();
        let bytes1: Vec<u8> = [5i32, 6, 7, 8].iter().flat_map(|x| x.to_le_bytes()).collect();
        wmb.append(v0, -1, None, &bytes0);
        wmb.append(v1, -1, None, &bytes1);

        let region = Region { start: vec![0], count: vec![4] };
        let mut pool = BufferPool::default();
        pool.grow(bytes0.len() + bytes1.len());
        let mut transfers = 0usize;
        flush(&backend, handle, &region, &mut wmb, &mut pool, Some(&mut transfers)).unwrap();

        assert_eq!(transfers, 1);
        assert_eq!(wmb.validvars(), 0);
        assert_eq!(pool.current_usage, 0);

        let back0 = backend.get_vars(handle, v0, ElemType::I32, &[0], &[4], -1).unwrap();
        let vals0: Vec<i32> = back0.chunks(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(vals0, vec![1, 2, 3, 4]);
    }
}
