//! Back-end driver capability set (spec.md Design Notes,
//! "Polymorphism over I/O-type"): replaces the original's switch over
//! an `iotype` tag with a trait every concrete driver implements.
//!
//! The real scientific-data back-ends (pnetcdf, netcdf4, serial netcdf,
//! ADIOS) are out of scope for this crate (spec.md component table
//! marks the file-format drivers as consumed, not built here) and
//! pulling in their C bindings would mean fabricating dependencies
//! this workspace has no real use for. [`mock::MockBackend`] and
//! [`flat::FlatFileBackend`] stand in: enough of a back-end to drive
//! every operation the write-buffer and darray paths perform, without
//! a netCDF dependency. See DESIGN.md.

pub mod flat;
pub mod mock;

use pio_core::elem_type::ElemType;
use pio_core::error::PioError;

pub type BackendHandle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AttrTarget {
    Global,
    Var(i32),
}

/// Capability set a concrete back-end driver implements. Method names
/// mirror the original's `PIO_IOTYPE` dispatch surface; the multi-
/// variable flush path calls only the typed array operations.
pub trait IoBackend {
    fn name(&self) -> &str;

    fn create(&self, path: &str, clobber: bool) -> Result<BackendHandle, PioError>;
    fn open(&self, path: &str, writable: bool) -> Result<BackendHandle, PioError>;
    fn close(&self, handle: BackendHandle) -> Result<(), PioError>;
    fn sync(&self, handle: BackendHandle) -> Result<(), PioError>;
    fn delete(&self, path: &str) -> Result<(), PioError>;

    fn def_dim(&self, handle: BackendHandle, name: &str, len: Option<usize>) -> Result<i32, PioError>;
    fn def_var(&self, handle: BackendHandle, name: &str, elem_type: ElemType, dimids: &[i32]) -> Result<i32, PioError>;

    fn put_att(&self, handle: BackendHandle, target: AttrTarget, name: &str, bytes: &[u8]) -> Result<(), PioError>;
    fn get_att(&self, handle: BackendHandle, target: AttrTarget, name: &str) -> Result<Vec<u8>, PioError>;

    /// Write `count[d]` elements starting at `start[d]` in variable
    /// `varid`, for the record frame `frame` (ignored for non-record
    /// variables). `bytes` is exactly `Π count * elem_type.size()`.
    fn put_vars(
        &self,
        handle: BackendHandle,
        varid: i32,
        elem_type: ElemType,
        start: &[usize],
        count: &[usize],
        frame: i32,
        bytes: &[u8],
    ) -> Result<(), PioError>;

    fn get_vars(
        &self,
        handle: BackendHandle,
        varid: i32,
        elem_type: ElemType,
        start: &[usize],
        count: &[usize],
        frame: i32,
    ) -> Result<Vec<u8>, PioError>;
}

/// Odometer walk over an N-dimensional box shaped `count`, invoking `f`
/// with each local coordinate in row-major order. Shared by every
/// back-end that stores variables as a flat row-major buffer.
pub(crate) fn for_each_coord(count: &[usize], mut f: impl FnMut(&[usize])) {
    if count.iter().any(|&c| c == 0) {
        return;
    }
    let ndims = count.len();
    let mut coord = vec![0usize; ndims];
    loop {
        f(&coord);
        let mut d = ndims;
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            coord[d] += 1;
            if coord[d] < count[d] {
                break;
            }
            coord[d] = 0;
            if d == 0 {
                return;
            }
        }
    }
}
