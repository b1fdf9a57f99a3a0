//! In-memory back-end, used by the workspace's own tests and by
//! callers exercising the write-buffer/darray logic without touching
//! disk.

use std::collections::HashMap;
use std::sync::Mutex;

use pio_core::elem_type::ElemType;
use pio_core::error::PioError;

use crate::{AttrTarget, BackendHandle, IoBackend};

struct VarMeta {
    elem_type: ElemType,
    dimids: Vec<i32>,
}

struct MockFile {
    writable: bool,
    /// `None` marks the (at most one) record dimension; its length
    /// grows implicitly as frames are written.
    dims: Vec<Option<usize>>,
    vars: Vec<VarMeta>,
    global_attrs: HashMap<String, Vec<u8>>,
    var_attrs: HashMap<(i32, String), Vec<u8>>,
    /// varid -> frame -> packed bytes, frame -1 for non-record variables.
    data: HashMap<i32, HashMap<i32, Vec<u8>>>,
}

#[derive(Default)]
pub struct MockBackend {
    files: Mutex<HashMap<BackendHandle, MockFile>>,
    paths: Mutex<HashMap<String, BackendHandle>>,
    next_handle: Mutex<BackendHandle>,
}

impl MockBackend {
    pub fn new() -> Self {
        MockBackend::default()
    }

    fn alloc_handle(&self) -> BackendHandle {
        let mut n = self.next_handle.lock().unwrap();
        *n += 1;
        *n
    }

    fn var_dims(&self, file: &MockFile, varid: i32) -> (Vec<usize>, bool) {
        let var = &file.vars[varid as usize];
        let mut dims = Vec::new();
        let mut has_record = false;
        for &id in &var.dimids {
            match file.dims[id as usize] {
                Some(len) => dims.push(len),
                None => has_record = true,
            }
        }
        (dims, has_record)
    }
}

use crate::for_each_coord;

impl IoBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn create(&self, path: &str, _clobber: bool) -> Result<BackendHandle, PioError> {
        let handle = self.alloc_handle();
        self.files.lock().unwrap().insert(
            handle,
            MockFile {
                writable: true,
                dims: Vec::new(),
                vars: Vec::new(),
                global_attrs: HashMap::new(),
                var_attrs: HashMap::new(),
                data: HashMap::new(),
            },
        );
        self.paths.lock().unwrap().insert(path.to_string(), handle);
        Ok(handle)
    }

    fn open(&self, path: &str, writable: bool) -> Result<BackendHandle, PioError> {
        let handle = *self.paths.lock().unwrap().get(path).ok_or(PioError::InvalidArgument)?;
        if writable {
            self.files.lock().unwrap().get_mut(&handle).ok_or(PioError::BadHandle)?.writable = true;
        }
        Ok(handle)
    }

    fn close(&self, handle: BackendHandle) -> Result<(), PioError> {
        // Data stays resident under its path so a later `open` still
        // finds it; only readers tracking by handle need to re-open.
        let _ = handle;
        Ok(())
    }

    fn sync(&self, _handle: BackendHandle) -> Result<(), PioError> {
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), PioError> {
        if let Some(handle) = self.paths.lock().unwrap().remove(path) {
            self.files.lock().unwrap().remove(&handle);
        }
        Ok(())
    }

    fn def_dim(&self, handle: BackendHandle, _name: &str, len: Option<usize>) -> Result<i32, PioError> {
        let mut files = self.files.lock().unwrap();
        let file = files.get_mut(&handle).ok_or(PioError::BadHandle)?;
        file.dims.push(len);
        Ok(file.dims.len() as i32 - 1)
    }

    fn def_var(&self, handle: BackendHandle, _name: &str, elem_type: ElemType, dimids: &[i32]) -> Result<i32, PioError> {
        let mut files = self.files.lock().unwrap();
        let file = files.get_mut(&handle).ok_or(PioError::BadHandle)?;
        file.vars.push(VarMeta { elem_type, dimids: dimids.to_vec() });
        Ok(file.vars.len() as i32 - 1)
    }

    fn put_att(&self, handle: BackendHandle, target: AttrTarget, name: &str, bytes: &[u8]) -> Result<(), PioError> {
        let mut files = self.files.lock().unwrap();
        let file = files.get_mut(&handle).ok_or(PioError::BadHandle)?;
        match target {
            AttrTarget::Global => {
                file.global_attrs.insert(name.to_string(), bytes.to_vec());
            }
            AttrTarget::Var(varid) => {
                file.var_attrs.insert((varid, name.to_string()), bytes.to_vec());
            }
        }
        Ok(())
    }

    fn get_att(&self, handle: BackendHandle, target: AttrTarget, name: &str) -> Result<Vec<u8>, PioError> {
        let files = self.files.lock().unwrap();
        let file = files.get(&handle).ok_or(PioError::BadHandle)?;
        let found = match target {
            AttrTarget::Global => file.global_attrs.get(name),
            AttrTarget::Var(varid) => file.var_attrs.get(&(varid, name.to_string())),
        };
        found.cloned().ok_or(PioError::InvalidArgument)
    }

    fn put_vars(
        &self,
        handle: BackendHandle,
        varid: i32,
        elem_type: ElemType,
        start: &[usize],
        count: &[usize],
        frame: i32,
        bytes: &[u8],
    ) -> Result<(), PioError> {
        let mut files = self.files.lock().unwrap();
        let file = files.get_mut(&handle).ok_or(PioError::BadHandle)?;
        if !file.writable {
            return Err(PioError::Permission);
        }
        let (dims, _has_record) = self.var_dims(file, varid);
        let esize = elem_type.size();
        let volume: usize = dims.iter().product();
        let frames = file.data.entry(varid).or_default();
        let buf = frames.entry(frame).or_insert_with(|| vec![0u8; volume * esize]);
        if buf.len() < volume * esize {
            buf.resize(volume * esize, 0);
        }

        let mut src_off = 0usize;
        for_each_coord(count, |local| {
            let gcoord: Vec<usize> = (0..dims.len()).map(|d| start[d] + local[d]).collect();
            let lidx = pio_core::region::coord_to_lindex(&dims, &gcoord);
            buf[lidx * esize..(lidx + 1) * esize].copy_from_slice(&bytes[src_off..src_off + esize]);
            src_off += esize;
        });
        Ok(())
    }

    fn get_vars(
        &self,
        handle: BackendHandle,
        varid: i32,
        elem_type: ElemType,
        start: &[usize],
        count: &[usize],
        frame: i32,
    ) -> Result<Vec<u8>, PioError> {
        let files = self.files.lock().unwrap();
        let file = files.get(&handle).ok_or(PioError::BadHandle)?;
        let (dims, _has_record) = self.var_dims(file, varid);
        let esize = elem_type.size();
        let empty = Vec::new();
        let buf = file.data.get(&varid).and_then(|f| f.get(&frame)).unwrap_or(&empty);

        let total: usize = count.iter().product();
        let mut out = vec![0u8; total * esize];
        let mut dst_off = 0usize;
        for_each_coord(count, |local| {
            let gcoord: Vec<usize> = (0..dims.len()).map(|d| start[d] + local[d]).collect();
            let lidx = pio_core::region::coord_to_lindex(&dims, &gcoord);
            if (lidx + 1) * esize <= buf.len() {
                out[dst_off..dst_off + esize].copy_from_slice(&buf[lidx * esize..(lidx + 1) * esize]);
            }
            dst_off += esize;
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_each_coord_visits_in_row_major_order() {
        let mut seen = Vec::new();
        for_each_coord(&[2, 3], |c| seen.push(c.to_vec()));
        assert_eq!(
            seen,
            vec![
                vec![0, 0], vec![0, 1], vec![0, 2],
                vec![1, 0], vec![1, 1], vec![1, 2],
            ]
        );
    }

    #[test]
    fn write_then_read_back_subregion() {
        let be = MockBackend::new();
        let h = be.create("mem://a", true).unwrap();
        let d0 = be.def_dim(h, "x", Some(4)).unwrap();
        let v = be.def_var(h, "v", ElemType::I32, &[d0]).unwrap();

        let data: Vec<u8> = [10i32, 20].iter().flat_map(|x| x.to_le_bytes()).collect();
        be.put_vars(h, v, ElemType::I32, &[1], &[2], -1, &data).unwrap();

        let back = be.get_vars(h, v, ElemType::I32, &[0], &[4], -1).unwrap();
        let vals: Vec<i32> = back.chunks(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(vals, vec![0, 10, 20, 0]);
    }

    #[test]
    fn attributes_round_trip() {
        let be = MockBackend::new();
        let h = be.create("mem://b", true).unwrap();
        be.put_att(h, AttrTarget::Global, "title", b"hello").unwrap();
        assert_eq!(be.get_att(h, AttrTarget::Global, "title").unwrap(), b"hello");
        assert!(be.get_att(h, AttrTarget::Global, "missing").is_err());
    }
}
