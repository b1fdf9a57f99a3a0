//! Serial flat-file back-end: one directory per file, one data file per
//! (variable, frame) pair, metadata tracked in a sidecar JSON. Variable
//! bytes are moved with raw `pread`/`pwrite` the way the teacher's
//! POSIX driver does; metadata uses `serde_json` rather than a
//! hand-rolled layout, since the workspace already carries `serde` for
//! the decomposition file format.
//!
//! Reference: `ior-backend-posix/src/lib.rs` for the libc open/pread/
//! pwrite/close/unlink pattern.

use std::collections::HashMap;
use std::ffi::CString;
use std::fs;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use pio_core::elem_type::ElemType;
use pio_core::error::PioError;

use crate::{AttrTarget, BackendHandle, IoBackend};

#[derive(Serialize, Deserialize, Default, Clone)]
struct Meta {
    /// `None` marks the record dimension.
    dims: Vec<Option<usize>>,
    vars: Vec<VarMeta>,
    global_attrs: HashMap<String, Vec<u8>>,
    var_attrs: HashMap<String, Vec<u8>>,
}

#[derive(Serialize, Deserialize, Clone)]
struct VarMeta {
    name: String,
    elem_type: String,
    dimids: Vec<i32>,
}

struct OpenFile {
    dir: PathBuf,
    writable: bool,
    meta: Meta,
}

#[derive(Default)]
pub struct FlatFileBackend {
    files: Mutex<HashMap<BackendHandle, OpenFile>>,
    next_handle: Mutex<BackendHandle>,
}

fn meta_path(dir: &Path) -> PathBuf {
    dir.join("meta.json")
}

fn data_path(dir: &Path, varid: i32, frame: i32) -> PathBuf {
    dir.join(format!("v{varid}_f{frame}.bin"))
}

fn cvt(e: impl std::fmt::Display) -> PioError {
    log::warn!("flat back-end I/O error: {e}");
    PioError::Backend(-1)
}

fn raw_open(path: &Path, create: bool, writable: bool) -> Result<RawFd, PioError> {
    let c = CString::new(path.to_string_lossy().as_bytes()).map_err(|e| cvt(e))?;
    let mut flags = if writable { libc::O_RDWR } else { libc::O_RDONLY };
    if create {
        flags |= libc::O_CREAT;
    }
    let fd = unsafe { libc::open(c.as_ptr(), flags, 0o644) };
    if fd < 0 {
        return Err(cvt(std::io::Error::last_os_error()));
    }
    Ok(fd)
}

fn raw_pwrite(fd: RawFd, buf: &[u8], offset: i64) -> Result<(), PioError> {
    let n = unsafe { libc::pwrite(fd, buf.as_ptr() as *const _, buf.len(), offset) };
    if n < 0 || n as usize != buf.len() {
        return Err(cvt(std::io::Error::last_os_error()));
    }
    Ok(())
}

fn raw_pread(fd: RawFd, buf: &mut [u8], offset: i64) -> Result<usize, PioError> {
    let n = unsafe { libc::pread(fd, buf.as_mut_ptr() as *mut _, buf.len(), offset) };
    if n < 0 {
        return Err(cvt(std::io::Error::last_os_error()));
    }
    Ok(n as usize)
}

fn raw_close(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

impl FlatFileBackend {
    pub fn new() -> Self {
        FlatFileBackend::default()
    }

    fn alloc_handle(&self) -> BackendHandle {
        let mut n = self.next_handle.lock().unwrap();
        *n += 1;
        *n
    }

    fn persist_meta(dir: &Path, meta: &Meta) -> Result<(), PioError> {
        let json = serde_json::to_vec_pretty(meta).map_err(cvt)?;
        fs::write(meta_path(dir), json).map_err(cvt)
    }

    fn var_dims(meta: &Meta, varid: i32) -> Vec<usize> {
        meta.vars[varid as usize]
            .dimids
            .iter()
            .filter_map(|&id| meta.dims[id as usize])
            .collect()
    }
}

impl IoBackend for FlatFileBackend {
    fn name(&self) -> &str {
        "flat-file"
    }

    fn create(&self, path: &str, clobber: bool) -> Result<BackendHandle, PioError> {
        let dir = PathBuf::from(path);
        if dir.exists() {
            if !clobber {
                return Err(PioError::Permission);
            }
            fs::remove_dir_all(&dir).map_err(cvt)?;
        }
        fs::create_dir_all(&dir).map_err(cvt)?;
        let meta = Meta::default();
        Self::persist_meta(&dir, &meta)?;
        let handle = self.alloc_handle();
        self.files.lock().unwrap().insert(handle, OpenFile { dir, writable: true, meta });
        Ok(handle)
    }

    fn open(&self, path: &str, writable: bool) -> Result<BackendHandle, PioError> {
        let dir = PathBuf::from(path);
        let bytes = fs::read(meta_path(&dir)).map_err(cvt)?;
        let meta: Meta = serde_json::from_slice(&bytes).map_err(cvt)?;
        let handle = self.alloc_handle();
        self.files.lock().unwrap().insert(handle, OpenFile { dir, writable, meta });
        Ok(handle)
    }

    fn close(&self, handle: BackendHandle) -> Result<(), PioError> {
        self.files.lock().unwrap().remove(&handle).ok_or(PioError::BadHandle)?;
        Ok(())
    }

    fn sync(&self, handle: BackendHandle) -> Result<(), PioError> {
        let files = self.files.lock().unwrap();
        let file = files.get(&handle).ok_or(PioError::BadHandle)?;
        Self::persist_meta(&file.dir, &file.meta)
    }

    fn delete(&self, path: &str) -> Result<(), PioError> {
        fs::remove_dir_all(path).map_err(cvt)
    }

    fn def_dim(&self, handle: BackendHandle, _name: &str, len: Option<usize>) -> Result<i32, PioError> {
        let mut files = self.files.lock().unwrap();
        let file = files.get_mut(&handle).ok_or(PioError::BadHandle)?;
        file.meta.dims.push(len);
        let id = file.meta.dims.len() as i32 - 1;
        Self::persist_meta(&file.dir, &file.meta)?;
        Ok(id)
    }

    fn def_var(&self, handle: BackendHandle, name: &str, elem_type: ElemType, dimids: &[i32]) -> Result<i32, PioError> {
        let mut files = self.files.lock().unwrap();
        let file = files.get_mut(&handle).ok_or(PioError::BadHandle)?;
        file.meta.vars.push(VarMeta {
            name: name.to_string(),
            elem_type: elem_type.tag().to_string(),
            dimids: dimids.to_vec(),
        });
        let id = file.meta.vars.len() as i32 - 1;
        Self::persist_meta(&file.dir, &file.meta)?;
        Ok(id)
    }

    fn put_att(&self, handle: BackendHandle, target: AttrTarget, name: &str, bytes: &[u8]) -> Result<(), PioError> {
        let mut files = self.files.lock().unwrap();
        let file = files.get_mut(&handle).ok_or(PioError::BadHandle)?;
        let key = match target {
            AttrTarget::Global => name.to_string(),
            AttrTarget::Var(varid) => format!("{varid}:{name}"),
        };
        let store = match target {
            AttrTarget::Global => &mut file.meta.global_attrs,
            AttrTarget::Var(_) => &mut file.meta.var_attrs,
        };
        store.insert(key, bytes.to_vec());
        Self::persist_meta(&file.dir, &file.meta)
    }

    fn get_att(&self, handle: BackendHandle, target: AttrTarget, name: &str) -> Result<Vec<u8>, PioError> {
        let files = self.files.lock().unwrap();
        let file = files.get(&handle).ok_or(PioError::BadHandle)?;
        let key = match target {
            AttrTarget::Global => name.to_string(),
            AttrTarget::Var(varid) => format!("{varid}:{name}"),
        };
        let store = match target {
            AttrTarget::Global => &file.meta.global_attrs,
            AttrTarget::Var(_) => &file.meta.var_attrs,
        };
        store.get(&key).cloned().ok_or(PioError::InvalidArgument)
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
        let files = self.files.lock().unwrap();
        let file = files.get(&handle).ok_or(PioError::BadHandle)?;
        if !file.writable {
            return Err(PioError::Permission);
        }
        let dims = Self::var_dims(&file.meta, varid);
        let esize = elem_type.size();
        let path = data_path(&file.dir, varid, frame);
        let fd = raw_open(&path, true, true)?;

        let mut src_off = 0usize;
        let mut err = None;
        crate::for_each_coord(count, |local| {
            if err.is_some() {
                return;
            }
            let gcoord: Vec<usize> = (0..dims.len()).map(|d| start[d] + local[d]).collect();
            let lidx = pio_core::region::coord_to_lindex(&dims, &gcoord);
            if let Err(e) = raw_pwrite(fd, &bytes[src_off..src_off + esize], (lidx * esize) as i64) {
                err = Some(e);
            }
            src_off += esize;
        });
        raw_close(fd);
        if let Some(e) = err {
            return Err(e);
        }
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
        let dims = Self::var_dims(&file.meta, varid);
        let esize = elem_type.size();
        let path = data_path(&file.dir, varid, frame);

        let total: usize = count.iter().product();
        let mut out = vec![0u8; total * esize];
        if !path.exists() {
            return Ok(out);
        }
        let fd = raw_open(&path, false, false)?;
        let mut dst_off = 0usize;
        let mut err = None;
        crate::for_each_coord(count, |local| {
            if err.is_some() {
                return;
            }
            let gcoord: Vec<usize> = (0..dims.len()).map(|d| start[d] + local[d]).collect();
            let lidx = pio_core::region::coord_to_lindex(&dims, &gcoord);
            let mut chunk = vec![0u8; esize];
            match raw_pread(fd, &mut chunk, (lidx * esize) as i64) {
                Ok(n) if n == esize => out[dst_off..dst_off + esize].copy_from_slice(&chunk),
                Ok(_) => {}
                Err(e) => err = Some(e),
            }
            dst_off += esize;
        });
        raw_close(fd);
        if let Some(e) = err {
            return Err(e);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_round_trip_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("f.pio");
        let be = FlatFileBackend::new();
        let h = be.create(path.to_str().unwrap(), true).unwrap();
        let d0 = be.def_dim(h, "x", Some(4)).unwrap();
        let v = be.def_var(h, "v", ElemType::I32, &[d0]).unwrap();

        let data: Vec<u8> = [10i32, 20].iter().flat_map(|x| x.to_le_bytes()).collect();
        be.put_vars(h, v, ElemType::I32, &[1], &[2], -1, &data).unwrap();

        let back = be.get_vars(h, v, ElemType::I32, &[0], &[4], -1).unwrap();
        let vals: Vec<i32> = back.chunks(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(vals, vec![0, 10, 20, 0]);
    }

    #[test]
    fn reopen_recovers_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("f.pio");
        let be = FlatFileBackend::new();
        let h = be.create(path.to_str().unwrap(), true).unwrap();
        be.def_dim(h, "x", Some(4)).unwrap();
        be.def_var(h, "v", ElemType::I32, &[0]).unwrap();
        be.close(h).unwrap();

        let h2 = be.open(path.to_str().unwrap(), false).unwrap();
        let data = be.get_vars(h2, 0, ElemType::I32, &[0], &[4], -1).unwrap();
        assert_eq!(data.len(), 16);
    }
}
