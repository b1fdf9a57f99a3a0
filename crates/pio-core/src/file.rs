//! File: an open file bound to one IOSystem.
//!
//! Reference: spec.md §3 "File".

use bitflags::bitflags;

use crate::vardesc::VarDesc;
use crate::write_buffer::WriteMultiBuffer;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const WRITE   = 0b0000_0001;
        const CLOBBER = 0b0000_0010;
        const APPEND  = 0b0000_0100;
    }
}

/// The closed set of back-end drivers a File's `iotype` may name.
/// Reference: spec.md Design Notes "Polymorphism over I/O-type".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoType {
    Mock,
    FlatFile,
}

pub struct File {
    pub handle: crate::registry::Handle,
    pub iosystem: crate::registry::Handle,
    /// The back-end driver's own file handle; distinct from `handle`
    /// because multiple IOSystems may share a back-end that hands out
    /// its own numbering.
    pub backend_handle: u64,
    pub iotype: IoType,
    pub open_flags: OpenFlags,
    pub vars: Vec<VarDesc>,
    pub write_buffers: Vec<WriteMultiBuffer>,
}

impl File {
    pub fn is_writable(&self) -> bool {
        self.open_flags.contains(OpenFlags::WRITE)
    }

    pub fn var(&self, varid: i32) -> Option<&VarDesc> {
        self.vars.iter().find(|v| v.varid == varid)
    }

    pub fn var_mut(&mut self, varid: i32) -> Option<&mut VarDesc> {
        self.vars.iter_mut().find(|v| v.varid == varid)
    }

    /// Locate the write buffer for `ioid`/`is_record`, if one has
    /// already been lazily created.
    pub fn write_buffer_mut(&mut self, ioid: i32, is_record: bool) -> Option<&mut WriteMultiBuffer> {
        self.write_buffers
            .iter_mut()
            .find(|b| b.ioid == ioid && b.is_record == is_record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elem_type::ElemType;

    fn sample_file() -> File {
        File {
            handle: 16,
            iosystem: 1 << 16,
            backend_handle: 0,
            iotype: IoType::Mock,
            open_flags: OpenFlags::WRITE,
            vars: vec![VarDesc::new(1, false)],
            write_buffers: vec![WriteMultiBuffer::new(512, false, 4, ElemType::I32)],
        }
    }

    #[test]
    fn writable_flag_is_checked() {
        let f = sample_file();
        assert!(f.is_writable());
    }

    #[test]
    fn var_lookup_by_id() {
        let f = sample_file();
        assert!(f.var(1).is_some());
        assert!(f.var(99).is_none());
    }

    #[test]
    fn write_buffer_lookup_by_ioid_and_recordness() {
        let mut f = sample_file();
        assert!(f.write_buffer_mut(512, false).is_some());
        assert!(f.write_buffer_mut(512, true).is_none());
        assert!(f.write_buffer_mut(999, false).is_none());
    }
}
