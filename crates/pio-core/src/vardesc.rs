//! Per-variable bookkeeping (spec.md §3 "VarDesc").

use crate::error::ErrorHandler;

pub struct VarDesc {
    pub varid: i32,
    /// Current record index for unlimited-dimension variables; -1 if
    /// this variable has no record dimension.
    pub record: i32,
    /// Handles to outstanding non-blocking back-end requests; drained
    /// by the next sync point.
    pub pending_requests: Vec<u64>,
    pub error_handler: ErrorHandler,
}

impl VarDesc {
    pub fn new(varid: i32, has_record_dim: bool) -> Self {
        VarDesc {
            varid,
            record: if has_record_dim { 0 } else { -1 },
            pending_requests: Vec::new(),
            error_handler: ErrorHandler::default(),
        }
    }

    pub fn is_record_var(&self) -> bool {
        self.record >= 0
    }

    pub fn advance_frame(&mut self) {
        if self.is_record_var() {
            self.record += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_record_var_has_sentinel_record() {
        let v = VarDesc::new(3, false);
        assert_eq!(v.record, -1);
        assert!(!v.is_record_var());
    }

    #[test]
    fn advance_frame_only_moves_record_vars() {
        let mut v = VarDesc::new(3, false);
        v.advance_frame();
        assert_eq!(v.record, -1);

        let mut r = VarDesc::new(4, true);
        r.advance_frame();
        assert_eq!(r.record, 1);
    }
}
