//! IOSystem: the process-wide context describing one cooperating group
//! of compute and I/O tasks.
//!
//! Reference: spec.md §3 "IOSystem". `pioc.c`'s `PIOc_Init_Intracomm` /
//! `PIOc_init_async` populate the equivalent C struct.

use mpi::topology::SimpleCommunicator;

use crate::error::ErrorHandler;
use crate::transport::SwapmOptions;

/// Whether compute tasks also perform I/O (synchronous) or a disjoint
/// set of tasks serves I/O for one or more compute components
/// (asynchronous, over an intercommunicator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncMode {
    Synchronous,
    Asynchronous,
}

/// Default rearranger an IODesc adopts unless it requests a specific one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RearrangerKind {
    Box,
    Subset,
}

/// Rearranger tuning knobs, one [`SwapmOptions`] per direction since the
/// compute→io and io→compute legs of a rearrange have different
/// fan-in/fan-out shapes and may warrant different throttling.
#[derive(Debug, Clone, Copy)]
pub struct RearrangeOptions {
    pub comp2io: SwapmOptions,
    pub io2comp: SwapmOptions,
}

impl Default for RearrangeOptions {
    fn default() -> Self {
        RearrangeOptions { comp2io: SwapmOptions::default(), io2comp: SwapmOptions::default() }
    }
}

pub struct IoSystem {
    pub handle: crate::registry::Handle,
    pub union_comm: SimpleCommunicator,
    pub comp_comm: SimpleCommunicator,
    pub io_comm: SimpleCommunicator,
    /// Union-communicator ranks designated as I/O tasks, in rank order.
    pub io_ranks: Vec<i32>,
    pub async_mode: AsyncMode,
    pub default_rearranger: RearrangerKind,
    pub error_handler: ErrorHandler,
    pub rearrange_opts: RearrangeOptions,
}

impl IoSystem {
    pub fn num_iotasks(&self) -> usize {
        self.io_ranks.len()
    }

    /// Union-communicator rank holding the "master" role for the I/O
    /// group: always the lowest-ranked I/O task.
    pub fn io_master_rank(&self) -> Option<i32> {
        self.io_ranks.iter().copied().min()
    }

    pub fn is_io_task(&self, union_rank: i32) -> bool {
        self.io_ranks.contains(&union_rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_master_is_lowest_rank() {
        let io_ranks = vec![5, 2, 8];
        assert_eq!(io_ranks.iter().copied().min(), Some(2));
    }
}
