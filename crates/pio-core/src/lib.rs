//! Core data model, pure utilities and process-wide state for the
//! parallel I/O rearranger runtime.
//!
//! See `pio-rearrange` for the BOX/SUBSET plan builders, `pio-backend`
//! for the back-end driver trait and implementations, and `pio-io` for
//! the write-aggregation and darray read/write paths that tie them
//! together.

pub mod context;
pub mod decomp_file;
pub mod elem_type;
pub mod error;
pub mod file;
pub mod iodesc;
pub mod iosystem;
pub mod planner;
pub mod region;
pub mod registry;
pub mod sort;
pub mod transport;
pub mod vardesc;
pub mod write_buffer;

pub use context::PioContext;
pub use elem_type::ElemType;
pub use error::{dispatch_error, ErrorHandler, PioError};
pub use file::{File, IoType, OpenFlags};
pub use iodesc::{FillMetadata, IoDesc, RearrangePlan};
pub use iosystem::{AsyncMode, IoSystem, RearrangeOptions, RearrangerKind};
pub use region::Region;
pub use registry::Handle;
pub use vardesc::VarDesc;
