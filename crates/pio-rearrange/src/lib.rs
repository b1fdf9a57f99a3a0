//! BOX and SUBSET rearranger plan builders (C5, C6).

pub mod box_rearr;
pub mod plan;
pub mod subset_rearr;

pub use plan::{group_by_owner, owning_tile};
