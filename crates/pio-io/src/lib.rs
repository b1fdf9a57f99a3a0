//! Orchestration layer (C8, C9): wires pio-core's data model and
//! pio-rearrange's plan builders to a concrete [`pio_backend::IoBackend`]
//! to actually move and write distributed-array data.

pub mod darray;
pub mod decomp;
pub mod write_buffer;
