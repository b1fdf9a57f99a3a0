use thiserror::Error;

/// Error taxonomy for the library, matching the return-code families a
/// caller can observe from any entry point.
///
/// Reference: `pio_error.h`, spec.md §7.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PioError {
    /// Null/invalid argument, bad dimension length, unknown iotype string.
    #[error("invalid argument")]
    InvalidArgument,

    /// A file, iodesc or iosystem handle that is not in the registry.
    #[error("bad handle")]
    BadHandle,

    /// Allocation failure while building a plan or growing a buffer.
    #[error("out of memory")]
    NoMemory,

    /// Write attempted on a file opened without the write bit.
    #[error("permission denied")]
    Permission,

    /// Back-end driver not compiled in / not a member of the closed iotype set.
    #[error("bad iotype")]
    BadIotype,

    /// Element type tag did not match any supported variant.
    #[error("bad element type")]
    BadType,

    /// The I/O-side planner (C3) could not converge on a tiling.
    #[error("planner failed to converge on a tiling")]
    ConvergenceFailure,

    /// An MPI call returned a non-success code. The wrapped value is the
    /// raw MPI error code; see `CheckMPIReturn` in the original.
    #[error("MPI error (code={0})")]
    Mpi(i32),

    /// Pass-through error from a back-end driver.
    #[error("back-end error (code={0})")]
    Backend(i32),

    #[error("unknown error")]
    Unknown,
}

impl PioError {
    /// Integer return code, for callers that want the C-style convention
    /// (0 == success, elsewhere encoded as a small negative/positive space).
    pub fn code(self) -> i32 {
        match self {
            PioError::InvalidArgument => -1,
            PioError::BadHandle => -2,
            PioError::NoMemory => -3,
            PioError::Permission => -4,
            PioError::BadIotype => -5,
            PioError::BadType => -6,
            PioError::ConvergenceFailure => -7,
            PioError::Mpi(c) => -(1000 + c.abs()),
            PioError::Backend(c) => c,
            PioError::Unknown => -99,
        }
    }
}

/// Per-IOSystem (overridable per-File) error handling policy.
///
/// Reference: spec.md §4.11 / §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorHandler {
    /// Print and abort on any non-success code.
    Internal,
    /// Broadcast the code from the I/O root so every rank of the union
    /// observes the same value.
    #[default]
    Broadcast,
    /// Return the code on the originating rank only; no broadcast.
    Return,
}

/// Apply an error-handling policy to a locally observed result.
///
/// `broadcast` is supplied by the caller because it requires a live
/// communicator; this function only implements the local-disposition
/// half (print/abort for `Internal`) and tells the caller whether it
/// must still perform a collective broadcast.
pub fn dispatch_error(handler: ErrorHandler, result: Result<(), PioError>) -> (Result<(), PioError>, bool) {
    match (&result, handler) {
        (Err(e), ErrorHandler::Internal) => {
            log::error!("PIO internal error handler: aborting on {e}");
            std::process::abort();
        }
        (Err(e), ErrorHandler::Broadcast) => {
            log::error!("PIO error (will broadcast): {e}");
            (result, true)
        }
        (Err(e), ErrorHandler::Return) => {
            log::warn!("PIO error (return-only): {e}");
            (result, false)
        }
        (Ok(()), _) => (result, matches!(handler, ErrorHandler::Broadcast)),
    }
}
