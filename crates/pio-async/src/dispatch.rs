//! I/O-side handler for the file- and variable-metadata messages: the
//! part of the message loop that talks directly to a
//! [`pio_backend::IoBackend`] with no rearrange involved.
//!
//! `InitDecomp`/`WriteDarray`/`ReadDarray`/`AdvanceFrame` aren't handled
//! here — they need the IOSystem's union communicator to run a
//! rearrange (`pio-io::darray`), so [`IoServer::run`](crate::server::IoServer::run)'s
//! caller matches those variants itself and calls into `pio-io`
//! directly instead of routing them through this dispatcher.

use pio_backend::{BackendHandle, IoBackend};
use pio_core::error::PioError;

use crate::message::Message;

/// Per-I/O-task state this dispatcher mutates: which back-end file is
/// currently open, and the next synthetic dim/var ids to hand out
/// (mirrors the original's monotonically increasing ncid/varid space).
#[derive(Default)]
pub struct FileState {
    pub handle: Option<BackendHandle>,
}

/// Apply one message to `backend`, returning the reply payload a
/// caller expecting a value (`DefDim`, `DefVar`, `GetAtt`, `GetVars`)
/// should send back to the compute master. Fire-and-forget ops return
/// an empty vec.
pub fn apply(backend: &dyn IoBackend, state: &mut FileState, msg: &Message) -> Result<Vec<u8>, PioError> {
    match msg {
        Message::CreateFile { path, clobber } => {
            state.handle = Some(backend.create(path, *clobber)?);
            Ok(Vec::new())
        }
        Message::OpenFile { path, writable } => {
            state.handle = Some(backend.open(path, *writable)?);
            Ok(Vec::new())
        }
        Message::CloseFile => {
            let h = state.handle.take().ok_or(PioError::BadHandle)?;
            backend.close(h).map(|_| Vec::new())
        }
        Message::Sync => backend.sync(handle(state)?).map(|_| Vec::new()),
        Message::DeleteFile { path } => backend.delete(path).map(|_| Vec::new()),
        Message::SetChunkCache { .. } => Ok(Vec::new()),
        Message::DefDim { name, len } => {
            let id = backend.def_dim(handle(state)?, name, *len)?;
            Ok(id.to_le_bytes().to_vec())
        }
        Message::DefVar { name, elem_type, dimids } => {
            let id = backend.def_var(handle(state)?, name, *elem_type, dimids)?;
            Ok(id.to_le_bytes().to_vec())
        }
        Message::EndDef => Ok(Vec::new()),
        Message::PutAtt { target, name, bytes } => {
            backend.put_att(handle(state)?, *target, name, bytes).map(|_| Vec::new())
        }
        Message::GetAtt { target, name } => backend.get_att(handle(state)?, *target, name),
        Message::PutVars { varid, elem_type, start, count, frame, bytes } => backend
            .put_vars(handle(state)?, *varid, *elem_type, start, count, *frame, bytes)
            .map(|_| Vec::new()),
        Message::GetVars { varid, elem_type, start, count, frame } => {
            backend.get_vars(handle(state)?, *varid, *elem_type, start, count, *frame)
        }
        Message::InitDecomp { .. }
        | Message::WriteDarray { .. }
        | Message::ReadDarray { .. }
        | Message::AdvanceFrame { .. }
        | Message::Exit => Err(PioError::InvalidArgument),
    }
}

fn handle(state: &FileState) -> Result<BackendHandle, PioError> {
    state.handle.ok_or(PioError::BadHandle)
}
