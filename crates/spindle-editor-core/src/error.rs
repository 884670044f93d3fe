//! Error taxonomy for the synchronization core.
//!
//! Everything here is recoverable. A failed round trip leaves the pre-edit
//! tree and cursor in place; marker loss after a round trip is not an error
//! at all and undo/redo underflow is a silent no-op.

use spindle_markup::ParseError;

use crate::engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The external engine's incremental spin call failed.
    #[error("markup engine failed: {0}")]
    Engine(#[from] EngineError),
    /// The engine returned markup the fragment parser rejected.
    #[error("engine output could not be parsed: {0}")]
    UnparseableOutput(#[from] ParseError),
}
