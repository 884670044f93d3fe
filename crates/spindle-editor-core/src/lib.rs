//! spindle-editor-core: Synchronization core for an instant-rendering editor.
//!
//! This crate provides:
//! - `Session` - the editor-session object tying everything together
//! - Cursor marker protocol surviving markup regeneration
//! - Block localization and the renderer round-trip pipeline
//! - Key-event correction guards, undo/redo history, outline extraction

pub mod commands;
pub mod engine;
pub mod error;
pub mod keydown;
pub mod localizer;
pub mod marker;
pub mod outline;
pub mod pipeline;
pub mod session;
pub mod undo;
pub mod visibility;

pub use commands::Command;
pub use engine::{ChangeSink, EngineError, MarkupEngine, SatelliteRenderer};
pub use error::SyncError;
pub use keydown::{Guard, GuardOutcome, Key, KeyEvent, KeydownResult, Modifiers};
pub use localizer::{RenderScope, ScopePlan};
pub use outline::OutlineItem;
pub use session::{EditorOptions, SessionReport, Session};
pub use smol_str::SmolStr;
pub use undo::History;
pub use visibility::ExpansionSet;
