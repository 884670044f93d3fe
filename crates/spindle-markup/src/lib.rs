//! spindle-markup: the in-memory model of the host editable surface.
//!
//! This crate provides:
//! - `Tree` / `NodeId` - arena-based node tree (blocks, decorated spans, text)
//! - `parse_fragment` - parser for the markup dialect the engine round-trips
//! - `serialize` - node tree back to markup text
//! - `CursorPosition` / `Selection` - positions addressed by (node, offset)
//!
//! No editor logic lives here; the synchronization core builds on top.

pub mod parse;
pub mod position;
pub mod serialize;
pub mod tree;

pub use parse::{ParseError, parse_document, parse_fragment};
pub use position::{CursorPosition, Selection};
pub use serialize::{escape_text, inner_markup, outer_markup};
pub use smol_str::SmolStr;
pub use tree::{BlockKind, NodeId, NodeKind, SpanKind, SpanNode, Tree};
