//! Attune Common - Shared types and memory for the Attune daemon.
//!
//! Holds the domain value types (snapshots, recommendations, resource
//! requirements), the three-layer memory system with its attention
//! front-end, the structured event surface, and the error taxonomy.
//! No I/O lives here; everything is deterministic and testable in-process.

pub mod error;
pub mod events;
pub mod memory;
pub mod types;

pub use error::*;
pub use types::*;
