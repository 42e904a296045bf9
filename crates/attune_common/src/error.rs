//! Error types for Attune.

use thiserror::Error;

/// Memory store errors. An invariant rejection keeps the prior value and
/// is fatal only to the single mutation that raised it.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("unknown fact: {0}")]
    UnknownFact(String),

    #[error("unknown causal node: {0}")]
    UnknownNode(u64),

    #[error("unknown causal link: {0}")]
    UnknownLink(u64),

    #[error("unknown causal chain: {0}")]
    UnknownChain(u64),

    #[error("rejected update: {0}")]
    RejectedUpdate(String),
}

/// Snapshot acquisition errors. The orchestrator recovers by skipping
/// the cycle.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasoning unit faults. A unit that returns one of these from `apply`
/// transitions to the Error state and is re-initialized on the next
/// detection cycle.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("tuning backend failure: {0}")]
    Backend(String),

    #[error("unit not initialized: {0}")]
    NotInitialized(String),
}
