//! Structured orchestration events.
//!
//! The run-loop reports what happened through typed events rather than
//! log lines, so observability consumers never have to parse console
//! output. Logging stays purely informational.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{Significance, WorkloadDomain};

/// One orchestration outcome worth telling a consumer about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrchestratorEvent {
    /// A full cycle ran to completion
    CycleCompleted {
        cycle: u64,
        active_units: usize,
        actions_applied: usize,
    },
    /// A cycle was skipped (snapshot acquisition failure)
    CycleSkipped { cycle: u64, reason: String },
    /// A workload signature matched and a new unit was created
    UnitSpawned { name: String, domain: WorkloadDomain },
    /// A unit was excluded from the current cycle (timeout or fault)
    UnitExcluded { name: String, reason: String },
    /// A unit was retired after its signature stayed absent
    UnitRetired { name: String },
    /// A unit entered the Error state
    UnitFaulted { name: String, reason: String },
    /// One planned action was applied
    ActionApplied {
        unit: String,
        action: String,
        success: bool,
        improvement_delta: f64,
    },
    /// A lesson was committed into the memory system
    LessonLearned {
        unit: String,
        significance: Significance,
        tags: Vec<String>,
    },
}

/// Capability for emitting orchestration events.
///
/// Production code hands the orchestrator a [`ChannelEmitter`] wired to
/// whatever consumes events; tests use it to observe the loop, and
/// [`NoopEmitter`] drops everything when nobody is listening.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: OrchestratorEvent);
}

/// Shared emitter handle.
pub type SharedEmitter = Arc<dyn EventEmitter>;

/// Emitter that discards all events.
pub struct NoopEmitter;

impl EventEmitter for NoopEmitter {
    fn emit(&self, _event: OrchestratorEvent) {}
}

/// Emitter backed by an unbounded channel.
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<OrchestratorEvent>,
}

impl ChannelEmitter {
    /// Create an emitter and the receiving end of its channel.
    pub fn channel() -> (SharedEmitter, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelEmitter { tx }), rx)
    }
}

impl EventEmitter for ChannelEmitter {
    fn emit(&self, event: OrchestratorEvent) {
        // Receiver gone means nobody is listening anymore; not an error.
        let _ = self.tx.send(event);
    }
}

/// Emitter that drops events, as a shared handle.
pub fn noop_emitter() -> SharedEmitter {
    Arc::new(NoopEmitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_emitter_delivers() {
        let (emitter, mut rx) = ChannelEmitter::channel();

        emitter.emit(OrchestratorEvent::CycleSkipped {
            cycle: 3,
            reason: "provider offline".to_string(),
        });

        match rx.recv().await {
            Some(OrchestratorEvent::CycleSkipped { cycle, reason }) => {
                assert_eq!(cycle, 3);
                assert_eq!(reason, "provider offline");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_noop_emitter_does_not_panic() {
        let emitter = noop_emitter();
        emitter.emit(OrchestratorEvent::UnitRetired {
            name: "gaming".to_string(),
        });
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (emitter, rx) = ChannelEmitter::channel();
        drop(rx);
        emitter.emit(OrchestratorEvent::UnitRetired {
            name: "gaming".to_string(),
        });
    }
}
