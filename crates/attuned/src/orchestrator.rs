//! The orchestration run-loop.
//!
//! One cycle: acquire snapshots, detect workloads and manage unit
//! lifecycles, collect recommendations concurrently, resolve conflicts
//! into a plan, execute it in serialization order, and route outcomes
//! into unit confidence and the memory system. No error in a cycle
//! stops the loop; only cancellation does.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use attune_common::events::{OrchestratorEvent, SharedEmitter};
use attune_common::memory::{MemoryStatistics, MemorySystem};
use attune_common::{ActionResult, ActivitySnapshot, AgentState, Recommendation, UnitStatus};

use crate::agents::{AgentHandle, AgentRegistry, Scenario};
use crate::config::AttuneConfig;
use crate::providers::SnapshotProvider;
use crate::resolver::{self, Candidate, ExecutionPlan, ResolverPolicy};

/// Aggregate loop health for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub cycles_run: u64,
    pub cycles_skipped: u64,
    pub active_units: usize,
    pub uptime_seconds: u64,
    pub last_error: Option<String>,
}

/// The run-loop owner. Holds the cycle's snapshots and recommendation
/// set exclusively; units own nothing across cycles beyond their own
/// confidence.
pub struct Orchestrator {
    config: AttuneConfig,
    provider: Arc<dyn SnapshotProvider>,
    registry: AgentRegistry,
    memory: Arc<MemorySystem>,
    emitter: SharedEmitter,
    units: Vec<AgentHandle>,
    cycle: u64,
    cycles_skipped: u64,
    started_at: Instant,
    last_error: Option<String>,
}

impl Orchestrator {
    pub fn new(
        config: AttuneConfig,
        provider: Arc<dyn SnapshotProvider>,
        registry: AgentRegistry,
        memory: Arc<MemorySystem>,
        emitter: SharedEmitter,
    ) -> Self {
        Self {
            config,
            provider,
            registry,
            memory,
            emitter,
            units: Vec::new(),
            cycle: 0,
            cycles_skipped: 0,
            started_at: Instant::now(),
            last_error: None,
        }
    }

    /// Drive cycles at the configured cadence until the cancellation
    /// signal flips. Cancellation is honored at the top of each cycle
    /// and during the sleep; an in-flight cycle always completes so no
    /// apply is aborted halfway.
    pub async fn run(&mut self, mut cancel: watch::Receiver<bool>) {
        info!(
            "Orchestration loop starting, cadence {}s",
            self.config.cycle_seconds
        );
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.cycle_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *cancel.borrow() {
                        break;
                    }
                    self.run_cycle().await;
                }
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Orchestration loop cancelled after {} cycles", self.cycle);
    }

    /// One full cycle. Public so hosts and tests can drive the loop
    /// manually.
    pub async fn run_cycle(&mut self) {
        self.cycle += 1;

        let system = match self.provider.system_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.skip_cycle(&format!("system snapshot: {}", e)),
        };
        let activity = match self.provider.activity_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.skip_cycle(&format!("activity snapshot: {}", e)),
        };

        self.detect(&activity);

        let scenario = Scenario {
            system,
            activity,
            admission_floor: self.config.admission_floor,
        };

        let collected = self.collect(&scenario).await;
        let mut candidates = Vec::new();
        for (idx, recommendation) in collected {
            match recommendation {
                Some(rec) => {
                    self.units[idx].state = AgentState::Active;
                    let handle = &self.units[idx];
                    candidates.push(Candidate {
                        unit: handle.unit.id().to_string(),
                        domain: handle.unit.domain().label().to_string(),
                        requirements: handle.unit.declare_requirements(),
                        recommendation: rec,
                    });
                }
                None => {
                    let name = self.units[idx].unit.id().to_string();
                    warn!("Unit {} timed out reasoning, excluded this cycle", name);
                    self.emitter.emit(OrchestratorEvent::UnitExcluded {
                        name,
                        reason: "reason() timeout".to_string(),
                    });
                }
            }
        }

        let policy = ResolverPolicy {
            admission_floor: self.config.admission_floor,
            ceiling: self.config.resource_ceiling,
            min_viable_share: self.config.min_viable_share,
        };
        let plan = resolver::resolve(&candidates, &policy);
        debug!(
            "Cycle {}: {} candidates, {} planned, {} deferred",
            self.cycle,
            candidates.len(),
            plan.entries.len(),
            plan.deferred.len()
        );

        let feedback = self.execute(&plan).await;
        let applied: usize = feedback.values().map(Vec::len).sum();
        self.learn(feedback).await;

        self.emitter.emit(OrchestratorEvent::CycleCompleted {
            cycle: self.cycle,
            active_units: self.units.len(),
            actions_applied: applied,
        });
    }

    /// Detection: spawn units for newly matching signatures, recover
    /// Error-state units, and apply the retirement policy. Returns the
    /// ids of newly created units.
    pub fn detect_and_create_agents_for(&mut self, activity: &ActivitySnapshot) -> Vec<String> {
        self.detect(activity)
    }

    pub fn active_units(&self) -> Vec<UnitStatus> {
        self.units.iter().map(|h| h.status()).collect()
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            cycles_run: self.cycle,
            cycles_skipped: self.cycles_skipped,
            active_units: self.units.len(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            last_error: self.last_error.clone(),
        }
    }

    pub async fn memory_statistics(&self) -> MemoryStatistics {
        self.memory.statistics().await
    }

    pub fn memory(&self) -> Arc<MemorySystem> {
        self.memory.clone()
    }

    fn skip_cycle(&mut self, reason: &str) {
        warn!("Cycle {} skipped: {}", self.cycle, reason);
        self.cycles_skipped += 1;
        self.last_error = Some(reason.to_string());
        self.emitter.emit(OrchestratorEvent::CycleSkipped {
            cycle: self.cycle,
            reason: reason.to_string(),
        });
    }

    fn detect(&mut self, activity: &ActivitySnapshot) -> Vec<String> {
        let detected = self.registry.detect(activity);
        let mut created = Vec::new();

        for domain in &detected {
            if let Some(handle) = self.units.iter_mut().find(|h| h.unit.domain() == *domain) {
                handle.absent_cycles = 0;
                if handle.state == AgentState::Error {
                    info!("Re-initializing {} unit after error", domain);
                    handle.reinitialize();
                }
            } else if let Some(unit) = self.registry.build(*domain) {
                info!("Detected {} workload, spawning unit", domain);
                self.emitter.emit(OrchestratorEvent::UnitSpawned {
                    name: unit.id().to_string(),
                    domain: *domain,
                });
                created.push(unit.id().to_string());
                self.units.push(AgentHandle::new(unit));
            }
        }

        for handle in &mut self.units {
            if !detected.contains(&handle.unit.domain()) {
                handle.absent_cycles += 1;
            }
        }

        // Retirement is a policy knob; the default keeps units around
        // across transient absences indefinitely.
        if self.config.retire_after_cycles > 0 {
            let retire_after = self.config.retire_after_cycles;
            let emitter = self.emitter.clone();
            self.units.retain(|handle| {
                if handle.absent_cycles >= retire_after {
                    info!(
                        "Retiring {} unit after {} absent cycles",
                        handle.unit.id(),
                        handle.absent_cycles
                    );
                    emitter.emit(OrchestratorEvent::UnitRetired {
                        name: handle.unit.id().to_string(),
                    });
                    false
                } else {
                    true
                }
            });
        }

        created
    }

    /// Collect recommendations from all operational units concurrently.
    /// reason() is read-only over the shared scenario, so the calls are
    /// safe to overlap; each carries the configured timeout, and a
    /// timed-out unit is excluded without touching its confidence.
    async fn collect(&self, scenario: &Scenario) -> Vec<(usize, Option<Recommendation>)> {
        let timeout = Duration::from_millis(self.config.reason_timeout_ms);
        let futures = self
            .units
            .iter()
            .enumerate()
            .filter(|(_, handle)| handle.state.is_operational())
            .map(|(idx, handle)| async move {
                match tokio::time::timeout(timeout, handle.unit.reason(scenario)).await {
                    Ok(recommendation) => (idx, Some(recommendation)),
                    Err(_) => (idx, None),
                }
            });
        join_all(futures).await
    }

    /// Apply the plan in its serialization order. A backend fault marks
    /// the unit Error and is routed into its feedback as a failed
    /// result; no action is retried within the cycle.
    async fn execute(&mut self, plan: &ExecutionPlan) -> HashMap<String, Vec<ActionResult>> {
        let mut feedback: HashMap<String, Vec<ActionResult>> = HashMap::new();

        for entry in &plan.entries {
            let Some(idx) = self.units.iter().position(|h| h.unit.id() == entry.unit) else {
                continue;
            };
            self.units[idx].state = AgentState::Optimizing;

            for action in &entry.actions {
                let result = self.units[idx]
                    .unit
                    .apply(action, &serde_json::Value::Null)
                    .await;
                match result {
                    Ok(action_result) => {
                        self.emitter.emit(OrchestratorEvent::ActionApplied {
                            unit: entry.unit.clone(),
                            action: action.clone(),
                            success: action_result.success,
                            improvement_delta: action_result.improvement_delta,
                        });
                        feedback.entry(entry.unit.clone()).or_default().push(action_result);
                    }
                    Err(e) => {
                        warn!("Unit {} faulted applying {}: {}", entry.unit, action, e);
                        self.units[idx].state = AgentState::Error;
                        self.units[idx].last_error = Some(e.to_string());
                        self.emitter.emit(OrchestratorEvent::UnitFaulted {
                            name: entry.unit.clone(),
                            reason: e.to_string(),
                        });
                        feedback
                            .entry(entry.unit.clone())
                            .or_default()
                            .push(ActionResult::failure(action, &e.to_string()));
                        break;
                    }
                }
            }
        }
        feedback
    }

    /// Route each unit's results into its own learn(), then commit the
    /// returned lessons into the memory system exactly once each.
    async fn learn(&mut self, feedback: HashMap<String, Vec<ActionResult>>) {
        for (unit_id, results) in feedback {
            let Some(idx) = self.units.iter().position(|h| h.unit.id() == unit_id) else {
                continue;
            };

            let lesson = self.units[idx].unit.learn(&results);
            if self.units[idx].state == AgentState::Optimizing {
                self.units[idx].state = AgentState::Active;
            }

            if let Some(episode) = lesson {
                self.emitter.emit(OrchestratorEvent::LessonLearned {
                    unit: unit_id.clone(),
                    significance: episode.significance,
                    tags: episode.tags.clone(),
                });
                if let Err(e) = self.memory.learn_from_experience(episode).await {
                    warn!("Memory rejected lesson from {}: {}", unit_id, e);
                }
            }
        }
    }
}
