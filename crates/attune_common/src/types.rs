//! Core value types shared between the daemon and the memory system.
//!
//! Everything here is an immutable-by-convention value: snapshots are
//! created once per cycle and dropped at cycle end, recommendations and
//! action results flow one direction through the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form parameters attached to an action invocation.
pub type ActionParams = serde_json::Value;

/// The resource dimensions the resolver arbitrates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Cpu,
    Gpu,
    Ram,
    Network,
    StorageIo,
}

impl ResourceKind {
    /// All dimensions, in arbitration order.
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Cpu,
        ResourceKind::Gpu,
        ResourceKind::Ram,
        ResourceKind::Network,
        ResourceKind::StorageIo,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Gpu => "gpu",
            ResourceKind::Ram => "ram",
            ResourceKind::Network => "network",
            ResourceKind::StorageIo => "storage-io",
        }
    }
}

/// Primary storage technology backing the system volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StorageKind {
    Nvme,
    Ssd,
    Hdd,
    #[default]
    Unknown,
}

/// Workload families a reasoning unit can specialize in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadDomain {
    Gaming,
    Streaming,
    Development,
    ContentCreation,
}

impl WorkloadDomain {
    pub fn label(&self) -> &'static str {
        match self {
            WorkloadDomain::Gaming => "gaming",
            WorkloadDomain::Streaming => "streaming",
            WorkloadDomain::Development => "development",
            WorkloadDomain::ContentCreation => "content-creation",
        }
    }
}

impl std::fmt::Display for WorkloadDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Point-in-time hardware reading, produced by a snapshot provider and
/// owned by the orchestrator for one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// CPU utilization across all cores, 0.0-1.0
    pub cpu_utilization: f64,
    /// GPU utilization, 0.0-1.0 (0.0 when no GPU telemetry is available)
    pub gpu_utilization: f64,
    /// RAM utilization, 0.0-1.0
    pub ram_utilization: f64,
    /// Hottest CPU sensor in Celsius, if any sensor reported
    pub cpu_temperature: Option<f32>,
    /// Logical core count
    pub core_count: usize,
    /// Storage technology of the system volume
    pub storage: StorageKind,
    pub captured_at: DateTime<Utc>,
}

impl SystemSnapshot {
    /// A snapshot with everything idle, useful as a test baseline.
    pub fn idle(core_count: usize) -> Self {
        Self {
            cpu_utilization: 0.0,
            gpu_utilization: 0.0,
            ram_utilization: 0.0,
            cpu_temperature: None,
            core_count,
            storage: StorageKind::Unknown,
            captured_at: Utc::now(),
        }
    }
}

/// Point-in-time process/window reading. Same lifecycle as [`SystemSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    /// Names of currently running processes
    pub processes: Vec<String>,
    /// Title of the focused window, when the provider can see one
    pub active_window: Option<String>,
    /// Category the provider tagged this activity with, if it could
    pub category: Option<WorkloadDomain>,
    pub captured_at: DateTime<Utc>,
}

impl ActivitySnapshot {
    pub fn new(processes: Vec<String>) -> Self {
        Self {
            processes,
            active_window: None,
            category: None,
            captured_at: Utc::now(),
        }
    }

    /// Case-insensitive substring match against running process names.
    pub fn mentions_process(&self, keyword: &str) -> bool {
        let needle = keyword.to_lowercase();
        self.processes
            .iter()
            .any(|p| p.to_lowercase().contains(&needle))
    }
}

/// Per-unit declared demand over the shared resource dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Fraction of each dimension the unit wants, 0.0-1.0
    pub cpu: f64,
    pub gpu: f64,
    pub ram: f64,
    pub network: f64,
    pub storage_io: f64,
    /// Scalar priority, 0.0-1.0
    pub priority: f64,
    /// Domains whose units this one contends with
    pub conflicts_with: Vec<String>,
}

impl ResourceRequirements {
    pub fn new(priority: f64) -> Self {
        Self {
            cpu: 0.0,
            gpu: 0.0,
            ram: 0.0,
            network: 0.0,
            storage_io: 0.0,
            priority: priority.clamp(0.0, 1.0),
            conflicts_with: Vec::new(),
        }
    }

    pub fn with_share(mut self, kind: ResourceKind, share: f64) -> Self {
        let share = share.clamp(0.0, 1.0);
        match kind {
            ResourceKind::Cpu => self.cpu = share,
            ResourceKind::Gpu => self.gpu = share,
            ResourceKind::Ram => self.ram = share,
            ResourceKind::Network => self.network = share,
            ResourceKind::StorageIo => self.storage_io = share,
        }
        self
    }

    pub fn conflicting_with(mut self, domain: &str) -> Self {
        self.conflicts_with.push(domain.to_string());
        self
    }

    /// Declared demand on one dimension.
    pub fn demand(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Cpu => self.cpu,
            ResourceKind::Gpu => self.gpu,
            ResourceKind::Ram => self.ram,
            ResourceKind::Network => self.network,
            ResourceKind::StorageIo => self.storage_io,
        }
    }
}

/// A unit's proposed response for one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    /// Named actions in execution order
    pub actions: Vec<String>,
    /// Metric the unit expects to move
    pub target_metric: String,
    /// Expected improvement, percent
    pub expected_improvement: f64,
    /// 0.0-1.0, clamped at construction
    pub confidence: f64,
    /// Whether this may be applied without crossing the admission floor
    pub auto_apply: bool,
}

impl Recommendation {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            actions: Vec::new(),
            target_metric: String::new(),
            expected_improvement: 0.0,
            confidence: 0.0,
            auto_apply: false,
        }
    }

    /// The "no opinion" value: zero confidence, no actions. Units return
    /// this instead of failing when they have nothing to say.
    pub fn none() -> Self {
        Self::new("no action", "no recommendation for this cycle")
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.actions.push(action.to_string());
        self
    }

    pub fn with_target(mut self, metric: &str, expected_improvement: f64) -> Self {
        self.target_metric = metric.to_string();
        self.expected_improvement = expected_improvement;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Request auto-apply. The flag only sticks when confidence is at or
    /// above the given floor; below it the request is demoted.
    pub fn auto_applied(mut self, floor: f64) -> Self {
        self.auto_apply = self.confidence >= floor;
        self
    }

    pub fn is_none(&self) -> bool {
        self.actions.is_empty() && self.confidence == 0.0
    }
}

/// Outcome of applying one named action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: String,
    pub success: bool,
    pub message: String,
    /// Measured improvement on the target metric, percent
    pub improvement_delta: f64,
}

impl ActionResult {
    pub fn ok(action: &str, message: &str, improvement_delta: f64) -> Self {
        Self {
            action: action.to_string(),
            success: true,
            message: message.to_string(),
            improvement_delta,
        }
    }

    pub fn failure(action: &str, message: &str) -> Self {
        Self {
            action: action.to_string(),
            success: false,
            message: message.to_string(),
            improvement_delta: 0.0,
        }
    }
}

/// Lifecycle states of a reasoning unit instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Uninitialized,
    Ready,
    Active,
    Optimizing,
    /// Non-terminal; re-initialized on the next detection cycle
    Error,
    Shutdown,
}

impl AgentState {
    /// States in which the unit participates in a cycle.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            AgentState::Ready | AgentState::Active | AgentState::Optimizing
        )
    }
}

/// Observability row for one active unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitStatus {
    pub name: String,
    pub domain: WorkloadDomain,
    pub state: AgentState,
    pub confidence: f64,
}

/// Emotional weight attached to a recorded episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Significance {
    VeryNegative,
    Negative,
    Neutral,
    Positive,
    VeryPositive,
}

impl Significance {
    /// Signed magnitude in -1.0..=1.0 used to scale learning updates.
    pub fn magnitude(&self) -> f64 {
        match self {
            Significance::VeryNegative => -1.0,
            Significance::Negative => -0.5,
            Significance::Neutral => 0.0,
            Significance::Positive => 0.5,
            Significance::VeryPositive => 1.0,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.magnitude() > 0.0
    }

    pub fn is_negative(&self) -> bool {
        self.magnitude() < 0.0
    }
}

/// Before/after reading of one metric around an applied change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDelta {
    pub metric: String,
    pub before: f64,
    pub after: f64,
}

impl MetricDelta {
    pub fn new(metric: &str, before: f64, after: f64) -> Self {
        Self {
            metric: metric.to_string(),
            before,
            after,
        }
    }

    pub fn delta(&self) -> f64 {
        self.after - self.before
    }
}

/// One concrete past experience. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: Uuid,
    /// What was going on when the actions were taken
    pub context: String,
    /// Actions in the order they were applied
    pub actions: Vec<String>,
    /// Human-readable outcome summary
    pub outcome: String,
    pub metrics: Vec<MetricDelta>,
    pub significance: Significance,
    /// How sure the recorder was about the causal attribution, 0.0-1.0
    pub confidence: f64,
    pub tags: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Builder for [`Episode`] values.
pub struct EpisodeBuilder {
    context: String,
    actions: Vec<String>,
    outcome: Option<String>,
    metrics: Vec<MetricDelta>,
    significance: Significance,
    confidence: f64,
    tags: Vec<String>,
}

impl EpisodeBuilder {
    pub fn new(context: &str) -> Self {
        Self {
            context: context.to_string(),
            actions: Vec::new(),
            outcome: None,
            metrics: Vec::new(),
            significance: Significance::Neutral,
            confidence: 0.5,
            tags: Vec::new(),
        }
    }

    pub fn action(mut self, action: &str) -> Self {
        self.actions.push(action.to_string());
        self
    }

    pub fn outcome(mut self, outcome: &str) -> Self {
        self.outcome = Some(outcome.to_string());
        self
    }

    pub fn metric(mut self, metric: &str, before: f64, after: f64) -> Self {
        self.metrics.push(MetricDelta::new(metric, before, after));
        self
    }

    pub fn significance(mut self, significance: Significance) -> Self {
        self.significance = significance;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn build(self) -> Episode {
        Episode {
            id: Uuid::new_v4(),
            context: self.context,
            actions: self.actions,
            outcome: self.outcome.unwrap_or_default(),
            metrics: self.metrics,
            significance: self.significance,
            confidence: self.confidence,
            tags: self.tags,
            recorded_at: Utc::now(),
        }
    }
}

/// A durable claim with a learned influence strength.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticFact {
    pub id: Uuid,
    pub statement: String,
    /// Synaptic weight, held within [0.1, 1.0] by the store
    pub weight: f64,
    /// Held within [0.2, 1.0] by the store
    pub confidence: f64,
    pub reinforcement_count: u32,
    pub category: String,
    /// Ids of related facts
    pub related: Vec<Uuid>,
}
