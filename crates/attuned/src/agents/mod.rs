//! Reasoning units - the per-workload decision makers.
//!
//! Every workload domain gets one unit implementing the same
//! four-operation contract: reason about the current scenario, apply a
//! named action, learn from feedback, declare resource requirements.
//! Units are selected by workload signature through [`AgentRegistry`]
//! and tracked by the orchestrator via [`AgentHandle`].

pub mod development;
pub mod gaming;
pub mod streaming;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use attune_common::{
    ActionParams, ActionResult, ActivitySnapshot, AgentError, AgentState, Episode, EpisodeBuilder,
    Recommendation, ResourceRequirements, Significance, SystemSnapshot, UnitStatus, WorkloadDomain,
};

use crate::backend::TuningBackend;
use crate::config::SignatureConfig;

pub use development::DevelopmentUnit;
pub use gaming::GamingUnit;
pub use streaming::StreamingUnit;

/// EWMA blend for confidence updates: 0.7 old, 0.3 new.
pub const EWMA_OLD: f64 = 0.7;
pub const EWMA_NEW: f64 = 0.3;

/// Exponentially weighted moving average of outcome success.
pub fn ewma(old: f64, outcome: f64) -> f64 {
    (EWMA_OLD * old + EWMA_NEW * outcome).clamp(0.0, 1.0)
}

/// Everything a unit may look at while reasoning about one cycle.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub system: SystemSnapshot,
    pub activity: ActivitySnapshot,
    /// Confidence floor recommendations must clear to auto-apply
    pub admission_floor: f64,
}

/// The uniform contract every workload unit implements.
///
/// `reason` is pure with respect to persistent state and deterministic
/// given the same scenario and internal confidence. `apply` is the only
/// side-effecting operation; unknown action names come back as failed
/// results, never as errors. `learn` folds a cycle's outcomes into the
/// unit's confidence and hands back the durable lesson for the
/// orchestrator to commit.
#[async_trait]
pub trait ReasoningUnit: Send + Sync {
    /// Stable identifier, unique among active units
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn domain(&self) -> WorkloadDomain;

    fn confidence(&self) -> f64;

    /// Externally adjusted priority, reflected by `declare_requirements`
    fn set_priority(&mut self, priority: f64);

    /// Clear transient state after an Error-state re-initialization
    fn reset(&mut self) {}

    async fn reason(&self, scenario: &Scenario) -> Recommendation;

    async fn apply(
        &mut self,
        action: &str,
        params: &ActionParams,
    ) -> Result<ActionResult, AgentError>;

    fn learn(&mut self, feedback: &[ActionResult]) -> Option<Episode>;

    fn declare_requirements(&self) -> ResourceRequirements;
}

/// Fold a feedback batch into a lesson episode. Shared by the unit
/// implementations so significance grading stays consistent.
pub fn lesson_from_feedback(
    domain: WorkloadDomain,
    target_metric: &str,
    context: &str,
    feedback: &[ActionResult],
) -> Option<Episode> {
    if feedback.is_empty() {
        return None;
    }

    let successes = feedback.iter().filter(|r| r.success).count();
    let ratio = successes as f64 / feedback.len() as f64;
    let avg_delta =
        feedback.iter().map(|r| r.improvement_delta).sum::<f64>() / feedback.len() as f64;

    let significance = if ratio == 1.0 && avg_delta > 5.0 {
        Significance::VeryPositive
    } else if ratio >= 0.5 {
        Significance::Positive
    } else if ratio > 0.0 {
        Significance::Negative
    } else {
        Significance::VeryNegative
    };

    let mut builder = EpisodeBuilder::new(context)
        .outcome(&format!(
            "{}/{} actions succeeded, avg delta {:.1}",
            successes,
            feedback.len(),
            avg_delta
        ))
        .metric(target_metric, 0.0, avg_delta)
        .significance(significance)
        .confidence(ratio)
        .tag(domain.label())
        .tag(target_metric);
    for result in feedback {
        builder = builder.action(&result.action);
    }
    Some(builder.build())
}

/// Success ratio of a feedback batch, for EWMA updates.
pub fn success_ratio(feedback: &[ActionResult]) -> f64 {
    if feedback.is_empty() {
        return 0.0;
    }
    feedback.iter().filter(|r| r.success).count() as f64 / feedback.len() as f64
}

// ============================================================================
// Agent Handle
// ============================================================================

/// Orchestrator-side wrapper tracking a unit's lifecycle state.
pub struct AgentHandle {
    pub unit: Box<dyn ReasoningUnit>,
    pub state: AgentState,
    /// Consecutive cycles the unit's signature was not detected
    pub absent_cycles: u32,
    pub created_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl AgentHandle {
    pub fn new(unit: Box<dyn ReasoningUnit>) -> Self {
        Self {
            unit,
            state: AgentState::Ready,
            absent_cycles: 0,
            created_at: Utc::now(),
            last_error: None,
        }
    }

    pub fn status(&self) -> UnitStatus {
        UnitStatus {
            name: self.unit.name().to_string(),
            domain: self.unit.domain(),
            state: self.state,
            confidence: self.unit.confidence(),
        }
    }

    /// Recover from the Error state; called during detection.
    pub fn reinitialize(&mut self) {
        self.unit.reset();
        self.state = AgentState::Ready;
        self.last_error = None;
    }
}

// ============================================================================
// Workload signatures and the registry
// ============================================================================

/// Keyword signature activating one workload domain.
#[derive(Debug, Clone)]
pub struct WorkloadSignature {
    pub domain: WorkloadDomain,
    pub keywords: Vec<String>,
}

impl WorkloadSignature {
    pub fn new(domain: WorkloadDomain, keywords: &[&str]) -> Self {
        Self {
            domain,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn matches(&self, activity: &ActivitySnapshot) -> bool {
        self.keywords.iter().any(|k| activity.mentions_process(k))
    }
}

type AgentFactory = Box<dyn Fn() -> Box<dyn ReasoningUnit> + Send + Sync>;

/// Open registry mapping workload signatures to unit factories.
pub struct AgentRegistry {
    entries: Vec<(WorkloadSignature, AgentFactory)>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn register(
        &mut self,
        signature: WorkloadSignature,
        factory: impl Fn() -> Box<dyn ReasoningUnit> + Send + Sync + 'static,
    ) {
        self.entries.push((signature, Box::new(factory)));
    }

    /// The built-in units wired to the given backend, with keyword
    /// tables taken from configuration.
    pub fn standard(backend: Arc<dyn TuningBackend>, signatures: &[SignatureConfig]) -> Self {
        let mut registry = Self::new();

        for config in signatures {
            let keywords: Vec<&str> = config.keywords.iter().map(|s| s.as_str()).collect();
            match config.domain.as_str() {
                "gaming" => {
                    let backend = backend.clone();
                    registry.register(
                        WorkloadSignature::new(WorkloadDomain::Gaming, &keywords),
                        move || Box::new(GamingUnit::new(backend.clone())),
                    );
                }
                "streaming" => {
                    let backend = backend.clone();
                    registry.register(
                        WorkloadSignature::new(WorkloadDomain::Streaming, &keywords),
                        move || Box::new(StreamingUnit::new(backend.clone())),
                    );
                }
                "development" => {
                    let backend = backend.clone();
                    registry.register(
                        WorkloadSignature::new(WorkloadDomain::Development, &keywords),
                        move || Box::new(DevelopmentUnit::new(backend.clone())),
                    );
                }
                other => {
                    tracing::warn!("No unit implementation for domain '{}', skipping", other);
                }
            }
        }
        registry
    }

    /// Domains whose signatures match the activity, in registration
    /// order.
    pub fn detect(&self, activity: &ActivitySnapshot) -> Vec<WorkloadDomain> {
        self.entries
            .iter()
            .filter(|(sig, _)| sig.matches(activity))
            .map(|(sig, _)| sig.domain)
            .collect()
    }

    /// Build a fresh unit for a domain.
    pub fn build(&self, domain: WorkloadDomain) -> Option<Box<dyn ReasoningUnit>> {
        self.entries
            .iter()
            .find(|(sig, _)| sig.domain == domain)
            .map(|(_, factory)| factory())
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FakeTuningBackend;
    use crate::config::AttuneConfig;
    use approx::assert_relative_eq;

    #[test]
    fn test_ewma_reference_ratio() {
        assert_relative_eq!(ewma(0.5, 1.0), 0.65);
        assert_relative_eq!(ewma(0.5, 0.0), 0.35);
        assert_relative_eq!(ewma(1.0, 1.0), 1.0);
    }

    #[test]
    fn test_lesson_grading() {
        let all_good = vec![
            ActionResult::ok("a", "ok", 10.0),
            ActionResult::ok("b", "ok", 10.0),
        ];
        let lesson = lesson_from_feedback(WorkloadDomain::Gaming, "fps", "ctx", &all_good).unwrap();
        assert_eq!(lesson.significance, Significance::VeryPositive);
        assert_eq!(lesson.actions, vec!["a", "b"]);
        assert!(lesson.tags.contains(&"gaming".to_string()));

        let all_bad = vec![ActionResult::failure("a", "no")];
        let lesson = lesson_from_feedback(WorkloadDomain::Gaming, "fps", "ctx", &all_bad).unwrap();
        assert_eq!(lesson.significance, Significance::VeryNegative);

        assert!(lesson_from_feedback(WorkloadDomain::Gaming, "fps", "ctx", &[]).is_none());
    }

    #[test]
    fn test_signature_matching() {
        let sig = WorkloadSignature::new(WorkloadDomain::Gaming, &["steam", "wine"]);
        let activity = ActivitySnapshot::new(vec!["SteamClient".to_string()]);
        assert!(sig.matches(&activity));

        let activity = ActivitySnapshot::new(vec!["firefox".to_string()]);
        assert!(!sig.matches(&activity));
    }

    #[test]
    fn test_standard_registry_detects_configured_domains() {
        let backend = Arc::new(FakeTuningBackend::new());
        let config = AttuneConfig::default();
        let registry = AgentRegistry::standard(backend, &config.signatures);

        let activity = ActivitySnapshot::new(vec!["steam".to_string(), "cargo".to_string()]);
        let detected = registry.detect(&activity);
        assert_eq!(
            detected,
            vec![WorkloadDomain::Gaming, WorkloadDomain::Development]
        );

        let unit = registry.build(WorkloadDomain::Gaming).unwrap();
        assert_eq!(unit.domain(), WorkloadDomain::Gaming);
    }

    #[test]
    fn test_handle_reinitialize_clears_error() {
        let backend = Arc::new(FakeTuningBackend::new());
        let mut handle = AgentHandle::new(Box::new(GamingUnit::new(backend)));
        handle.state = AgentState::Error;
        handle.last_error = Some("backend down".to_string());

        handle.reinitialize();
        assert_eq!(handle.state, AgentState::Ready);
        assert!(handle.last_error.is_none());
    }
}
