//! Development unit - shortens build turnaround.

use std::sync::Arc;

use async_trait::async_trait;

use attune_common::{
    ActionParams, ActionResult, AgentError, Episode, Recommendation, ResourceKind,
    ResourceRequirements, StorageKind, WorkloadDomain,
};

use crate::backend::TuningBackend;

use super::{ewma, lesson_from_feedback, success_ratio, ReasoningUnit, Scenario};

const ACTIONS: [(&str, f64); 2] = [
    ("raiseBuildParallelism", 20.0),
    ("elevateIoPriority", 8.0),
];

pub struct DevelopmentUnit {
    backend: Arc<dyn TuningBackend>,
    confidence: f64,
    priority: f64,
}

impl DevelopmentUnit {
    pub fn new(backend: Arc<dyn TuningBackend>) -> Self {
        Self {
            backend,
            confidence: 0.6,
            priority: 0.6,
        }
    }

    fn expected_delta(action: &str) -> Option<f64> {
        ACTIONS
            .iter()
            .find(|(name, _)| *name == action)
            .map(|(_, delta)| *delta)
    }
}

#[async_trait]
impl ReasoningUnit for DevelopmentUnit {
    fn id(&self) -> &str {
        "development"
    }

    fn name(&self) -> &str {
        "Development Optimizer"
    }

    fn domain(&self) -> WorkloadDomain {
        WorkloadDomain::Development
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn set_priority(&mut self, priority: f64) {
        self.priority = priority.clamp(0.0, 1.0);
    }

    async fn reason(&self, scenario: &Scenario) -> Recommendation {
        if self.confidence < 0.2 {
            return Recommendation::none();
        }

        let system = &scenario.system;

        // Spinning storage bottlenecks incremental builds before core
        // count does.
        if system.storage == StorageKind::Hdd {
            return Recommendation::new(
                "Prioritize build IO",
                "Build artifacts sit on spinning storage; raising IO priority",
            )
            .with_action("elevateIoPriority")
            .with_target("build-time", 10.0)
            .with_confidence(self.confidence)
            .auto_applied(scenario.admission_floor);
        }

        if system.core_count >= 8 {
            return Recommendation::new(
                "Widen the build",
                "Plenty of cores available; raising parallelism and IO priority",
            )
            .with_action("raiseBuildParallelism")
            .with_action("elevateIoPriority")
            .with_target("build-time", 25.0)
            .with_confidence(self.confidence)
            .auto_applied(scenario.admission_floor);
        }

        Recommendation::new(
            "Build IO tuning",
            "Few cores to spare; limiting the intervention to IO priority",
        )
        .with_action("elevateIoPriority")
        .with_target("build-time", 10.0)
        .with_confidence(self.confidence * 0.8)
        .auto_applied(scenario.admission_floor)
    }

    async fn apply(
        &mut self,
        action: &str,
        params: &ActionParams,
    ) -> Result<ActionResult, AgentError> {
        let Some(delta) = Self::expected_delta(action) else {
            return Ok(ActionResult::failure(
                action,
                &format!("unknown action '{}' for development unit", action),
            ));
        };

        let change = self
            .backend
            .apply_change(WorkloadDomain::Development, action, params)
            .await?;
        Ok(ActionResult::ok(action, &change.detail, delta))
    }

    fn learn(&mut self, feedback: &[ActionResult]) -> Option<Episode> {
        if feedback.is_empty() {
            return None;
        }
        self.confidence = ewma(self.confidence, success_ratio(feedback));
        lesson_from_feedback(
            WorkloadDomain::Development,
            "build-time",
            "build acceleration cycle",
            feedback,
        )
    }

    fn declare_requirements(&self) -> ResourceRequirements {
        ResourceRequirements::new(self.priority)
            .with_share(ResourceKind::Cpu, 0.9)
            .with_share(ResourceKind::Ram, 0.5)
            .with_share(ResourceKind::StorageIo, 0.6)
            .with_share(ResourceKind::Network, 0.1)
            .conflicting_with("gaming")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FakeTuningBackend;
    use attune_common::{ActivitySnapshot, SystemSnapshot};

    fn scenario(cores: usize, storage: StorageKind) -> Scenario {
        let mut system = SystemSnapshot::idle(cores);
        system.storage = storage;
        Scenario {
            system,
            activity: ActivitySnapshot::new(vec!["cargo".to_string()]),
            admission_floor: 0.6,
        }
    }

    #[tokio::test]
    async fn test_many_cores_widen_the_build() {
        let unit = DevelopmentUnit::new(Arc::new(FakeTuningBackend::new()));
        let rec = unit.reason(&scenario(16, StorageKind::Nvme)).await;
        assert_eq!(
            rec.actions,
            vec!["raiseBuildParallelism", "elevateIoPriority"]
        );
    }

    #[tokio::test]
    async fn test_hdd_prioritizes_io_over_parallelism() {
        let unit = DevelopmentUnit::new(Arc::new(FakeTuningBackend::new()));
        let rec = unit.reason(&scenario(16, StorageKind::Hdd)).await;
        assert_eq!(rec.actions, vec!["elevateIoPriority"]);
    }

    #[tokio::test]
    async fn test_few_cores_limits_intervention() {
        let unit = DevelopmentUnit::new(Arc::new(FakeTuningBackend::new()));
        let rec = unit.reason(&scenario(4, StorageKind::Ssd)).await;
        assert_eq!(rec.actions, vec!["elevateIoPriority"]);
        // Below the admission floor, so not auto-applied.
        assert!(!rec.auto_apply);
    }

    #[test]
    fn test_conflicts_with_gaming() {
        let unit = DevelopmentUnit::new(Arc::new(FakeTuningBackend::new()));
        let req = unit.declare_requirements();
        assert!(req.conflicts_with.contains(&"gaming".to_string()));
    }
}
