//! Gaming unit - keeps frame rates up and the GPU out of thermal trouble.

use std::sync::Arc;

use async_trait::async_trait;

use attune_common::{
    ActionParams, ActionResult, AgentError, Episode, Recommendation, ResourceKind,
    ResourceRequirements, WorkloadDomain,
};

use crate::backend::TuningBackend;

use super::{ewma, lesson_from_feedback, success_ratio, ReasoningUnit, Scenario};

/// GPU temperature above which frame capping takes precedence.
const HOT_GPU_CELSIUS: f32 = 85.0;

/// Known actions and the improvement they are expected to deliver.
const ACTIONS: [(&str, f64); 4] = [
    ("enableGameMode", 8.0),
    ("disableVSync", 12.0),
    ("boostGpuClocks", 6.0),
    ("enableFrameCap", 4.0),
];

pub struct GamingUnit {
    backend: Arc<dyn TuningBackend>,
    confidence: f64,
    priority: f64,
}

impl GamingUnit {
    pub fn new(backend: Arc<dyn TuningBackend>) -> Self {
        Self {
            backend,
            confidence: 0.7,
            priority: 0.9,
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
impl ReasoningUnit for GamingUnit {
    fn id(&self) -> &str {
        "gaming"
    }

    fn name(&self) -> &str {
        "Gaming Optimizer"
    }

    fn domain(&self) -> WorkloadDomain {
        WorkloadDomain::Gaming
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

        if system.cpu_temperature.map(|t| t > HOT_GPU_CELSIUS) == Some(true) {
            return Recommendation::new(
                "Cap frame rate",
                "Thermal headroom is gone; trading peak fps for stability",
            )
            .with_action("enableFrameCap")
            .with_target("gpu-temperature", 10.0)
            .with_confidence(self.confidence * 0.9)
            .auto_applied(scenario.admission_floor);
        }

        if system.gpu_utilization > 0.85 {
            return Recommendation::new(
                "Reclaim frame rate",
                "GPU is saturated; dropping sync overhead and enabling game mode",
            )
            .with_action("enableGameMode")
            .with_action("disableVSync")
            .with_target("fps", 15.0)
            .with_confidence(self.confidence)
            .auto_applied(scenario.admission_floor);
        }

        Recommendation::new(
            "Game mode tuning",
            "A game is running; shifting scheduling and sync toward latency",
        )
        .with_action("enableGameMode")
        .with_action("disableVSync")
        .with_target("fps", 12.0)
        .with_confidence(self.confidence)
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
                &format!("unknown action '{}' for gaming unit", action),
            ));
        };

        let change = self
            .backend
            .apply_change(WorkloadDomain::Gaming, action, params)
            .await?;
        Ok(ActionResult::ok(action, &change.detail, delta))
    }

    fn learn(&mut self, feedback: &[ActionResult]) -> Option<Episode> {
        if feedback.is_empty() {
            return None;
        }
        self.confidence = ewma(self.confidence, success_ratio(feedback));
        lesson_from_feedback(
            WorkloadDomain::Gaming,
            "fps",
            "gaming optimization cycle",
            feedback,
        )
    }

    fn declare_requirements(&self) -> ResourceRequirements {
        ResourceRequirements::new(self.priority)
            .with_share(ResourceKind::Gpu, 0.95)
            .with_share(ResourceKind::Cpu, 0.5)
            .with_share(ResourceKind::Ram, 0.4)
            .with_share(ResourceKind::Network, 0.2)
            .with_share(ResourceKind::StorageIo, 0.2)
            .conflicting_with("content-creation")
            .conflicting_with("development")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FakeTuningBackend;
    use attune_common::{ActivitySnapshot, SystemSnapshot};
    use approx::assert_relative_eq;

    fn scenario(gpu: f64, temp: Option<f32>) -> Scenario {
        let mut system = SystemSnapshot::idle(8);
        system.gpu_utilization = gpu;
        system.cpu_temperature = temp;
        Scenario {
            system,
            activity: ActivitySnapshot::new(vec!["steam".to_string()]),
            admission_floor: 0.6,
        }
    }

    fn unit() -> GamingUnit {
        GamingUnit::new(Arc::new(FakeTuningBackend::new()))
    }

    #[tokio::test]
    async fn test_reason_is_deterministic() {
        let unit = unit();
        let s = scenario(0.9, None);
        let a = unit.reason(&s).await;
        let b = unit.reason(&s).await;
        assert_eq!(a.title, b.title);
        assert_eq!(a.actions, b.actions);
        assert_eq!(a.confidence, b.confidence);
    }

    #[tokio::test]
    async fn test_hot_gpu_takes_precedence() {
        let unit = unit();
        let rec = unit.reason(&scenario(0.95, Some(91.0))).await;
        assert_eq!(rec.actions, vec!["enableFrameCap"]);
        assert_eq!(rec.target_metric, "gpu-temperature");
    }

    #[tokio::test]
    async fn test_saturated_gpu_recommendation_auto_applies() {
        let unit = unit();
        let rec = unit.reason(&scenario(0.9, None)).await;
        assert_eq!(rec.actions, vec!["enableGameMode", "disableVSync"]);
        assert!(rec.auto_apply);
    }

    #[tokio::test]
    async fn test_low_confidence_yields_no_opinion() {
        let mut unit = unit();
        for _ in 0..20 {
            unit.learn(&[ActionResult::failure("enableGameMode", "no")]);
        }
        assert!(unit.confidence() < 0.2);
        let rec = unit.reason(&scenario(0.9, None)).await;
        assert!(rec.is_none());
    }

    #[tokio::test]
    async fn test_unknown_action_fails_without_error() {
        let mut unit = unit();
        let result = unit
            .apply("overclockRam", &serde_json::Value::Null)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.message.contains("unknown action"));
    }

    #[tokio::test]
    async fn test_backend_fault_surfaces_as_error() {
        let backend = Arc::new(FakeTuningBackend::new().failing_on("disableVSync"));
        let mut unit = GamingUnit::new(backend);
        assert!(unit
            .apply("disableVSync", &serde_json::Value::Null)
            .await
            .is_err());
    }

    #[test]
    fn test_learn_moves_confidence_by_ewma() {
        let mut unit = unit();
        let lesson = unit.learn(&[ActionResult::ok("disableVSync", "ok", 12.0)]);
        assert!(lesson.is_some());
        assert_relative_eq!(unit.confidence(), 0.7 * 0.7 + 0.3);

        assert!(unit.learn(&[]).is_none());
    }

    #[test]
    fn test_requirements_follow_priority() {
        let mut unit = unit();
        assert_relative_eq!(unit.declare_requirements().priority, 0.9);
        unit.set_priority(0.4);
        assert_relative_eq!(unit.declare_requirements().priority, 0.4);
        assert_relative_eq!(unit.declare_requirements().gpu, 0.95);
    }
}
