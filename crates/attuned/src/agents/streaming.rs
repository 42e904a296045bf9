//! Streaming unit - protects encoder output and upload stability.

use std::sync::Arc;

use async_trait::async_trait;

use attune_common::{
    ActionParams, ActionResult, AgentError, Episode, Recommendation, ResourceKind,
    ResourceRequirements, WorkloadDomain,
};

use crate::backend::TuningBackend;

use super::{ewma, lesson_from_feedback, success_ratio, ReasoningUnit, Scenario};

const ACTIONS: [(&str, f64); 3] = [
    ("optimizeEncoder", 8.0),
    ("lowerBitrate", 15.0),
    ("raiseBitrate", 5.0),
];

pub struct StreamingUnit {
    backend: Arc<dyn TuningBackend>,
    confidence: f64,
    priority: f64,
}

impl StreamingUnit {
    pub fn new(backend: Arc<dyn TuningBackend>) -> Self {
        Self {
            backend,
            confidence: 0.65,
            priority: 0.5,
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
impl ReasoningUnit for StreamingUnit {
    fn id(&self) -> &str {
        "streaming"
    }

    fn name(&self) -> &str {
        "Streaming Optimizer"
    }

    fn domain(&self) -> WorkloadDomain {
        WorkloadDomain::Streaming
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

        // A pinned CPU starves the encoder before anything else does.
        if scenario.system.cpu_utilization > 0.85 {
            return Recommendation::new(
                "Relieve the encoder",
                "CPU is saturated; lowering bitrate and retuning the encoder preset",
            )
            .with_action("lowerBitrate")
            .with_action("optimizeEncoder")
            .with_target("dropped-frames", 20.0)
            .with_confidence(self.confidence)
            .auto_applied(scenario.admission_floor);
        }

        Recommendation::new(
            "Encoder tuning",
            "Stream is active; keeping the encoder preset matched to load",
        )
        .with_action("optimizeEncoder")
        .with_target("dropped-frames", 10.0)
        .with_confidence(self.confidence * 0.9)
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
                &format!("unknown action '{}' for streaming unit", action),
            ));
        };

        let change = self
            .backend
            .apply_change(WorkloadDomain::Streaming, action, params)
            .await?;
        Ok(ActionResult::ok(action, &change.detail, delta))
    }

    fn learn(&mut self, feedback: &[ActionResult]) -> Option<Episode> {
        if feedback.is_empty() {
            return None;
        }
        self.confidence = ewma(self.confidence, success_ratio(feedback));
        lesson_from_feedback(
            WorkloadDomain::Streaming,
            "dropped-frames",
            "streaming stability cycle",
            feedback,
        )
    }

    fn declare_requirements(&self) -> ResourceRequirements {
        ResourceRequirements::new(self.priority)
            .with_share(ResourceKind::Gpu, 0.30)
            .with_share(ResourceKind::Cpu, 0.45)
            .with_share(ResourceKind::Ram, 0.3)
            .with_share(ResourceKind::Network, 0.8)
            .with_share(ResourceKind::StorageIo, 0.2)
    }
}
