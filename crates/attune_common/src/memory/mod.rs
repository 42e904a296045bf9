//! The three-layer memory system and its facade.
//!
//! Semantic (durable weighted facts), Episodic (tagged experiences), and
//! Causal (cause→effect chains) stores live behind one lock so the
//! four-step learning transaction is atomic per episode: readers never
//! see a partially applied experience.

pub mod attention;
pub mod causal;
pub mod episodic;
pub mod semantic;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::MemoryError;
use crate::types::{Episode, SemanticFact};

use attention::{AttentionEngine, AttentionVector};
use causal::{CausalPrediction, CausalStore};
use episodic::{ActionLesson, EpisodicStore};
use semantic::SemanticStore;

/// Aggregate health metrics for dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStatistics {
    pub fact_count: usize,
    pub episode_count: usize,
    pub chain_count: usize,
    pub average_synaptic_weight: f64,
    pub episodic_success_rate: f64,
    pub average_chain_confidence: f64,
}

/// What one learning transaction touched. Used by callers (and tests)
/// to confirm the integration path ran exactly once per episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnReport {
    pub facts_created: usize,
    pub facts_adjusted: usize,
    pub links_adjusted: usize,
}

struct MemoryInner {
    semantic: SemanticStore,
    episodic: EpisodicStore,
    causal: CausalStore,
}

/// Facade over the three stores plus the attention engine.
pub struct MemorySystem {
    inner: RwLock<MemoryInner>,
    attention: Mutex<AttentionEngine>,
}

impl MemorySystem {
    /// A memory system with the seeded causal graph.
    pub fn new(max_attention_vectors: usize) -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                semantic: SemanticStore::new(),
                episodic: EpisodicStore::new(),
                causal: CausalStore::seeded(),
            }),
            attention: Mutex::new(AttentionEngine::new(max_attention_vectors)),
        }
    }

    /// The system's single learning transaction. Holds the write guard
    /// across all four steps so no partial application is visible:
    ///
    /// 1. record the episode;
    /// 2. when its significance is positive, synthesize/update semantic
    ///    facts from its actions;
    /// 3. adjust similarly-tagged causal links by the signed
    ///    significance magnitude;
    /// 4. reinforce or weaken semantic facts sharing the episode's tags.
    pub async fn learn_from_experience(&self, episode: Episode) -> Result<LearnReport, MemoryError> {
        let mut inner = self.inner.write().await;
        let mut report = LearnReport {
            facts_created: 0,
            facts_adjusted: 0,
            links_adjusted: 0,
        };

        let magnitude = episode.significance.magnitude();
        let tags = episode.tags.clone();
        let category = tags.first().cloned().unwrap_or_else(|| "general".to_string());

        inner.episodic.record(episode.clone());

        // Step 2 runs against the episode's content before step 4 walks
        // the tag-shared facts, so a fresh fact also receives the shared
        // reinforcement below.
        if episode.significance.is_positive() {
            let metric = episode
                .metrics
                .first()
                .map(|m| m.metric.clone())
                .unwrap_or_else(|| "outcome".to_string());
            for action in &episode.actions {
                let statement = format!("{} improves {}", action, metric);
                let existed = inner.semantic.find(&statement).is_some();
                let id = inner.semantic.upsert(&statement, &category);
                if existed {
                    inner.semantic.reinforce(id, magnitude)?;
                } else {
                    report.facts_created += 1;
                }
            }
        }

        report.links_adjusted = inner.causal.adjust_tagged(&tags, magnitude);

        for tag in &tags {
            for id in inner.semantic.ids_in_category(tag) {
                if magnitude >= 0.0 {
                    inner.semantic.reinforce(id, magnitude)?;
                } else {
                    inner.semantic.weaken(id, -magnitude)?;
                }
                report.facts_adjusted += 1;
            }
        }

        debug!(
            "learned from episode {}: {} facts created, {} adjusted, {} links",
            episode.id, report.facts_created, report.facts_adjusted, report.links_adjusted
        );
        Ok(report)
    }

    /// Focus on a query: builds an attention vector against a read view
    /// of the stores.
    pub async fn attend(&self, query: &str) -> AttentionVector {
        let inner = self.inner.read().await;
        let mut attention = self.attention.lock().await;
        attention.attend(query, &inner.semantic, &inner.episodic, &inner.causal)
    }

    /// Number of attention vectors currently active.
    pub async fn active_attention_vectors(&self) -> usize {
        self.attention.lock().await.active_count()
    }

    pub async fn statistics(&self) -> MemoryStatistics {
        let inner = self.inner.read().await;
        MemoryStatistics {
            fact_count: inner.semantic.len(),
            episode_count: inner.episodic.len(),
            chain_count: inner.causal.chain_count(),
            average_synaptic_weight: inner.semantic.average_weight(),
            episodic_success_rate: inner.episodic.success_rate(),
            average_chain_confidence: inner.causal.average_chain_confidence(),
        }
    }

    /// Read one semantic fact by statement, if present.
    pub async fn fact(&self, statement: &str) -> Option<SemanticFact> {
        self.inner.read().await.semantic.find(statement).cloned()
    }

    /// Strongest facts in a category.
    pub async fn top_facts(&self, category: &str, limit: usize) -> Vec<SemanticFact> {
        self.inner
            .read()
            .await
            .semantic
            .top_for_category(category, limit)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Episodes carrying a tag.
    pub async fn episodes_tagged(&self, tag: &str) -> Vec<Episode> {
        self.inner
            .read()
            .await
            .episodic
            .by_tag(tag)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Aggregated action lessons from the episodic store.
    pub async fn lessons(&self) -> Vec<ActionLesson> {
        self.inner.read().await.episodic.extract_lessons()
    }

    /// Best causal prediction for an event.
    pub async fn predict(&self, event: &str) -> Option<CausalPrediction> {
        self.inner.read().await.causal.predict_outcome(event)
    }
}

impl Default for MemorySystem {
    fn default() -> Self {
        Self::new(attention::DEFAULT_MAX_ACTIVE)
    }
}
