//! Attention - query-scoped focus over the memory stores.
//!
//! Given a free-text query, derives topic keys from keyword rules,
//! scores them with a saturating function of the normalized key weight,
//! and pulls the strongest knowledge for every key above the relevance
//! floor. A bounded number of vectors can be active at once; pushing
//! past the bound evicts the least confident one first.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::memory::causal::{CausalPrediction, CausalStore};
use crate::memory::episodic::EpisodicStore;
use crate::memory::semantic::SemanticStore;
use crate::types::{Episode, SemanticFact};

/// Keys scoring below this are dropped from the vector.
pub const RELEVANCE_FLOOR: f64 = 0.3;

/// Default bound on simultaneously active vectors.
pub const DEFAULT_MAX_ACTIVE: usize = 3;

/// Retired vectors kept for inspection.
const HISTORY_LIMIT: usize = 20;

/// How sharply the saturating score reacts around the midpoint.
const SCORE_STEEPNESS: f64 = 6.0;

/// How strongly score spread reduces vector confidence.
const VARIANCE_DAMPENING: f64 = 0.5;

/// How many facts/episodes each focus area carries.
const RECALL_LIMIT: usize = 3;

/// One keyword rule: any matching keyword activates the topic key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRule {
    pub keywords: Vec<String>,
    pub key: String,
    pub weight: f64,
}

impl TopicRule {
    pub fn new(keywords: &[&str], key: &str, weight: f64) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            key: key.to_string(),
            weight,
        }
    }
}

/// Knowledge pulled for one surviving topic key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusArea {
    pub key: String,
    pub score: f64,
    pub facts: Vec<SemanticFact>,
    pub episodes: Vec<Episode>,
    pub prediction: Option<CausalPrediction>,
}

/// Ephemeral, per-query attention state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionVector {
    pub id: Uuid,
    pub query: String,
    /// Raw topic-key weights derived from the rules
    pub weights: HashMap<String, f64>,
    /// Saturating scores per key (pre-floor)
    pub scores: HashMap<String, f64>,
    /// Keys that survived the relevance floor, with their knowledge
    pub focus: Vec<FocusArea>,
    /// max(score) - variance(scores) * dampening
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// The finite-focus engine holding active vectors and a history buffer.
#[derive(Debug)]
pub struct AttentionEngine {
    rules: Vec<TopicRule>,
    max_active: usize,
    active: Vec<AttentionVector>,
    history: VecDeque<AttentionVector>,
}

impl AttentionEngine {
    pub fn new(max_active: usize) -> Self {
        Self {
            rules: default_rules(),
            max_active: max_active.max(1),
            active: Vec::new(),
            history: VecDeque::new(),
        }
    }

    /// Extend the rule table. Later rules with an existing key add an
    /// alternative trigger for it.
    pub fn add_rule(&mut self, rule: TopicRule) {
        self.rules.push(rule);
    }

    /// Build a vector for the query against the given stores, make it
    /// active (evicting the least confident vector when at the bound),
    /// and return a copy.
    pub fn attend(
        &mut self,
        query: &str,
        semantic: &SemanticStore,
        episodic: &EpisodicStore,
        causal: &CausalStore,
    ) -> AttentionVector {
        let weights = self.derive_weights(query);
        let scores = saturating_scores(&weights);

        let mut focus: Vec<FocusArea> = scores
            .iter()
            .filter(|(_, score)| **score >= RELEVANCE_FLOOR)
            .map(|(key, score)| {
                let tag = key.to_lowercase();
                FocusArea {
                    key: key.clone(),
                    score: *score,
                    facts: semantic
                        .top_for_category(&tag, RECALL_LIMIT)
                        .into_iter()
                        .cloned()
                        .collect(),
                    episodes: episodic
                        .by_tag(&tag)
                        .into_iter()
                        .take(RECALL_LIMIT)
                        .cloned()
                        .collect(),
                    prediction: causal.predict_outcome(&tag),
                }
            })
            .collect();
        focus.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let vector = AttentionVector {
            id: Uuid::new_v4(),
            query: query.to_string(),
            confidence: focus_confidence(&scores),
            weights,
            scores,
            focus,
            created_at: Utc::now(),
        };

        if self.active.len() >= self.max_active {
            self.evict_least_confident();
        }
        self.active.push(vector.clone());
        vector
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Currently active vectors, most recent last.
    pub fn active(&self) -> &[AttentionVector] {
        &self.active
    }

    fn evict_least_confident(&mut self) {
        let Some(weakest) = self
            .active
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
        else {
            return;
        };

        let evicted = self.active.remove(weakest);
        self.history.push_back(evicted);
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    fn derive_weights(&self, query: &str) -> HashMap<String, f64> {
        let query_lower = query.to_lowercase();
        let mut weights: HashMap<String, f64> = HashMap::new();
        for rule in &self.rules {
            if rule.keywords.iter().any(|k| query_lower.contains(k)) {
                let entry = weights.entry(rule.key.clone()).or_insert(0.0);
                if rule.weight > *entry {
                    *entry = rule.weight;
                }
            }
        }
        weights
    }
}

impl Default for AttentionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ACTIVE)
    }
}

/// The reference topic rules. Extensible via
/// [`AttentionEngine::add_rule`].
fn default_rules() -> Vec<TopicRule> {
    vec![
        TopicRule::new(&["gaming", "game", "fps", "frame"], "FPS", 1.0),
        TopicRule::new(&["gaming", "gpu", "graphics", "render"], "GPU", 0.8),
        TopicRule::new(&["stream", "broadcast", "bitrate", "encoder"], "bitrate", 0.9),
        TopicRule::new(&["stream", "network", "latency", "ping", "upload"], "network", 0.7),
        TopicRule::new(&["compile", "build", "develop", "code"], "build", 0.8),
        TopicRule::new(&["cpu", "processor", "compile"], "CPU", 0.6),
        TopicRule::new(&["memory", "ram"], "RAM", 0.5),
        TopicRule::new(&["disk", "storage", "io"], "storage", 0.4),
    ]
}

/// Monotonic saturating score of the normalized key weight: a logistic
/// centered on the midpoint, so higher normalized weight always scores
/// higher but never past 1.0.
fn saturating_scores(weights: &HashMap<String, f64>) -> HashMap<String, f64> {
    let max_weight = weights.values().cloned().fold(0.0_f64, f64::max);
    if max_weight <= 0.0 {
        return HashMap::new();
    }
    weights
        .iter()
        .map(|(key, weight)| {
            let normalized = weight / max_weight;
            let score = 1.0 / (1.0 + (-SCORE_STEEPNESS * (normalized - 0.5)).exp());
            (key.clone(), score)
        })
        .collect()
}

/// Attention is more confident when focused on few keys than spread
/// across many: max(score) - variance(scores) * dampening.
fn focus_confidence(scores: &HashMap<String, f64>) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let max = scores.values().cloned().fold(0.0_f64, f64::max);
    let mean = scores.values().sum::<f64>() / scores.len() as f64;
    let variance =
        scores.values().map(|s| (s - mean) * (s - mean)).sum::<f64>() / scores.len() as f64;
    (max - variance * VARIANCE_DAMPENING).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EpisodeBuilder, Significance};

    fn stores() -> (SemanticStore, EpisodicStore, CausalStore) {
        let mut semantic = SemanticStore::new();
        semantic.upsert("disableVSync improves fps", "fps");
        let mut episodic = EpisodicStore::new();
        episodic.record(
            EpisodeBuilder::new("gaming session")
                .action("disableVSync")
                .significance(Significance::Positive)
                .tag("fps")
                .build(),
        );
        (semantic, episodic, CausalStore::seeded())
    }

    #[test]
    fn test_gaming_query_scores_fps_key() {
        let (semantic, episodic, causal) = stores();
        let mut engine = AttentionEngine::default();
        let vector = engine.attend("gaming", &semantic, &episodic, &causal);

        let fps = vector.focus.iter().find(|f| f.key == "FPS").unwrap();
        assert!(fps.score > 0.0);
        assert!(!fps.facts.is_empty());
        assert!(!fps.episodes.is_empty());

        // Everything that survived is at or above the floor.
        for area in &vector.focus {
            assert!(area.score >= RELEVANCE_FLOOR);
        }
    }

    #[test]
    fn test_unrelated_query_yields_empty_vector() {
        let (semantic, episodic, causal) = stores();
        let mut engine = AttentionEngine::default();
        let vector = engine.attend("philosophy of mind", &semantic, &episodic, &causal);

        assert!(vector.focus.is_empty());
        assert_eq!(vector.confidence, 0.0);
    }

    #[test]
    fn test_sharp_focus_beats_diffuse_focus() {
        let (semantic, episodic, causal) = stores();
        let mut engine = AttentionEngine::default();

        let sharp = engine.attend("fps", &semantic, &episodic, &causal);
        let diffuse = engine.attend(
            "gaming stream build cpu memory disk network",
            &semantic,
            &episodic,
            &causal,
        );
        assert!(sharp.confidence >= diffuse.confidence);
    }

    #[test]
    fn test_active_set_is_bounded() {
        let (semantic, episodic, causal) = stores();
        let mut engine = AttentionEngine::new(3);

        for query in ["gaming", "stream", "build", "cpu", "memory"] {
            engine.attend(query, &semantic, &episodic, &causal);
        }
        assert_eq!(engine.active_count(), 3);
        assert_eq!(engine.history_len(), 2);
    }

    #[test]
    fn test_eviction_removes_least_confident() {
        let (semantic, episodic, causal) = stores();
        let mut engine = AttentionEngine::new(2);

        engine.attend("gaming fps", &semantic, &episodic, &causal);
        // An unmatched query has zero confidence and goes first.
        engine.attend("unrelated topic", &semantic, &episodic, &causal);
        engine.attend("stream bitrate", &semantic, &episodic, &causal);

        assert_eq!(engine.active_count(), 2);
        assert!(engine.active().iter().all(|v| v.query != "unrelated topic"));
    }

    #[test]
    fn test_score_monotonic_in_weight() {
        let mut weights = HashMap::new();
        weights.insert("high".to_string(), 1.0);
        weights.insert("low".to_string(), 0.4);
        let scores = saturating_scores(&weights);
        assert!(scores["high"] > scores["low"]);
        assert!(scores["high"] <= 1.0);
    }

    #[test]
    fn test_custom_rule_extends_table() {
        let (semantic, episodic, causal) = stores();
        let mut engine = AttentionEngine::default();
        engine.add_rule(TopicRule::new(&["vr", "headset"], "VR", 1.0));

        let vector = engine.attend("vr headset stutter", &semantic, &episodic, &causal);
        assert!(vector.focus.iter().any(|f| f.key == "VR"));
    }
}
