//! Causal memory - cause→effect chains used for outcome prediction.
//!
//! Arena-style storage: nodes, links, and chains live in flat maps keyed
//! by numeric id, and refer to each other by id only. Chains are built
//! once from a fixed seed and thereafter only reinforced or weakened.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// Link strength bounds
pub const STRENGTH_FLOOR: f64 = 0.1;
pub const STRENGTH_CEIL: f64 = 1.0;

/// Link reliability bounds, percent
pub const RELIABILITY_FLOOR: f64 = 10.0;
pub const RELIABILITY_CEIL: f64 = 100.0;

/// Step sizes per unit of magnitude
const STRENGTH_STEP: f64 = 0.05;
const RELIABILITY_STEP: f64 = 2.0;

/// Defaults for links synthesized while building a chain
const DEFAULT_STRENGTH: f64 = 0.5;
const DEFAULT_RELIABILITY: f64 = 70.0;

/// A named event in the causal graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalNode {
    pub id: u64,
    pub event: String,
}

/// A condition under which a link's strength is disregarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalException {
    pub condition: String,
}

/// Directed cause→effect edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalLink {
    pub id: u64,
    pub cause: u64,
    pub effect: u64,
    /// Held within [0.1, 1.0]
    pub strength: f64,
    /// Percent, held within [10, 100]
    pub reliability: f64,
    pub exceptions: Vec<CausalException>,
}

impl CausalLink {
    /// Strength after applying exceptions: zero when any active
    /// condition names one of the link's exceptions.
    pub fn effective_strength(&self, active_conditions: &[String]) -> f64 {
        let disregarded = self
            .exceptions
            .iter()
            .any(|e| active_conditions.iter().any(|c| c == &e.condition));
        if disregarded {
            0.0
        } else {
            self.strength
        }
    }
}

/// An ordered cause→effect path with an aggregate confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalChain {
    pub id: u64,
    pub node_ids: Vec<u64>,
    pub confidence: f64,
    pub tags: Vec<String>,
}

/// Result of asking the graph what an event leads to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalPrediction {
    pub chain_id: u64,
    /// Event names along the chain, in order
    pub trace: Vec<String>,
    pub confidence: f64,
}

/// Flat-map store for the causal graph.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CausalStore {
    nodes: HashMap<u64, CausalNode>,
    links: HashMap<u64, CausalLink>,
    chains: HashMap<u64, CausalChain>,
    next_id: u64,
}

impl CausalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed seed graph the system starts from. Covers the causal
    /// paths the reference units act on; everything after this is
    /// reinforcement and weakening.
    pub fn seeded() -> Self {
        let mut store = Self::new();

        let gpu_temp = store.add_node("high gpu temperature");
        let throttle = store.add_node("thermal throttling");
        let frame_drops = store.add_node("frame drops");
        let vsync_off = store.add_node("disableVSync");
        let fps_up = store.add_node("higher frame rate");
        let background = store.add_node("background process load");
        let contention = store.add_node("cpu contention");
        let slow_build = store.add_node("slow compilation");
        let net_sat = store.add_node("network saturation");
        let stream_drops = store.add_node("dropped stream frames");
        let bitrate_down = store.add_node("lowerBitrate");
        let stream_stable = store.add_node("stable stream output");

        // Building a chain synthesizes the missing links with defaults.
        let thermal = store
            .add_chain(&[gpu_temp, throttle, frame_drops], &["gaming", "thermal"])
            .expect("seed nodes exist");
        store
            .add_chain(&[vsync_off, fps_up], &["gaming", "fps"])
            .expect("seed nodes exist");
        store
            .add_chain(&[background, contention, slow_build], &["development", "cpu"])
            .expect("seed nodes exist");
        store
            .add_chain(&[net_sat, stream_drops], &["streaming", "network"])
            .expect("seed nodes exist");
        store
            .add_chain(&[bitrate_down, stream_stable], &["streaming", "bitrate"])
            .expect("seed nodes exist");

        // Throttling does not reach frame drops while a frame cap holds.
        if let Some(link_id) = store.link_between(throttle, frame_drops) {
            store
                .add_exception(link_id, "frame cap active")
                .expect("seed link exists");
        }
        let _ = thermal;

        store
    }

    pub fn add_node(&mut self, event: &str) -> u64 {
        let id = self.bump_id();
        self.nodes.insert(
            id,
            CausalNode {
                id,
                event: event.to_string(),
            },
        );
        id
    }

    pub fn add_link(
        &mut self,
        cause: u64,
        effect: u64,
        strength: f64,
        reliability: f64,
    ) -> Result<u64, MemoryError> {
        if !self.nodes.contains_key(&cause) {
            return Err(MemoryError::UnknownNode(cause));
        }
        if !self.nodes.contains_key(&effect) {
            return Err(MemoryError::UnknownNode(effect));
        }

        let id = self.bump_id();
        self.links.insert(
            id,
            CausalLink {
                id,
                cause,
                effect,
                strength: strength.clamp(STRENGTH_FLOOR, STRENGTH_CEIL),
                reliability: reliability.clamp(RELIABILITY_FLOOR, RELIABILITY_CEIL),
                exceptions: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Build a chain over existing nodes, synthesizing any missing
    /// consecutive links with default strength and reliability.
    pub fn add_chain(&mut self, node_ids: &[u64], tags: &[&str]) -> Result<u64, MemoryError> {
        for id in node_ids {
            if !self.nodes.contains_key(id) {
                return Err(MemoryError::UnknownNode(*id));
            }
        }

        for pair in node_ids.windows(2) {
            if self.link_between(pair[0], pair[1]).is_none() {
                self.add_link(pair[0], pair[1], DEFAULT_STRENGTH, DEFAULT_RELIABILITY)?;
            }
        }

        let id = self.bump_id();
        let mut chain = CausalChain {
            id,
            node_ids: node_ids.to_vec(),
            confidence: 0.0,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };
        chain.confidence = self.chain_confidence(&chain, &[]);
        self.chains.insert(id, chain);
        Ok(id)
    }

    pub fn add_exception(&mut self, link_id: u64, condition: &str) -> Result<(), MemoryError> {
        let link = self
            .links
            .get_mut(&link_id)
            .ok_or(MemoryError::UnknownLink(link_id))?;
        link.exceptions.push(CausalException {
            condition: condition.to_string(),
        });
        Ok(())
    }

    /// Strengthen a link. Monotonic, bounded: strength and reliability
    /// are clamped to their ranges. A non-finite or negative magnitude
    /// is rejected and the link keeps its prior values.
    pub fn reinforce_link(&mut self, link_id: u64, magnitude: f64) -> Result<(), MemoryError> {
        self.adjust_link(link_id, magnitude, 1.0)
    }

    /// Weaken a link, bounded to the same ranges.
    pub fn weaken_link(&mut self, link_id: u64, magnitude: f64) -> Result<(), MemoryError> {
        self.adjust_link(link_id, magnitude, -1.0)
    }

    fn adjust_link(&mut self, link_id: u64, magnitude: f64, sign: f64) -> Result<(), MemoryError> {
        if !magnitude.is_finite() || magnitude < 0.0 {
            return Err(MemoryError::RejectedUpdate(format!(
                "magnitude {} is not a finite non-negative number",
                magnitude
            )));
        }
        let link = self
            .links
            .get_mut(&link_id)
            .ok_or(MemoryError::UnknownLink(link_id))?;

        link.strength =
            (link.strength + sign * STRENGTH_STEP * magnitude).clamp(STRENGTH_FLOOR, STRENGTH_CEIL);
        link.reliability = (link.reliability + sign * RELIABILITY_STEP * magnitude)
            .clamp(RELIABILITY_FLOOR, RELIABILITY_CEIL);

        self.refresh_chain_confidences();
        Ok(())
    }

    /// Apply the signed significance of an experience to every link of
    /// every chain sharing a tag with it.
    pub fn adjust_tagged(&mut self, tags: &[String], signed_magnitude: f64) -> usize {
        let chain_ids: Vec<u64> = self
            .chains
            .values()
            .filter(|c| c.tags.iter().any(|t| tags.contains(t)))
            .map(|c| c.id)
            .collect();

        let mut touched = 0;
        for chain_id in chain_ids {
            for link_id in self.links_along(chain_id) {
                let result = if signed_magnitude >= 0.0 {
                    self.reinforce_link(link_id, signed_magnitude)
                } else {
                    self.weaken_link(link_id, -signed_magnitude)
                };
                if result.is_ok() {
                    touched += 1;
                }
            }
        }
        touched
    }

    /// The highest-confidence chain whose nodes mention the event, with
    /// its full ordered trace.
    pub fn predict_outcome(&self, event: &str) -> Option<CausalPrediction> {
        self.predict_outcome_under(event, &[])
    }

    /// Like [`predict_outcome`](Self::predict_outcome) but with active
    /// conditions applied, so excepted links drop out of the confidence.
    pub fn predict_outcome_under(
        &self,
        event: &str,
        active_conditions: &[String],
    ) -> Option<CausalPrediction> {
        let needle = event.to_lowercase();
        let mut best: Option<CausalPrediction> = None;

        for chain in self.chains.values() {
            let mentions = chain.node_ids.iter().any(|id| {
                self.nodes
                    .get(id)
                    .map(|n| n.event.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            });
            if !mentions {
                continue;
            }

            let confidence = self.chain_confidence(chain, active_conditions);
            let better = best
                .as_ref()
                .map(|b| confidence > b.confidence)
                .unwrap_or(true);
            if better {
                best = Some(CausalPrediction {
                    chain_id: chain.id,
                    trace: chain
                        .node_ids
                        .iter()
                        .filter_map(|id| self.nodes.get(id).map(|n| n.event.clone()))
                        .collect(),
                    confidence,
                });
            }
        }
        best
    }

    /// Chains carrying a given tag.
    pub fn chains_tagged(&self, tag: &str) -> Vec<&CausalChain> {
        self.chains
            .values()
            .filter(|c| c.tags.iter().any(|t| t == tag))
            .collect()
    }

    pub fn chain(&self, id: u64) -> Option<&CausalChain> {
        self.chains.get(&id)
    }

    pub fn link(&self, id: u64) -> Option<&CausalLink> {
        self.links.get(&id)
    }

    /// Link id connecting two nodes, if one exists.
    pub fn link_between(&self, cause: u64, effect: u64) -> Option<u64> {
        self.links
            .values()
            .find(|l| l.cause == cause && l.effect == effect)
            .map(|l| l.id)
    }

    /// Link ids along a chain's consecutive node pairs.
    pub fn links_along(&self, chain_id: u64) -> Vec<u64> {
        let Some(chain) = self.chains.get(&chain_id) else {
            return Vec::new();
        };
        chain
            .node_ids
            .windows(2)
            .filter_map(|pair| self.link_between(pair[0], pair[1]))
            .collect()
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn average_chain_confidence(&self) -> f64 {
        if self.chains.is_empty() {
            return 0.0;
        }
        self.chains.values().map(|c| c.confidence).sum::<f64>() / self.chains.len() as f64
    }

    /// Aggregate confidence: mean of effective strength scaled by
    /// reliability over the chain's links.
    fn chain_confidence(&self, chain: &CausalChain, active_conditions: &[String]) -> f64 {
        let scores: Vec<f64> = chain
            .node_ids
            .windows(2)
            .filter_map(|pair| {
                self.link_between(pair[0], pair[1])
                    .and_then(|id| self.links.get(&id))
            })
            .map(|l| l.effective_strength(active_conditions) * (l.reliability / 100.0))
            .collect();
        if scores.is_empty() {
            return 0.0;
        }
        scores.iter().sum::<f64>() / scores.len() as f64
    }

    fn refresh_chain_confidences(&mut self) {
        let ids: Vec<u64> = self.chains.keys().copied().collect();
        for id in ids {
            let confidence = {
                let chain = &self.chains[&id];
                self.chain_confidence(chain, &[])
            };
            if let Some(chain) = self.chains.get_mut(&id) {
                chain.confidence = confidence;
            }
        }
    }

    fn bump_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_seed_builds_chains() {
        let store = CausalStore::seeded();
        assert!(store.chain_count() >= 5);
        assert!(!store.chains_tagged("gaming").is_empty());
        assert!(!store.chains_tagged("streaming").is_empty());
        assert!(!store.chains_tagged("development").is_empty());
    }

    #[test]
    fn test_link_bounds_hold_under_repeated_updates() {
        let mut store = CausalStore::new();
        let a = store.add_node("a");
        let b = store.add_node("b");
        let link = store.add_link(a, b, 0.5, 70.0).unwrap();

        for _ in 0..100 {
            store.reinforce_link(link, 1.0).unwrap();
        }
        let l = store.link(link).unwrap();
        assert!(l.strength <= STRENGTH_CEIL);
        assert!(l.reliability <= RELIABILITY_CEIL);

        for _ in 0..100 {
            store.weaken_link(link, 1.0).unwrap();
        }
        let l = store.link(link).unwrap();
        assert!(l.strength >= STRENGTH_FLOOR);
        assert!(l.reliability >= RELIABILITY_FLOOR);
    }

    #[test]
    fn test_invalid_magnitude_rejected() {
        let mut store = CausalStore::new();
        let a = store.add_node("a");
        let b = store.add_node("b");
        let link = store.add_link(a, b, 0.5, 70.0).unwrap();

        let before = store.link(link).unwrap().strength;
        assert!(store.reinforce_link(link, f64::NAN).is_err());
        assert_eq!(store.link(link).unwrap().strength, before);
    }

    #[test]
    fn test_add_link_validates_nodes() {
        let mut store = CausalStore::new();
        let a = store.add_node("a");
        assert!(store.add_link(a, 999, 0.5, 70.0).is_err());
    }

    #[test]
    fn test_predict_outcome_finds_chain_with_trace() {
        let store = CausalStore::seeded();
        let prediction = store.predict_outcome("disableVSync").unwrap();

        assert_eq!(prediction.trace.first().unwrap(), "disableVSync");
        assert_eq!(prediction.trace.last().unwrap(), "higher frame rate");
        assert!(prediction.confidence > 0.0);
    }

    #[test]
    fn test_predict_outcome_unknown_event() {
        let store = CausalStore::seeded();
        assert!(store.predict_outcome("quantum entanglement").is_none());
    }

    #[test]
    fn test_predict_prefers_higher_confidence_chain() {
        let mut store = CausalStore::new();
        let shared = store.add_node("shared event");
        let weak_end = store.add_node("weak end");
        let strong_end = store.add_node("strong end");

        let weak = store.add_chain(&[shared, weak_end], &["t"]).unwrap();
        let strong = store.add_chain(&[shared, strong_end], &["t"]).unwrap();

        let link = store.link_between(shared, strong_end).unwrap();
        for _ in 0..10 {
            store.reinforce_link(link, 1.0).unwrap();
        }

        let prediction = store.predict_outcome("shared event").unwrap();
        assert_eq!(prediction.chain_id, strong);
        let _ = weak;
    }

    #[test]
    fn test_exception_disregards_link_strength() {
        let mut store = CausalStore::new();
        let a = store.add_node("cause");
        let b = store.add_node("effect");
        store.add_chain(&[a, b], &["t"]).unwrap();
        let link = store.link_between(a, b).unwrap();
        store.add_exception(link, "mitigation active").unwrap();

        let plain = store.predict_outcome("cause").unwrap();
        assert!(plain.confidence > 0.0);

        let under = store
            .predict_outcome_under("cause", &["mitigation active".to_string()])
            .unwrap();
        assert_eq!(under.confidence, 0.0);
    }

    #[test]
    fn test_adjust_tagged_touches_matching_chains_only() {
        let mut store = CausalStore::seeded();
        let gaming_links: Vec<u64> = store
            .chains_tagged("gaming")
            .iter()
            .flat_map(|c| store.links_along(c.id))
            .collect();
        let before: Vec<f64> = gaming_links
            .iter()
            .map(|id| store.link(*id).unwrap().strength)
            .collect();

        let touched = store.adjust_tagged(&["gaming".to_string()], 1.0);
        assert!(touched > 0);

        for (id, old) in gaming_links.iter().zip(before) {
            let new = store.link(*id).unwrap().strength;
            assert!(new >= old);
        }

        // Streaming chains are untouched by a gaming-tagged experience.
        let streaming_confidence_before = store
            .chains_tagged("streaming")
            .iter()
            .map(|c| c.confidence)
            .sum::<f64>();
        store.adjust_tagged(&["gaming".to_string()], 1.0);
        let streaming_confidence_after = store
            .chains_tagged("streaming")
            .iter()
            .map(|c| c.confidence)
            .sum::<f64>();
        assert_relative_eq!(streaming_confidence_before, streaming_confidence_after);
    }

    #[test]
    fn test_chain_confidence_refreshes_after_reinforce() {
        let mut store = CausalStore::new();
        let a = store.add_node("a");
        let b = store.add_node("b");
        let chain = store.add_chain(&[a, b], &["t"]).unwrap();
        let before = store.chain(chain).unwrap().confidence;

        let link = store.link_between(a, b).unwrap();
        store.reinforce_link(link, 1.0).unwrap();
        let after = store.chain(chain).unwrap().confidence;
        assert!(after > before);
    }
}
