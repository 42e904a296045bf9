//! Episodic memory - tagged, emotionally weighted experiences.
//!
//! Episodes are immutable once recorded and only ever read back through
//! aggregate queries. The store keeps a tag index so per-domain recall
//! does not scan the whole log.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Episode, Significance};

/// Aggregated view of how one action has fared across episodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLesson {
    pub action: String,
    /// Episodes with positive significance that included the action
    pub positive: u32,
    /// Episodes with negative significance that included the action
    pub negative: u32,
    /// Mean metric delta across all episodes containing the action
    pub avg_delta: f64,
}

/// Append-only store of episodes with a tag index.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EpisodicStore {
    episodes: Vec<Episode>,
    by_tag: HashMap<String, Vec<usize>>,
}

impl EpisodicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an episode and index it by tag.
    pub fn record(&mut self, episode: Episode) {
        let idx = self.episodes.len();
        for tag in &episode.tags {
            self.by_tag.entry(tag.clone()).or_default().push(idx);
        }
        self.episodes.push(episode);
    }

    pub fn by_tag(&self, tag: &str) -> Vec<&Episode> {
        self.by_tag
            .get(tag)
            .map(|indexes| indexes.iter().map(|&i| &self.episodes[i]).collect())
            .unwrap_or_default()
    }

    pub fn by_significance(&self, significance: Significance) -> Vec<&Episode> {
        self.episodes
            .iter()
            .filter(|e| e.significance == significance)
            .collect()
    }

    /// Episodes with positive significance.
    pub fn successful(&self) -> Vec<&Episode> {
        self.episodes
            .iter()
            .filter(|e| e.significance.is_positive())
            .collect()
    }

    /// Episodes with negative significance.
    pub fn failed(&self) -> Vec<&Episode> {
        self.episodes
            .iter()
            .filter(|e| e.significance.is_negative())
            .collect()
    }

    /// Fraction of recorded episodes with positive significance.
    pub fn success_rate(&self) -> f64 {
        if self.episodes.is_empty() {
            return 0.0;
        }
        self.successful().len() as f64 / self.episodes.len() as f64
    }

    /// Aggregate which actions co-occur with positive vs negative
    /// outcomes, with the mean metric delta per action. Sorted by how
    /// often the action appears, most frequent first.
    pub fn extract_lessons(&self) -> Vec<ActionLesson> {
        struct Tally {
            positive: u32,
            negative: u32,
            delta_sum: f64,
            delta_count: u32,
        }

        let mut tallies: HashMap<String, Tally> = HashMap::new();
        for episode in &self.episodes {
            let episode_delta: Vec<f64> = episode.metrics.iter().map(|m| m.delta()).collect();
            for action in &episode.actions {
                let tally = tallies.entry(action.clone()).or_insert(Tally {
                    positive: 0,
                    negative: 0,
                    delta_sum: 0.0,
                    delta_count: 0,
                });
                if episode.significance.is_positive() {
                    tally.positive += 1;
                } else if episode.significance.is_negative() {
                    tally.negative += 1;
                }
                for delta in &episode_delta {
                    tally.delta_sum += delta;
                    tally.delta_count += 1;
                }
            }
        }

        let mut lessons: Vec<ActionLesson> = tallies
            .into_iter()
            .map(|(action, t)| ActionLesson {
                action,
                positive: t.positive,
                negative: t.negative,
                avg_delta: if t.delta_count == 0 {
                    0.0
                } else {
                    t.delta_sum / t.delta_count as f64
                },
            })
            .collect();
        lessons.sort_by(|a, b| {
            (b.positive + b.negative)
                .cmp(&(a.positive + a.negative))
                .then_with(|| a.action.cmp(&b.action))
        });
        lessons
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EpisodeBuilder;
    use approx::assert_relative_eq;

    fn episode(action: &str, significance: Significance, tag: &str, delta: f64) -> Episode {
        EpisodeBuilder::new("test context")
            .action(action)
            .significance(significance)
            .metric("fps", 50.0, 50.0 + delta)
            .tag(tag)
            .build()
    }

    #[test]
    fn test_record_and_query_by_tag() {
        let mut store = EpisodicStore::new();
        store.record(episode("disableVSync", Significance::Positive, "gaming", 10.0));
        store.record(episode("lowerBitrate", Significance::Neutral, "streaming", 0.0));

        assert_eq!(store.by_tag("gaming").len(), 1);
        assert_eq!(store.by_tag("streaming").len(), 1);
        assert!(store.by_tag("development").is_empty());
    }

    #[test]
    fn test_successful_and_failed_partitions() {
        let mut store = EpisodicStore::new();
        store.record(episode("a", Significance::VeryPositive, "g", 5.0));
        store.record(episode("b", Significance::Negative, "g", -5.0));
        store.record(episode("c", Significance::Neutral, "g", 0.0));

        assert_eq!(store.successful().len(), 1);
        assert_eq!(store.failed().len(), 1);
        assert_eq!(store.by_significance(Significance::Neutral).len(), 1);
        assert_relative_eq!(store.success_rate(), 1.0 / 3.0);
    }

    #[test]
    fn test_success_rate_empty_store() {
        let store = EpisodicStore::new();
        assert_eq!(store.success_rate(), 0.0);
    }

    #[test]
    fn test_extract_lessons_aggregates_per_action() {
        let mut store = EpisodicStore::new();
        store.record(episode("disableVSync", Significance::Positive, "gaming", 12.0));
        store.record(episode("disableVSync", Significance::VeryPositive, "gaming", 18.0));
        store.record(episode("disableVSync", Significance::Negative, "gaming", -3.0));
        store.record(episode("lowerBitrate", Significance::Positive, "streaming", 2.0));

        let lessons = store.extract_lessons();
        assert_eq!(lessons[0].action, "disableVSync");
        assert_eq!(lessons[0].positive, 2);
        assert_eq!(lessons[0].negative, 1);
        assert_relative_eq!(lessons[0].avg_delta, 9.0);

        assert_eq!(lessons[1].action, "lowerBitrate");
        assert_eq!(lessons[1].positive, 1);
    }

    #[test]
    fn test_lessons_empty_store() {
        let store = EpisodicStore::new();
        assert!(store.extract_lessons().is_empty());
    }
}
