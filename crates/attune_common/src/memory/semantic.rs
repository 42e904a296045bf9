//! Semantic memory - durable weighted facts.
//!
//! Facts are claims like "disableVSync improves fps". They carry a
//! synaptic weight (influence strength) and a confidence, both of which
//! move only through [`SemanticStore::reinforce`] and
//! [`SemanticStore::weaken`]. Facts are never deleted, only weakened
//! toward the floor. Forgetting is deliberately slower than learning so
//! that rarely-confirmed but still-true facts survive.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MemoryError;
use crate::types::SemanticFact;

/// Weight bounds
pub const WEIGHT_FLOOR: f64 = 0.1;
pub const WEIGHT_CEIL: f64 = 1.0;

/// Confidence bounds
pub const CONFIDENCE_FLOOR: f64 = 0.2;
pub const CONFIDENCE_CEIL: f64 = 1.0;

/// Reinforcement step sizes per unit of magnitude
pub const REINFORCE_WEIGHT_STEP: f64 = 0.05;
pub const REINFORCE_CONFIDENCE_STEP: f64 = 0.02;

/// Weakening steps are smaller than reinforcement steps
pub const WEAKEN_WEIGHT_STEP: f64 = 0.03;
pub const WEAKEN_CONFIDENCE_STEP: f64 = 0.01;

/// Initial values for a freshly synthesized fact
const INITIAL_WEIGHT: f64 = 0.5;
const INITIAL_CONFIDENCE: f64 = 0.5;

/// In-process store of semantic facts, indexed by statement and category.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SemanticStore {
    facts: HashMap<Uuid, SemanticFact>,
    by_statement: HashMap<String, Uuid>,
    by_category: HashMap<String, Vec<Uuid>>,
}

impl SemanticStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fact if its statement is new, otherwise return the
    /// existing id. New facts start at the initial weight/confidence.
    pub fn upsert(&mut self, statement: &str, category: &str) -> Uuid {
        if let Some(id) = self.by_statement.get(statement) {
            return *id;
        }

        let fact = SemanticFact {
            id: Uuid::new_v4(),
            statement: statement.to_string(),
            weight: INITIAL_WEIGHT,
            confidence: INITIAL_CONFIDENCE,
            reinforcement_count: 0,
            category: category.to_string(),
            related: Vec::new(),
        };
        let id = fact.id;
        self.by_statement.insert(statement.to_string(), id);
        self.by_category.entry(category.to_string()).or_default().push(id);
        self.facts.insert(id, fact);
        id
    }

    /// Raise a fact's weight and confidence. Magnitude scales the step
    /// sizes; both results are clamped to their bounds. A non-finite or
    /// negative magnitude is rejected and the fact is left untouched.
    pub fn reinforce(&mut self, id: Uuid, magnitude: f64) -> Result<(), MemoryError> {
        validate_magnitude(magnitude)?;
        let fact = self
            .facts
            .get_mut(&id)
            .ok_or_else(|| MemoryError::UnknownFact(id.to_string()))?;

        fact.weight =
            (fact.weight + REINFORCE_WEIGHT_STEP * magnitude).clamp(WEIGHT_FLOOR, WEIGHT_CEIL);
        fact.confidence = (fact.confidence + REINFORCE_CONFIDENCE_STEP * magnitude)
            .clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEIL);
        fact.reinforcement_count += 1;
        Ok(())
    }

    /// Mirror of [`reinforce`](Self::reinforce) with the smaller
    /// weakening steps. Never drops a fact below the floors.
    pub fn weaken(&mut self, id: Uuid, magnitude: f64) -> Result<(), MemoryError> {
        validate_magnitude(magnitude)?;
        let fact = self
            .facts
            .get_mut(&id)
            .ok_or_else(|| MemoryError::UnknownFact(id.to_string()))?;

        fact.weight =
            (fact.weight - WEAKEN_WEIGHT_STEP * magnitude).clamp(WEIGHT_FLOOR, WEIGHT_CEIL);
        fact.confidence = (fact.confidence - WEAKEN_CONFIDENCE_STEP * magnitude)
            .clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEIL);
        Ok(())
    }

    /// Record a relation between two facts. Ids are relations here, not
    /// owning pointers, so dangling entries are tolerated by readers.
    pub fn link(&mut self, id: Uuid, related: Uuid) -> Result<(), MemoryError> {
        let fact = self
            .facts
            .get_mut(&id)
            .ok_or_else(|| MemoryError::UnknownFact(id.to_string()))?;
        if !fact.related.contains(&related) {
            fact.related.push(related);
        }
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<&SemanticFact> {
        self.facts.get(&id)
    }

    pub fn find(&self, statement: &str) -> Option<&SemanticFact> {
        self.by_statement
            .get(statement)
            .and_then(|id| self.facts.get(id))
    }

    /// Ids of all facts in a category.
    pub fn ids_in_category(&self, category: &str) -> Vec<Uuid> {
        self.by_category.get(category).cloned().unwrap_or_default()
    }

    /// Strongest facts for a category, by weight * confidence.
    pub fn top_for_category(&self, category: &str, limit: usize) -> Vec<&SemanticFact> {
        let mut facts: Vec<&SemanticFact> = self
            .ids_in_category(category)
            .iter()
            .filter_map(|id| self.facts.get(id))
            .collect();
        facts.sort_by(|a, b| {
            let ka = a.weight * a.confidence;
            let kb = b.weight * b.confidence;
            kb.partial_cmp(&ka).unwrap_or(std::cmp::Ordering::Equal)
        });
        facts.truncate(limit);
        facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn average_weight(&self) -> f64 {
        if self.facts.is_empty() {
            return 0.0;
        }
        self.facts.values().map(|f| f.weight).sum::<f64>() / self.facts.len() as f64
    }
}

fn validate_magnitude(magnitude: f64) -> Result<(), MemoryError> {
    if !magnitude.is_finite() || magnitude < 0.0 {
        return Err(MemoryError::RejectedUpdate(format!(
            "magnitude {} is not a finite non-negative number",
            magnitude
        )));
    }
    Ok(())
}
