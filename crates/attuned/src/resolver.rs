//! Conflict resolver - competing demands in, one execution plan out.
//!
//! Pure and side-effect-free: feed it synthetic recommendation and
//! requirement sets and assert on the plan. The orchestrator calls it
//! once per cycle with the collected recommendations.
//!
//! Admission first: a recommendation survives when it is flagged
//! auto-apply or its confidence clears the floor. Then each resource
//! dimension is allocated sequentially in priority order, capped per
//! unit, with declared conflicts resolved against the lower-priority
//! side down to a minimum-viable floor.

use serde::{Deserialize, Serialize};

use attune_common::{Recommendation, ResourceKind, ResourceRequirements};

/// One unit's bid for the cycle.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub unit: String,
    pub domain: String,
    pub requirements: ResourceRequirements,
    pub recommendation: Recommendation,
}

/// Knobs the resolver honors. Mirrors the daemon configuration.
#[derive(Debug, Clone, Copy)]
pub struct ResolverPolicy {
    pub admission_floor: f64,
    /// Per-unit share ceiling on a contended dimension
    pub ceiling: f64,
    /// Conflicting units are never reduced below this share
    pub min_viable_share: f64,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            admission_floor: 0.6,
            ceiling: 0.30,
            min_viable_share: 0.05,
        }
    }
}

/// Planned work for one admitted unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    pub unit: String,
    /// Actions in execution order
    pub actions: Vec<String>,
    /// Granted share per contended dimension
    pub allocations: Vec<(ResourceKind, f64)>,
}

impl PlanEntry {
    pub fn allocation(&self, kind: ResourceKind) -> Option<f64> {
        self.allocations
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, share)| *share)
    }
}

/// The resolver's output. Entry order is the serialization order for
/// apply calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub entries: Vec<PlanEntry>,
    /// Units whose recommendation was recorded but not applied
    pub deferred: Vec<String>,
}

impl ExecutionPlan {
    pub fn entry(&self, unit: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.unit == unit)
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.entry(unit).is_some()
    }
}

/// Resolve a cycle's candidate set into an execution plan.
pub fn resolve(candidates: &[Candidate], policy: &ResolverPolicy) -> ExecutionPlan {
    let mut plan = ExecutionPlan::default();

    // Admission. Candidates with no actions have nothing to execute and
    // are dropped outright.
    let mut admitted: Vec<usize> = Vec::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        let rec = &candidate.recommendation;
        if rec.actions.is_empty() {
            continue;
        }
        if rec.auto_apply || rec.confidence >= policy.admission_floor {
            admitted.push(idx);
        } else {
            plan.deferred.push(candidate.unit.clone());
        }
    }

    // Sequential allocation per dimension, priority descending. The
    // stable sort keeps declaration order for equal priorities.
    let mut allocations: Vec<Vec<(ResourceKind, f64)>> = vec![Vec::new(); candidates.len()];
    for kind in ResourceKind::ALL {
        let demanders: Vec<usize> = admitted
            .iter()
            .copied()
            .filter(|&i| candidates[i].requirements.demand(kind) > 0.0)
            .collect();
        if demanders.is_empty() {
            continue;
        }

        let total_demand: f64 = demanders
            .iter()
            .map(|&i| candidates[i].requirements.demand(kind))
            .sum();
        let sole = demanders.len() == 1;

        let mut order = demanders;
        order.sort_by(|&a, &b| {
            candidates[b]
                .requirements
                .priority
                .partial_cmp(&candidates[a].requirements.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut remaining = 1.0_f64;
        let mut served: Vec<usize> = Vec::new();
        for idx in order {
            let demand = candidates[idx].requirements.demand(kind);
            let cap = if sole { demand } else { demand.min(policy.ceiling) };
            let mut grant = cap.min(remaining);

            // Oversubscribed dimension with a declared conflict: the
            // lower-priority side is reduced, but never below the
            // minimum-viable floor.
            if total_demand > 1.0 && grant < policy.min_viable_share {
                let conflicting = served.iter().any(|&winner| {
                    in_conflict(&candidates[idx], &candidates[winner])
                });
                if conflicting {
                    grant = policy.min_viable_share.min(cap);
                }
            }

            if grant > 0.0 {
                allocations[idx].push((kind, grant));
                remaining = (remaining - grant).max(0.0);
            }
            served.push(idx);
        }
    }

    // Units that demanded resources and got nothing anywhere are the
    // infeasible remainder; dropping them is policy, not an error.
    let mut survivors: Vec<usize> = Vec::new();
    for idx in admitted {
        let demanded_any = ResourceKind::ALL
            .iter()
            .any(|&k| candidates[idx].requirements.demand(k) > 0.0);
        if demanded_any && allocations[idx].is_empty() {
            plan.deferred.push(candidates[idx].unit.clone());
        } else {
            survivors.push(idx);
        }
    }

    survivors.sort_by(|&a, &b| {
        candidates[b]
            .requirements
            .priority
            .partial_cmp(&candidates[a].requirements.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    plan.entries = survivors
        .into_iter()
        .map(|idx| PlanEntry {
            unit: candidates[idx].unit.clone(),
            actions: candidates[idx].recommendation.actions.clone(),
            allocations: std::mem::take(&mut allocations[idx]),
        })
        .collect();
    plan
}

fn in_conflict(a: &Candidate, b: &Candidate) -> bool {
    a.requirements.conflicts_with.contains(&b.domain)
        || b.requirements.conflicts_with.contains(&a.domain)
}
