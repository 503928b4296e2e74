//! Candidate pool selector: deterministic budget-constrained selection.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::candidate_pool::CandidatePool;
use super::scoring::{enhanced_score, optimal_count};
use crate::budget::{BudgetAllocation, BudgetAllocator, SelectionStrategy};
use crate::models::{Candidate, CreatorTier};

/// Primary candidates may cost up to this multiple of the per-candidate budget.
pub const PRIMARY_RATE_TOLERANCE: f64 = 1.2;
/// Reserve candidates may cost up to this multiple of the reserve share.
pub const RESERVE_RATE_TOLERANCE: f64 = 1.3;
pub const MAX_RESERVE: usize = 8;
pub const MAX_BACKUP: usize = 10;
/// Number of reserves included in the overdraw check.
const RESERVE_VALIDATION_DEPTH: usize = 3;
/// Absorbs multiplication error so a rate of exactly `budget × tolerance`
/// stays inside the ceiling.
const RATE_EPSILON: f64 = 1e-6;

/// Result of a selection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSelection {
    pub pool: CandidatePool,
    pub allocation: BudgetAllocation,
    pub optimal_count: usize,
}

/// Whether `rate` fits within `budget × tolerance` (inclusive).
pub fn within_ceiling(rate: f64, budget: f64, tolerance: f64) -> bool {
    rate <= budget * tolerance + RATE_EPSILON
}

fn by_score_desc(a: &Candidate, b: &Candidate) -> Ordering {
    b.match_score.total_cmp(&a.match_score)
}

/// Dedupe by id (first occurrence wins), compute budget-aware scores and
/// sort by score, highest first. Ties keep discovery order.
pub fn rank_candidates(candidates: Vec<Candidate>, total_budget: f64) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .map(|mut c| {
            c.match_score = enhanced_score(&c, total_budget);
            c
        })
        .collect();
    ranked.sort_by(by_score_desc);
    ranked
}

/// Pick `count` primaries from ranked candidates.
pub fn select_primary(
    ranked: &[Candidate],
    count: usize,
    per_candidate_budget: f64,
    strategy: SelectionStrategy,
) -> Vec<Candidate> {
    if count == 0 {
        return Vec::new();
    }

    let mut affordable: Vec<Candidate> = ranked
        .iter()
        .filter(|c| within_ceiling(c.estimated_rate, per_candidate_budget, PRIMARY_RATE_TOLERANCE))
        .cloned()
        .collect();

    match strategy {
        SelectionStrategy::PremiumQuality => affordable.sort_by(|a, b| {
            (b.tier == CreatorTier::Macro)
                .cmp(&(a.tier == CreatorTier::Macro))
                .then_with(|| by_score_desc(a, b))
        }),
        SelectionStrategy::EngagementFocused => affordable.sort_by(|a, b| {
            b.engagement_rate
                .total_cmp(&a.engagement_rate)
                .then_with(|| by_score_desc(a, b))
        }),
        SelectionStrategy::Diversified => return round_robin_by_tier(affordable, count),
        SelectionStrategy::BudgetOptimized | SelectionStrategy::ReachMaximized => {}
    }

    affordable.truncate(count);
    affordable
}

/// Alternate micro → macro → mega, each tier in score order.
fn round_robin_by_tier(affordable: Vec<Candidate>, count: usize) -> Vec<Candidate> {
    let mut groups: Vec<std::collections::VecDeque<Candidate>> = CreatorTier::all()
        .iter()
        .map(|tier| {
            affordable
                .iter()
                .filter(|c| c.tier == *tier)
                .cloned()
                .collect()
        })
        .collect();

    let mut selected = Vec::with_capacity(count);
    while selected.len() < count && groups.iter().any(|g| !g.is_empty()) {
        for group in groups.iter_mut() {
            if selected.len() == count {
                break;
            }
            if let Some(c) = group.pop_front() {
                selected.push(c);
            }
        }
    }
    selected
}

/// Pick up to [`MAX_RESERVE`] reserves from the candidates left after
/// primary selection.
pub fn select_reserve(remaining: &[Candidate], reserve_allocation: f64) -> Vec<Candidate> {
    let slots = remaining.len().min(MAX_RESERVE).max(1);
    let per_reserve = reserve_allocation / slots as f64;
    remaining
        .iter()
        .filter(|c| within_ceiling(c.estimated_rate, per_reserve, RESERVE_RATE_TOLERANCE))
        .take(MAX_RESERVE)
        .cloned()
        .collect()
}

/// Budget-constrained selector for one strategy.
#[derive(Debug, Clone)]
pub struct CandidatePoolSelector {
    strategy: SelectionStrategy,
    max_candidates: Option<usize>,
}

impl CandidatePoolSelector {
    pub fn new(strategy: SelectionStrategy) -> Self {
        Self {
            strategy,
            max_candidates: None,
        }
    }

    pub fn with_max_candidates(mut self, max: Option<usize>) -> Self {
        self.max_candidates = max;
        self
    }

    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    /// Build the primary/reserve/backup pool.
    ///
    /// Empty input yields an empty pool; deciding whether that is fatal is
    /// left to the caller.
    pub fn select(&self, candidates: Vec<Candidate>, total_budget: f64) -> PoolSelection {
        let allocation = BudgetAllocator::allocate(total_budget, self.strategy);
        let ranked = rank_candidates(candidates, total_budget);
        let count = optimal_count(total_budget, &ranked, self.strategy, self.max_candidates);

        let primary = select_primary(
            &ranked,
            count,
            allocation.per_candidate_budget(count),
            self.strategy,
        );
        let primary_ids: HashSet<&str> = primary.iter().map(|c| c.id.as_str()).collect();
        let remaining: Vec<Candidate> = ranked
            .iter()
            .filter(|c| !primary_ids.contains(c.id.as_str()))
            .cloned()
            .collect();

        let reserve = select_reserve(&remaining, allocation.reserve_allocation);
        let reserve_ids: HashSet<&str> = reserve.iter().map(|c| c.id.as_str()).collect();
        let backup: Vec<Candidate> = remaining
            .iter()
            .filter(|c| !reserve_ids.contains(c.id.as_str()))
            .take(MAX_BACKUP)
            .cloned()
            .collect();

        let mut pool = CandidatePool::new(primary, reserve, backup);
        let exposure: f64 = pool.primary.iter().map(|c| c.estimated_rate).sum::<f64>()
            + pool
                .reserve
                .iter()
                .take(RESERVE_VALIDATION_DEPTH)
                .map(|c| c.estimated_rate)
                .sum::<f64>();
        if exposure > total_budget {
            let message = format!(
                "primary plus top reserve rates ({exposure:.2}) exceed total budget ({total_budget:.2})"
            );
            warn!(strategy = %self.strategy, "{}", message);
            pool.warnings.push(message);
        }

        debug!(
            strategy = %self.strategy,
            optimal_count = count,
            primary = pool.primary.len(),
            reserve = pool.reserve.len(),
            backup = pool.backup.len(),
            "Candidate pool selected"
        );

        PoolSelection {
            pool,
            allocation,
            optimal_count: count,
        }
    }
}
