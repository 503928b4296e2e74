//! Pure scoring heuristics used by pool selection.

use crate::budget::SelectionStrategy;
use crate::models::{Candidate, CreatorTier};

/// Fallback average rate for macro creators when none were discovered.
pub const DEFAULT_MACRO_RATE: f64 = 5_000.0;
/// Fallback average rate for micro creators when none were discovered.
pub const DEFAULT_MICRO_RATE: f64 = 3_000.0;
/// Engagement rate (percent) above which a creator counts as high-engagement.
pub const HIGH_ENGAGEMENT_RATE: f64 = 5.0;
/// Hard bounds on how many primaries a campaign contacts.
pub const MIN_OPTIMAL_COUNT: usize = 1;
pub const MAX_OPTIMAL_COUNT: usize = 6;

/// Engagement contribution, capped at 0.2.
pub fn engagement_bonus(engagement_rate: f64) -> f64 {
    (engagement_rate / 10.0).clamp(0.0, 0.2)
}

/// How comfortably a third of the budget covers this rate, 0.0–1.0.
pub fn budget_efficiency(total_budget: f64, estimated_rate: f64) -> f64 {
    if estimated_rate <= 0.0 {
        return 1.0;
    }
    ((total_budget / 3.0) / estimated_rate).clamp(0.0, 1.0)
}

pub fn tier_adjustment(tier: CreatorTier) -> f64 {
    match tier {
        CreatorTier::Micro => 0.05,
        CreatorTier::Macro => 0.0,
        CreatorTier::Mega => -0.05,
    }
}

/// Budget-aware match score, clamped to `[0, 1]`.
pub fn enhanced_score(candidate: &Candidate, total_budget: f64) -> f64 {
    let score = candidate.similarity
        + engagement_bonus(candidate.engagement_rate)
        + budget_efficiency(total_budget, candidate.estimated_rate) * 0.15
        + tier_adjustment(candidate.tier);
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Mean estimated rate of candidates in `tier`, if any.
pub fn average_rate(candidates: &[Candidate], tier: CreatorTier) -> Option<f64> {
    let rates: Vec<f64> = candidates
        .iter()
        .filter(|c| c.tier == tier)
        .map(|c| c.estimated_rate)
        .collect();
    if rates.is_empty() {
        None
    } else {
        Some(rates.iter().sum::<f64>() / rates.len() as f64)
    }
}

/// `floor(value)` clamped into `[min, max]`; non-finite values map to `max`.
fn floor_clamped(value: f64, min: usize, max: usize) -> usize {
    if !value.is_finite() {
        return max;
    }
    (value.floor().max(0.0) as usize).clamp(min, max)
}

/// Number of primary candidates to select for this budget and strategy.
///
/// `candidates` should already be ranked. The strategy-specific count is
/// bounded to `[1, 6]`, then capped by `max_candidates` (zero means no cap)
/// and by the number of candidates available.
pub fn optimal_count(
    total_budget: f64,
    candidates: &[Candidate],
    strategy: SelectionStrategy,
    max_candidates: Option<usize>,
) -> usize {
    if candidates.is_empty() {
        return 0;
    }

    let raw = match strategy {
        SelectionStrategy::PremiumQuality => {
            let target = average_rate(candidates, CreatorTier::Macro)
                .filter(|r| *r > 0.0)
                .unwrap_or(DEFAULT_MACRO_RATE);
            floor_clamped(total_budget * 0.8 / target, 1, 3)
        }
        SelectionStrategy::ReachMaximized => {
            let target = average_rate(candidates, CreatorTier::Micro)
                .filter(|r| *r > 0.0)
                .unwrap_or(DEFAULT_MICRO_RATE);
            floor_clamped(total_budget * 0.7 / target, 2, 6)
        }
        SelectionStrategy::EngagementFocused => {
            let high: Vec<f64> = candidates
                .iter()
                .filter(|c| c.engagement_rate > HIGH_ENGAGEMENT_RATE)
                .take(5)
                .map(|c| c.estimated_rate)
                .collect();
            if high.is_empty() {
                3
            } else {
                let avg = high.iter().sum::<f64>() / high.len() as f64;
                if avg > 0.0 {
                    floor_clamped(total_budget * 0.75 / avg, 1, 4)
                } else {
                    4
                }
            }
        }
        SelectionStrategy::Diversified => floor_clamped(total_budget / 4_000.0, 2, 4),
        SelectionStrategy::BudgetOptimized => {
            if total_budget < 5_000.0 {
                1
            } else if total_budget < 15_000.0 {
                let ceiling = total_budget / 3.0;
                candidates
                    .iter()
                    .filter(|c| c.estimated_rate < ceiling)
                    .count()
                    .min(3)
            } else {
                let ceiling = total_budget / 4.0;
                candidates
                    .iter()
                    .filter(|c| c.estimated_rate < ceiling)
                    .count()
                    .min(4)
            }
        }
    };

    let mut count = raw.clamp(MIN_OPTIMAL_COUNT, MAX_OPTIMAL_COUNT);
    if let Some(max) = max_candidates.filter(|m| *m > 0) {
        count = count.min(max);
    }
    count.min(candidates.len())
}
