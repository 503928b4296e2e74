//! Budget allocation: splits a campaign budget into primary, reserve and
//! buffer tranches according to the selection strategy.

use serde::{Deserialize, Serialize};

/// How candidates are ranked and how the budget is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Most creators per dollar.
    #[default]
    BudgetOptimized,
    /// Many smaller creators for audience breadth.
    ReachMaximized,
    /// Highest engagement rates first.
    EngagementFocused,
    /// Spread across micro, macro and mega tiers.
    Diversified,
    /// Fewer, larger (macro) creators.
    PremiumQuality,
}

impl SelectionStrategy {
    /// `(primary, reserve, buffer)` fractions of the total budget.
    pub fn allocation_ratios(self) -> (f64, f64, f64) {
        match self {
            Self::PremiumQuality => (0.80, 0.15, 0.05),
            Self::ReachMaximized => (0.70, 0.25, 0.05),
            Self::Diversified => (0.75, 0.20, 0.05),
            Self::BudgetOptimized | Self::EngagementFocused => (0.75, 0.20, 0.05),
        }
    }
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BudgetOptimized => write!(f, "budget_optimized"),
            Self::ReachMaximized => write!(f, "reach_maximized"),
            Self::EngagementFocused => write!(f, "engagement_focused"),
            Self::Diversified => write!(f, "diversified"),
            Self::PremiumQuality => write!(f, "premium_quality"),
        }
    }
}

impl std::str::FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "budget_optimized" => Ok(Self::BudgetOptimized),
            "reach_maximized" => Ok(Self::ReachMaximized),
            "engagement_focused" => Ok(Self::EngagementFocused),
            "diversified" => Ok(Self::Diversified),
            "premium_quality" => Ok(Self::PremiumQuality),
            other => Err(format!("unknown selection strategy: {other}")),
        }
    }
}

/// A campaign budget split into tranches.
///
/// `primary_allocation + reserve_allocation + buffer_allocation == total`
/// within floating-point rounding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub total: f64,
    pub primary_allocation: f64,
    pub reserve_allocation: f64,
    pub buffer_allocation: f64,
}

impl BudgetAllocation {
    /// Ceiling used when filtering primary candidates.
    pub fn per_candidate_budget(&self, count: usize) -> f64 {
        if count == 0 {
            0.0
        } else {
            self.primary_allocation / count as f64
        }
    }

    /// Sum of the three tranches.
    pub fn allocated(&self) -> f64 {
        self.primary_allocation + self.reserve_allocation + self.buffer_allocation
    }
}

/// Stateless allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetAllocator;

impl BudgetAllocator {
    /// Split `total_budget` by the strategy's ratios.
    ///
    /// The buffer takes the remainder so the parts always add up to the
    /// total. Non-positive or non-finite budgets allocate nothing.
    pub fn allocate(total_budget: f64, strategy: SelectionStrategy) -> BudgetAllocation {
        if !total_budget.is_finite() || total_budget <= 0.0 {
            return BudgetAllocation {
                total: 0.0,
                primary_allocation: 0.0,
                reserve_allocation: 0.0,
                buffer_allocation: 0.0,
            };
        }

        let (primary, reserve, _) = strategy.allocation_ratios();
        let primary_allocation = total_budget * primary;
        let reserve_allocation = total_budget * reserve;
        BudgetAllocation {
            total: total_budget,
            primary_allocation,
            reserve_allocation,
            buffer_allocation: total_budget - primary_allocation - reserve_allocation,
        }
    }
}
