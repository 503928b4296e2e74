//! Campaign brief: the immutable description of what a sponsor wants.

use serde::{Deserialize, Serialize};

use crate::error::{CampaignError, CampaignResult};

/// Descriptions shorter than this produce a validation warning.
const MIN_DESCRIPTION_CHARS: usize = 50;
/// Audience descriptions shorter than this produce a validation warning.
const MIN_AUDIENCE_CHARS: usize = 20;

fn default_creator_count() -> u32 {
    3
}

fn default_timeline_days() -> u32 {
    30
}

/// Structured campaign brief.
///
/// Created once when a workflow starts and shared read-only (`Arc`) with
/// every phase and negotiation of that workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignBrief {
    /// Campaign identifier.
    pub id: String,
    pub brand_name: String,
    pub product_name: String,
    #[serde(default)]
    pub product_description: String,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub campaign_goal: String,
    /// Content niche used for discovery (e.g. "fitness").
    pub niche: String,
    /// Total spend available for creator fees.
    pub total_budget: f64,
    /// Number of confirmed creators the sponsor wants.
    #[serde(default = "default_creator_count")]
    pub desired_creator_count: u32,
    /// Campaign run length in days.
    #[serde(default = "default_timeline_days")]
    pub timeline_days: u32,
}

impl CampaignBrief {
    /// Create a brief with the required fields; the rest take defaults.
    pub fn new(
        id: impl Into<String>,
        brand_name: impl Into<String>,
        product_name: impl Into<String>,
        niche: impl Into<String>,
        total_budget: f64,
    ) -> Self {
        Self {
            id: id.into(),
            brand_name: brand_name.into(),
            product_name: product_name.into(),
            product_description: String::new(),
            target_audience: String::new(),
            campaign_goal: String::new(),
            niche: niche.into(),
            total_budget,
            desired_creator_count: default_creator_count(),
            timeline_days: default_timeline_days(),
        }
    }

    pub fn with_desired_creator_count(mut self, count: u32) -> Self {
        self.desired_creator_count = count;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.product_description = description.into();
        self
    }

    pub fn with_target_audience(mut self, audience: impl Into<String>) -> Self {
        self.target_audience = audience.into();
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.campaign_goal = goal.into();
        self
    }

    pub fn with_timeline_days(mut self, days: u32) -> Self {
        self.timeline_days = days;
        self
    }

    /// Validate the brief.
    ///
    /// Returns soft warnings on success. Budget problems and missing
    /// required fields are hard errors.
    pub fn validate(&self, min_budget: f64) -> CampaignResult<Vec<String>> {
        if !self.total_budget.is_finite() || self.total_budget <= 0.0 {
            return Err(CampaignError::invalid_brief(format!(
                "total budget must be a positive amount, got {}",
                self.total_budget
            )));
        }
        if self.total_budget < min_budget {
            return Err(CampaignError::budget_infeasible(
                self.total_budget,
                format!("below minimum campaign budget of {min_budget:.2}"),
            ));
        }
        if self.desired_creator_count == 0 {
            return Err(CampaignError::invalid_brief(
                "desired creator count must be at least 1",
            ));
        }
        if self.niche.trim().is_empty() {
            return Err(CampaignError::invalid_brief("niche is required"));
        }

        let mut warnings = Vec::new();
        if self.product_description.trim().chars().count() < MIN_DESCRIPTION_CHARS {
            warnings.push(format!(
                "product description is shorter than {MIN_DESCRIPTION_CHARS} characters"
            ));
        }
        if self.target_audience.trim().chars().count() < MIN_AUDIENCE_CHARS {
            warnings.push(format!(
                "target audience is shorter than {MIN_AUDIENCE_CHARS} characters"
            ));
        }
        Ok(warnings)
    }
}
