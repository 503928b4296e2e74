//! Workflow configuration
//!
//! Layering: `Default` values, then an optional TOML document, then
//! `CAMPAIGN_*` environment overrides. Durations are stored as fractional
//! seconds so both production values (hours) and test values
//! (milliseconds) fit the same field.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::budget::SelectionStrategy;
use crate::negotiation::MAX_FOLLOW_UPS;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse workflow config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid workflow config: {0}")]
    Invalid(String),
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

/// Thresholds that send a call outcome to human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewThresholds {
    /// Analyses below this confidence are reviewed.
    pub min_confidence: f64,
    /// More objections than this are reviewed.
    pub max_objections: usize,
    /// Negotiated rates above this are reviewed.
    pub high_value_rate: f64,
}

impl Default for ReviewThresholds {
    fn default() -> Self {
        Self {
            min_confidence: 0.85,
            max_objections: 2,
            high_value_rate: 5_000.0,
        }
    }
}

/// Per-negotiation timing, pricing and review settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    pub call_timeout_secs: f64,
    pub human_review_timeout_secs: f64,
    pub sponsor_approval_timeout_secs: f64,
    pub max_follow_ups: u32,
    /// Opening offer as a multiple of the estimated rate.
    pub initial_offer_multiplier: f64,
    /// Highest offer as a multiple of the estimated rate.
    pub max_offer_multiplier: f64,
    pub review: ReviewThresholds,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: 300.0,
            human_review_timeout_secs: 24.0 * 3600.0,
            sponsor_approval_timeout_secs: 48.0 * 3600.0,
            max_follow_ups: 3,
            initial_offer_multiplier: 0.95,
            max_offer_multiplier: 1.25,
            review: ReviewThresholds::default(),
        }
    }
}

impl NegotiationConfig {
    pub fn call_timeout(&self) -> Duration {
        secs(self.call_timeout_secs)
    }

    pub fn human_review_timeout(&self) -> Duration {
        secs(self.human_review_timeout_secs)
    }

    pub fn sponsor_approval_timeout(&self) -> Duration {
        secs(self.sponsor_approval_timeout_secs)
    }
}

/// Thresholds for the default stop-early policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Evaluate after every N terminal negotiations.
    pub evaluate_every: u32,
    /// Success rate below which the approach is adjusted.
    pub min_success_rate: f64,
    /// Attempts required before the success rate is trusted.
    pub min_attempts_before_adjust: u32,
    /// Max-offer multiplier applied on adjustment.
    pub adjusted_max_offer_multiplier: f64,
    /// Remaining budget (fraction of total) at which outreach stops.
    pub stop_below_budget_fraction: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            evaluate_every: 2,
            min_success_rate: 0.25,
            min_attempts_before_adjust: 4,
            adjusted_max_offer_multiplier: 1.35,
            stop_below_budget_fraction: 0.05,
        }
    }
}

/// Top-level workflow configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub strategy: SelectionStrategy,
    /// Upper bound on primary candidates (None or 0 = strategy decides).
    pub max_candidates: Option<usize>,
    /// Briefs below this budget are rejected.
    pub min_budget: f64,
    /// Send generated contracts without waiting for a manual step.
    pub auto_dispatch_contracts: bool,
    pub approval_sweep_interval_secs: f64,
    pub negotiation: NegotiationConfig,
    pub policy: PolicyConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::default(),
            max_candidates: None,
            min_budget: 500.0,
            auto_dispatch_contracts: true,
            approval_sweep_interval_secs: 60.0,
            negotiation: NegotiationConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl WorkflowConfig {
    /// Parse a TOML document; missing keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with process environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply `CAMPAIGN_*` overrides from `lookup`. Unparseable values are
    /// ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_f64 = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());

        if let Some(strategy) = lookup("CAMPAIGN_STRATEGY").and_then(|v| v.parse().ok()) {
            self.strategy = strategy;
        }
        if let Some(max) = lookup("CAMPAIGN_MAX_CANDIDATES").and_then(|v| v.trim().parse().ok()) {
            self.max_candidates = Some(max);
        }
        if let Some(v) = parse_f64("CAMPAIGN_MIN_BUDGET") {
            self.min_budget = v;
        }
        if let Some(val) = lookup("CAMPAIGN_AUTO_DISPATCH_CONTRACTS") {
            self.auto_dispatch_contracts = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Some(v) = parse_f64("CAMPAIGN_CALL_TIMEOUT_SECS") {
            self.negotiation.call_timeout_secs = v;
        }
        if let Some(v) = parse_f64("CAMPAIGN_HUMAN_REVIEW_TIMEOUT_SECS") {
            self.negotiation.human_review_timeout_secs = v;
        }
        if let Some(v) = parse_f64("CAMPAIGN_SPONSOR_APPROVAL_TIMEOUT_SECS") {
            self.negotiation.sponsor_approval_timeout_secs = v;
        }
        if let Some(v) = parse_f64("CAMPAIGN_AUTO_APPROVE_THRESHOLD") {
            self.negotiation.review.min_confidence = v.clamp(0.0, 1.0);
        }
    }

    /// Reject values that would make the engine misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = &self.negotiation;
        if n.initial_offer_multiplier <= 0.0 || n.max_offer_multiplier < n.initial_offer_multiplier
        {
            return Err(ConfigError::Invalid(format!(
                "offer multipliers must satisfy 0 < initial ({}) <= max ({})",
                n.initial_offer_multiplier, n.max_offer_multiplier
            )));
        }
        if n.max_follow_ups > MAX_FOLLOW_UPS {
            return Err(ConfigError::Invalid(format!(
                "negotiation.max_follow_ups must be at most {MAX_FOLLOW_UPS}, got {}",
                n.max_follow_ups
            )));
        }
        if !(0.0..=1.0).contains(&n.review.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "review.min_confidence must be within 0..=1, got {}",
                n.review.min_confidence
            )));
        }
        if self.approval_sweep_interval_secs <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "approval_sweep_interval_secs must be positive, got {}",
                self.approval_sweep_interval_secs
            )));
        }
        if self.policy.evaluate_every == 0 {
            return Err(ConfigError::Invalid(
                "policy.evaluate_every must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn approval_sweep_interval(&self) -> Duration {
        secs(self.approval_sweep_interval_secs)
    }
}
