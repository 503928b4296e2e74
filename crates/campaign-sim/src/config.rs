//! Dry-run configuration.
//!
//! A TOML file with a `[workflow]` table (the engine's own settings) plus
//! simulator-only `[approvals]` rules and output locations. Environment
//! overrides are applied after the file: `CAMPAIGN_*` for the workflow,
//! `SIM_*` for the simulator.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use campaign_orchestration::{HumanDecision, WorkflowConfig};
use serde::{Deserialize, Serialize};

/// How the simulated approver answers queued requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalRules {
    /// Answer given to every human review.
    pub human_decision: HumanDecision,
    /// Human reviews proposing more than this are rejected instead.
    pub human_reject_above: Option<f64>,
    /// Sponsor approves at or below this rate and rejects above it.
    /// `None` approves everything.
    pub sponsor_rate_ceiling: Option<f64>,
    /// Leave requests queued so they expire through the sweeper.
    pub leave_pending: bool,
}

impl Default for ApprovalRules {
    fn default() -> Self {
        Self {
            human_decision: HumanDecision::Approve,
            human_reject_above: None,
            sponsor_rate_ceiling: None,
            leave_pending: false,
        }
    }
}

/// Complete dry-run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub workflow: WorkflowConfig,
    pub approvals: ApprovalRules,
    /// Directory for the run summary and the telemetry log.
    pub output_dir: PathBuf,
    /// Simulated call latency in milliseconds.
    pub call_latency_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig::default(),
            approvals: ApprovalRules::default(),
            output_dir: std::env::var("SIM_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("sim-output")),
            call_latency_ms: 0,
        }
    }
}

impl RunnerConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::from_toml_str(&content)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
            .workflow
            .validate()
            .context("Workflow settings rejected after environment overrides")?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.workflow.validate()?;
        Ok(config)
    }

    /// Apply `CAMPAIGN_*` and `SIM_*` overrides from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.workflow.apply_env(&lookup);
        if let Some(dir) = lookup("SIM_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(ms) = lookup("SIM_CALL_LATENCY_MS").and_then(|v| v.trim().parse().ok()) {
            self.call_latency_ms = ms;
        }
        if let Some(ceiling) = lookup("SIM_SPONSOR_RATE_CEILING").and_then(|v| v.trim().parse().ok())
        {
            self.approvals.sponsor_rate_ceiling = Some(ceiling);
        }
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join("run-summary.json")
    }

    pub fn telemetry_path(&self) -> PathBuf {
        self.output_dir.join("campaign-telemetry.jsonl")
    }
}
