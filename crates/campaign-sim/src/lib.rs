//! Campaign dry-run simulator
//!
//! Runs the campaign workflow engine end to end against in-process
//! collaborators scripted by a JSON fixture:
//! - [`fixtures`]: brief, creators and per-creator scripts
//! - [`simulated`]: discovery, calls, outreach, contracts, persistence and
//!   an auto-approver that answers the approval gateway
//! - [`runner`]: wires one workflow through `WorkflowService`
//! - [`telemetry`]: run summaries (pretty JSON) and a JSONL telemetry log
//!
//! # Usage
//!
//! ```bash
//! campaign-sim --fixture crates/campaign-sim/fixtures/sample_campaign.json
//! CAMPAIGN_STRATEGY=premium_quality campaign-sim --fixture f.json --config sim.toml
//! ```

pub mod config;
pub mod fixtures;
pub mod runner;
pub mod simulated;
pub mod telemetry;

pub use config::{ApprovalRules, RunnerConfig};
pub use fixtures::{CampaignFixture, CandidateScript, FixtureError};
pub use runner::{run_dry_run, DryRunOutcome};
pub use telemetry::{NegotiationSummary, RunSummary};
