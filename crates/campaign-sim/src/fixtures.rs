//! Campaign fixtures: a brief, the creators discovery returns, and what
//! each creator will say when contacted.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use campaign_orchestration::{CallResult, CampaignBrief, Candidate, FollowUpResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to read fixture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse fixture: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid fixture: {0}")]
    Invalid(String),
}

/// Scripted behavior for one creator.
///
/// Anything left unset falls back to the availability-based defaults in
/// [`crate::simulated::ScriptedCallService`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateScript {
    /// Result returned when the call completes.
    pub call: Option<CallResult>,
    /// Make the call provider fail with this message.
    pub call_error: Option<String>,
    /// Answers to successive follow-ups; the last one repeats.
    pub follow_ups: Vec<FollowUpResult>,
    /// Make the final confirmation message fail.
    pub reject_confirmation: bool,
}

/// A complete dry-run scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignFixture {
    pub brief: CampaignBrief,
    pub candidates: Vec<Candidate>,
    /// Keyed by candidate id.
    #[serde(default)]
    pub scripts: HashMap<String, CandidateScript>,
}

impl CampaignFixture {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, FixtureError> {
        let fixture: Self = serde_json::from_str(content)?;
        fixture.validate()?;
        Ok(fixture)
    }

    /// Candidate ids must be unique and every script must name one.
    pub fn validate(&self) -> Result<(), FixtureError> {
        let mut seen = HashSet::new();
        for candidate in &self.candidates {
            if !seen.insert(candidate.id.as_str()) {
                return Err(FixtureError::Invalid(format!(
                    "duplicate candidate id {}",
                    candidate.id
                )));
            }
        }
        let mut unknown: Vec<&str> = self
            .scripts
            .keys()
            .map(String::as_str)
            .filter(|id| !seen.contains(id))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(FixtureError::Invalid(format!(
                "scripts for unknown candidates: {}",
                unknown.join(", ")
            )));
        }
        Ok(())
    }

    pub fn script(&self, candidate_id: &str) -> Option<&CandidateScript> {
        self.scripts.get(candidate_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_orchestration::CallOutcome;

    const MINIMAL: &str = r#"{
        "brief": {
            "id": "camp-7",
            "brand_name": "Acme",
            "product_name": "Kettle",
            "niche": "cooking",
            "total_budget": 8000.0
        },
        "candidates": [
            {"id": "c-1", "name": "Ana", "followers": 40000, "engagement_rate": 4.1,
             "tier": "micro", "estimated_rate": 900.0},
            {"id": "c-2", "name": "Ben", "followers": 250000, "engagement_rate": 2.4,
             "tier": "macro", "estimated_rate": 3500.0, "availability": "busy"}
        ],
        "scripts": {
            "c-1": {"call": {"conversation_id": "conv-1", "outcome": "accepted",
                             "confidence": 0.95, "negotiated_rate": 950.0}}
        }
    }"#;

    #[test]
    fn test_parse_minimal_fixture() {
        let fixture = CampaignFixture::from_json(MINIMAL).unwrap();
        assert_eq!(fixture.brief.desired_creator_count, 3);
        assert_eq!(fixture.candidates.len(), 2);

        let script = fixture.script("c-1").unwrap();
        let call = script.call.as_ref().unwrap();
        assert_eq!(call.outcome, CallOutcome::Accepted);
        assert_eq!(call.negotiated_rate, Some(950.0));
        assert!(script.follow_ups.is_empty());
        assert!(fixture.script("c-2").is_none());
    }

    #[test]
    fn test_duplicate_candidate_rejected() {
        let mut fixture = CampaignFixture::from_json(MINIMAL).unwrap();
        let dup = fixture.candidates[0].clone();
        fixture.candidates.push(dup);
        let err = fixture.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate candidate id c-1"));
    }

    #[test]
    fn test_script_for_unknown_candidate_rejected() {
        let mut fixture = CampaignFixture::from_json(MINIMAL).unwrap();
        fixture
            .scripts
            .insert("ghost".into(), CandidateScript::default());
        assert!(matches!(fixture.validate(), Err(FixtureError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CampaignFixture::load(Path::new("/nonexistent/fixture.json")).unwrap_err();
        assert!(matches!(err, FixtureError::Io { .. }));
    }
}
