//! Discovered creators and their classification.

use serde::{Deserialize, Serialize};

/// Follower count at which a creator stops being micro-tier.
pub const MACRO_TIER_FOLLOWERS: u64 = 100_000;
/// Follower count at which a creator becomes mega-tier.
pub const MEGA_TIER_FOLLOWERS: u64 = 1_000_000;

/// Creator size classification by follower count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatorTier {
    /// Under 100k followers.
    Micro,
    /// 100k to 1M followers.
    Macro,
    /// 1M followers and up.
    Mega,
}

impl CreatorTier {
    /// Classify a creator by follower count.
    pub fn from_followers(followers: u64) -> Self {
        if followers < MACRO_TIER_FOLLOWERS {
            Self::Micro
        } else if followers < MEGA_TIER_FOLLOWERS {
            Self::Macro
        } else {
            Self::Mega
        }
    }

    /// All tiers, smallest first.
    pub fn all() -> [CreatorTier; 3] {
        [Self::Micro, Self::Macro, Self::Mega]
    }
}

impl std::fmt::Display for CreatorTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Micro => write!(f, "micro"),
            Self::Macro => write!(f, "macro"),
            Self::Mega => write!(f, "mega"),
        }
    }
}

/// Self-reported or inferred availability of a creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Excellent,
    #[default]
    Good,
    Limited,
    Busy,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::Limited => write!(f, "limited"),
            Self::Busy => write!(f, "busy"),
        }
    }
}

/// A creator eligible for outreach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub niche: String,
    #[serde(default)]
    pub platform: String,
    pub followers: u64,
    /// Engagement rate as a percentage (4.5 means 4.5%).
    pub engagement_rate: f64,
    pub tier: CreatorTier,
    /// Expected fee for one campaign placement.
    pub estimated_rate: f64,
    #[serde(default)]
    pub availability: Availability,
    /// Raw relevance from discovery, 0.0–1.0.
    #[serde(default)]
    pub similarity: f64,
    /// Budget-aware score computed during pool selection, 0.0–1.0.
    #[serde(default)]
    pub match_score: f64,
    /// Contact handle passed to outreach collaborators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

impl Candidate {
    /// Create a candidate; the tier is derived from `followers`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        followers: u64,
        engagement_rate: f64,
        estimated_rate: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            niche: String::new(),
            platform: String::new(),
            followers,
            engagement_rate,
            tier: CreatorTier::from_followers(followers),
            estimated_rate,
            availability: Availability::default(),
            similarity: 0.0,
            match_score: 0.0,
            contact: None,
        }
    }

    pub fn with_similarity(mut self, similarity: f64) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    pub fn with_niche(mut self, niche: impl Into<String>) -> Self {
        self.niche = niche.into();
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    /// Match score on the 0–100 reporting scale.
    pub fn match_score_percent(&self) -> f64 {
        (self.match_score * 100.0).clamp(0.0, 100.0)
    }
}
