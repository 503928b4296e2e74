//! Campaign inputs: the immutable brief and discovered candidates.

pub mod brief;
pub mod candidate;

pub use brief::CampaignBrief;
pub use candidate::{Availability, Candidate, CreatorTier};
