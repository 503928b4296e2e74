//! Candidate pool: the three ordered contact tiers plus contact bookkeeping.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::Candidate;

/// Which tier of the pool a candidate was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolTier {
    Primary,
    Reserve,
    Backup,
}

impl std::fmt::Display for PoolTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Reserve => write!(f, "reserve"),
            Self::Backup => write!(f, "backup"),
        }
    }
}

/// Primary, reserve and backup candidates for one campaign.
///
/// A candidate id appears in at most one of the three sequences. Every id
/// handed out by [`CandidatePool::next_to_contact`] is recorded in
/// `contacted`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidatePool {
    pub primary: Vec<Candidate>,
    pub reserve: Vec<Candidate>,
    pub backup: Vec<Candidate>,
    /// Ids in the order they were contacted.
    pub contacted: Vec<String>,
    pub confirmed: BTreeSet<String>,
    pub declined: BTreeSet<String>,
    /// Non-fatal selection warnings (e.g. reserve overdraw risk).
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Per-tier counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStatus {
    pub total: usize,
    pub contacted: usize,
    pub available: usize,
}

/// Snapshot of pool usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub primary: TierStatus,
    pub reserve: TierStatus,
    pub backup: TierStatus,
    pub contacted: usize,
    pub confirmed: usize,
    pub declined: usize,
    /// Confirmed / contacted, 0.0 before any contact.
    pub success_rate: f64,
}

impl CandidatePool {
    pub fn new(primary: Vec<Candidate>, reserve: Vec<Candidate>, backup: Vec<Candidate>) -> Self {
        Self {
            primary,
            reserve,
            backup,
            ..Self::default()
        }
    }

    /// Total candidates across all tiers.
    pub fn len(&self) -> usize {
        self.primary.len() + self.reserve.len() + self.backup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tiers(&self) -> [(PoolTier, &Vec<Candidate>); 3] {
        [
            (PoolTier::Primary, &self.primary),
            (PoolTier::Reserve, &self.reserve),
            (PoolTier::Backup, &self.backup),
        ]
    }

    /// Tier holding `candidate_id`, if any.
    pub fn tier_of(&self, candidate_id: &str) -> Option<PoolTier> {
        self.tiers()
            .into_iter()
            .find(|(_, list)| list.iter().any(|c| c.id == candidate_id))
            .map(|(tier, _)| tier)
    }

    pub fn is_contacted(&self, candidate_id: &str) -> bool {
        self.contacted.iter().any(|id| id == candidate_id)
    }

    /// Next uncontacted candidate whose estimated rate fits `max_rate`,
    /// searching primary, then reserve, then backup. The returned candidate
    /// is marked contacted.
    pub fn next_to_contact(&mut self, max_rate: f64) -> Option<(PoolTier, Candidate)> {
        let next = self.tiers().into_iter().find_map(|(tier, list)| {
            list.iter()
                .find(|c| !self.is_contacted(&c.id) && c.estimated_rate <= max_rate)
                .map(|c| (tier, c.clone()))
        })?;
        self.contacted.push(next.1.id.clone());
        Some(next)
    }

    pub fn mark_confirmed(&mut self, candidate_id: &str) {
        self.declined.remove(candidate_id);
        self.confirmed.insert(candidate_id.to_string());
    }

    pub fn mark_declined(&mut self, candidate_id: &str) {
        self.confirmed.remove(candidate_id);
        self.declined.insert(candidate_id.to_string());
    }

    /// Whether the three tiers share no candidate id.
    pub fn is_disjoint(&self) -> bool {
        let mut seen = BTreeSet::new();
        self.primary
            .iter()
            .chain(&self.reserve)
            .chain(&self.backup)
            .all(|c| seen.insert(c.id.as_str()))
    }

    fn tier_status(&self, list: &[Candidate]) -> TierStatus {
        let contacted = list.iter().filter(|c| self.is_contacted(&c.id)).count();
        TierStatus {
            total: list.len(),
            contacted,
            available: list.len() - contacted,
        }
    }

    pub fn status(&self) -> PoolStatus {
        let contacted = self.contacted.len();
        PoolStatus {
            primary: self.tier_status(&self.primary),
            reserve: self.tier_status(&self.reserve),
            backup: self.tier_status(&self.backup),
            contacted,
            confirmed: self.confirmed.len(),
            declined: self.declined.len(),
            success_rate: if contacted == 0 {
                0.0
            } else {
                self.confirmed.len() as f64 / contacted as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(id: &str, rate: f64) -> Candidate {
        Candidate::new(id, id, 20_000, 3.0, rate)
    }

    fn sample_pool() -> CandidatePool {
        CandidatePool::new(
            vec![c("p1", 1_000.0), c("p2", 2_000.0)],
            vec![c("r1", 800.0)],
            vec![c("b1", 500.0)],
        )
    }

    #[test]
    fn test_contact_order_primary_reserve_backup() {
        let mut pool = sample_pool();
        let order: Vec<_> = std::iter::from_fn(|| pool.next_to_contact(f64::MAX))
            .map(|(tier, cand)| (tier, cand.id))
            .collect();
        assert_eq!(
            order,
            vec![
                (PoolTier::Primary, "p1".to_string()),
                (PoolTier::Primary, "p2".to_string()),
                (PoolTier::Reserve, "r1".to_string()),
                (PoolTier::Backup, "b1".to_string()),
            ]
        );
        assert_eq!(pool.contacted, vec!["p1", "p2", "r1", "b1"]);
        assert!(pool.next_to_contact(f64::MAX).is_none());
    }

    #[test]
    fn test_next_to_contact_skips_unaffordable() {
        let mut pool = sample_pool();
        let (_, first) = pool.next_to_contact(1_500.0).unwrap();
        assert_eq!(first.id, "p1");
        let (tier, second) = pool.next_to_contact(1_500.0).unwrap();
        assert_eq!(tier, PoolTier::Reserve);
        assert_eq!(second.id, "r1");
        // p2 was passed over, not contacted
        assert!(!pool.is_contacted("p2"));
    }

    #[test]
    fn test_status_counts() {
        let mut pool = sample_pool();
        pool.next_to_contact(f64::MAX);
        pool.next_to_contact(f64::MAX);
        pool.mark_confirmed("p1");
        pool.mark_declined("p2");

        let status = pool.status();
        assert_eq!(status.primary.total, 2);
        assert_eq!(status.primary.contacted, 2);
        assert_eq!(status.primary.available, 0);
        assert_eq!(status.reserve.available, 1);
        assert_eq!(status.confirmed, 1);
        assert_eq!(status.declined, 1);
        assert!((status.success_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_mark_is_exclusive() {
        let mut pool = sample_pool();
        pool.mark_declined("p1");
        pool.mark_confirmed("p1");
        assert!(pool.confirmed.contains("p1"));
        assert!(!pool.declined.contains("p1"));
    }

    #[test]
    fn test_disjoint_and_tier_lookup() {
        let mut pool = sample_pool();
        assert!(pool.is_disjoint());
        assert_eq!(pool.tier_of("r1"), Some(PoolTier::Reserve));
        assert_eq!(pool.tier_of("zz"), None);

        pool.backup.push(c("p1", 1_000.0));
        assert!(!pool.is_disjoint());
    }
}
