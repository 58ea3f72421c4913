//! Recycler output types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ids::BrowserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecycleReason {
    Age,
    UseCount,
    Memory,
    Cpu,
    Unresponsive,
    PageLeak,
    ErrorRate,
    ForcedByScaler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Urgency mapping: >=90 critical, >=80 high, >=70 medium, else low
    /// (scores below the recycling threshold never reach this function in
    /// practice).
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=100 => Urgency::Critical,
            80..=89 => Urgency::High,
            70..=79 => Urgency::Medium,
            _ => Urgency::Low,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecyclingCandidate {
    pub browser_id: BrowserId,
    /// Composite score in [0, 100].
    pub score: u8,
    pub reasons: BTreeSet<RecycleReason>,
    pub urgency: Urgency,
    pub last_used_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecyclingEvent {
    pub browser_id: BrowserId,
    pub urgency: Urgency,
    pub reasons: BTreeSet<RecycleReason>,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_boundaries_match_spec_thresholds() {
        assert_eq!(Urgency::from_score(100), Urgency::Critical);
        assert_eq!(Urgency::from_score(90), Urgency::Critical);
        assert_eq!(Urgency::from_score(89), Urgency::High);
        assert_eq!(Urgency::from_score(80), Urgency::High);
        assert_eq!(Urgency::from_score(79), Urgency::Medium);
        assert_eq!(Urgency::from_score(70), Urgency::Medium);
        assert_eq!(Urgency::from_score(69), Urgency::Low);
        assert_eq!(Urgency::from_score(0), Urgency::Low);
    }
}
