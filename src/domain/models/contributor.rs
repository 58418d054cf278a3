//! Contributor domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Score given to contributors without any resolved claims.
pub const NEUTRAL_TRUST: f64 = 0.5;

/// A platform user who has claimed at least one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub id: Uuid,
    /// Platform login (unique).
    pub login: String,
    /// Aggregate reliability in `[0.0, 1.0]`.
    pub trust_score: f64,
    /// How much history backs the score, in `[0.0, 1.0]`.
    pub confidence: f64,
    pub completed_claims: u32,
    pub abandoned_claims: u32,
    pub released_claims: u32,
    /// Mean time from claim to first activity, in seconds.
    pub avg_time_to_first_activity_secs: Option<i64>,
    pub scored_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Contributor {
    /// Create a contributor with the neutral prior score.
    pub fn new(login: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            login: login.into(),
            trust_score: NEUTRAL_TRUST,
            confidence: 0.0,
            completed_claims: 0,
            abandoned_claims: 0,
            released_claims: 0,
            avg_time_to_first_activity_secs: None,
            scored_at: None,
            created_at,
        }
    }

    pub fn total_claims(&self) -> u32 {
        self.completed_claims + self.abandoned_claims + self.released_claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_contributor_starts_neutral() {
        let c = Contributor::new("octocat", Utc::now());
        assert!((c.trust_score - NEUTRAL_TRUST).abs() < f64::EPSILON);
        assert!(c.confidence.abs() < f64::EPSILON);
        assert_eq!(c.total_claims(), 0);
        assert!(c.scored_at.is_none());
    }
}
