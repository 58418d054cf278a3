//! Contributor trust scoring.
//!
//! The score blends the completion ratio of resolved claims with how quickly
//! the contributor starts working after claiming, then pulls the result toward
//! a neutral prior until enough history exists.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Assignment, AssignmentState, ScoringConfig};
use crate::domain::ports::{AssignmentFilter, AssignmentRepository, Clock, ContributorFilter, ContributorRepository};

/// Result of scoring one contributor's history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
    pub trust_score: f64,
    pub confidence: f64,
    pub completed: u32,
    pub abandoned: u32,
    pub released: u32,
    pub avg_time_to_first_activity_secs: Option<i64>,
}

/// Score a claim history. Non-terminal assignments are ignored.
pub fn compute_trust(history: &[Assignment], config: &ScoringConfig) -> TrustScore {
    let terminated: Vec<&Assignment> = history.iter().filter(|a| a.is_terminal()).collect();

    let count = |state: AssignmentState| terminated.iter().filter(|a| a.state == state).count() as u32;
    let completed = count(AssignmentState::Completed);
    let abandoned = count(AssignmentState::Abandoned);
    let released = count(AssignmentState::Released);

    let resolved = completed + abandoned;
    let completion = if resolved == 0 {
        0.5
    } else {
        f64::from(completed) / f64::from(resolved)
    };

    let delays: Vec<Option<i64>> = terminated
        .iter()
        .map(|a| a.first_activity_at.map(|t| (t - a.claimed_at).num_seconds().max(0)))
        .collect();

    let tau_secs = (config.tau_hours * 3600.0).max(1.0);
    let responsiveness = if delays.is_empty() {
        0.5
    } else {
        let sum: f64 = delays
            .iter()
            .map(|d| d.map_or(0.0, |secs| (-(secs as f64) / tau_secs).exp()))
            .sum();
        sum / delays.len() as f64
    };

    let (wc, wr) = normalized_weights(config);
    let raw = wc * completion + wr * responsiveness;

    let n0 = f64::from(config.volume_threshold.max(1));
    let dampening = (f64::from(resolved) / n0).min(1.0);
    let trust_score = (config.prior + dampening * (raw - config.prior)).clamp(0.0, 1.0);

    let active: Vec<i64> = delays.iter().flatten().copied().collect();
    let avg_time_to_first_activity_secs = if active.is_empty() {
        None
    } else {
        Some(active.iter().sum::<i64>() / active.len() as i64)
    };

    TrustScore {
        trust_score,
        confidence: dampening,
        completed,
        abandoned,
        released,
        avg_time_to_first_activity_secs,
    }
}

fn normalized_weights(config: &ScoringConfig) -> (f64, f64) {
    let wc = config.completion_weight.max(0.0);
    let wr = config.responsiveness_weight.max(0.0);
    let total = wc + wr;
    if total > 0.0 {
        (wc / total, wr / total)
    } else {
        (0.5, 0.5)
    }
}

/// Persists trust scores computed from stored claim history.
pub struct TrustScorer {
    contributors: Arc<dyn ContributorRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    clock: Arc<dyn Clock>,
    config: ScoringConfig,
}

impl TrustScorer {
    pub fn new(
        contributors: Arc<dyn ContributorRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        clock: Arc<dyn Clock>,
        config: ScoringConfig,
    ) -> Self {
        Self {
            contributors,
            assignments,
            clock,
            config,
        }
    }

    /// Recompute and store the score of one contributor.
    pub async fn score(&self, contributor_id: Uuid) -> DomainResult<TrustScore> {
        let mut contributor = self
            .contributors
            .get(contributor_id)
            .await?
            .ok_or_else(|| DomainError::ContributorNotFound(contributor_id.to_string()))?;

        let history = self
            .assignments
            .list(AssignmentFilter::history_of(contributor_id))
            .await?;
        let score = compute_trust(&history, &self.config);

        contributor.trust_score = score.trust_score;
        contributor.confidence = score.confidence;
        contributor.completed_claims = score.completed;
        contributor.abandoned_claims = score.abandoned;
        contributor.released_claims = score.released;
        contributor.avg_time_to_first_activity_secs = score.avg_time_to_first_activity_secs;
        contributor.scored_at = Some(self.clock.now());
        self.contributors.update(&contributor).await?;

        tracing::debug!(
            contributor = %contributor.login,
            trust_score = score.trust_score,
            confidence = score.confidence,
            "trust score updated"
        );
        Ok(score)
    }

    /// Rescore every contributor; failures are logged and skipped.
    pub async fn refresh_all(&self) -> DomainResult<usize> {
        let contributors = self.contributors.list(ContributorFilter::default()).await?;
        let mut refreshed = 0;
        for contributor in contributors {
            match self.score(contributor.id).await {
                Ok(_) => refreshed += 1,
                Err(e) => {
                    tracing::warn!(contributor = %contributor.login, error = %e, "trust refresh failed");
                }
            }
        }
        tracing::info!(refreshed, "trust scores refreshed");
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn claim(state: AssignmentState, first_activity_after: Option<Duration>) -> Assignment {
        let claimed = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut a = Assignment::new(Uuid::new_v4(), Uuid::new_v4(), claimed);
        a.state = state;
        a.first_activity_at = first_activity_after.map(|d| claimed + d);
        a
    }

    fn history(completed: usize, abandoned: usize) -> Vec<Assignment> {
        let mut h = Vec::new();
        h.extend((0..completed).map(|_| claim(AssignmentState::Completed, Some(Duration::hours(2)))));
        h.extend((0..abandoned).map(|_| claim(AssignmentState::Abandoned, Some(Duration::hours(2)))));
        h
    }

    #[test]
    fn test_no_history_is_neutral() {
        let s = compute_trust(&[], &ScoringConfig::default());
        assert!((s.trust_score - 0.5).abs() < 1e-12);
        assert!(s.confidence.abs() < 1e-12);
        assert_eq!(s.avg_time_to_first_activity_secs, None);
    }

    #[test]
    fn test_reliable_history_beats_unreliable() {
        let cfg = ScoringConfig::default();
        let good = compute_trust(&history(8, 2), &cfg);
        let bad = compute_trust(&history(2, 8), &cfg);
        assert!(good.trust_score > bad.trust_score);
        assert!((good.confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_small_history_is_dampened_toward_prior() {
        let cfg = ScoringConfig::default();
        let one = compute_trust(&history(1, 0), &cfg);
        let ten = compute_trust(&history(10, 0), &cfg);
        assert!(one.trust_score > 0.5);
        assert!(one.trust_score < ten.trust_score);
        assert!((one.confidence - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_released_claims_only_affect_responsiveness() {
        let cfg = ScoringConfig::default();
        let mut h = history(5, 5);
        let base = compute_trust(&h, &cfg);
        h.push(claim(AssignmentState::Released, None));
        let with_release = compute_trust(&h, &cfg);
        assert_eq!(with_release.released, 1);
        assert!((with_release.confidence - base.confidence).abs() < 1e-12);
        assert!(with_release.trust_score < base.trust_score);
    }

    #[test]
    fn test_live_claims_are_ignored() {
        let cfg = ScoringConfig::default();
        let mut h = history(3, 1);
        let base = compute_trust(&h, &cfg);
        h.push(claim(AssignmentState::Active, Some(Duration::hours(1))));
        assert_eq!(compute_trust(&h, &cfg), base);
    }

    #[test]
    fn test_average_time_to_first_activity() {
        let h = vec![
            claim(AssignmentState::Completed, Some(Duration::hours(1))),
            claim(AssignmentState::Completed, Some(Duration::hours(3))),
            claim(AssignmentState::Abandoned, None),
        ];
        let s = compute_trust(&h, &ScoringConfig::default());
        assert_eq!(s.avg_time_to_first_activity_secs, Some(7200));
    }
}
