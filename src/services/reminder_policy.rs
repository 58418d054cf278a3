//! Reminder policy table.
//!
//! Global default thresholds with per-repository overrides merged field by
//! field. Effective windows are stretched or shrunk by contributor trust.

use chrono::Duration;
use std::sync::{PoisonError, RwLock};

use crate::domain::errors::DomainResult;
use crate::domain::models::{PolicyOverride, ReminderPolicy, Repo, TrustScalingConfig};

/// Trust-scaled windows the state machine evaluates against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub grace: Duration,
    pub inactivity: Duration,
    pub warning_window: Duration,
    pub max_reminders: u32,
    pub trust_factor: f64,
}

impl Thresholds {
    /// Time between consecutive reminder slots inside the warning window.
    ///
    /// Reminder `k` (1-based) is due at `stale_at + (k - 1) * spacing` and the
    /// warning at `stale_at + max_reminders * spacing`.
    pub fn reminder_spacing(&self) -> Duration {
        let slots = i32::try_from(self.max_reminders).unwrap_or(i32::MAX).saturating_add(1);
        self.warning_window / slots
    }
}

pub struct ReminderPolicyTable {
    defaults: RwLock<ReminderPolicy>,
    scaling: TrustScalingConfig,
}

impl ReminderPolicyTable {
    pub fn new(defaults: ReminderPolicy, scaling: TrustScalingConfig) -> DomainResult<Self> {
        defaults.validate()?;
        Ok(Self {
            defaults: RwLock::new(defaults),
            scaling,
        })
    }

    pub fn defaults(&self) -> ReminderPolicy {
        *self.defaults.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in new global defaults. Invalid defaults are rejected and the
    /// previous ones stay in force.
    pub fn replace_defaults(&self, next: ReminderPolicy) -> DomainResult<()> {
        next.validate()?;
        let mut guard = self.defaults.write().unwrap_or_else(PoisonError::into_inner);
        if *guard != next {
            tracing::info!(?next, "reminder policy defaults replaced");
        }
        *guard = next;
        Ok(())
    }

    /// Merge an override over the current defaults.
    ///
    /// A missing override yields the defaults. An override that would produce
    /// an invalid policy is ignored in favour of the defaults.
    pub fn resolve(&self, policy_override: Option<&PolicyOverride>) -> ReminderPolicy {
        let defaults = self.defaults();
        let Some(o) = policy_override else {
            return defaults;
        };

        let merged = o.apply(&defaults);
        match merged.validate() {
            Ok(()) => merged,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring invalid repository policy override");
                defaults
            }
        }
    }

    pub fn policy(&self, repo: &Repo) -> ReminderPolicy {
        self.resolve(repo.policy.as_ref())
    }

    /// Validate an override before it is stored.
    pub fn validate_override(&self, policy_override: &PolicyOverride) -> DomainResult<ReminderPolicy> {
        let merged = policy_override.apply(&self.defaults());
        merged.validate()?;
        Ok(merged)
    }

    pub fn trust_factor(&self, trust: f64) -> f64 {
        let trust = if trust.is_finite() { trust.clamp(0.0, 1.0) } else { 0.5 };
        self.scaling.min_factor + trust * (self.scaling.max_factor - self.scaling.min_factor)
    }

    pub fn thresholds(&self, policy: &ReminderPolicy, trust: f64) -> Thresholds {
        let f = self.trust_factor(trust);
        Thresholds {
            grace: scale(policy.grace_period(), f),
            inactivity: scale(policy.inactivity_window(), f),
            warning_window: policy.warning_window(),
            max_reminders: policy.max_reminders,
            trust_factor: f,
        }
    }
}

fn scale(d: Duration, factor: f64) -> Duration {
    Duration::milliseconds((d.num_milliseconds() as f64 * factor).round() as i64)
}
