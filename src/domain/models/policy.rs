//! Reminder policy thresholds.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Longest window a policy may configure (one year).
pub const MAX_WINDOW_HOURS: i64 = 24 * 365;

/// Escalation thresholds for a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReminderPolicy {
    /// Time a fresh claim has to show first activity.
    #[serde(default = "default_grace_period_hours")]
    pub grace_period_hours: i64,

    /// Time without activity before an active claim goes stale.
    #[serde(default = "default_inactivity_window_hours")]
    pub inactivity_window_hours: i64,

    /// Time from going stale to abandonment.
    #[serde(default = "default_warning_window_hours")]
    pub warning_window_hours: i64,

    /// Reminder comments sent while stale, before the final warning.
    #[serde(default = "default_max_reminders")]
    pub max_reminders: u32,
}

const fn default_grace_period_hours() -> i64 {
    72
}

const fn default_inactivity_window_hours() -> i64 {
    72
}

const fn default_warning_window_hours() -> i64 {
    24
}

const fn default_max_reminders() -> u32 {
    1
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            grace_period_hours: default_grace_period_hours(),
            inactivity_window_hours: default_inactivity_window_hours(),
            warning_window_hours: default_warning_window_hours(),
            max_reminders: default_max_reminders(),
        }
    }
}

impl ReminderPolicy {
    pub fn grace_period(&self) -> Duration {
        hours(self.grace_period_hours)
    }

    pub fn inactivity_window(&self) -> Duration {
        hours(self.inactivity_window_hours)
    }

    pub fn warning_window(&self) -> Duration {
        hours(self.warning_window_hours)
    }

    /// Windows must lie in `1..=MAX_WINDOW_HOURS`, and at least one and at
    /// most one reminder per hour of the warning window may be configured.
    pub fn validate(&self) -> DomainResult<()> {
        let windows = [
            ("grace_period_hours", self.grace_period_hours),
            ("inactivity_window_hours", self.inactivity_window_hours),
            ("warning_window_hours", self.warning_window_hours),
        ];
        for (name, value) in windows {
            if !(1..=MAX_WINDOW_HOURS).contains(&value) {
                return Err(DomainError::InvalidPolicy(format!(
                    "{name} must be between 1 and {MAX_WINDOW_HOURS}, got {value}"
                )));
            }
        }
        if self.max_reminders == 0 || i64::from(self.max_reminders) > self.warning_window_hours {
            return Err(DomainError::InvalidPolicy(format!(
                "max_reminders must be between 1 and warning_window_hours ({}), got {}",
                self.warning_window_hours, self.max_reminders
            )));
        }
        Ok(())
    }
}

fn hours(h: i64) -> Duration {
    Duration::try_hours(h).unwrap_or(Duration::MAX)
}

/// Per-repository override; unset fields fall back to the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PolicyOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period_hours: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactivity_window_hours: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_window_hours: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reminders: Option<u32>,
}

impl PolicyOverride {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, defaults: &ReminderPolicy) -> ReminderPolicy {
        ReminderPolicy {
            grace_period_hours: self.grace_period_hours.unwrap_or(defaults.grace_period_hours),
            inactivity_window_hours: self
                .inactivity_window_hours
                .unwrap_or(defaults.inactivity_window_hours),
            warning_window_hours: self
                .warning_window_hours
                .unwrap_or(defaults.warning_window_hours),
            max_reminders: self.max_reminders.unwrap_or(defaults.max_reminders),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        let policy = ReminderPolicy::default();
        policy.validate().unwrap();
        assert_eq!(policy.inactivity_window(), Duration::hours(72));
        assert_eq!(policy.warning_window(), Duration::hours(24));
    }

    #[test]
    fn test_negative_window_rejected() {
        let policy = ReminderPolicy {
            warning_window_hours: -1,
            ..Default::default()
        };
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("warning_window_hours"));
    }

    #[test]
    fn test_zero_reminders_rejected() {
        let policy = ReminderPolicy {
            max_reminders: 0,
            ..Default::default()
        };
        assert!(matches!(policy.validate(), Err(DomainError::InvalidPolicy(_))));
    }

    #[test]
    fn test_override_merges_per_field() {
        let defaults = ReminderPolicy::default();
        let o = PolicyOverride {
            inactivity_window_hours: Some(24),
            ..Default::default()
        };
        let merged = o.apply(&defaults);
        assert_eq!(merged.inactivity_window_hours, 24);
        assert_eq!(merged.grace_period_hours, defaults.grace_period_hours);
        assert!(!o.is_empty());
        assert!(PolicyOverride::default().is_empty());
    }

    #[test]
    fn test_oversized_window_rejected() {
        let policy = ReminderPolicy {
            grace_period_hours: 3_000_000_000,
            ..Default::default()
        };
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("grace_period_hours"));

        let policy = ReminderPolicy {
            inactivity_window_hours: MAX_WINDOW_HOURS + 1,
            ..Default::default()
        };
        assert!(matches!(policy.validate(), Err(DomainError::InvalidPolicy(_))));
        let policy = ReminderPolicy {
            inactivity_window_hours: MAX_WINDOW_HOURS,
            ..Default::default()
        };
        policy.validate().unwrap();
    }

    #[test]
    fn test_reminders_bounded_by_warning_window() {
        let policy = ReminderPolicy {
            max_reminders: u32::MAX,
            ..Default::default()
        };
        assert!(matches!(policy.validate(), Err(DomainError::InvalidPolicy(_))));

        let policy = ReminderPolicy {
            max_reminders: 24,
            ..Default::default()
        };
        policy.validate().unwrap();
        let policy = ReminderPolicy {
            max_reminders: 25,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_unvalidated_hours_do_not_overflow() {
        let policy = ReminderPolicy {
            grace_period_hours: i64::MAX,
            ..Default::default()
        };
        assert_eq!(policy.grace_period(), Duration::MAX);
    }
}
