//! Assignment lifecycle decisions.
//!
//! `evaluate` is pure: given an assignment, the issue timeline, the current
//! time and trust-scaled thresholds it decides the next step. The scheduler
//! owns persistence and commits whatever is returned here.
//!
//! Escalation timeline with `max_reminders = n` and warning window `W`:
//! reminder 1 on entering STALE at `s`, reminder `k` at `s + (k-1)·W/(n+1)`,
//! the warning at `s + n·W/(n+1)` and abandonment after `s + W`.

use chrono::{DateTime, Duration, Utc};

use crate::domain::models::{ActionKind, ActivitySignal, Assignment, AssignmentState, SignalKind};
use crate::services::reminder_policy::Thresholds;

/// What the scheduler should commit for one assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing changed since the last evaluation.
    Unchanged,
    /// Activity bookkeeping moved but the state did not.
    Touched(Assignment),
    /// A state change, with the outbound action it produces.
    Transition {
        from: AssignmentState,
        to: AssignmentState,
        next: Assignment,
        action: Option<ActionKind>,
    },
}

impl Outcome {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

/// `t + d`, saturating at the latest representable instant.
fn after(t: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    t.checked_add_signed(d).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Activity of the assignee visible at `now`.
struct ActivityView {
    first: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
}

fn activity_view(a: &Assignment, timeline: &[ActivitySignal], assignee: &str, now: DateTime<Utc>) -> ActivityView {
    let mut times = timeline
        .iter()
        .filter(|s| s.kind.is_activity() && s.is_by(assignee))
        .filter(|s| s.occurred_at >= a.claimed_at && s.occurred_at <= now)
        .map(|s| s.occurred_at);

    let first = times.next();
    let latest = times.last().or(first);
    ActivityView { first, latest }
}

/// Earliest signal that ends the claim outright.
fn lifecycle_end(
    a: &Assignment,
    timeline: &[ActivitySignal],
    assignee: &str,
    now: DateTime<Utc>,
) -> Option<(AssignmentState, DateTime<Utc>)> {
    timeline
        .iter()
        .filter(|s| s.occurred_at >= a.claimed_at && s.occurred_at <= now)
        .find_map(|s| match s.kind {
            SignalKind::IssueClosed => Some((AssignmentState::Completed, s.occurred_at)),
            SignalKind::PullRequestMerged if s.is_by(assignee) => {
                Some((AssignmentState::Completed, s.occurred_at))
            }
            SignalKind::Unassigned if s.is_by(assignee) => Some((AssignmentState::Released, s.occurred_at)),
            _ => None,
        })
}

fn transition(a: &Assignment, mut next: Assignment, action: Option<ActionKind>, now: DateTime<Utc>) -> Outcome {
    debug_assert!(a.state.can_transition_to(next.state) || a.state == next.state);
    next.version = a.version + 1;
    next.updated_at = now;
    Outcome::Transition {
        from: a.state,
        to: next.state,
        next,
        action,
    }
}

/// Terminate an assignment because of an external event.
pub fn terminate(a: &Assignment, to: AssignmentState, at: DateTime<Utc>, now: DateTime<Utc>) -> Outcome {
    if !a.state.can_transition_to(to) || !to.is_terminal() {
        return Outcome::Unchanged;
    }
    let mut next = a.clone();
    next.state = to;
    next.state_entered_at = at;
    next.terminated_at = Some(at);
    next.escalation_deadline = None;
    transition(a, next, None, now)
}

fn reset_to_active(a: &Assignment, view: &ActivityView, th: &Thresholds, now: DateTime<Utc>) -> Option<Outcome> {
    let latest = view.latest?;
    let is_new = a.last_activity_at.map_or(true, |prev| latest > prev);
    if !is_new {
        return None;
    }
    let mut next = a.clone();
    next.state = AssignmentState::Active;
    next.first_activity_at = a.first_activity_at.or(view.first);
    next.last_activity_at = Some(latest);
    next.state_entered_at = latest;
    next.reminder_count = 0;
    next.escalation_deadline = Some(after(latest, th.inactivity));
    Some(transition(a, next, None, now))
}

fn enter_stale(a: &Assignment, stale_at: DateTime<Utc>, th: &Thresholds, now: DateTime<Utc>) -> Outcome {
    let mut next = a.clone();
    next.state = AssignmentState::Stale;
    next.state_entered_at = stale_at;
    next.reminder_count = 1;
    next.escalation_deadline = Some(after(stale_at, th.warning_window));
    transition(a, next, Some(ActionKind::Reminder), now)
}

/// Decide the next step for `a`, at most one transition.
///
/// Deadlines elapse only when `now` is strictly past them, and activity at
/// exactly a deadline counts as before it.
pub fn evaluate(
    a: &Assignment,
    timeline: &[ActivitySignal],
    assignee: &str,
    th: &Thresholds,
    now: DateTime<Utc>,
) -> Outcome {
    if a.is_terminal() {
        return Outcome::Unchanged;
    }

    if let Some((to, at)) = lifecycle_end(a, timeline, assignee, now) {
        return terminate(a, to, at, now);
    }

    let view = activity_view(a, timeline, assignee, now);

    match a.state {
        AssignmentState::Claimed => {
            if let Some(first) = view.first {
                let latest = view.latest.unwrap_or(first);
                let mut next = a.clone();
                next.state = AssignmentState::Active;
                next.first_activity_at = Some(first);
                next.last_activity_at = Some(latest);
                next.state_entered_at = first;
                next.escalation_deadline = Some(after(latest, th.inactivity));
                return transition(a, next, None, now);
            }
            let deadline = after(a.claimed_at, th.grace);
            if now > deadline {
                return enter_stale(a, deadline, th, now);
            }
            Outcome::Unchanged
        }
        AssignmentState::Active => {
            let anchor = match (a.last_activity_at, view.latest) {
                (Some(prev), Some(latest)) => prev.max(latest),
                (prev, latest) => prev.or(latest).unwrap_or(a.claimed_at),
            };
            let deadline = after(anchor, th.inactivity);
            if now > deadline {
                let mut stale = enter_stale(a, deadline, th, now);
                if let Outcome::Transition { next, .. } = &mut stale {
                    next.last_activity_at = Some(anchor);
                }
                return stale;
            }
            if a.last_activity_at != Some(anchor) {
                let mut next = a.clone();
                next.first_activity_at = a.first_activity_at.or(view.first);
                next.last_activity_at = Some(anchor);
                next.escalation_deadline = Some(deadline);
                next.version = a.version + 1;
                next.updated_at = now;
                return Outcome::Touched(next);
            }
            Outcome::Unchanged
        }
        AssignmentState::Stale => {
            if let Some(reset) = reset_to_active(a, &view, th, now) {
                return reset;
            }
            let stale_at = a.state_entered_at;
            let spacing = th.reminder_spacing();
            let sent = a.reminder_count;
            let offset = spacing
                .checked_mul(i32::try_from(sent).unwrap_or(i32::MAX))
                .unwrap_or(Duration::MAX);
            let next_slot = after(stale_at, offset);
            if now <= next_slot {
                return Outcome::Unchanged;
            }

            let mut next = a.clone();
            if sent < th.max_reminders {
                next.reminder_count = sent + 1;
                transition(a, next, Some(ActionKind::Reminder), now)
            } else {
                next.state = AssignmentState::Warned;
                next.state_entered_at = next_slot;
                next.escalation_deadline = Some(a.escalation_deadline.unwrap_or_else(|| after(stale_at, th.warning_window)));
                transition(a, next, Some(ActionKind::Warning), now)
            }
        }
        AssignmentState::Warned => {
            if let Some(reset) = reset_to_active(a, &view, th, now) {
                return reset;
            }
            let deadline = a
                .escalation_deadline
                .unwrap_or_else(|| after(a.state_entered_at, th.reminder_spacing()));
            if now > deadline {
                let mut next = a.clone();
                next.state = AssignmentState::Abandoned;
                next.state_entered_at = deadline;
                next.terminated_at = Some(deadline);
                next.escalation_deadline = None;
                return transition(a, next, Some(ActionKind::Reassignment), now);
            }
            Outcome::Unchanged
        }
        AssignmentState::Abandoned | AssignmentState::Completed | AssignmentState::Released => Outcome::Unchanged,
    }
}
