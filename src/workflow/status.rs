//! Session status inference for monitoring dashboards.
//!
//! Status is never stored. It is classified on every read from the last
//! event timestamp and the completion ratio, against configured windows:
//! recent activity is active, a longer quiet spell is paused, and a stale
//! session is inactive — unless most of the route is already behind it,
//! in which case it reads as paused rather than abandoned.

use jiff::Timestamp;

use crate::config::Config;
use crate::model::SessionStatus;

/// Classifies one session.
///
/// `visited` counts points with a recorded outcome, skipped included —
/// the ratio measures traversal progress, not collection success.
pub fn classify(
    finalized: bool,
    last_activity: Timestamp,
    visited: u32,
    total_points: u32,
    now: Timestamp,
    config: &Config,
) -> SessionStatus {
    if finalized {
        return SessionStatus::Completed;
    }

    let quiet_hours = (now - last_activity).total(jiff::Unit::Hour).unwrap_or(0.0);
    if quiet_hours <= f64::from(config.active_window_hours) {
        return SessionStatus::Active;
    }
    if quiet_hours <= f64::from(config.paused_window_hours) {
        return SessionStatus::Paused;
    }

    let ratio = if total_points == 0 {
        0.0
    } else {
        f64::from(visited) / f64::from(total_points)
    };
    if ratio > config.near_done_ratio {
        SessionStatus::Paused
    } else {
        SessionStatus::Inactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::ToSpan;

    fn at(hours_ago: i32) -> (Timestamp, Timestamp) {
        let now = Timestamp::now();
        (now - hours_ago.hours(), now)
    }

    #[test]
    fn finalized_wins_regardless_of_age() {
        let config = Config::default();
        let (last, now) = at(100);
        assert_eq!(
            classify(true, last, 10, 10, now, &config),
            SessionStatus::Completed
        );
    }

    #[test]
    fn recent_activity_is_active() {
        let config = Config::default();
        let (last, now) = at(1);
        assert_eq!(
            classify(false, last, 1, 10, now, &config),
            SessionStatus::Active
        );
    }

    #[test]
    fn quiet_within_a_day_is_paused() {
        let config = Config::default();
        let (last, now) = at(5);
        assert_eq!(
            classify(false, last, 1, 10, now, &config),
            SessionStatus::Paused
        );
    }

    #[test]
    fn stale_and_barely_started_is_inactive() {
        let config = Config::default();
        let (last, now) = at(30);
        assert_eq!(
            classify(false, last, 2, 10, now, &config),
            SessionStatus::Inactive
        );
    }

    #[test]
    fn stale_but_nearly_done_reads_as_paused() {
        // 30 hours quiet with 9 of 10 points visited: almost certainly a
        // courier who stopped at the finish line, not an abandoned run.
        let config = Config::default();
        let (last, now) = at(30);
        assert_eq!(
            classify(false, last, 9, 10, now, &config),
            SessionStatus::Paused
        );
    }

    #[test]
    fn ratio_boundary_is_exclusive() {
        let config = Config::default();
        let (last, now) = at(30);
        assert_eq!(
            classify(false, last, 8, 10, now, &config),
            SessionStatus::Inactive
        );
    }
}
