//! Identity and timestamp generation for services.
//!
//! Timestamps are truncated to microseconds, the precision of PostgreSQL
//! `TIMESTAMPTZ`, so an entity read back from the store equals the one written.

use chrono::{DateTime, Duration, NaiveDate, SubsecRound, Utc};
use uuid::Uuid;

/// Current time at storage precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Timestamp for a mutation of a record last touched at `prior`.
///
/// Strictly later than `prior`, even within the same microsecond or after the
/// wall clock stepped backwards; update guards compare against `prior`.
pub fn advance(prior: DateTime<Utc>) -> DateTime<Utc> {
    now().max(prior + Duration::microseconds(1))
}

/// Today's date (UTC).
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// New time-ordered entity id.
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn now_has_microsecond_precision() {
        let ts = now();
        assert_eq!(ts.nanosecond() % 1_000, 0);
    }

    #[test]
    fn advance_is_strictly_later_than_a_future_prior() {
        let future = now() + Duration::hours(1);
        assert_eq!(advance(future), future + Duration::microseconds(1));
        assert_eq!(advance(future).nanosecond() % 1_000, 0);
    }

    #[test]
    fn advance_uses_the_clock_for_a_past_prior() {
        let past = now() - Duration::hours(1);
        assert!(advance(past) > past + Duration::minutes(59));
    }

    #[test]
    fn advance_differs_from_a_same_instant_prior() {
        let prior = now();
        assert!(advance(prior) > prior);
    }

    #[test]
    fn ids_are_unique_and_v7() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 7);
    }
}
