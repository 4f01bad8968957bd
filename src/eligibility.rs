//! Donor cooldown rule.
//!
//! A donor may give blood again once 90 days have passed since their last
//! recorded donation; a donor with no prior donation is always eligible.
//! The rule is a pure function over dates so the boundary cases are
//! testable without a store; `check_eligibility` is the store-backed
//! wrapper. DonationRecorder re-runs the check inside its transaction —
//! a UI-time answer is stale by definition.

use chrono::NaiveDate;
use rusqlite::Connection;
use uuid::Uuid;

use crate::config::COOLDOWN_DAYS;
use crate::db;
use crate::error::CoreError;

/// Outcome of the cooldown rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Eligibility {
    pub eligible: bool,
    /// Days the donor must still wait. `None` when eligible.
    pub days_remaining: Option<i64>,
}

/// Apply the 90-day rule to a cooldown anchor date.
pub fn cooldown_status(last_donation_date: Option<NaiveDate>, today: NaiveDate) -> Eligibility {
    let Some(last) = last_donation_date else {
        return Eligibility {
            eligible: true,
            days_remaining: None,
        };
    };

    let days_since = (today - last).num_days();
    if days_since >= COOLDOWN_DAYS {
        Eligibility {
            eligible: true,
            days_remaining: None,
        }
    } else {
        // days_since may exceed the window only in the eligible branch;
        // clamp keeps a same-day donation at the full 90.
        Eligibility {
            eligible: false,
            days_remaining: Some((COOLDOWN_DAYS - days_since).max(0)),
        }
    }
}

/// Look up the donor's cooldown anchor and apply the rule.
///
/// Fails with `NotFound` when the donor does not exist. Verification state
/// is deliberately not consulted: verification and eligibility are
/// independent gates.
pub fn check_eligibility(
    conn: &Connection,
    donor_id: &Uuid,
    today: NaiveDate,
) -> Result<Eligibility, CoreError> {
    let last = db::get_last_donation_date(conn, donor_id)?
        .ok_or_else(|| CoreError::not_found("donor", donor_id))?;
    Ok(cooldown_status(last, today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::{BloodGroup, User, UserRole};
    use chrono::{Duration, Utc};

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn no_prior_donation_is_always_eligible() {
        let e = cooldown_status(None, day("2026-08-26"));
        assert!(e.eligible);
        assert_eq!(e.days_remaining, None);
    }

    #[test]
    fn eighty_nine_days_leaves_one_remaining() {
        let today = day("2026-08-26");
        let e = cooldown_status(Some(today - Duration::days(89)), today);
        assert!(!e.eligible);
        assert_eq!(e.days_remaining, Some(1));
    }

    #[test]
    fn ninety_days_is_eligible() {
        let today = day("2026-08-26");
        let e = cooldown_status(Some(today - Duration::days(90)), today);
        assert!(e.eligible);
    }

    #[test]
    fn same_day_donation_reports_full_window() {
        let today = day("2026-08-26");
        let e = cooldown_status(Some(today), today);
        assert!(!e.eligible);
        assert_eq!(e.days_remaining, Some(90));
    }

    #[test]
    fn thirty_days_ago_reports_sixty_remaining() {
        let today = day("2026-08-26");
        let e = cooldown_status(Some(today - Duration::days(30)), today);
        assert_eq!(e.days_remaining, Some(60));
    }

    #[test]
    fn unknown_donor_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = check_eligibility(&conn, &Uuid::new_v4(), day("2026-08-26")).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn unverified_donor_can_still_be_eligible() {
        let conn = open_memory_database().unwrap();
        let donor = User {
            id: Uuid::new_v4(),
            name: "Unverified".into(),
            email: "u@example.com".into(),
            phone: None,
            role: UserRole::Donor,
            blood_group: Some(BloodGroup::OPositive),
            is_verified: false,
            latitude: None,
            longitude: None,
            last_donation_date: None,
            created_at: Utc::now().naive_utc(),
        };
        db::insert_user(&conn, &donor).unwrap();

        let e = check_eligibility(&conn, &donor.id, day("2026-08-26")).unwrap();
        assert!(e.eligible);
    }
}
