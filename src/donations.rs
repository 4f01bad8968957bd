//! Donation recording.
//!
//! The one place the system mutates several entities at once, so the whole
//! sequence runs in a single immediate transaction: status probe, cooldown
//! re-check, donation insert, cooldown stamp, conditional fulfilment, and
//! the two notification payloads. Either everything lands or nothing does.
//! Two hospitals racing on one request cannot both win: the immediate
//! transaction serializes writers, the status probe rejects the loser, and
//! the UNIQUE(request_id) constraint backs both up at the store level.

use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::db;
use crate::error::CoreError;
use crate::models::{Donation, DonationRecord, DonationStats, RequestStatus};
use crate::{eligibility, notifications};

const HOSPITAL_HISTORY_LIMIT: u32 = 50;

/// Record a completed donation against an active request.
///
/// The eligibility re-check reads `last_donation_date` inside the same
/// transaction that stamps it, closing the back-to-back donation race for
/// one donor across two requests.
pub fn record(
    conn: &mut Connection,
    donor_id: &Uuid,
    request_id: &Uuid,
    hospital_id: &Uuid,
    units_donated: u32,
    notes: Option<String>,
) -> Result<Uuid, CoreError> {
    if units_donated < 1 {
        return Err(CoreError::InvalidArgument(
            "units_donated must be at least 1".into(),
        ));
    }

    let today = Utc::now().date_naive();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let request = db::get_request(&tx, request_id)?
        .ok_or_else(|| CoreError::not_found("request", request_id))?;
    match request.status {
        RequestStatus::Active => {}
        RequestStatus::Fulfilled => {
            return Err(CoreError::Conflict(
                "a donation is already recorded for this request".into(),
            ))
        }
        RequestStatus::Cancelled => {
            return Err(CoreError::InvalidStateTransition(
                "request is cancelled".into(),
            ))
        }
    }

    if db::get_user(&tx, hospital_id)?.is_none() {
        return Err(CoreError::not_found("hospital", hospital_id));
    }

    let eligibility = eligibility::check_eligibility(&tx, donor_id, today)?;
    if !eligibility.eligible {
        return Err(CoreError::IneligibleDonor {
            days_remaining: eligibility.days_remaining.unwrap_or(0),
        });
    }

    let donation = Donation {
        id: Uuid::new_v4(),
        donor_id: *donor_id,
        request_id: *request_id,
        hospital_id: *hospital_id,
        units_donated,
        notes,
        donation_date: today,
    };
    db::insert_donation(&tx, &donation).map_err(|e| {
        if e.is_constraint_violation() {
            CoreError::Conflict("a donation is already recorded for this request".into())
        } else {
            e.into()
        }
    })?;

    db::set_last_donation_date(&tx, donor_id, today)?;

    if !db::fulfil_request_if_active(&tx, request_id)? {
        // Probed active above inside this transaction, so this is a
        // concurrent claim slipping through; give up cleanly.
        return Err(CoreError::Conflict(
            "request was claimed by a concurrent donation".into(),
        ));
    }

    notifications::queue(
        &tx,
        notifications::donation_thanks(*donor_id, *request_id, units_donated),
    )?;
    notifications::queue(
        &tx,
        notifications::request_fulfilled(request.patient_id, *request_id),
    )?;

    tx.commit()?;

    tracing::info!(
        donation_id = %donation.id,
        donor_id = %donor_id,
        request_id = %request_id,
        units = units_donated,
        "Donation recorded"
    );
    Ok(donation.id)
}

/// A donor's own donation history, newest first.
pub fn history_for_donor(
    conn: &Connection,
    donor_id: &Uuid,
) -> Result<Vec<DonationRecord>, CoreError> {
    Ok(db::list_donations_by_donor(conn, donor_id)?)
}

/// Donations performed at one hospital, newest first.
pub fn history_for_hospital(
    conn: &Connection,
    hospital_id: &Uuid,
) -> Result<Vec<DonationRecord>, CoreError> {
    Ok(db::list_donations_by_hospital(
        conn,
        hospital_id,
        HOSPITAL_HISTORY_LIMIT,
    )?)
}

/// Aggregate counters, scoped to one hospital when given.
pub fn stats(conn: &Connection, hospital_id: Option<&Uuid>) -> Result<DonationStats, CoreError> {
    Ok(db::donation_stats(conn, hospital_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_database, open_memory_database};
    use crate::models::{BloodGroup, NewRequest};
    use crate::testutil::{new_donor, new_hospital, new_patient, seed_user};
    use chrono::Duration;

    fn seed_request(conn: &Connection, patient: &Uuid) -> Uuid {
        crate::lifecycle::create(
            conn,
            patient,
            NewRequest {
                blood_group: BloodGroup::ONegative,
                units_needed: Some(1),
                urgency: None,
                latitude: 24.86,
                longitude: 67.01,
                hospital_name: None,
                contact_number: None,
                additional_notes: None,
            },
        )
        .unwrap()
        .request_id
    }

    #[test]
    fn record_fulfils_request_and_stamps_cooldown() {
        let mut conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let hospital = seed_user(&conn, new_hospital());
        let request_id = seed_request(&conn, &patient.id);

        record(&mut conn, &donor.id, &request_id, &hospital.id, 1, None).unwrap();

        let request = db::get_request(&conn, &request_id).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Fulfilled);

        let last = db::get_last_donation_date(&conn, &donor.id)
            .unwrap()
            .unwrap();
        assert_eq!(last, Some(Utc::now().date_naive()));

        // Thanks to the donor, fulfilment notice to the patient.
        let donor_inbox = db::list_notifications(&conn, &donor.id, 10).unwrap();
        let patient_inbox = db::list_notifications(&conn, &patient.id, 10).unwrap();
        assert_eq!(donor_inbox.len(), 1);
        assert_eq!(patient_inbox.len(), 1);
        assert_eq!(donor_inbox[0].request_id, Some(request_id));
    }

    #[test]
    fn ineligible_donor_leaves_no_partial_state() {
        let mut conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor = seed_user(&conn, {
            let mut d = new_donor(BloodGroup::ONegative);
            d.last_donation_date = Some(Utc::now().date_naive() - Duration::days(30));
            d
        });
        let hospital = seed_user(&conn, new_hospital());
        let request_id = seed_request(&conn, &patient.id);

        let err = record(&mut conn, &donor.id, &request_id, &hospital.id, 1, None).unwrap_err();
        assert!(matches!(err, CoreError::IneligibleDonor { days_remaining: 60 }));

        let request = db::get_request(&conn, &request_id).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Active);
        assert!(db::list_donations_by_donor(&conn, &donor.id)
            .unwrap()
            .is_empty());
        assert!(db::list_notifications(&conn, &patient.id, 10)
            .unwrap()
            .is_empty());
        // cooldown anchor untouched
        let last = db::get_last_donation_date(&conn, &donor.id)
            .unwrap()
            .unwrap();
        assert_eq!(last, donor.last_donation_date);
    }

    #[test]
    fn donor_at_exact_cooldown_boundary_may_donate() {
        let mut conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor = seed_user(&conn, {
            let mut d = new_donor(BloodGroup::ONegative);
            d.last_donation_date = Some(Utc::now().date_naive() - Duration::days(90));
            d
        });
        let hospital = seed_user(&conn, new_hospital());
        let request_id = seed_request(&conn, &patient.id);

        record(&mut conn, &donor.id, &request_id, &hospital.id, 1, None).unwrap();
    }

    #[test]
    fn second_recording_conflicts() {
        let mut conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor_a = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let donor_b = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let hospital = seed_user(&conn, new_hospital());
        let request_id = seed_request(&conn, &patient.id);

        record(&mut conn, &donor_a.id, &request_id, &hospital.id, 1, None).unwrap();
        let err = record(&mut conn, &donor_b.id, &request_id, &hospital.id, 1, None).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn back_to_back_donations_by_one_donor_are_blocked() {
        let mut conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let hospital = seed_user(&conn, new_hospital());
        let first = seed_request(&conn, &patient.id);
        let second = seed_request(&conn, &patient.id);

        record(&mut conn, &donor.id, &first, &hospital.id, 1, None).unwrap();
        let err = record(&mut conn, &donor.id, &second, &hospital.id, 1, None).unwrap_err();
        assert!(matches!(err, CoreError::IneligibleDonor { days_remaining: 90 }));
    }

    #[test]
    fn recording_against_cancelled_request_is_invalid_transition() {
        let mut conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let hospital = seed_user(&conn, new_hospital());
        let request_id = seed_request(&conn, &patient.id);
        crate::lifecycle::cancel(&conn, &request_id, &patient.id).unwrap();

        let err = record(&mut conn, &donor.id, &request_id, &hospital.id, 1, None).unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition(_)));
    }

    #[test]
    fn zero_units_is_invalid() {
        let mut conn = open_memory_database().unwrap();
        let donor = Uuid::new_v4();
        let err = record(&mut conn, &donor, &Uuid::new_v4(), &Uuid::new_v4(), 0, None).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn racing_hospitals_produce_exactly_one_donation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");
        let conn = open_database(&path).unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let hospital_a = seed_user(&conn, new_hospital());
        let hospital_b = seed_user(&conn, new_hospital());
        let request_id = seed_request(&conn, &patient.id);
        drop(conn);

        let spawn = |hospital: Uuid| {
            let path = path.clone();
            let donor = donor.id;
            std::thread::spawn(move || {
                let mut conn = open_database(&path).unwrap();
                record(&mut conn, &donor, &request_id, &hospital, 1, None)
            })
        };
        let a = spawn(hospital_a.id);
        let b = spawn(hospital_b.id);
        let results = [a.join().unwrap(), b.join().unwrap()];

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one recording must win: {results:?}");
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(CoreError::Conflict(_)))));

        let conn = open_database(&path).unwrap();
        let request = db::get_request(&conn, &request_id).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Fulfilled);
        let rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM donations WHERE request_id = ?1",
                [request_id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn stats_scope_to_hospital() {
        let mut conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let hospital = seed_user(&conn, new_hospital());
        let other_hospital = seed_user(&conn, new_hospital());
        let request_id = seed_request(&conn, &patient.id);

        record(&mut conn, &donor.id, &request_id, &hospital.id, 2, None).unwrap();

        let mine = stats(&conn, Some(&hospital.id)).unwrap();
        assert_eq!(mine.total_donations, 1);
        assert_eq!(mine.total_units, 2);
        assert_eq!(mine.unique_donors, 1);

        let theirs = stats(&conn, Some(&other_hospital.id)).unwrap();
        assert_eq!(theirs.total_donations, 0);
    }
}
