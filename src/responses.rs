//! Donor response coordination.
//!
//! Records accept/reject answers with last-write-wins upsert semantics on
//! the unique (request, donor) key, and bootstraps the chat thread on
//! acceptance: the donor's first message to the patient is what makes the
//! conversation appear in both users' chat lists. Acceptance is not
//! serialized — several donors may accept the same request; the request is
//! claimed only when a donation is recorded against it.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::error::CoreError;
use crate::models::{ChatMessage, RequestResponse, ResponseChoice};

/// Thread opener used when the accepting donor supplies no message.
const DEFAULT_ACCEPT_MESSAGE: &str =
    "Hi, I saw your blood request and I am willing to donate. How can I help?";

/// Record a donor's answer to a request.
///
/// Resubmission overwrites the previous answer in either direction; a
/// retry of the same answer is a no-op thanks to the unique key. Terminal
/// requests no longer take responses.
pub fn respond(
    conn: &Connection,
    request_id: &Uuid,
    donor_id: &Uuid,
    response: ResponseChoice,
    message: Option<String>,
) -> Result<(), CoreError> {
    let request = db::get_request(conn, request_id)?
        .ok_or_else(|| CoreError::not_found("request", request_id))?;
    if request.status.is_terminal() {
        return Err(CoreError::InvalidStateTransition(format!(
            "request is {}",
            request.status.as_str()
        )));
    }

    let message = message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());

    db::upsert_response(
        conn,
        &RequestResponse {
            id: Uuid::new_v4(),
            request_id: *request_id,
            donor_id: *donor_id,
            response,
            message: message.clone(),
            responded_at: Utc::now().naive_utc(),
        },
    )?;

    if response == ResponseChoice::Accepted {
        bootstrap_chat(conn, request_id, donor_id, &request.patient_id, message)?;
    }

    tracing::info!(
        request_id = %request_id,
        donor_id = %donor_id,
        response = response.as_str(),
        "Donor response recorded"
    );
    Ok(())
}

/// Open the donor → patient conversation with the acceptance message,
/// unless the pair already has a thread on this request (a donor changing
/// their mind back to accepted must not open a second thread).
fn bootstrap_chat(
    conn: &Connection,
    request_id: &Uuid,
    donor_id: &Uuid,
    patient_id: &Uuid,
    message: Option<String>,
) -> Result<(), CoreError> {
    if db::thread_exists(conn, request_id, donor_id, patient_id)? {
        return Ok(());
    }

    db::insert_chat_message(
        conn,
        &ChatMessage {
            id: Uuid::new_v4(),
            request_id: *request_id,
            sender_id: *donor_id,
            receiver_id: *patient_id,
            message: message.unwrap_or_else(|| DEFAULT_ACCEPT_MESSAGE.to_string()),
            is_read: false,
            created_at: Utc::now().naive_utc(),
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::{BloodGroup, NewRequest, RequestStatus};
    use crate::testutil::{new_donor, new_patient, seed_user};

    fn seed_request(conn: &Connection, patient: &Uuid) -> Uuid {
        crate::lifecycle::create(
            conn,
            patient,
            NewRequest {
                blood_group: BloodGroup::ONegative,
                units_needed: None,
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
    fn acceptance_bootstraps_chat_with_default_text() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let request_id = seed_request(&conn, &patient.id);

        respond(&conn, &request_id, &donor.id, ResponseChoice::Accepted, None).unwrap();

        let thread = db::list_chat_messages(&conn, &request_id, &patient.id).unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].sender_id, donor.id);
        assert_eq!(thread[0].receiver_id, patient.id);
        assert_eq!(thread[0].message, DEFAULT_ACCEPT_MESSAGE);
    }

    #[test]
    fn acceptance_uses_supplied_message() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let request_id = seed_request(&conn, &patient.id);

        respond(
            &conn,
            &request_id,
            &donor.id,
            ResponseChoice::Accepted,
            Some("I can be there in an hour.".into()),
        )
        .unwrap();

        let thread = db::list_chat_messages(&conn, &request_id, &patient.id).unwrap();
        assert_eq!(thread[0].message, "I can be there in an hour.");
    }

    #[test]
    fn rejection_creates_no_chat_and_keeps_request_active() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let request_id = seed_request(&conn, &patient.id);

        respond(&conn, &request_id, &donor.id, ResponseChoice::Rejected, None).unwrap();

        assert!(db::list_chat_messages(&conn, &request_id, &patient.id)
            .unwrap()
            .is_empty());
        let request = db::get_request(&conn, &request_id).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Active);
    }

    #[test]
    fn resubmission_overwrites_leaving_one_row() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let request_id = seed_request(&conn, &patient.id);

        respond(&conn, &request_id, &donor.id, ResponseChoice::Accepted, None).unwrap();
        respond(&conn, &request_id, &donor.id, ResponseChoice::Rejected, None).unwrap();

        let rows = db::list_responses_for_request(&conn, &request_id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.response, ResponseChoice::Rejected);
    }

    #[test]
    fn flip_flop_does_not_duplicate_chat_thread() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let request_id = seed_request(&conn, &patient.id);

        respond(&conn, &request_id, &donor.id, ResponseChoice::Accepted, None).unwrap();
        respond(&conn, &request_id, &donor.id, ResponseChoice::Rejected, None).unwrap();
        respond(&conn, &request_id, &donor.id, ResponseChoice::Accepted, None).unwrap();

        let thread = db::list_chat_messages(&conn, &request_id, &patient.id).unwrap();
        assert_eq!(thread.len(), 1);
    }

    #[test]
    fn multiple_donors_may_accept_concurrently() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor_a = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let donor_b = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let request_id = seed_request(&conn, &patient.id);

        respond(&conn, &request_id, &donor_a.id, ResponseChoice::Accepted, None).unwrap();
        respond(&conn, &request_id, &donor_b.id, ResponseChoice::Accepted, None).unwrap();

        let rows = db::list_responses_for_request(&conn, &request_id).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn responding_to_missing_request_is_not_found() {
        let conn = open_memory_database().unwrap();
        let donor = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let err = respond(
            &conn,
            &Uuid::new_v4(),
            &donor.id,
            ResponseChoice::Accepted,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn responding_to_cancelled_request_is_invalid_transition() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, new_patient());
        let donor = seed_user(&conn, new_donor(BloodGroup::ONegative));
        let request_id = seed_request(&conn, &patient.id);
        crate::lifecycle::cancel(&conn, &request_id, &patient.id).unwrap();

        let err = respond(&conn, &request_id, &donor.id, ResponseChoice::Accepted, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition(_)));
    }
}
