//! Blood-request lifecycle.
//!
//! Owns the request state machine: `active` (initial) → `fulfilled`
//! (terminal, written only by the donation recorder) | `cancelled`
//! (terminal, owner only). Terminal states never resurrect. Creation
//! immediately computes the notify-set through the geo matcher and queues
//! a notification per matched donor; delivery belongs to the external
//! dispatcher.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::error::CoreError;
use crate::models::{
    ActiveRequestView, BloodRequest, CreatedRequest, NewRequest, RequestDetails, RequestStatus,
    Urgency,
};
use crate::{geo, notifications};

/// Hospital request view is capped the way the original admin screens were.
const ALL_REQUESTS_LIMIT: u32 = 100;

fn validate_coordinate(latitude: f64, longitude: f64) -> Result<(), CoreError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(CoreError::InvalidArgument(format!(
            "latitude out of range: {latitude}"
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(CoreError::InvalidArgument(format!(
            "longitude out of range: {longitude}"
        )));
    }
    Ok(())
}

/// Create a request and compute its notify-set.
///
/// Units default to 1 and urgency to `medium` when omitted; a zero units
/// value is rejected rather than silently bumped.
pub fn create(
    conn: &Connection,
    patient_id: &Uuid,
    new: NewRequest,
) -> Result<CreatedRequest, CoreError> {
    validate_coordinate(new.latitude, new.longitude)?;

    let units_needed = new.units_needed.unwrap_or(1);
    if units_needed < 1 {
        return Err(CoreError::InvalidArgument(
            "units_needed must be at least 1".into(),
        ));
    }

    let request = BloodRequest {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        blood_group: new.blood_group,
        units_needed,
        urgency: new.urgency.unwrap_or(Urgency::Medium),
        latitude: new.latitude,
        longitude: new.longitude,
        hospital_name: new.hospital_name,
        contact_number: new.contact_number,
        additional_notes: new.additional_notes,
        status: RequestStatus::Active,
        created_at: Utc::now().naive_utc(),
    };
    db::insert_request(conn, &request)?;

    let matches = geo::find_nearby_donors(
        conn,
        request.blood_group,
        request.latitude,
        request.longitude,
        None,
    )?;
    for m in &matches {
        notifications::queue(
            conn,
            notifications::donor_matched(m.donor_id, &request, m.distance_km),
        )?;
    }

    tracing::info!(
        request_id = %request.id,
        blood_group = request.blood_group.as_str(),
        urgency = request.urgency.as_str(),
        matched = matches.len(),
        "Blood request created"
    );

    Ok(CreatedRequest {
        request_id: request.id,
        matched_donor_count: matches.len(),
    })
}

/// Cancel a request. Owner only; a terminal request cannot be cancelled.
pub fn cancel(
    conn: &Connection,
    request_id: &Uuid,
    requesting_user_id: &Uuid,
) -> Result<(), CoreError> {
    let request = db::get_request(conn, request_id)?
        .ok_or_else(|| CoreError::not_found("request", request_id))?;

    if request.patient_id != *requesting_user_id {
        return Err(CoreError::Unauthorized(
            "only the request owner may cancel it".into(),
        ));
    }
    if request.status.is_terminal() {
        return Err(CoreError::InvalidStateTransition(format!(
            "request is already {}",
            request.status.as_str()
        )));
    }

    db::update_request_status(conn, request_id, RequestStatus::Cancelled)?;
    tracing::info!(request_id = %request_id, "Blood request cancelled");
    Ok(())
}

/// Active requests for the donor feed, severity rank first, newest within
/// a rank. When a viewer is given, each row carries that donor's own
/// response.
pub fn list_active(
    conn: &Connection,
    viewer_donor_id: Option<&Uuid>,
) -> Result<Vec<ActiveRequestView>, CoreError> {
    let rows = db::list_active_requests(conn)?;

    let mut out = Vec::with_capacity(rows.len());
    for (request, patient_name, patient_phone) in rows {
        let my_response = match viewer_donor_id {
            Some(donor_id) => db::get_response(conn, &request.id, donor_id)?.map(|r| r.response),
            None => None,
        };
        out.push(ActiveRequestView {
            request,
            patient_name,
            patient_phone,
            my_response,
        });
    }
    Ok(out)
}

/// A patient's own requests, newest first.
pub fn list_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<BloodRequest>, CoreError> {
    Ok(db::list_requests_by_patient(conn, patient_id)?)
}

/// All requests for the hospital view, newest first.
pub fn list_all(conn: &Connection) -> Result<Vec<ActiveRequestView>, CoreError> {
    let rows = db::list_all_requests(conn, ALL_REQUESTS_LIMIT)?;
    Ok(rows
        .into_iter()
        .map(|(request, patient_name, patient_phone)| ActiveRequestView {
            request,
            patient_name,
            patient_phone,
            my_response: None,
        })
        .collect())
}

/// Full request detail including the caller's own response when present.
pub fn get_details(
    conn: &Connection,
    request_id: &Uuid,
    caller_id: &Uuid,
) -> Result<RequestDetails, CoreError> {
    let (request, patient_name, patient_email, patient_phone) =
        db::get_request_with_patient(conn, request_id)?
            .ok_or_else(|| CoreError::not_found("request", request_id))?;

    let my_response = db::get_response(conn, request_id, caller_id)?.map(|r| r.response);

    Ok(RequestDetails {
        request,
        patient_name,
        patient_email,
        patient_phone,
        my_response,
    })
}
