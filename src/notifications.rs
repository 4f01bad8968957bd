//! Notification payload production.
//!
//! This core never delivers anything; it builds payloads and queues them as
//! rows for the external dispatcher to drain. The builders keep the wording
//! in one place so the recorder and lifecycle stay free of copy.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::error::CoreError;
use crate::models::{BloodRequest, Notification, NotificationKind, NotificationPayload};

const LIST_LIMIT: u32 = 50;

/// Payload for a donor matched to a newly created request.
pub fn donor_matched(donor_id: Uuid, request: &BloodRequest, distance_km: f64) -> NotificationPayload {
    NotificationPayload {
        user_id: donor_id,
        title: "Blood Request Near You".into(),
        message: format!(
            "A {} request ({} urgency) was created about {:.1} km from you.",
            request.blood_group.as_str(),
            request.urgency.as_str(),
            distance_km
        ),
        kind: NotificationKind::Request,
        request_id: Some(request.id),
    }
}

/// Payload thanking a donor for a recorded donation.
pub fn donation_thanks(donor_id: Uuid, request_id: Uuid, units: u32) -> NotificationPayload {
    NotificationPayload {
        user_id: donor_id,
        title: "Thank You for Donating!".into(),
        message: format!(
            "Your donation of {units} unit(s) has been recorded. You helped save a life!"
        ),
        kind: NotificationKind::Donation,
        request_id: Some(request_id),
    }
}

/// Payload telling a patient their request was fulfilled.
pub fn request_fulfilled(patient_id: Uuid, request_id: Uuid) -> NotificationPayload {
    NotificationPayload {
        user_id: patient_id,
        title: "Donation Completed".into(),
        message: "A donor has fulfilled your blood request. Thank you for using our service!"
            .into(),
        kind: NotificationKind::Donation,
        request_id: Some(request_id),
    }
}

/// Queue one payload for delivery.
pub fn queue(conn: &Connection, payload: NotificationPayload) -> Result<Uuid, CoreError> {
    let id = Uuid::new_v4();
    db::insert_notification(conn, id, &payload, Utc::now().naive_utc())?;
    Ok(id)
}

/// A user's queued notifications, newest first.
pub fn list_for_user(conn: &Connection, user_id: &Uuid) -> Result<Vec<Notification>, CoreError> {
    Ok(db::list_notifications(conn, user_id, LIST_LIMIT)?)
}

/// Mark one notification read; `NotFound` when it is absent or owned by
/// someone else.
pub fn mark_read(conn: &Connection, id: &Uuid, user_id: &Uuid) -> Result<(), CoreError> {
    if !db::mark_notification_read(conn, id, user_id)? {
        return Err(CoreError::not_found("notification", id));
    }
    Ok(())
}

pub fn mark_all_read(conn: &Connection, user_id: &Uuid) -> Result<(), CoreError> {
    db::mark_all_notifications_read(conn, user_id)?;
    Ok(())
}
