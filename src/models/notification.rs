use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::NotificationKind;

/// A queued notification payload. This core only produces rows; the
/// external dispatcher owns delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub request_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

/// Payload for a notification about to be queued.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub request_id: Option<Uuid>,
}
