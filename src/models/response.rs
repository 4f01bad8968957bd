use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ResponseChoice;

/// A donor's answer to a blood request. Unique per (request, donor);
/// resubmitting overwrites, last write wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub donor_id: Uuid,
    pub response: ResponseChoice,
    pub message: Option<String>,
    pub responded_at: NaiveDateTime,
}
