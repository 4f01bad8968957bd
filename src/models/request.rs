use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{BloodGroup, RequestStatus, ResponseChoice, Urgency};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloodRequest {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub blood_group: BloodGroup,
    pub units_needed: u32,
    pub urgency: Urgency,
    pub latitude: f64,
    pub longitude: f64,
    /// Free text, not a reference to a hospital user.
    pub hospital_name: Option<String>,
    pub contact_number: Option<String>,
    pub additional_notes: Option<String>,
    pub status: RequestStatus,
    pub created_at: NaiveDateTime,
}

/// Input for request creation. Urgency and units fall back to their
/// defaults (`medium`, 1) when omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub blood_group: BloodGroup,
    pub units_needed: Option<u32>,
    pub urgency: Option<Urgency>,
    pub latitude: f64,
    pub longitude: f64,
    pub hospital_name: Option<String>,
    pub contact_number: Option<String>,
    pub additional_notes: Option<String>,
}

/// Outcome of request creation: the new id plus how many verified donors
/// fell inside the match radius (delivery itself is the dispatcher's job).
#[derive(Debug, Clone, Serialize)]
pub struct CreatedRequest {
    pub request_id: Uuid,
    pub matched_donor_count: usize,
}

/// An active request as shown to a donor, annotated with that donor's own
/// response if they already answered.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveRequestView {
    pub request: BloodRequest,
    pub patient_name: String,
    pub patient_phone: Option<String>,
    pub my_response: Option<ResponseChoice>,
}

/// Full request detail: the request, the patient contact card, and — when
/// the caller is a donor — the caller's own response.
#[derive(Debug, Clone, Serialize)]
pub struct RequestDetails {
    pub request: BloodRequest,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: Option<String>,
    pub my_response: Option<ResponseChoice>,
}
