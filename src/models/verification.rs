use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::VerificationStatus;

/// A donor's identity-verification record. One row per donor; resubmission
/// resets it to `pending` and clears the previous decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonorVerification {
    pub id: Uuid,
    pub donor_id: Uuid,
    /// Opaque references into the external image store, never raw bytes.
    pub front_image_ref: String,
    pub back_image_ref: String,
    pub status: VerificationStatus,
    pub rejection_reason: Option<String>,
    pub verified_by_hospital_id: Option<Uuid>,
    pub submitted_at: NaiveDateTime,
    pub verified_at: Option<NaiveDateTime>,
}

/// Pending-queue entry for the hospital work list.
#[derive(Debug, Clone, Serialize)]
pub struct PendingVerification {
    pub verification: DonorVerification,
    pub donor_name: String,
    pub donor_email: String,
    pub donor_phone: Option<String>,
    pub donor_blood_group: Option<super::enums::BloodGroup>,
}
