use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A completed donation. Immutable after creation; at most one per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub request_id: Uuid,
    pub hospital_id: Uuid,
    pub units_donated: u32,
    pub notes: Option<String>,
    pub donation_date: NaiveDate,
}

/// Donation joined with the participant names for history listings.
#[derive(Debug, Clone, Serialize)]
pub struct DonationRecord {
    pub donation: Donation,
    pub donor_name: String,
    pub hospital_name: String,
    pub patient_name: String,
}

/// Aggregate counters for the hospital dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DonationStats {
    pub total_donations: u64,
    pub total_units: u64,
    pub unique_donors: u64,
}
