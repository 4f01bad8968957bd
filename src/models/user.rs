use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{BloodGroup, UserRole};

/// User row as this core sees it. Identity fields are owned by the
/// authentication subsystem; this core writes only `is_verified` and
/// `last_donation_date`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub blood_group: Option<BloodGroup>,
    pub is_verified: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub last_donation_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
}

/// A matched donor with the computed distance to the request location.
#[derive(Debug, Clone, Serialize)]
pub struct DonorMatch {
    pub donor_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub blood_group: BloodGroup,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
}
