//! Geographic donor matching.
//!
//! Filters verified donors by exact blood group (candidate query in SQL),
//! computes great-circle distance with the haversine formula, and keeps
//! only donors inside the radius, closest first. Read-only; an empty match
//! set is a valid outcome, not an error.

use rusqlite::Connection;

use crate::config::{DEFAULT_RADIUS_KM, EARTH_RADIUS_KM};
use crate::db::{self, DatabaseError};
use crate::models::{BloodGroup, DonorMatch};

/// Great-circle distance between two coordinates, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    EARTH_RADIUS_KM * 2.0 * a.sqrt().asin()
}

/// Verified donors with the given blood group within `radius_km` of the
/// point, ascending by distance. Donors without a stored coordinate never
/// reach this function (excluded by the candidate query).
pub fn find_nearby_donors(
    conn: &Connection,
    blood_group: BloodGroup,
    latitude: f64,
    longitude: f64,
    radius_km: Option<f64>,
) -> Result<Vec<DonorMatch>, DatabaseError> {
    let radius = radius_km.unwrap_or(DEFAULT_RADIUS_KM);

    let mut matches: Vec<DonorMatch> = db::find_donor_candidates(conn, blood_group)?
        .into_iter()
        .map(|mut m| {
            m.distance_km = haversine_km(latitude, longitude, m.latitude, m.longitude);
            m
        })
        .filter(|m| m.distance_km <= radius)
        .collect();

    matches.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(matches)
}
