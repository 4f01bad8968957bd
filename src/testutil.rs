//! Shared fixtures for the unit tests: quick user construction and seeding
//! against an in-memory store.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::models::{BloodGroup, User, UserRole};

pub fn new_user(role: UserRole) -> User {
    let id = Uuid::new_v4();
    User {
        id,
        name: format!("{} {}", role.as_str(), &id.to_string()[..8]),
        email: format!("{id}@example.com"),
        phone: Some("03001234567".into()),
        role,
        blood_group: None,
        is_verified: false,
        latitude: None,
        longitude: None,
        last_donation_date: None,
        created_at: Utc::now().naive_utc(),
    }
}

pub fn new_patient() -> User {
    new_user(UserRole::Patient)
}

pub fn new_hospital() -> User {
    new_user(UserRole::Hospital)
}

/// A verified donor at Karachi city centre.
pub fn new_donor(group: BloodGroup) -> User {
    let mut u = new_user(UserRole::Donor);
    u.blood_group = Some(group);
    u.is_verified = true;
    u.latitude = Some(24.8607);
    u.longitude = Some(67.0011);
    u
}

pub fn seed_user(conn: &Connection, user: User) -> User {
    db::insert_user(conn, &user).unwrap();
    user
}
