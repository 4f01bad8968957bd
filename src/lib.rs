//! # Hemoline
//!
//! Donor-matching and request-lifecycle engine for a blood-donation
//! coordination platform.
//!
//! Patients create blood requests, nearby verified donors are matched by
//! blood group and distance, donors accept or reject, and hospitals verify
//! donor identity and record completed donations. This crate owns the domain
//! logic only: matching, the request state machine, the 90-day donor
//! cooldown, response coordination with chat handoff, and the atomic
//! donation-recording transaction. Authentication, UI, image storage and
//! push delivery are external collaborators.
//!
//! ## Architecture
//!
//! - `models`: data structs and string-backed enums
//! - `db`: SQLite store — connection setup, migrations, repository queries
//! - `geo` / `eligibility` / `lifecycle` / `responses` / `donations` /
//!   `verification`: the domain components
//! - `chat` / `notifications`: collaborator-facing stores this core writes into
//! - `engine`: the facade callers consume, with actor/role authorization

pub mod chat;
pub mod config;
pub mod db;
pub mod donations;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod models;
pub mod notifications;
pub mod responses;
pub mod verification;

#[cfg(test)]
pub(crate) mod testutil;

pub use engine::{Actor, Engine};
pub use error::CoreError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, CoreError>;
