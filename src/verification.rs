//! Donor verification gate.
//!
//! State machine per donor: no submission → `pending` → `approved` |
//! `rejected`, with resubmission always returning to `pending`. Only an
//! approved donor carries `is_verified=true`, and only verified donors are
//! matchable by the geo matcher. Decisions address the verification record
//! by its own id — there is exactly one lookup path.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::error::CoreError;
use crate::models::{DonorVerification, PendingVerification, VerificationStatus};

/// Submit (or resubmit) identity documents for verification.
///
/// Image arguments are opaque references into the external image store.
/// Resubmission wipes the previous decision and drops `is_verified` until
/// a hospital rules again.
pub fn submit(
    conn: &Connection,
    donor_id: &Uuid,
    front_image_ref: &str,
    back_image_ref: &str,
) -> Result<(), CoreError> {
    if front_image_ref.trim().is_empty() || back_image_ref.trim().is_empty() {
        return Err(CoreError::InvalidArgument(
            "both document image references are required".into(),
        ));
    }
    if db::get_user(conn, donor_id)?.is_none() {
        return Err(CoreError::not_found("donor", donor_id));
    }

    db::upsert_verification(
        conn,
        Uuid::new_v4(),
        donor_id,
        front_image_ref.trim(),
        back_image_ref.trim(),
        Utc::now().naive_utc(),
    )?;
    db::set_user_verified(conn, donor_id, false)?;

    tracing::info!(donor_id = %donor_id, "Verification submitted");
    Ok(())
}

/// Rule on a pending verification.
///
/// `approved` flips the donor's `is_verified` on; `rejected` requires a
/// reason and flips it off. A verification that already carries a decision
/// cannot be re-decided — the donor resubmits instead.
pub fn decide(
    conn: &Connection,
    verification_id: &Uuid,
    hospital_id: &Uuid,
    status: VerificationStatus,
    reason: Option<&str>,
) -> Result<(), CoreError> {
    if status == VerificationStatus::Pending {
        return Err(CoreError::InvalidArgument(
            "decision must be approved or rejected".into(),
        ));
    }
    let reason = reason.map(str::trim).filter(|r| !r.is_empty());
    if status == VerificationStatus::Rejected && reason.is_none() {
        return Err(CoreError::MissingReason);
    }

    let verification = db::get_verification(conn, verification_id)?
        .ok_or_else(|| CoreError::not_found("verification", verification_id))?;
    if verification.status != VerificationStatus::Pending {
        return Err(CoreError::InvalidStateTransition(format!(
            "verification is already {}",
            verification.status.as_str()
        )));
    }

    db::decide_verification(
        conn,
        verification_id,
        hospital_id,
        status,
        reason,
        Utc::now().naive_utc(),
    )?;
    db::set_user_verified(
        conn,
        &verification.donor_id,
        status == VerificationStatus::Approved,
    )?;

    tracing::info!(
        verification_id = %verification_id,
        donor_id = %verification.donor_id,
        decision = status.as_str(),
        "Verification decided"
    );
    Ok(())
}

/// The donor's current verification record, if any.
pub fn status_for_donor(
    conn: &Connection,
    donor_id: &Uuid,
) -> Result<Option<DonorVerification>, CoreError> {
    Ok(db::get_verification_by_donor(conn, donor_id)?)
}

/// Hospital work queue: pending verifications, newest submission first.
pub fn list_pending(conn: &Connection) -> Result<Vec<PendingVerification>, CoreError> {
    Ok(db::list_pending_verifications(conn)?)
}
