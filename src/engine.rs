//! Engine facade.
//!
//! The one surface callers consume. Holds an explicitly injected store
//! connection (no module-global handle) behind a mutex, receives the
//! caller's identity as an `Actor` from the external identity provider,
//! and gates each operation by role before dispatching into the domain
//! modules. Infrastructure failures are logged here and surfaced as the
//! generic storage error; every domain-rule violation stays typed.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::error::CoreError;
use crate::models::{
    ActiveRequestView, BloodRequest, ChatMessage, ConversationSummary, CreatedRequest,
    DonationRecord, DonationStats, DonorVerification, NewRequest, Notification,
    PendingVerification, RequestDetails, ResponseChoice, UserRole, VerificationStatus,
};
use crate::Result;
use crate::{chat, donations, eligibility, lifecycle, notifications, responses, verification};

/// Caller identity, supplied per call by the identity provider.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self { user_id, role }
    }

    fn require(&self, role: UserRole) -> Result<()> {
        if self.role != role {
            return Err(CoreError::Unauthorized(format!(
                "operation requires the {} role",
                role.as_str()
            )));
        }
        Ok(())
    }
}

pub struct Engine {
    conn: Mutex<Connection>,
}

impl Engine {
    /// Wrap an already opened connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(db::open_database(path)?))
    }

    /// In-memory engine, mainly for tests and tooling.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(db::open_memory_database()?))
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock leaves the store consistent
        // (transactions roll back), so the poison flag carries no signal.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Requests ────────────────────────────────────────────────

    /// Patient: create a blood request and learn how many verified donors
    /// were matched for notification.
    pub fn create_request(&self, actor: &Actor, new: NewRequest) -> Result<CreatedRequest> {
        actor.require(UserRole::Patient)?;
        let conn = self.lock();
        lifecycle::create(&conn, &actor.user_id, new).map_err(log_if_infra)
    }

    /// Patient: own requests, newest first.
    pub fn list_my_requests(&self, actor: &Actor) -> Result<Vec<BloodRequest>> {
        actor.require(UserRole::Patient)?;
        let conn = self.lock();
        lifecycle::list_for_patient(&conn, &actor.user_id).map_err(log_if_infra)
    }

    /// Donor: the active-request feed, annotated with the caller's own
    /// response per item.
    pub fn list_active_requests(&self, actor: &Actor) -> Result<Vec<ActiveRequestView>> {
        actor.require(UserRole::Donor)?;
        let conn = self.lock();
        lifecycle::list_active(&conn, Some(&actor.user_id)).map_err(log_if_infra)
    }

    /// Hospital: every request regardless of status.
    pub fn list_all_requests(&self, actor: &Actor) -> Result<Vec<ActiveRequestView>> {
        actor.require(UserRole::Hospital)?;
        let conn = self.lock();
        lifecycle::list_all(&conn).map_err(log_if_infra)
    }

    /// Any authenticated user: request detail plus the caller's own
    /// response when one exists.
    pub fn get_request_details(&self, actor: &Actor, request_id: &Uuid) -> Result<RequestDetails> {
        let conn = self.lock();
        lifecycle::get_details(&conn, request_id, &actor.user_id).map_err(log_if_infra)
    }

    /// Patient (owner): cancel an active request.
    pub fn cancel_request(&self, actor: &Actor, request_id: &Uuid) -> Result<()> {
        actor.require(UserRole::Patient)?;
        let conn = self.lock();
        lifecycle::cancel(&conn, request_id, &actor.user_id).map_err(log_if_infra)
    }

    /// Donor: accept or reject a request. Acceptance opens the chat thread
    /// with the patient.
    pub fn respond_to_request(
        &self,
        actor: &Actor,
        request_id: &Uuid,
        response: ResponseChoice,
        message: Option<String>,
    ) -> Result<()> {
        actor.require(UserRole::Donor)?;
        let conn = self.lock();
        responses::respond(&conn, request_id, &actor.user_id, response, message)
            .map_err(log_if_infra)
    }

    // ── Verification ────────────────────────────────────────────

    /// Donor: submit identity documents (opaque image references).
    pub fn submit_verification(&self, actor: &Actor, front_ref: &str, back_ref: &str) -> Result<()> {
        actor.require(UserRole::Donor)?;
        let conn = self.lock();
        verification::submit(&conn, &actor.user_id, front_ref, back_ref).map_err(log_if_infra)
    }

    /// Donor: current verification record, or `None` before any submission.
    pub fn get_verification_status(&self, actor: &Actor) -> Result<Option<DonorVerification>> {
        actor.require(UserRole::Donor)?;
        let conn = self.lock();
        verification::status_for_donor(&conn, &actor.user_id).map_err(log_if_infra)
    }

    /// Hospital: rule on a pending verification.
    pub fn decide_verification(
        &self,
        actor: &Actor,
        verification_id: &Uuid,
        status: VerificationStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        actor.require(UserRole::Hospital)?;
        let conn = self.lock();
        verification::decide(&conn, verification_id, &actor.user_id, status, reason)
            .map_err(log_if_infra)
    }

    /// Hospital: the pending-verification work queue.
    pub fn list_pending_verifications(&self, actor: &Actor) -> Result<Vec<PendingVerification>> {
        actor.require(UserRole::Hospital)?;
        let conn = self.lock();
        verification::list_pending(&conn).map_err(log_if_infra)
    }

    // ── Donations ───────────────────────────────────────────────

    /// Hospital: record a completed donation. Atomic; re-checks donor
    /// eligibility at write time.
    pub fn record_donation(
        &self,
        actor: &Actor,
        donor_id: &Uuid,
        request_id: &Uuid,
        units_donated: u32,
        notes: Option<String>,
    ) -> Result<Uuid> {
        actor.require(UserRole::Hospital)?;
        let mut conn = self.lock();
        donations::record(
            &mut conn,
            donor_id,
            request_id,
            &actor.user_id,
            units_donated,
            notes,
        )
        .map_err(log_if_infra)
    }

    /// Hospital: preview a donor's cooldown state. Advisory only — the
    /// recording path re-checks regardless.
    pub fn check_donor_eligibility(
        &self,
        actor: &Actor,
        donor_id: &Uuid,
    ) -> Result<eligibility::Eligibility> {
        actor.require(UserRole::Hospital)?;
        let conn = self.lock();
        eligibility::check_eligibility(&conn, donor_id, chrono::Utc::now().date_naive())
            .map_err(log_if_infra)
    }

    /// Donor: own donation history.
    pub fn get_donor_history(&self, actor: &Actor) -> Result<Vec<DonationRecord>> {
        actor.require(UserRole::Donor)?;
        let conn = self.lock();
        donations::history_for_donor(&conn, &actor.user_id).map_err(log_if_infra)
    }

    /// Hospital: donations performed there.
    pub fn get_hospital_donations(&self, actor: &Actor) -> Result<Vec<DonationRecord>> {
        actor.require(UserRole::Hospital)?;
        let conn = self.lock();
        donations::history_for_hospital(&conn, &actor.user_id).map_err(log_if_infra)
    }

    /// Hospital: aggregate donation counters for the dashboard.
    pub fn get_donation_stats(&self, actor: &Actor) -> Result<DonationStats> {
        actor.require(UserRole::Hospital)?;
        let conn = self.lock();
        donations::stats(&conn, Some(&actor.user_id)).map_err(log_if_infra)
    }

    // ── Chat ────────────────────────────────────────────────────

    pub fn send_chat_message(
        &self,
        actor: &Actor,
        request_id: &Uuid,
        receiver_id: &Uuid,
        text: &str,
    ) -> Result<Uuid> {
        let conn = self.lock();
        chat::send_message(&conn, request_id, &actor.user_id, receiver_id, text)
            .map_err(log_if_infra)
    }

    /// Thread for a request as the caller sees it; marks incoming read.
    pub fn get_chat_messages(&self, actor: &Actor, request_id: &Uuid) -> Result<Vec<ChatMessage>> {
        let conn = self.lock();
        chat::messages(&conn, request_id, &actor.user_id).map_err(log_if_infra)
    }

    pub fn get_conversation_list(&self, actor: &Actor) -> Result<Vec<ConversationSummary>> {
        let conn = self.lock();
        chat::conversation_list(&conn, &actor.user_id).map_err(log_if_infra)
    }

    pub fn get_unread_count(&self, actor: &Actor) -> Result<u32> {
        let conn = self.lock();
        chat::unread_count(&conn, &actor.user_id).map_err(log_if_infra)
    }

    // ── Notifications ───────────────────────────────────────────

    pub fn list_notifications(&self, actor: &Actor) -> Result<Vec<Notification>> {
        let conn = self.lock();
        notifications::list_for_user(&conn, &actor.user_id).map_err(log_if_infra)
    }

    pub fn mark_notification_read(&self, actor: &Actor, notification_id: &Uuid) -> Result<()> {
        let conn = self.lock();
        notifications::mark_read(&conn, notification_id, &actor.user_id).map_err(log_if_infra)
    }

    pub fn mark_all_notifications_read(&self, actor: &Actor) -> Result<()> {
        let conn = self.lock();
        notifications::mark_all_read(&conn, &actor.user_id).map_err(log_if_infra)
    }
}

/// Callers can act on domain errors; they cannot act on storage faults, so
/// those get logged here and pass through as the generic variant.
fn log_if_infra(err: CoreError) -> CoreError {
    match &err {
        CoreError::Database(inner) => {
            tracing::error!(error = %inner, "Storage failure");
            err
        }
        CoreError::Timeout(ms) => {
            tracing::warn!(budget_ms = ms, "Store call exceeded busy timeout");
            err
        }
        _ => err,
    }
}
