use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

// ═══════════════════════════════════════════
// Timestamp helpers
// ═══════════════════════════════════════════

/// Fixed-width storage format so lexical TEXT ordering is chronological.
const TS_FMT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FMT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .unwrap_or_default()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_id(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

// ═══════════════════════════════════════════
// User Repository
// ═══════════════════════════════════════════

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, name, email, phone, role, blood_group, is_verified,
         latitude, longitude, last_donation_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            user.id.to_string(),
            user.name,
            user.email,
            user.phone,
            user.role.as_str(),
            user.blood_group.map(|g| g.as_str()),
            user.is_verified as i32,
            user.latitude,
            user.longitude,
            user.last_donation_date.map(|d| d.to_string()),
            fmt_ts(user.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, phone, role, blood_group, is_verified,
         latitude, longitude, last_donation_date, created_at
         FROM users WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok(UserRow {
            id: row.get::<_, String>(0)?,
            name: row.get::<_, String>(1)?,
            email: row.get::<_, String>(2)?,
            phone: row.get::<_, Option<String>>(3)?,
            role: row.get::<_, String>(4)?,
            blood_group: row.get::<_, Option<String>>(5)?,
            is_verified: row.get::<_, i32>(6)?,
            latitude: row.get::<_, Option<f64>>(7)?,
            longitude: row.get::<_, Option<f64>>(8)?,
            last_donation_date: row.get::<_, Option<String>>(9)?,
            created_at: row.get::<_, String>(10)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(user_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Set the donor's verification flag. Returns false when the user is absent.
pub fn set_user_verified(
    conn: &Connection,
    donor_id: &Uuid,
    verified: bool,
) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE users SET is_verified = ?1 WHERE id = ?2",
        params![verified as i32, donor_id.to_string()],
    )?;
    Ok(rows > 0)
}

/// Stamp the donor's cooldown anchor after a recorded donation.
pub fn set_last_donation_date(
    conn: &Connection,
    donor_id: &Uuid,
    date: NaiveDate,
) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE users SET last_donation_date = ?1 WHERE id = ?2",
        params![date.to_string(), donor_id.to_string()],
    )?;
    Ok(rows > 0)
}

/// Cooldown anchor for a donor. Outer `None` means the user does not exist;
/// inner `None` means no prior donation.
pub fn get_last_donation_date(
    conn: &Connection,
    donor_id: &Uuid,
) -> Result<Option<Option<NaiveDate>>, DatabaseError> {
    let result = conn.query_row(
        "SELECT last_donation_date FROM users WHERE id = ?1",
        params![donor_id.to_string()],
        |row| row.get::<_, Option<String>>(0),
    );

    match result {
        Ok(date) => Ok(Some(date.and_then(|d| parse_date(&d)))),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// Internal row type for User mapping
struct UserRow {
    id: String,
    name: String,
    email: String,
    phone: Option<String>,
    role: String,
    blood_group: Option<String>,
    is_verified: i32,
    latitude: Option<f64>,
    longitude: Option<f64>,
    last_donation_date: Option<String>,
    created_at: String,
}

fn user_from_row(row: UserRow) -> Result<User, DatabaseError> {
    let blood_group = match row.blood_group {
        Some(g) => Some(BloodGroup::from_str(&g)?),
        None => None,
    };
    Ok(User {
        id: parse_id(&row.id)?,
        name: row.name,
        email: row.email,
        phone: row.phone,
        role: UserRole::from_str(&row.role)?,
        blood_group,
        is_verified: row.is_verified != 0,
        latitude: row.latitude,
        longitude: row.longitude,
        last_donation_date: row.last_donation_date.and_then(|d| parse_date(&d)),
        created_at: parse_ts(&row.created_at),
    })
}

// ═══════════════════════════════════════════
// Donor-candidate query (GeoMatcher input)
// ═══════════════════════════════════════════

/// Verified donors with the requested blood group and a known coordinate.
/// Distance filtering and ordering happen in `geo` (the bundled SQLite has
/// no trigonometric functions).
pub fn find_donor_candidates(
    conn: &Connection,
    blood_group: BloodGroup,
) -> Result<Vec<DonorMatch>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, phone, blood_group, latitude, longitude
         FROM users
         WHERE role = 'donor'
         AND is_verified = 1
         AND blood_group = ?1
         AND latitude IS NOT NULL
         AND longitude IS NOT NULL",
    )?;

    let rows = stmt.query_map(params![blood_group.as_str()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, f64>(4)?,
            row.get::<_, f64>(5)?,
        ))
    })?;

    let mut candidates = Vec::new();
    for row in rows {
        let (id, name, phone, group, latitude, longitude) = row?;
        candidates.push(DonorMatch {
            donor_id: parse_id(&id)?,
            name,
            phone,
            blood_group: BloodGroup::from_str(&group)?,
            latitude,
            longitude,
            distance_km: 0.0,
        });
    }
    Ok(candidates)
}

// ═══════════════════════════════════════════
// Blood Request Repository
// ═══════════════════════════════════════════

pub fn insert_request(conn: &Connection, req: &BloodRequest) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO blood_requests (id, patient_id, blood_group, units_needed, urgency,
         latitude, longitude, hospital_name, contact_number, additional_notes, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            req.id.to_string(),
            req.patient_id.to_string(),
            req.blood_group.as_str(),
            req.units_needed,
            req.urgency.as_str(),
            req.latitude,
            req.longitude,
            req.hospital_name,
            req.contact_number,
            req.additional_notes,
            req.status.as_str(),
            fmt_ts(req.created_at),
        ],
    )?;
    Ok(())
}

const REQUEST_COLS: &str = "id, patient_id, blood_group, units_needed, urgency,
     latitude, longitude, hospital_name, contact_number, additional_notes, status, created_at";

fn request_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get::<_, String>(0)?,
        patient_id: row.get::<_, String>(1)?,
        blood_group: row.get::<_, String>(2)?,
        units_needed: row.get::<_, u32>(3)?,
        urgency: row.get::<_, String>(4)?,
        latitude: row.get::<_, f64>(5)?,
        longitude: row.get::<_, f64>(6)?,
        hospital_name: row.get::<_, Option<String>>(7)?,
        contact_number: row.get::<_, Option<String>>(8)?,
        additional_notes: row.get::<_, Option<String>>(9)?,
        status: row.get::<_, String>(10)?,
        created_at: row.get::<_, String>(11)?,
    })
}

pub fn get_request(conn: &Connection, id: &Uuid) -> Result<Option<BloodRequest>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REQUEST_COLS} FROM blood_requests WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], request_row);

    match result {
        Ok(row) => Ok(Some(request_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Request joined with the patient contact card, for the details screen.
pub fn get_request_with_patient(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<(BloodRequest, String, String, Option<String>)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT br.id, br.patient_id, br.blood_group, br.units_needed, br.urgency,
                br.latitude, br.longitude, br.hospital_name, br.contact_number,
                br.additional_notes, br.status, br.created_at,
                u.name, u.email, u.phone
         FROM blood_requests br
         JOIN users u ON br.patient_id = u.id
         WHERE br.id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok((
            request_row(row)?,
            row.get::<_, String>(12)?,
            row.get::<_, String>(13)?,
            row.get::<_, Option<String>>(14)?,
        ))
    });

    match result {
        Ok((row, name, email, phone)) => Ok(Some((request_from_row(row)?, name, email, phone))),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// A patient's own requests, newest first.
pub fn list_requests_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<BloodRequest>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REQUEST_COLS} FROM blood_requests
         WHERE patient_id = ?1
         ORDER BY created_at DESC"
    ))?;

    let rows = stmt.query_map(params![patient_id.to_string()], request_row)?;
    rows.map(|r| request_from_row(r?)).collect()
}

/// Active requests for the donor feed: severity rank first (critical > high
/// > medium > low), then newest. The rank is an explicit CASE expression,
/// never the accidental alphabetical order of the urgency words.
pub fn list_active_requests(
    conn: &Connection,
) -> Result<Vec<(BloodRequest, String, Option<String>)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT br.id, br.patient_id, br.blood_group, br.units_needed, br.urgency,
                br.latitude, br.longitude, br.hospital_name, br.contact_number,
                br.additional_notes, br.status, br.created_at,
                u.name, u.phone
         FROM blood_requests br
         JOIN users u ON br.patient_id = u.id
         WHERE br.status = 'active'
         ORDER BY CASE br.urgency
                      WHEN 'critical' THEN 3
                      WHEN 'high' THEN 2
                      WHEN 'medium' THEN 1
                      ELSE 0
                  END DESC,
                  br.created_at DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            request_row(row)?,
            row.get::<_, String>(12)?,
            row.get::<_, Option<String>>(13)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (req, name, phone) = row?;
        out.push((request_from_row(req)?, name, phone));
    }
    Ok(out)
}

/// All requests regardless of status, newest first, for the hospital view.
pub fn list_all_requests(
    conn: &Connection,
    limit: u32,
) -> Result<Vec<(BloodRequest, String, Option<String>)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT br.id, br.patient_id, br.blood_group, br.units_needed, br.urgency,
                br.latitude, br.longitude, br.hospital_name, br.contact_number,
                br.additional_notes, br.status, br.created_at,
                u.name, u.phone
         FROM blood_requests br
         JOIN users u ON br.patient_id = u.id
         ORDER BY br.created_at DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| {
        Ok((
            request_row(row)?,
            row.get::<_, String>(12)?,
            row.get::<_, Option<String>>(13)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (req, name, phone) = row?;
        out.push((request_from_row(req)?, name, phone));
    }
    Ok(out)
}

pub fn update_request_status(
    conn: &Connection,
    id: &Uuid,
    status: RequestStatus,
) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE blood_requests SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id.to_string()],
    )?;
    Ok(rows > 0)
}

/// Conditional fulfilment: flips `active → fulfilled` and reports whether
/// this call won. Zero rows means a concurrent writer already claimed the
/// request (or it was never active).
pub fn fulfil_request_if_active(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE blood_requests SET status = 'fulfilled' WHERE id = ?1 AND status = 'active'",
        params![id.to_string()],
    )?;
    Ok(rows > 0)
}

// Internal row type for BloodRequest mapping
struct RequestRow {
    id: String,
    patient_id: String,
    blood_group: String,
    units_needed: u32,
    urgency: String,
    latitude: f64,
    longitude: f64,
    hospital_name: Option<String>,
    contact_number: Option<String>,
    additional_notes: Option<String>,
    status: String,
    created_at: String,
}

fn request_from_row(row: RequestRow) -> Result<BloodRequest, DatabaseError> {
    Ok(BloodRequest {
        id: parse_id(&row.id)?,
        patient_id: parse_id(&row.patient_id)?,
        blood_group: BloodGroup::from_str(&row.blood_group)?,
        units_needed: row.units_needed,
        urgency: Urgency::from_str(&row.urgency)?,
        latitude: row.latitude,
        longitude: row.longitude,
        hospital_name: row.hospital_name,
        contact_number: row.contact_number,
        additional_notes: row.additional_notes,
        status: RequestStatus::from_str(&row.status)?,
        created_at: parse_ts(&row.created_at),
    })
}

// ═══════════════════════════════════════════
// Request Response Repository
// ═══════════════════════════════════════════

/// Upsert the (request, donor) response row. The UNIQUE(request_id, donor_id)
/// key makes retries idempotent and resubmission last-write-wins; the
/// original row id survives an overwrite.
pub fn upsert_response(conn: &Connection, resp: &RequestResponse) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO request_responses (id, request_id, donor_id, response, message, responded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (request_id, donor_id)
         DO UPDATE SET response = excluded.response,
                       message = excluded.message,
                       responded_at = excluded.responded_at",
        params![
            resp.id.to_string(),
            resp.request_id.to_string(),
            resp.donor_id.to_string(),
            resp.response.as_str(),
            resp.message,
            fmt_ts(resp.responded_at),
        ],
    )?;
    Ok(())
}

pub fn get_response(
    conn: &Connection,
    request_id: &Uuid,
    donor_id: &Uuid,
) -> Result<Option<RequestResponse>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, request_id, donor_id, response, message, responded_at
         FROM request_responses
         WHERE request_id = ?1 AND donor_id = ?2",
    )?;

    let result = stmt.query_row(
        params![request_id.to_string(), donor_id.to_string()],
        response_row,
    );

    match result {
        Ok(row) => Ok(Some(response_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All responses to a request, newest first, with the donor contact card.
pub fn list_responses_for_request(
    conn: &Connection,
    request_id: &Uuid,
) -> Result<Vec<(RequestResponse, String, Option<String>)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT rr.id, rr.request_id, rr.donor_id, rr.response, rr.message, rr.responded_at,
                u.name, u.phone
         FROM request_responses rr
         JOIN users u ON rr.donor_id = u.id
         WHERE rr.request_id = ?1
         ORDER BY rr.responded_at DESC",
    )?;

    let rows = stmt.query_map(params![request_id.to_string()], |row| {
        Ok((
            response_row(row)?,
            row.get::<_, String>(6)?,
            row.get::<_, Option<String>>(7)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (resp, name, phone) = row?;
        out.push((response_from_row(resp)?, name, phone));
    }
    Ok(out)
}

fn response_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResponseRow> {
    Ok(ResponseRow {
        id: row.get::<_, String>(0)?,
        request_id: row.get::<_, String>(1)?,
        donor_id: row.get::<_, String>(2)?,
        response: row.get::<_, String>(3)?,
        message: row.get::<_, Option<String>>(4)?,
        responded_at: row.get::<_, String>(5)?,
    })
}

struct ResponseRow {
    id: String,
    request_id: String,
    donor_id: String,
    response: String,
    message: Option<String>,
    responded_at: String,
}

fn response_from_row(row: ResponseRow) -> Result<RequestResponse, DatabaseError> {
    Ok(RequestResponse {
        id: parse_id(&row.id)?,
        request_id: parse_id(&row.request_id)?,
        donor_id: parse_id(&row.donor_id)?,
        response: ResponseChoice::from_str(&row.response)?,
        message: row.message,
        responded_at: parse_ts(&row.responded_at),
    })
}

// ═══════════════════════════════════════════
// Donor Verification Repository
// ═══════════════════════════════════════════

/// Upsert the single verification row per donor. Resubmission always resets
/// the record to `pending` and clears the previous decision.
pub fn upsert_verification(
    conn: &Connection,
    id: Uuid,
    donor_id: &Uuid,
    front_image_ref: &str,
    back_image_ref: &str,
    submitted_at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO donor_verifications
         (id, donor_id, front_image_ref, back_image_ref, status, submitted_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5)
         ON CONFLICT (donor_id)
         DO UPDATE SET front_image_ref = excluded.front_image_ref,
                       back_image_ref = excluded.back_image_ref,
                       status = 'pending',
                       rejection_reason = NULL,
                       verified_by_hospital_id = NULL,
                       verified_at = NULL,
                       submitted_at = excluded.submitted_at",
        params![
            id.to_string(),
            donor_id.to_string(),
            front_image_ref,
            back_image_ref,
            fmt_ts(submitted_at),
        ],
    )?;
    Ok(())
}

const VERIFICATION_COLS: &str = "id, donor_id, front_image_ref, back_image_ref, status,
     rejection_reason, verified_by_hospital_id, submitted_at, verified_at";

fn verification_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VerificationRow> {
    Ok(VerificationRow {
        id: row.get::<_, String>(0)?,
        donor_id: row.get::<_, String>(1)?,
        front_image_ref: row.get::<_, String>(2)?,
        back_image_ref: row.get::<_, String>(3)?,
        status: row.get::<_, String>(4)?,
        rejection_reason: row.get::<_, Option<String>>(5)?,
        verified_by_hospital_id: row.get::<_, Option<String>>(6)?,
        submitted_at: row.get::<_, String>(7)?,
        verified_at: row.get::<_, Option<String>>(8)?,
    })
}

pub fn get_verification(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<DonorVerification>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VERIFICATION_COLS} FROM donor_verifications WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], verification_row);

    match result {
        Ok(row) => Ok(Some(verification_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_verification_by_donor(
    conn: &Connection,
    donor_id: &Uuid,
) -> Result<Option<DonorVerification>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VERIFICATION_COLS} FROM donor_verifications WHERE donor_id = ?1"
    ))?;

    let result = stmt.query_row(params![donor_id.to_string()], verification_row);

    match result {
        Ok(row) => Ok(Some(verification_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The hospital work queue: pending verifications, newest submission first.
pub fn list_pending_verifications(
    conn: &Connection,
) -> Result<Vec<PendingVerification>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT dv.id, dv.donor_id, dv.front_image_ref, dv.back_image_ref, dv.status,
                dv.rejection_reason, dv.verified_by_hospital_id, dv.submitted_at, dv.verified_at,
                u.name, u.email, u.phone, u.blood_group
         FROM donor_verifications dv
         JOIN users u ON dv.donor_id = u.id
         WHERE dv.status = 'pending'
         ORDER BY dv.submitted_at DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            verification_row(row)?,
            row.get::<_, String>(9)?,
            row.get::<_, String>(10)?,
            row.get::<_, Option<String>>(11)?,
            row.get::<_, Option<String>>(12)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (v, name, email, phone, group) = row?;
        let donor_blood_group = match group {
            Some(g) => Some(BloodGroup::from_str(&g)?),
            None => None,
        };
        out.push(PendingVerification {
            verification: verification_from_row(v)?,
            donor_name: name,
            donor_email: email,
            donor_phone: phone,
            donor_blood_group,
        });
    }
    Ok(out)
}

/// Record the hospital's decision on a pending verification.
pub fn decide_verification(
    conn: &Connection,
    id: &Uuid,
    hospital_id: &Uuid,
    status: VerificationStatus,
    reason: Option<&str>,
    verified_at: NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE donor_verifications
         SET status = ?1, verified_by_hospital_id = ?2, rejection_reason = ?3, verified_at = ?4
         WHERE id = ?5",
        params![
            status.as_str(),
            hospital_id.to_string(),
            reason,
            fmt_ts(verified_at),
            id.to_string(),
        ],
    )?;
    Ok(rows > 0)
}

struct VerificationRow {
    id: String,
    donor_id: String,
    front_image_ref: String,
    back_image_ref: String,
    status: String,
    rejection_reason: Option<String>,
    verified_by_hospital_id: Option<String>,
    submitted_at: String,
    verified_at: Option<String>,
}

fn verification_from_row(row: VerificationRow) -> Result<DonorVerification, DatabaseError> {
    Ok(DonorVerification {
        id: parse_id(&row.id)?,
        donor_id: parse_id(&row.donor_id)?,
        front_image_ref: row.front_image_ref,
        back_image_ref: row.back_image_ref,
        status: VerificationStatus::from_str(&row.status)?,
        rejection_reason: row.rejection_reason,
        verified_by_hospital_id: row
            .verified_by_hospital_id
            .and_then(|s| Uuid::parse_str(&s).ok()),
        submitted_at: parse_ts(&row.submitted_at),
        verified_at: row.verified_at.map(|s| parse_ts(&s)),
    })
}

// ═══════════════════════════════════════════
// Donation Repository
// ═══════════════════════════════════════════

pub fn insert_donation(conn: &Connection, donation: &Donation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO donations (id, donor_id, request_id, hospital_id, units_donated, notes, donation_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            donation.id.to_string(),
            donation.donor_id.to_string(),
            donation.request_id.to_string(),
            donation.hospital_id.to_string(),
            donation.units_donated,
            donation.notes,
            donation.donation_date.to_string(),
        ],
    )?;
    Ok(())
}

pub fn donation_exists_for_request(
    conn: &Connection,
    request_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT COUNT(*) > 0 FROM donations WHERE request_id = ?1",
        params![request_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

const DONATION_JOIN: &str = "SELECT d.id, d.donor_id, d.request_id, d.hospital_id,
            d.units_donated, d.notes, d.donation_date,
            donor.name, hospital.name, patient.name
     FROM donations d
     JOIN users donor ON d.donor_id = donor.id
     JOIN users hospital ON d.hospital_id = hospital.id
     JOIN blood_requests br ON d.request_id = br.id
     JOIN users patient ON br.patient_id = patient.id";

fn donation_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(DonationRow, String, String, String)> {
    Ok((
        DonationRow {
            id: row.get::<_, String>(0)?,
            donor_id: row.get::<_, String>(1)?,
            request_id: row.get::<_, String>(2)?,
            hospital_id: row.get::<_, String>(3)?,
            units_donated: row.get::<_, u32>(4)?,
            notes: row.get::<_, Option<String>>(5)?,
            donation_date: row.get::<_, String>(6)?,
        },
        row.get::<_, String>(7)?,
        row.get::<_, String>(8)?,
        row.get::<_, String>(9)?,
    ))
}

/// A donor's donation history, newest first.
pub fn list_donations_by_donor(
    conn: &Connection,
    donor_id: &Uuid,
) -> Result<Vec<DonationRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{DONATION_JOIN} WHERE d.donor_id = ?1 ORDER BY d.donation_date DESC"
    ))?;
    let rows = stmt.query_map(params![donor_id.to_string()], donation_record_row)?;
    collect_donation_records(rows)
}

/// Donations performed at a hospital, newest first.
pub fn list_donations_by_hospital(
    conn: &Connection,
    hospital_id: &Uuid,
    limit: u32,
) -> Result<Vec<DonationRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{DONATION_JOIN} WHERE d.hospital_id = ?1 ORDER BY d.donation_date DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![hospital_id.to_string(), limit], donation_record_row)?;
    collect_donation_records(rows)
}

fn collect_donation_records(
    rows: impl Iterator<Item = rusqlite::Result<(DonationRow, String, String, String)>>,
) -> Result<Vec<DonationRecord>, DatabaseError> {
    let mut out = Vec::new();
    for row in rows {
        let (d, donor_name, hospital_name, patient_name) = row?;
        out.push(DonationRecord {
            donation: donation_from_row(d)?,
            donor_name,
            hospital_name,
            patient_name,
        });
    }
    Ok(out)
}

/// Aggregate counters, optionally scoped to one hospital.
pub fn donation_stats(
    conn: &Connection,
    hospital_id: Option<&Uuid>,
) -> Result<DonationStats, DatabaseError> {
    let (sql, params_vec): (&str, Vec<String>) = match hospital_id {
        Some(id) => (
            "SELECT COUNT(*), COALESCE(SUM(units_donated), 0), COUNT(DISTINCT donor_id)
             FROM donations WHERE hospital_id = ?1",
            vec![id.to_string()],
        ),
        None => (
            "SELECT COUNT(*), COALESCE(SUM(units_donated), 0), COUNT(DISTINCT donor_id)
             FROM donations",
            vec![],
        ),
    };

    let stats = conn.query_row(
        sql,
        rusqlite::params_from_iter(params_vec.iter()),
        |row| {
            Ok(DonationStats {
                total_donations: row.get::<_, i64>(0)? as u64,
                total_units: row.get::<_, i64>(1)? as u64,
                unique_donors: row.get::<_, i64>(2)? as u64,
            })
        },
    )?;
    Ok(stats)
}

struct DonationRow {
    id: String,
    donor_id: String,
    request_id: String,
    hospital_id: String,
    units_donated: u32,
    notes: Option<String>,
    donation_date: String,
}

fn donation_from_row(row: DonationRow) -> Result<Donation, DatabaseError> {
    Ok(Donation {
        id: parse_id(&row.id)?,
        donor_id: parse_id(&row.donor_id)?,
        request_id: parse_id(&row.request_id)?,
        hospital_id: parse_id(&row.hospital_id)?,
        units_donated: row.units_donated,
        notes: row.notes,
        donation_date: parse_date(&row.donation_date).unwrap_or_default(),
    })
}

// ═══════════════════════════════════════════
// Chat Repository
// ═══════════════════════════════════════════

pub fn insert_chat_message(conn: &Connection, msg: &ChatMessage) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO chat_messages (id, request_id, sender_id, receiver_id, message, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            msg.id.to_string(),
            msg.request_id.to_string(),
            msg.sender_id.to_string(),
            msg.receiver_id.to_string(),
            msg.message,
            msg.is_read as i32,
            fmt_ts(msg.created_at),
        ],
    )?;
    Ok(())
}

/// Whether any message already flows between the pair on this request, in
/// either direction. Guards the acceptance bootstrap against duplicates.
pub fn thread_exists(
    conn: &Connection,
    request_id: &Uuid,
    user_a: &Uuid,
    user_b: &Uuid,
) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT COUNT(*) > 0 FROM chat_messages
         WHERE request_id = ?1
         AND ((sender_id = ?2 AND receiver_id = ?3) OR (sender_id = ?3 AND receiver_id = ?2))",
        params![
            request_id.to_string(),
            user_a.to_string(),
            user_b.to_string()
        ],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Messages in a request thread visible to one participant, oldest first.
pub fn list_chat_messages(
    conn: &Connection,
    request_id: &Uuid,
    user_id: &Uuid,
) -> Result<Vec<ChatMessage>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, request_id, sender_id, receiver_id, message, is_read, created_at
         FROM chat_messages
         WHERE request_id = ?1 AND (sender_id = ?2 OR receiver_id = ?2)
         ORDER BY created_at ASC",
    )?;

    let rows = stmt.query_map(
        params![request_id.to_string(), user_id.to_string()],
        chat_row,
    )?;
    rows.map(|r| chat_from_row(r?)).collect()
}

pub fn mark_messages_read(
    conn: &Connection,
    request_id: &Uuid,
    receiver_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE chat_messages SET is_read = 1
         WHERE request_id = ?1 AND receiver_id = ?2 AND is_read = 0",
        params![request_id.to_string(), receiver_id.to_string()],
    )?;
    Ok(())
}

pub fn unread_message_count(conn: &Connection, user_id: &Uuid) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM chat_messages WHERE receiver_id = ?1 AND is_read = 0",
        params![user_id.to_string()],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count as u32)
}

/// Per-request conversation summaries for a user's chat list, most recent
/// thread first.
pub fn conversation_list(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Vec<ConversationSummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT cm.request_id,
                CASE WHEN cm.sender_id = ?1 THEN cm.receiver_id ELSE cm.sender_id END AS other_id,
                u.name,
                (SELECT message FROM chat_messages
                 WHERE request_id = cm.request_id ORDER BY created_at DESC LIMIT 1),
                (SELECT created_at FROM chat_messages
                 WHERE request_id = cm.request_id ORDER BY created_at DESC LIMIT 1),
                (SELECT COUNT(*) FROM chat_messages
                 WHERE request_id = cm.request_id AND receiver_id = ?1 AND is_read = 0)
         FROM chat_messages cm
         JOIN users u ON u.id = CASE WHEN cm.sender_id = ?1 THEN cm.receiver_id ELSE cm.sender_id END
         WHERE cm.sender_id = ?1 OR cm.receiver_id = ?1
         GROUP BY cm.request_id, other_id
         ORDER BY 5 DESC",
    )?;

    let rows = stmt.query_map(params![user_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i64>(5)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (request_id, other_id, name, last, last_at, unread) = row?;
        out.push(ConversationSummary {
            request_id: parse_id(&request_id)?,
            other_user_id: parse_id(&other_id)?,
            other_user_name: name,
            last_message: last,
            last_message_at: parse_ts(&last_at),
            unread_count: unread as u32,
        });
    }
    Ok(out)
}

fn chat_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get::<_, String>(0)?,
        request_id: row.get::<_, String>(1)?,
        sender_id: row.get::<_, String>(2)?,
        receiver_id: row.get::<_, String>(3)?,
        message: row.get::<_, String>(4)?,
        is_read: row.get::<_, i32>(5)?,
        created_at: row.get::<_, String>(6)?,
    })
}

struct ChatRow {
    id: String,
    request_id: String,
    sender_id: String,
    receiver_id: String,
    message: String,
    is_read: i32,
    created_at: String,
}

fn chat_from_row(row: ChatRow) -> Result<ChatMessage, DatabaseError> {
    Ok(ChatMessage {
        id: parse_id(&row.id)?,
        request_id: parse_id(&row.request_id)?,
        sender_id: parse_id(&row.sender_id)?,
        receiver_id: parse_id(&row.receiver_id)?,
        message: row.message,
        is_read: row.is_read != 0,
        created_at: parse_ts(&row.created_at),
    })
}

// ═══════════════════════════════════════════
// Notification Repository
// ═══════════════════════════════════════════

pub fn insert_notification(
    conn: &Connection,
    id: Uuid,
    payload: &NotificationPayload,
    created_at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO notifications (id, user_id, title, message, type, request_id, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
        params![
            id.to_string(),
            payload.user_id.to_string(),
            payload.title,
            payload.message,
            payload.kind.as_str(),
            payload.request_id.map(|r| r.to_string()),
            fmt_ts(created_at),
        ],
    )?;
    Ok(())
}

/// A user's notifications, newest first.
pub fn list_notifications(
    conn: &Connection,
    user_id: &Uuid,
    limit: u32,
) -> Result<Vec<Notification>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, title, message, type, request_id, is_read, created_at
         FROM notifications
         WHERE user_id = ?1
         ORDER BY created_at DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![user_id.to_string(), limit], |row| {
        Ok(NotificationRow {
            id: row.get::<_, String>(0)?,
            user_id: row.get::<_, String>(1)?,
            title: row.get::<_, String>(2)?,
            message: row.get::<_, String>(3)?,
            kind: row.get::<_, String>(4)?,
            request_id: row.get::<_, Option<String>>(5)?,
            is_read: row.get::<_, i32>(6)?,
            created_at: row.get::<_, String>(7)?,
        })
    })?;

    rows.map(|r| notification_from_row(r?)).collect()
}

/// Mark one notification read. Scoped to the owner so one user cannot touch
/// another's queue.
pub fn mark_notification_read(
    conn: &Connection,
    id: &Uuid,
    user_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
        params![id.to_string(), user_id.to_string()],
    )?;
    Ok(rows > 0)
}

pub fn mark_all_notifications_read(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
        params![user_id.to_string()],
    )?;
    Ok(())
}

struct NotificationRow {
    id: String,
    user_id: String,
    title: String,
    message: String,
    kind: String,
    request_id: Option<String>,
    is_read: i32,
    created_at: String,
}

fn notification_from_row(row: NotificationRow) -> Result<Notification, DatabaseError> {
    Ok(Notification {
        id: parse_id(&row.id)?,
        user_id: parse_id(&row.user_id)?,
        title: row.title,
        message: row.message,
        kind: NotificationKind::from_str(&row.kind)?,
        request_id: row.request_id.and_then(|s| Uuid::parse_str(&s).ok()),
        is_read: row.is_read != 0,
        created_at: parse_ts(&row.created_at),
    })
}
