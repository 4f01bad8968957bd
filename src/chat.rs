//! Per-request chat threads.
//!
//! A conversation lives under a blood request between the patient and one
//! responding donor. The response coordinator opens the thread on
//! acceptance; afterwards both sides talk through here. Reads are
//! participant-scoped, so a user only ever sees messages they sent or
//! received.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::error::CoreError;
use crate::models::{ChatMessage, ConversationSummary};

/// Send a message within a request's thread.
pub fn send_message(
    conn: &Connection,
    request_id: &Uuid,
    sender_id: &Uuid,
    receiver_id: &Uuid,
    text: &str,
) -> Result<Uuid, CoreError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CoreError::InvalidArgument("message cannot be empty".into()));
    }
    if db::get_request(conn, request_id)?.is_none() {
        return Err(CoreError::not_found("request", request_id));
    }

    let msg = ChatMessage {
        id: Uuid::new_v4(),
        request_id: *request_id,
        sender_id: *sender_id,
        receiver_id: *receiver_id,
        message: text.to_string(),
        is_read: false,
        created_at: Utc::now().naive_utc(),
    };
    db::insert_chat_message(conn, &msg)?;
    Ok(msg.id)
}

/// A participant's view of the thread, oldest first. Fetching also marks
/// the caller's incoming messages read, matching the read-on-open UX.
pub fn messages(
    conn: &Connection,
    request_id: &Uuid,
    user_id: &Uuid,
) -> Result<Vec<ChatMessage>, CoreError> {
    let msgs = db::list_chat_messages(conn, request_id, user_id)?;
    db::mark_messages_read(conn, request_id, user_id)?;
    Ok(msgs)
}

/// All of a user's conversation threads, most recently active first.
pub fn conversation_list(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Vec<ConversationSummary>, CoreError> {
    Ok(db::conversation_list(conn, user_id)?)
}

/// Unread messages across all of a user's threads.
pub fn unread_count(conn: &Connection, user_id: &Uuid) -> Result<u32, CoreError> {
    Ok(db::unread_message_count(conn, user_id)?)
}
