use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One message in a per-request conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub request_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub message: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

/// Conversation summary for a user's chat list: the other party, the last
/// message preview, and the unread count for that thread.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub request_id: Uuid,
    pub other_user_id: Uuid,
    pub other_user_name: String,
    pub last_message: String,
    pub last_message_at: NaiveDateTime,
    pub unread_count: u32,
}
