//! Database row types — these map directly to SQLite rows.
//! Distinct from the courier-types API models so the store boundary stays
//! explicit: timestamps and ids are parsed here and malformed rows are
//! rejected at mapping time, never passed through as raw strings.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct UserRow {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub joined_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

pub struct MessageRow {
    pub id: Uuid,
    pub from_username: String,
    pub to_username: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Public display fields of the counterparty, joined in with each message
/// row so listings need a single query.
pub struct ContactRow {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

pub struct MessageWithContactRow {
    pub message: MessageRow,
    pub contact: ContactRow,
}
