use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::{ContactRow, MessageRow, MessageWithContactRow, UserRow};
use crate::{Database, StoreError};

impl Database {
    // -- Users --

    /// Insert-or-fail: the primary key on `username` makes two concurrent
    /// registrations race safely. Exactly one wins, the other gets
    /// `StoreError::UniqueViolation`.
    pub fn create_user(&self, user: &UserRow) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password_hash, first_name, last_name, phone, joined_at, last_login_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    user.username,
                    user.password_hash,
                    user.first_name,
                    user.last_name,
                    user.phone,
                    user.joined_at,
                    user.last_login_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT username, password_hash, first_name, last_name, phone, joined_at, last_login_at
                 FROM users WHERE username = ?1",
            )?
            .query_row([username], map_user)
            .optional()
        })
    }

    /// Directory listing, ordered by last name.
    pub fn list_users(&self) -> Result<Vec<UserRow>, StoreError> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT username, password_hash, first_name, last_name, phone, joined_at, last_login_at
                 FROM users ORDER BY last_name, username",
            )?
            .query_map([], map_user)?
            .collect()
        })
    }

    pub fn update_last_login(&self, username: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET last_login_at = ?1 WHERE username = ?2",
                rusqlite::params![at, username],
            )?;
            Ok(())
        })
    }

    pub fn user_exists(&self, username: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT 1 FROM users WHERE username = ?1",
                [username],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
        })
    }

    // -- Messages --

    pub fn insert_message(&self, message: &MessageRow) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, from_username, to_username, body, sent_at, read_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    message.id.to_string(),
                    message.from_username,
                    message.to_username,
                    message.body,
                    message.sent_at,
                    message.read_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT id, from_username, to_username, body, sent_at, read_at
                 FROM messages WHERE id = ?1",
            )?
            .query_row([id.to_string()], map_message)
            .optional()
        })
    }

    /// Messages sent by `username`, each joined with the recipient's
    /// display fields, oldest first.
    pub fn messages_from(&self, username: &str) -> Result<Vec<MessageWithContactRow>, StoreError> {
        self.with_conn(|conn| {
            query_messages_with_contact(
                conn,
                "SELECT m.id, m.from_username, m.to_username, m.body, m.sent_at, m.read_at,
                        t.username, t.first_name, t.last_name, t.phone
                 FROM messages m
                 JOIN users t ON m.to_username = t.username
                 WHERE m.from_username = ?1
                 ORDER BY m.sent_at, m.id",
                username,
            )
        })
    }

    /// Messages received by `username`, each joined with the sender's
    /// display fields, oldest first.
    pub fn messages_to(&self, username: &str) -> Result<Vec<MessageWithContactRow>, StoreError> {
        self.with_conn(|conn| {
            query_messages_with_contact(
                conn,
                "SELECT m.id, m.from_username, m.to_username, m.body, m.sent_at, m.read_at,
                        f.username, f.first_name, f.last_name, f.phone
                 FROM messages m
                 JOIN users f ON m.from_username = f.username
                 WHERE m.to_username = ?1
                 ORDER BY m.sent_at, m.id",
                username,
            )
        })
    }

    /// Conditional read-receipt write: only lands while `read_at` is still
    /// null, so concurrent calls cannot overwrite the first timestamp.
    /// Returns whether this call set it.
    pub fn mark_read(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET read_at = ?1 WHERE id = ?2 AND read_at IS NULL",
                rusqlite::params![at, id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }
}

fn map_user(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        username: row.get(0)?,
        password_hash: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        phone: row.get(4)?,
        joined_at: row.get(5)?,
        last_login_at: row.get(6)?,
    })
}

fn map_message(row: &Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: parse_uuid(0, row.get(0)?)?,
        from_username: row.get(1)?,
        to_username: row.get(2)?,
        body: row.get(3)?,
        sent_at: row.get(4)?,
        read_at: row.get(5)?,
    })
}

fn query_messages_with_contact(
    conn: &Connection,
    sql: &str,
    username: &str,
) -> rusqlite::Result<Vec<MessageWithContactRow>> {
    conn.prepare(sql)?
        .query_map([username], |row| {
            Ok(MessageWithContactRow {
                message: map_message(row)?,
                contact: ContactRow {
                    username: row.get(6)?,
                    first_name: row.get(7)?,
                    last_name: row.get(8)?,
                    phone: row.get(9)?,
                },
            })
        })?
        .collect()
}

/// Ids are stored as TEXT; a row that fails to parse is corrupt and is
/// rejected rather than passed through.
fn parse_uuid(idx: usize, value: String) -> rusqlite::Result<Uuid> {
    value.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(username: &str, last_name: &str) -> UserRow {
        UserRow {
            username: username.to_string(),
            password_hash: "$argon2id$test".to_string(),
            first_name: "Test".to_string(),
            last_name: last_name.to_string(),
            phone: "+15550000000".to_string(),
            joined_at: Utc::now(),
            last_login_at: None,
        }
    }

    fn test_message(from: &str, to: &str, body: &str) -> MessageRow {
        MessageRow {
            id: Uuid::new_v4(),
            from_username: from.to_string(),
            to_username: to.to_string(),
            body: body.to_string(),
            sent_at: Utc::now(),
            read_at: None,
        }
    }

    fn db_with_users(users: &[(&str, &str)]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for (username, last_name) in users {
            db.create_user(&test_user(username, last_name)).unwrap();
        }
        db
    }

    #[test]
    fn duplicate_username_is_a_unique_violation() {
        let db = db_with_users(&[("alice", "Anders")]);
        let err = db.create_user(&test_user("alice", "Other")).unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));

        // The losing insert must not have written anything.
        let row = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(row.last_name, "Anders");
    }

    #[test]
    fn update_last_login_round_trips() {
        let db = db_with_users(&[("alice", "Anders")]);
        assert!(db.get_user_by_username("alice").unwrap().unwrap().last_login_at.is_none());

        let at = Utc::now();
        db.update_last_login("alice", at).unwrap();
        let row = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(row.last_login_at, Some(at));
    }

    #[test]
    fn list_users_orders_by_last_name() {
        let db = db_with_users(&[("carol", "Zimmer"), ("alice", "Anders"), ("bob", "Miller")]);
        let names: Vec<String> = db.list_users().unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn message_insert_requires_existing_recipient() {
        let db = db_with_users(&[("alice", "Anders")]);
        let err = db.insert_message(&test_message("alice", "ghost", "hi")).unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }

    #[test]
    fn mark_read_lands_only_once() {
        let db = db_with_users(&[("alice", "Anders"), ("bob", "Miller")]);
        let msg = test_message("alice", "bob", "hi");
        db.insert_message(&msg).unwrap();

        let first = Utc::now();
        assert!(db.mark_read(msg.id, first).unwrap());

        let second = Utc::now();
        assert!(!db.mark_read(msg.id, second).unwrap());

        let row = db.get_message(msg.id).unwrap().unwrap();
        assert_eq!(row.read_at, Some(first));
    }

    #[test]
    fn sent_listing_joins_recipient_display_fields() {
        let db = db_with_users(&[("alice", "Anders"), ("bob", "Miller")]);
        db.insert_message(&test_message("alice", "bob", "first")).unwrap();
        db.insert_message(&test_message("alice", "bob", "second")).unwrap();

        let sent = db.messages_from("alice").unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].message.body, "first");
        assert_eq!(sent[1].message.body, "second");
        assert_eq!(sent[0].contact.username, "bob");
        assert_eq!(sent[0].contact.last_name, "Miller");

        assert!(db.messages_to("alice").unwrap().is_empty());
    }

    #[test]
    fn received_listing_joins_sender_display_fields() {
        let db = db_with_users(&[("alice", "Anders"), ("bob", "Miller")]);
        db.insert_message(&test_message("alice", "bob", "hi")).unwrap();

        let received = db.messages_to("bob").unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].contact.username, "alice");
    }

    #[test]
    fn corrupt_message_id_is_rejected() {
        let db = db_with_users(&[("alice", "Anders"), ("bob", "Miller")]);
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, from_username, to_username, body, sent_at)
                 VALUES ('not-a-uuid', 'alice', 'bob', 'hi', ?1)",
                [Utc::now()],
            )?;
            Ok(())
        })
        .unwrap();

        assert!(db.messages_from("alice").is_err());
    }
}
