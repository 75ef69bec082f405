use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use courier_db::Database;
use courier_db::models::{ContactRow, MessageRow};
use courier_types::api::{
    Claims, MessageResponse, ReceivedMessageResponse, SendMessageRequest, SentMessageResponse,
};
use courier_types::models::{Contact, Message};

use crate::auth::AppState;
use crate::error::{ApiError, join_error};

/// Enforces the ownership rule over the message store: a message is
/// visible only to its sender and recipient, and only the recipient may
/// mark it read.
pub struct MessageService {
    db: Arc<Database>,
}

impl MessageService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Persist a new message. The caller guarantees `from` is the
    /// authenticated identity from a verified token.
    pub fn send(&self, from: &str, to: &str, body: &str) -> Result<Message, ApiError> {
        if body.is_empty() {
            return Err(ApiError::BadRequest("message body must not be empty".to_string()));
        }
        if !self.db.user_exists(to)? {
            return Err(ApiError::UnknownRecipient);
        }

        let row = MessageRow {
            id: Uuid::new_v4(),
            from_username: from.to_string(),
            to_username: to.to_string(),
            body: body.to_string(),
            sent_at: Utc::now(),
            read_at: None,
        };
        self.db.insert_message(&row)?;

        Ok(message_from_row(row))
    }

    /// Messages sent by `username`, enriched with each recipient's display
    /// fields. Only the owner may list; anyone else sees `NotFound`, not
    /// `Forbidden`, so the route reveals nothing.
    pub fn sent_by(
        &self,
        username: &str,
        requester: &str,
    ) -> Result<Vec<SentMessageResponse>, ApiError> {
        if username != requester {
            return Err(ApiError::NotFound);
        }

        let rows = self.db.messages_from(username)?;
        Ok(rows
            .into_iter()
            .map(|row| SentMessageResponse {
                id: row.message.id,
                to_user: contact_from_row(row.contact),
                body: row.message.body,
                sent_at: row.message.sent_at,
                read_at: row.message.read_at,
            })
            .collect())
    }

    /// Messages received by `username`, enriched with each sender's
    /// display fields. Same ownership rule as `sent_by`.
    pub fn received_by(
        &self,
        username: &str,
        requester: &str,
    ) -> Result<Vec<ReceivedMessageResponse>, ApiError> {
        if username != requester {
            return Err(ApiError::NotFound);
        }

        let rows = self.db.messages_to(username)?;
        Ok(rows
            .into_iter()
            .map(|row| ReceivedMessageResponse {
                id: row.message.id,
                from_user: contact_from_row(row.contact),
                body: row.message.body,
                sent_at: row.message.sent_at,
                read_at: row.message.read_at,
            })
            .collect())
    }

    /// The core access-control rule of the whole service: a message is
    /// visible to its two participants and nobody else.
    pub fn get(&self, id: Uuid, requester: &str) -> Result<Message, ApiError> {
        let row = self.db.get_message(id)?.ok_or(ApiError::NotFound)?;
        if requester != row.from_username && requester != row.to_username {
            return Err(ApiError::Forbidden);
        }
        Ok(message_from_row(row))
    }

    /// Set the read receipt. Only the recipient may do this; the store
    /// write is conditional on `read_at` still being null, so a repeat
    /// call (or a concurrent one) is a no-op that returns the message
    /// with the first timestamp intact.
    pub fn mark_read(&self, id: Uuid, requester: &str) -> Result<Message, ApiError> {
        let row = self.db.get_message(id)?.ok_or(ApiError::NotFound)?;
        if requester != row.to_username {
            return Err(ApiError::Forbidden);
        }

        self.db.mark_read(id, Utc::now())?;

        let row = self.db.get_message(id)?.ok_or(ApiError::NotFound)?;
        Ok(message_from_row(row))
    }
}

fn message_from_row(row: MessageRow) -> Message {
    Message {
        id: row.id,
        from_username: row.from_username,
        to_username: row.to_username,
        body: row.body,
        sent_at: row.sent_at,
        read_at: row.read_at,
    }
}

fn contact_from_row(row: ContactRow) -> Contact {
    Contact {
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
    }
}

fn message_response(message: Message) -> MessageResponse {
    MessageResponse {
        id: message.id,
        from_username: message.from_username,
        to_username: message.to_username,
        body: message.body,
        sent_at: message.sent_at,
        read_at: message.read_at,
    }
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.clone();
    let message = tokio::task::spawn_blocking(move || {
        service.messages.send(&claims.sub, &req.to_username, &req.body)
    })
    .await
    .map_err(join_error)??;

    Ok((StatusCode::CREATED, Json(message_response(message))))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.clone();
    let message = tokio::task::spawn_blocking(move || service.messages.get(id, &claims.sub))
        .await
        .map_err(join_error)??;

    Ok(Json(message_response(message)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.clone();
    let message = tokio::task::spawn_blocking(move || service.messages.mark_read(id, &claims.sub))
        .await
        .map_err(join_error)??;

    Ok(Json(message_response(message)))
}

pub async fn sent_messages(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.clone();
    let messages =
        tokio::task::spawn_blocking(move || service.messages.sent_by(&username, &claims.sub))
            .await
            .map_err(join_error)??;

    Ok(Json(messages))
}

pub async fn received_messages(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.clone();
    let messages =
        tokio::task::spawn_blocking(move || service.messages.received_by(&username, &claims.sub))
            .await
            .map_err(join_error)??;

    Ok(Json(messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthService;
    use courier_auth::{PasswordHasher, TokenIssuer};
    use courier_types::api::RegisterRequest;

    struct Fixture {
        auth: AuthService,
        messages: MessageService,
    }

    fn fixture_with_users(usernames: &[&str]) -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let auth = AuthService::new(
            db.clone(),
            PasswordHasher::new(1).unwrap(),
            TokenIssuer::new("test-secret", 30),
        )
        .unwrap();
        let messages = MessageService::new(db);

        for username in usernames {
            auth.register(&RegisterRequest {
                username: username.to_string(),
                password: format!("{username}-password"),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                phone: "+15550000000".to_string(),
            })
            .unwrap();
        }

        Fixture { auth, messages }
    }

    #[test]
    fn send_to_unknown_recipient_fails() {
        let fx = fixture_with_users(&["alice"]);
        let err = fx.messages.send("alice", "ghost", "hi").unwrap_err();
        assert!(matches!(err, ApiError::UnknownRecipient));
    }

    #[test]
    fn message_is_visible_only_to_participants() {
        let fx = fixture_with_users(&["alice", "bob", "carol"]);
        let message = fx.messages.send("alice", "bob", "just for us").unwrap();

        assert!(fx.messages.get(message.id, "alice").is_ok());
        assert!(fx.messages.get(message.id, "bob").is_ok());
        assert!(matches!(
            fx.messages.get(message.id, "carol").unwrap_err(),
            ApiError::Forbidden
        ));
    }

    #[test]
    fn missing_message_is_not_found() {
        let fx = fixture_with_users(&["alice"]);
        assert!(matches!(
            fx.messages.get(Uuid::new_v4(), "alice").unwrap_err(),
            ApiError::NotFound
        ));
        assert!(matches!(
            fx.messages.mark_read(Uuid::new_v4(), "alice").unwrap_err(),
            ApiError::NotFound
        ));
    }

    #[test]
    fn mark_read_is_recipient_only() {
        let fx = fixture_with_users(&["alice", "bob"]);
        let message = fx.messages.send("alice", "bob", "hi").unwrap();

        let err = fx.messages.mark_read(message.id, "alice").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));

        // The failed attempt must not have touched the receipt.
        let unread = fx.messages.get(message.id, "bob").unwrap();
        assert!(unread.read_at.is_none());
    }

    #[test]
    fn mark_read_is_idempotent_and_keeps_first_timestamp() {
        let fx = fixture_with_users(&["alice", "bob"]);
        let message = fx.messages.send("alice", "bob", "hi").unwrap();

        let first = fx.messages.mark_read(message.id, "bob").unwrap();
        let first_read_at = first.read_at.unwrap();

        let second = fx.messages.mark_read(message.id, "bob").unwrap();
        assert_eq!(second.read_at, Some(first_read_at));
    }

    #[test]
    fn listings_are_owner_only() {
        let fx = fixture_with_users(&["alice", "bob"]);
        fx.messages.send("alice", "bob", "hi").unwrap();

        assert!(matches!(
            fx.messages.sent_by("alice", "bob").unwrap_err(),
            ApiError::NotFound
        ));
        assert!(matches!(
            fx.messages.received_by("bob", "alice").unwrap_err(),
            ApiError::NotFound
        ));
    }

    #[test]
    fn alice_and_bob_exchange_a_message() {
        let fx = fixture_with_users(&["alice", "bob"]);
        assert!(fx.auth.authenticate("alice", "alice-password").unwrap());

        let sent = fx.messages.send("alice", "bob", "hi").unwrap();

        let inbox = fx.messages.received_by("bob", "bob").unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].body, "hi");
        assert_eq!(inbox[0].from_user.username, "alice");
        assert!(inbox[0].read_at.is_none());

        let outbox = fx.messages.sent_by("alice", "alice").unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to_user.username, "bob");

        let read = fx.messages.mark_read(sent.id, "bob").unwrap();
        assert!(read.read_at.is_some());

        assert!(matches!(
            fx.messages.mark_read(sent.id, "alice").unwrap_err(),
            ApiError::Forbidden
        ));
    }

    #[test]
    fn empty_body_is_rejected() {
        let fx = fixture_with_users(&["alice", "bob"]);
        assert!(matches!(
            fx.messages.send("alice", "bob", "").unwrap_err(),
            ApiError::BadRequest(_)
        ));
    }
}
