use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::info;

use courier_auth::{PasswordHasher, TokenIssuer};
use courier_db::models::UserRow;
use courier_db::{Database, StoreError};
use courier_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use courier_types::models::User;

use crate::error::{ApiError, join_error};
use crate::messages::MessageService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub auth: AuthService,
    pub messages: MessageService,
    pub db: Arc<Database>,
    pub tokens: TokenIssuer,
}

/// Orchestrates registration and login over the credential store, the
/// password hasher, and the token issuer. All dependencies are injected at
/// construction and immutable afterwards.
pub struct AuthService {
    db: Arc<Database>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
    decoy_hash: String,
}

impl AuthService {
    pub fn new(
        db: Arc<Database>,
        hasher: PasswordHasher,
        tokens: TokenIssuer,
    ) -> Result<Self, ApiError> {
        // Hashed once up front so a login against a missing username burns
        // the same verify work as one against a real account.
        let decoy_hash = hasher.hash("courier-decoy-credential")?;
        Ok(Self {
            db,
            hasher,
            tokens,
            decoy_hash,
        })
    }

    /// Register a new user and log them straight in: stamps
    /// `last_login_at` and returns the issued token alongside the profile.
    pub fn register(&self, req: &RegisterRequest) -> Result<(User, String), ApiError> {
        if req.username.len() < 3 || req.username.len() > 32 {
            return Err(ApiError::BadRequest(
                "username must be 3-32 characters".to_string(),
            ));
        }
        if req.password.len() < 8 {
            return Err(ApiError::BadRequest(
                "password must be at least 8 characters".to_string(),
            ));
        }

        let password_hash = self.hasher.hash(&req.password)?;
        let now = Utc::now();
        let row = UserRow {
            username: req.username.clone(),
            password_hash,
            first_name: req.first_name.clone(),
            last_name: req.last_name.clone(),
            phone: req.phone.clone(),
            joined_at: now,
            last_login_at: None,
        };

        // The primary key on username makes this insert-or-fail: two
        // concurrent registrations cannot both succeed.
        match self.db.create_user(&row) {
            Ok(()) => {}
            Err(StoreError::UniqueViolation) => return Err(ApiError::DuplicateUser),
            Err(e) => return Err(e.into()),
        }

        self.db.update_last_login(&req.username, now)?;
        let token = self.tokens.issue(&req.username)?;
        info!(username = %req.username, "user registered");

        let user = User {
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            joined_at: now,
            last_login_at: Some(now),
        };
        Ok((user, token))
    }

    /// Verify credentials, stamp `last_login_at`, and issue a token.
    pub fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        if !self.check_credentials(username, password)? {
            return Err(ApiError::InvalidCredentials);
        }

        self.db.update_last_login(username, Utc::now())?;
        let token = self.tokens.issue(username)?;
        info!(username = %username, "user logged in");
        Ok(token)
    }

    /// Pure credential check with no side effects. Not-found and mismatch
    /// both come back as `Ok(false)`; only infrastructure faults error.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<bool, ApiError> {
        self.check_credentials(username, password)
    }

    /// Unknown username and wrong password must be indistinguishable, by
    /// timing as well as by result: a missing user still pays for a full
    /// verify against the decoy hash.
    fn check_credentials(&self, username: &str, password: &str) -> Result<bool, ApiError> {
        let user = self.db.get_user_by_username(username)?;
        let stored = user
            .as_ref()
            .map(|u| u.password_hash.as_str())
            .unwrap_or(&self.decoy_hash);
        let matched = self.hasher.verify(password, stored)?;
        Ok(matched && user.is_some())
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Hashing is CPU-bound; run it off the async runtime.
    let service = state.clone();
    let (user, token) = tokio::task::spawn_blocking(move || service.auth.register(&req))
        .await
        .map_err(join_error)??;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();
    let service = state.clone();
    let token =
        tokio::task::spawn_blocking(move || service.auth.login(&req.username, &req.password))
            .await
            .map_err(join_error)??;

    Ok(Json(LoginResponse { username, token }))
}
