use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use courier_types::models::{Contact, User};

use crate::auth::AppState;
use crate::error::{ApiError, join_error};

/// Directory listing: public display fields of every user, ordered by
/// last name. Requires an authenticated caller; the password hash never
/// leaves the store boundary.
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let service = state.clone();
    let rows = tokio::task::spawn_blocking(move || service.db.list_users())
        .await
        .map_err(join_error)??;

    let contacts: Vec<Contact> = rows
        .into_iter()
        .map(|row| Contact {
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
        })
        .collect();

    Ok(Json(contacts))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = state.clone();
    let row = tokio::task::spawn_blocking(move || service.db.get_user_by_username(&username))
        .await
        .map_err(join_error)??
        .ok_or(ApiError::NotFound)?;

    Ok(Json(User {
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
        joined_at: row.joined_at,
        last_login_at: row.last_login_at,
    }))
}
