use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::Value;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::auth::handlers::is_valid_email;
use crate::auth::jwt::AuthUser;
use crate::sanitize::sanitize_response;
use crate::state::AppState;

use super::credentials;
use super::dto::{ListUsersParams, UpdatePasswordRequest, UpdateUserRequest};
use super::error::UserError;
use super::repo::User;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me).put(update_user))
        .route("/me/password", put(update_password))
}

fn reject(e: UserError) -> (StatusCode, String) {
    e.into()
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    reject(UserError::internal(e))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_session_user): AuthUser,
    Query(params): Query<ListUsersParams>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let users = User::search(&state.db, &params).await.map_err(|e| {
        error!(error = %e, "user search failed");
        internal(e)
    })?;

    let value = serde_json::to_value(users).map_err(internal)?;
    Ok(Json(sanitize_response(&value)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_session_user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let user = User::find_with_relations(&state.db, id)
        .await
        .map_err(|e| {
            error!(error = %e, %id, "load user failed");
            internal(e)
        })?
        .ok_or_else(|| {
            warn!(%id, "user not found");
            reject(UserError::NotFound("User not found".into()))
        })?;
    Ok(Json(sanitize_response(&user)))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, (StatusCode, String)> {
    let user = User::find_with_relations(&state.db, user_id)
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, "load user failed");
            internal(e)
        })?
        .ok_or_else(|| {
            warn!(%user_id, "session user no longer exists");
            reject(UserError::Unauthorized("User not found".into()))
        })?;
    Ok(Json(sanitize_response(&user)))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(mut payload): Json<UpdateUserRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if let Some(email) = payload.email.as_mut() {
        *email = email.trim().to_lowercase();
        if !is_valid_email(email) {
            warn!(email = %email, "invalid email");
            return Err(reject(UserError::Validation("Invalid email".into())));
        }
        // An email may only move to this account if no other account holds it.
        match User::find_by_email(&state.db, email).await {
            Ok(Some(existing)) if existing.id != user_id => {
                warn!(email = %email, "email already registered");
                return Err(reject(UserError::Conflict("Email already registered".into())));
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "find_by_email failed");
                return Err(internal(e));
            }
        }
    }
    if let Some(username) = payload.username.as_mut() {
        *username = username.trim().to_string();
        if username.is_empty() {
            return Err(reject(UserError::Validation(
                "Username can not be empty".into(),
            )));
        }
        match User::find_by_username(&state.db, username).await {
            Ok(Some(existing)) if existing.id != user_id => {
                warn!(username = %username, "username already taken");
                return Err(reject(UserError::Conflict("Username already taken".into())));
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "find_by_username failed");
                return Err(internal(e));
            }
        }
    }

    User::update_profile(&state.db, user_id, &payload)
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, "profile update failed");
            internal(e)
        })?
        .ok_or_else(|| reject(UserError::NotFound("User not found".into())))?;

    let user = User::find_with_relations(&state.db, user_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| reject(UserError::NotFound("User not found".into())))?;
    Ok(Json(sanitize_response(&user)))
}

#[instrument(skip(state, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let updated = credentials::change_password(&state.db, user_id, &payload)
        .await
        .map_err(|e| {
            warn!(%user_id, error = %e, "password update rejected");
            reject(e)
        })?;
    Ok(Json(updated))
}
