use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use forum_db::Database;
use forum_types::api::{LoginForm, RegisterForm};

use crate::error::ApiError;
use crate::middleware::{SESSION_COOKIE, clear_session_cookie, session_cookie};
use crate::reactions::ReactionEngine;
use crate::session::SessionManager;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub sessions: SessionManager,
    pub reactions: ReactionEngine,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>) -> AppState {
        Arc::new(Self {
            sessions: SessionManager::new(db.clone()),
            reactions: ReactionEngine::new(db.clone()),
            db,
        })
    }
}

pub async fn register(
    State(state): State<AppState>,
    Form(req): Form<RegisterForm>,
) -> Result<Response, ApiError> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation(
            "username must be 3-32 characters".into(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }
    if !req.email.contains('@') || req.email.len() > 50 {
        return Err(ApiError::Validation("invalid email address".into()));
    }

    // Check if username or email is taken
    if state.db.get_user_by_username(&req.username)?.is_some()
        || state.db.get_user_by_email(&req.email)?.is_some()
    {
        return Ok((StatusCode::CONFLICT, "username or email already taken").into_response());
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?
        .to_string();

    let user_id = Uuid::new_v4();
    state.db.create_user(
        &user_id.to_string(),
        &req.username,
        &req.email,
        &password_hash,
        Utc::now(),
    )?;

    info!("registered user {}", req.username);
    Ok(Redirect::to("/login").into_response())
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(req): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let user = state
        .db
        .get_user_by_username(&req.username)?
        .ok_or(ApiError::InvalidCredentials)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow!("stored hash unreadable: {e}"))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow!("malformed user id in store: {e}"))?;

    let session = state.sessions.create_session(user_id)?;
    let max_age = session.remaining_secs(Utc::now());
    let jar = jar.add(session_cookie(&session.token.to_string(), max_age));

    info!("user {} logged in", user.username);
    Ok((jar, Redirect::to("/")).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.delete_session(cookie.value())?;
    }
    let jar = jar.add(clear_session_cookie());
    Ok((jar, Redirect::to("/")).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verify_roundtrip() {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(b"secret123", &salt)
            .unwrap()
            .to_string();

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"secret123", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"wrong-password", &parsed)
                .is_err()
        );
    }
}
