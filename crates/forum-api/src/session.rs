use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use forum_db::Database;
use forum_types::models::Session;

use crate::error::ApiError;

/// Fixed session lifetime. Relogin before expiry replaces the session
/// rather than extending it.
pub const SESSION_TTL_SECS: i64 = 3600;

/// Owns the session lifecycle: issuance, lookup, expiry, invalidation.
#[derive(Clone)]
pub struct SessionManager {
    db: Arc<Database>,
}

impl SessionManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Issues a fresh session for the user. Any session the user already
    /// holds is deleted first, so at most one stays live. Under concurrent
    /// logins this is last-writer-wins, which is acceptable: single
    /// session per user is advisory, not a hard guarantee.
    pub fn create_session(&self, user_id: Uuid) -> Result<Session, ApiError> {
        let user_id_str = user_id.to_string();
        self.db.delete_sessions_for_user(&user_id_str)?;

        let token = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::seconds(SESSION_TTL_SECS);
        self.db
            .insert_session(&token.to_string(), &user_id_str, expires_at)?;

        debug!(%user_id, "session created");
        Ok(Session {
            token,
            user_id,
            expires_at,
        })
    }

    /// Looks up a session by token. A missing row is `NotFound`; a row
    /// past its expiry is `Expired`. The stale row is NOT deleted here,
    /// cleanup is the caller's responsibility.
    pub fn get_session(&self, token: &str) -> Result<Session, ApiError> {
        let row = self.db.get_session(token)?.ok_or(ApiError::NotFound)?;

        let session = Session {
            token: row
                .token
                .parse()
                .map_err(|e| anyhow::anyhow!("malformed token in store: {e}"))?,
            user_id: row
                .user_id
                .parse()
                .map_err(|e| anyhow::anyhow!("malformed user id in store: {e}"))?,
            expires_at: row.expires_at,
        };

        if session.is_expired(Utc::now()) {
            return Err(ApiError::Expired);
        }
        Ok(session)
    }

    /// Idempotent removal; an absent token is not an error.
    pub fn delete_session(&self, token: &str) -> Result<(), ApiError> {
        self.db.delete_session(token)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (SessionManager, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        (SessionManager::new(db.clone()), db)
    }

    fn add_user(db: &Database, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(
            &id.to_string(),
            name,
            &format!("{name}@example.com"),
            "not-a-real-hash",
            Utc::now(),
        )
        .unwrap();
        id
    }

    #[test]
    fn create_session_has_one_hour_ttl() {
        let (sessions, db) = manager();
        let user = add_user(&db, "ann");

        let session = sessions.create_session(user).unwrap();
        let remaining = session.remaining_secs(Utc::now());
        assert!((3595..=3600).contains(&remaining), "ttl was {remaining}");
    }

    #[test]
    fn relogin_invalidates_previous_session() {
        let (sessions, db) = manager();
        let user = add_user(&db, "bob");

        let first = sessions.create_session(user).unwrap();
        let second = sessions.create_session(user).unwrap();
        assert_ne!(first.token, second.token);

        assert!(matches!(
            sessions.get_session(&first.token.to_string()),
            Err(ApiError::NotFound)
        ));
        let live = sessions.get_session(&second.token.to_string()).unwrap();
        assert_eq!(live.user_id, user);

        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sessions WHERE user_id = ?1",
                    [user.to_string()],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn stale_session_is_expired_not_missing() {
        let (sessions, db) = manager();
        let user = add_user(&db, "cal");

        let token = Uuid::new_v4();
        db.insert_session(
            &token.to_string(),
            &user.to_string(),
            Utc::now() - Duration::minutes(5),
        )
        .unwrap();

        assert!(matches!(
            sessions.get_session(&token.to_string()),
            Err(ApiError::Expired)
        ));
        // GetSession must not have cleaned up the row itself
        assert!(db.get_session(&token.to_string()).unwrap().is_some());
    }

    #[test]
    fn unknown_token_is_not_found() {
        let (sessions, _db) = manager();
        assert!(matches!(
            sessions.get_session("no-such-token"),
            Err(ApiError::NotFound)
        ));
    }

    #[test]
    fn delete_session_is_idempotent() {
        let (sessions, db) = manager();
        let user = add_user(&db, "dee");

        let session = sessions.create_session(user).unwrap();
        let token = session.token.to_string();

        sessions.delete_session(&token).unwrap();
        assert!(matches!(
            sessions.get_session(&token),
            Err(ApiError::NotFound)
        ));
        // Second delete of the same token is fine
        sessions.delete_session(&token).unwrap();
    }
}
