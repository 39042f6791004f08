//! Database row types — these map directly to SQLite rows.
//! Distinct from the forum-types API models to keep the DB layer independent.

use chrono::{DateTime, Utc};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct SessionRow {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

pub struct PostRow {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_username: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// What a toggle did to the stored reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// No prior reaction; one was inserted.
    Added,
    /// Prior reaction had the same polarity; it was removed.
    Removed,
    /// Prior reaction had the opposite polarity; replaced.
    Flipped,
}
