use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A live login session. The token doubles as the cookie value: an
/// opaque random identifier, nothing encoded inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Seconds left until expiry, clamped at zero. Used for the cookie Max-Age.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Direction of a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Like,
    Dislike,
}

impl Polarity {
    pub fn from_liked(liked: bool) -> Self {
        if liked { Polarity::Like } else { Polarity::Dislike }
    }

    pub fn is_like(self) -> bool {
        matches!(self, Polarity::Like)
    }
}

/// What a reaction points at. Posts and comments share reaction semantics;
/// the kind only matters at the storage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

/// Like/dislike tallies for one target, recomputed from the stored
/// reactions on every read. There is no counter cache.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}
