use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ReactionCounts;

// -- Auth forms --

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

// -- Posts & comments --

#[derive(Debug, Deserialize)]
pub struct CreatePostForm {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentForm {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct PostSummary {
    pub id: Uuid,
    pub author_username: String,
    pub title: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub counts: ReactionCounts,
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub title: String,
    pub body: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub counts: ReactionCounts,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub body: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub counts: ReactionCounts,
}

// -- Reactions --

/// Body of a toggle request. The target kind is implied by the route,
/// only the direction travels in the form.
#[derive(Debug, Deserialize)]
pub struct ReactionForm {
    pub liked: bool,
}
