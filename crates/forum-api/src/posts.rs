use axum::{
    Extension, Form, Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use forum_types::api::{CommentView, CreatePostForm, PostSummary, PostView};
use forum_types::models::TargetKind;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

const HOME_PAGE_LIMIT: u32 = 50;

/// Recent posts with their reaction tallies. Counts are recomputed per
/// post on every request; fine at forum volume, a cache candidate later.
pub async fn home(State(state): State<AppState>) -> Result<Json<Vec<PostSummary>>, ApiError> {
    let rows = state.db.list_posts(HOME_PAGE_LIMIT)?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in rows {
        let id: Uuid = row
            .id
            .parse()
            .map_err(|e| anyhow::anyhow!("malformed post id in store: {e}"))?;
        posts.push(PostSummary {
            id,
            author_username: row.author_username,
            title: row.title,
            created_at: row.created_at,
            counts: state.reactions.counts(id, TargetKind::Post)?,
        });
    }
    Ok(Json(posts))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<PostView>, ApiError> {
    let row = state
        .db
        .get_post(&post_id.to_string())?
        .ok_or(ApiError::NotFound)?;

    let mut comments = Vec::new();
    for comment in state.db.list_comments_for_post(&row.id)? {
        let id: Uuid = comment
            .id
            .parse()
            .map_err(|e| anyhow::anyhow!("malformed comment id in store: {e}"))?;
        comments.push(CommentView {
            id,
            author_id: comment
                .author_id
                .parse()
                .map_err(|e| anyhow::anyhow!("malformed author id in store: {e}"))?,
            author_username: comment.author_username,
            body: comment.body,
            created_at: comment.created_at,
            counts: state.reactions.counts(id, TargetKind::Comment)?,
        });
    }

    Ok(Json(PostView {
        id: post_id,
        author_id: row
            .author_id
            .parse()
            .map_err(|e| anyhow::anyhow!("malformed author id in store: {e}"))?,
        author_username: row.author_username,
        title: row.title,
        body: row.body,
        created_at: row.created_at,
        counts: state.reactions.counts(post_id, TargetKind::Post)?,
        comments,
    }))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(req): Form<CreatePostForm>,
) -> Result<Response, ApiError> {
    if req.title.trim().is_empty() || req.title.len() > 200 {
        return Err(ApiError::Validation("title must be 1-200 characters".into()));
    }
    if req.body.trim().is_empty() {
        return Err(ApiError::Validation("post body must not be empty".into()));
    }

    let post_id = Uuid::new_v4();
    state.db.insert_post(
        &post_id.to_string(),
        &user.id.to_string(),
        &req.title,
        &req.body,
        Utc::now(),
    )?;

    debug!(%post_id, author = %user.username, "post created");
    Ok(Redirect::to(&format!("/posts/{post_id}")).into_response())
}
