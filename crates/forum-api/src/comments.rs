use axum::{
    Extension, Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use forum_types::api::CreateCommentForm;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(user): Extension<CurrentUser>,
    Form(req): Form<CreateCommentForm>,
) -> Result<Response, ApiError> {
    if req.body.trim().is_empty() {
        return Err(ApiError::Validation("comment must not be empty".into()));
    }

    // Comment targets must exist
    state
        .db
        .get_post(&post_id.to_string())?
        .ok_or(ApiError::NotFound)?;

    let comment_id = Uuid::new_v4();
    state.db.insert_comment(
        &comment_id.to_string(),
        &post_id.to_string(),
        &user.id.to_string(),
        &req.body,
        Utc::now(),
    )?;

    debug!(%comment_id, %post_id, author = %user.username, "comment created");
    Ok(Redirect::to(&format!("/posts/{post_id}")).into_response())
}
