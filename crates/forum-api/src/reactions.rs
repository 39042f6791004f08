use std::sync::Arc;

use axum::{
    Extension, Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use forum_db::Database;
use forum_db::models::ToggleOutcome;
use forum_types::api::ReactionForm;
use forum_types::models::{Polarity, ReactionCounts, TargetKind};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

/// The like/dislike engine, generic over what the reaction points at.
/// Owns toggle semantics and aggregation; assumes the caller has already
/// validated that the target exists.
#[derive(Clone)]
pub struct ReactionEngine {
    db: Arc<Database>,
}

impl ReactionEngine {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Click-again-to-undo voting. No prior reaction inserts one; a
    /// same-direction repeat cancels it; an opposite-direction repeat
    /// flips it. Runs as one storage transaction.
    pub fn toggle(
        &self,
        user_id: Uuid,
        target_id: Uuid,
        kind: TargetKind,
        polarity: Polarity,
    ) -> Result<ToggleOutcome, ApiError> {
        let outcome = self.db.toggle_reaction(
            kind,
            &Uuid::new_v4().to_string(),
            &user_id.to_string(),
            &target_id.to_string(),
            polarity.is_like(),
            Utc::now(),
        )?;
        debug!(?outcome, ?kind, ?polarity, %target_id, "reaction toggled");
        Ok(outcome)
    }

    /// Tallies for one target, recomputed from the stored reactions on
    /// every call. O(reactions on target); no counter cache is kept.
    pub fn counts(&self, target_id: Uuid, kind: TargetKind) -> Result<ReactionCounts, ApiError> {
        let polarities = self
            .db
            .get_reaction_polarities(kind, &target_id.to_string())?;

        let mut counts = ReactionCounts::default();
        for liked in polarities {
            if liked {
                counts.likes += 1;
            } else {
                counts.dislikes += 1;
            }
        }
        Ok(counts)
    }
}

pub async fn toggle_post_reaction(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(user): Extension<CurrentUser>,
    Form(req): Form<ReactionForm>,
) -> Result<Response, ApiError> {
    // Target must exist before the engine runs
    state
        .db
        .get_post(&post_id.to_string())?
        .ok_or(ApiError::NotFound)?;

    state
        .reactions
        .toggle(user.id, post_id, TargetKind::Post, Polarity::from_liked(req.liked))?;

    Ok(Redirect::to(&format!("/posts/{post_id}")).into_response())
}

pub async fn toggle_comment_reaction(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(user): Extension<CurrentUser>,
    Form(req): Form<ReactionForm>,
) -> Result<Response, ApiError> {
    let comment = state
        .db
        .get_comment(&comment_id.to_string())?
        .ok_or(ApiError::NotFound)?;

    state
        .reactions
        .toggle(
            user.id,
            comment_id,
            TargetKind::Comment,
            Polarity::from_liked(req.liked),
        )?;

    // Back to the view the comment lives on
    Ok(Redirect::to(&format!("/posts/{}", comment.post_id)).into_response())
}
