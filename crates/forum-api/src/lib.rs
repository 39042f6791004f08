pub mod auth;
pub mod comments;
pub mod error;
pub mod middleware;
pub mod posts;
pub mod reactions;
pub mod session;

use axum::{
    Router,
    routing::{get, post},
};

use crate::auth::AppState;
use crate::middleware::{authenticate, require_auth};

/// Assembles the forum router. `authenticate` wraps everything and only
/// resolves identity; `require_auth` gates the routes that need one.
pub fn app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(posts::home))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/posts/{post_id}", get(posts::get_post))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/posts", post(posts::create_post))
        .route("/posts/{post_id}/comments", post(comments::create_comment))
        .route("/posts/{post_id}/reaction", post(reactions::toggle_post_reaction))
        .route(
            "/comments/{comment_id}/reaction",
            post(reactions::toggle_comment_reaction),
        )
        .layer(axum::middleware::from_fn(require_auth))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(axum::middleware::from_fn_with_state(state, authenticate))
}
