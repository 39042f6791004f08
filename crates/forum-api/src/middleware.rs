use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::AppState;
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "forum_session";

/// Identity resolved by `authenticate` and attached to request extensions.
/// Handlers behind `require_auth` can rely on it being present.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
}

pub fn session_cookie(token: &str, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::ZERO)
        .build()
}

/// Soft authentication, applied to every route. Resolves the session
/// cookie to a user and attaches it; never rejects a request. Invalid or
/// expired cookies are cleared on the response and the request proceeds
/// anonymously. Authorization is `require_auth`'s job.
pub async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return next.run(req).await;
    };
    let token = cookie.value().to_owned();

    let session = match state.sessions.get_session(&token) {
        Ok(session) => session,
        Err(ApiError::Expired) => {
            // GetSession leaves the stale row; cleanup happens here
            if let Err(err) = state.sessions.delete_session(&token) {
                warn!("failed to drop expired session: {err}");
            }
            debug!("expired session cookie cleared");
            return anonymous_with_cleared_cookie(jar, req, next).await;
        }
        Err(ApiError::NotFound) => {
            debug!("unknown session cookie cleared");
            return anonymous_with_cleared_cookie(jar, req, next).await;
        }
        Err(err) => {
            warn!("session lookup failed, proceeding anonymous: {err}");
            return next.run(req).await;
        }
    };

    let user = match state.db.get_user_by_id(&session.user_id.to_string()) {
        Ok(Some(user)) => user,
        Ok(None) => {
            // Session points at a deleted user; treat like an unknown token
            if let Err(err) = state.sessions.delete_session(&token) {
                warn!("failed to drop orphaned session: {err}");
            }
            return anonymous_with_cleared_cookie(jar, req, next).await;
        }
        Err(err) => {
            warn!("user lookup failed, proceeding anonymous: {err}");
            return next.run(req).await;
        }
    };

    let id: Uuid = match user.id.parse() {
        Ok(id) => id,
        Err(err) => {
            warn!("malformed user id in store: {err}");
            return next.run(req).await;
        }
    };

    req.extensions_mut().insert(CurrentUser {
        id,
        username: user.username,
    });
    next.run(req).await
}

/// Hard gate for protected routes: anonymous callers are sent to the
/// login page, authenticated ones pass through unchanged.
pub async fn require_auth(req: Request, next: Next) -> Response {
    if req.extensions().get::<CurrentUser>().is_some() {
        next.run(req).await
    } else {
        Redirect::to("/login").into_response()
    }
}

async fn anonymous_with_cleared_cookie(jar: CookieJar, req: Request, next: Next) -> Response {
    // Only the delta against the request jar becomes a Set-Cookie header
    let jar = jar.add(clear_session_cookie());
    (jar, next.run(req).await).into_response()
}
