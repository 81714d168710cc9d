use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::PrivateCookieJar;
use tracing::{debug, info};

use crate::oauth::session::{SESSION_COOKIE, clear_session, current_user};

pub const LOGIN_PATH: &str = "/login";

/// OAuth variant of the gate: only requests whose session carries a signed-in
/// identity reach the handler. Everyone else is sent to sign in.
///
/// The identity is inserted into the request extensions as a
/// [`SessionUser`](crate::oauth::SessionUser) for handlers that want it.
pub async fn require_session(jar: PrivateCookieJar, mut req: Request, next: Next) -> Response {
    match current_user(&jar) {
        Some(user) => {
            debug!(subject = %user.subject, path = %req.uri().path(), "session accepted");
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None => {
            info!(path = %req.uri().path(), "no signed-in session; redirecting to login");
            if jar.get(SESSION_COOKIE).is_some() {
                // Decrypted but unreadable: drop it so the next sign-in starts clean.
                return (clear_session(jar), Redirect::to(LOGIN_PATH)).into_response();
            }
            Redirect::to(LOGIN_PATH).into_response()
        }
    }
}
