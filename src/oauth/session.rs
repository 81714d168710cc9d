use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Duration;

pub const SESSION_COOKIE: &str = "order_desk_session";
const SESSION_TTL_HOURS: i64 = 8;

/// The signed-in identity carried in the encrypted session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub subject: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl SessionUser {
    /// Read the identity claims out of an `id_token`.
    ///
    /// The token comes straight from the token endpoint over TLS, so the
    /// payload is trusted without a signature check. Returns `None` when the
    /// token is malformed or carries no subject.
    pub fn from_id_token(id_token: &str) -> Option<Self> {
        let payload_b64 = id_token.split('.').nth(1)?;
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload_b64.trim_end_matches('='))
            .ok()?;
        let claims: Value = serde_json::from_slice(&decoded).ok()?;

        let claim = |name: &str| {
            claims
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let subject = claim("oid").or_else(|| claim("sub"))?;
        Some(Self {
            subject,
            name: claim("name"),
            email: claim("email").or_else(|| claim("preferred_username")),
        })
    }
}

/// Identity attached to the request's session, if any. A cookie that fails to
/// decrypt is already dropped by the jar; one that fails to parse is ignored.
pub fn current_user(jar: &PrivateCookieJar) -> Option<SessionUser> {
    jar.get(SESSION_COOKIE)
        .and_then(|c| serde_json::from_str(c.value()).ok())
}

pub fn store_session(
    jar: PrivateCookieJar,
    user: &SessionUser,
    insecure_cookie: bool,
) -> Result<PrivateCookieJar, serde_json::Error> {
    let value = serde_json::to_string(user)?;
    Ok(jar.add(build_cookie(
        SESSION_COOKIE,
        value,
        Duration::hours(SESSION_TTL_HOURS),
        insecure_cookie,
    )))
}

pub fn clear_session(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(SESSION_COOKIE))
}

pub(crate) fn build_cookie(
    name: &str,
    value: String,
    max_age: Duration,
    insecure_cookie: bool,
) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(!insecure_cookie)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

pub(crate) fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
