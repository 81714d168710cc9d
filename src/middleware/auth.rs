use axum::Json;
use axum::extract::{FromRef, FromRequestParts, Request, State};
use axum::http::{HeaderMap, StatusCode, request::Parts};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::{API_KEY_HEADER, ApiKey};

/// Why the gate turned a request away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    /// No `x-api-key` header at all.
    Missing,
    /// Header present but not the configured key.
    Invalid,
}

impl GateRejection {
    pub fn status(self) -> StatusCode {
        match self {
            GateRejection::Missing => StatusCode::UNAUTHORIZED,
            GateRejection::Invalid => StatusCode::FORBIDDEN,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            GateRejection::Missing => "API key missing",
            GateRejection::Invalid => "Invalid API key",
        }
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

/// Decide whether the request headers carry the configured key.
///
/// An empty header value counts as missing. A value that is present but not
/// valid header text can never equal the key, so it is rejected as invalid.
pub fn check_api_key(headers: &HeaderMap, expected: &ApiKey) -> Result<(), GateRejection> {
    let Some(value) = headers.get(API_KEY_HEADER) else {
        return Err(GateRejection::Missing);
    };
    if value.is_empty() {
        return Err(GateRejection::Missing);
    }
    if expected.matches(value.as_bytes()) {
        Ok(())
    } else {
        Err(GateRejection::Invalid)
    }
}

/// Middleware form of the gate, for `route_layer(from_fn_with_state(key, require_api_key))`.
/// The wrapped handler only runs once the key has been accepted.
pub async fn require_api_key(State(key): State<ApiKey>, req: Request, next: Next) -> Response {
    match check_api_key(req.headers(), &key) {
        Ok(()) => {
            debug!(path = %req.uri().path(), "api key accepted");
            next.run(req).await
        }
        Err(rejection) => {
            warn!(path = %req.uri().path(), reason = ?rejection, "api key rejected");
            rejection.into_response()
        }
    }
}

/// Extractor form of the gate. Put it first in a handler's arguments.
#[derive(Debug, Clone, Copy)]
pub struct RequireApiKey;

impl<S> FromRequestParts<S> for RequireApiKey
where
    ApiKey: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let key = ApiKey::from_ref(state);
        check_api_key(&parts.headers, &key).inspect_err(|rejection| {
            warn!(path = %parts.uri.path(), reason = ?rejection, "api key rejected");
        })?;
        Ok(Self)
    }
}
