use crate::config::{ApiKey, AuthMode, Config};
use crate::error::ConfigError;
use crate::handlers::{oauth, orders};
use crate::middleware::{require_api_key, require_session};
use crate::oauth::OauthProvider;
use axum::{Router, extract::FromRef, middleware::from_fn_with_state, routing::get};
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

/// Which admission check protects `/check_orders`.
#[derive(Clone, Debug)]
pub enum Gate {
    ApiKey(ApiKey),
    Session,
}

#[derive(Clone)]
pub struct AppState {
    pub gate: Gate,
    pub oauth: Option<Arc<OauthProvider>>,
    pub cookie_key: Key,
    pub insecure_cookie: bool,
}

impl AppState {
    /// State for the API-key variant.
    pub fn with_api_key(key: ApiKey) -> Self {
        Self {
            gate: Gate::ApiKey(key),
            oauth: None,
            cookie_key: Key::generate(),
            insecure_cookie: false,
        }
    }

    /// State for the session variant. `oauth` is `None` when sign-in routes
    /// should not be served (e.g. sessions minted elsewhere).
    pub fn with_session(
        oauth: Option<OauthProvider>,
        cookie_key: Key,
        insecure_cookie: bool,
    ) -> Self {
        Self {
            gate: Gate::Session,
            oauth: oauth.map(Arc::new),
            cookie_key,
            insecure_cookie,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        match cfg.auth.mode {
            AuthMode::ApiKey => {
                let key = ApiKey::new(cfg.server.api_key.as_deref().unwrap_or_default())?;
                Ok(Self::with_api_key(key))
            }
            AuthMode::Oauth => {
                let provider = OauthProvider::from_config(&cfg.auth)?;
                let cookie_key = match cfg.auth.cookie_secret.as_deref() {
                    Some(secret) => {
                        Key::try_from(secret.as_bytes()).map_err(|_| ConfigError::CookieSecret)?
                    }
                    None => Key::generate(),
                };
                Ok(Self::with_session(
                    Some(provider),
                    cookie_key,
                    cfg.auth.insecure_cookie,
                ))
            }
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected = Router::new().route("/check_orders", get(orders::check_orders));
    let protected = match &state.gate {
        Gate::ApiKey(key) => protected.route_layer(from_fn_with_state(key.clone(), require_api_key)),
        Gate::Session => {
            protected.route_layer(from_fn_with_state(state.clone(), require_session))
        }
    };

    let mut router = Router::new()
        .route("/", get(orders::hello))
        .route("/health", get(orders::health))
        .merge(protected);

    if state.oauth.is_some() {
        router = router
            .route("/login", get(oauth::login))
            .route("/auth", get(oauth::callback))
            .route("/logout", get(oauth::logout));
    }

    router.with_state(state)
}
