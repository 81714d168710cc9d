use crate::error::AppError;
use crate::oauth::OauthProvider;
use crate::oauth::session::{
    SessionUser, build_cookie, clear_cookie, clear_session, store_session,
};
use crate::router::AppState;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier};
use serde::Deserialize;
use std::sync::Arc;
use time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

const CSRF_COOKIE: &str = "oauth_csrf_token";
const PKCE_COOKIE: &str = "oauth_pkce_verifier";

/// GET /login -> redirects to the provider's consent page.
pub async fn login(State(state): State<AppState>, jar: PrivateCookieJar) -> Response {
    let provider = match provider(&state) {
        Ok(p) => p,
        Err(err) => return err.into_response(),
    };

    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_token) = provider.authorize_url(challenge);
    let jar = store_oauth_cookies(jar, &csrf_token, verifier.secret(), state.insecure_cookie);

    info!("Dispatching OAuth redirect");
    (jar, Redirect::temporary(auth_url.as_str())).into_response()
}

/// GET /auth -> exchanges the code, stores the identity in the session, goes home.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    let provider = match provider(&state) {
        Ok(p) => p,
        Err(err) => return err.into_response(),
    };

    let (pkce_verifier, csrf_cookie, jar) = match load_oauth_session(jar) {
        Ok(data) => data,
        Err((jar, err)) => return respond_with_error(jar, err),
    };

    let Some(state_param) = query.state.as_deref() else {
        return respond_with_error(
            jar,
            AppError::OauthFlow("missing `state` in callback".to_string()),
        );
    };
    if state_param != csrf_cookie {
        return respond_with_error(jar, AppError::OauthFlow("CSRF token mismatch".to_string()));
    }

    let Some(code) = query.code.as_deref() else {
        return respond_with_error(
            jar,
            AppError::OauthFlow("missing `code` in callback".to_string()),
        );
    };

    let token_response = match provider
        .exchange_code(
            AuthorizationCode::new(code.to_owned()),
            PkceCodeVerifier::new(pkce_verifier),
        )
        .await
    {
        Ok(res) => res,
        Err(err) => return respond_with_error(jar, err),
    };

    let Some(user) = token_response
        .extra_fields()
        .id_token
        .as_deref()
        .and_then(SessionUser::from_id_token)
    else {
        return respond_with_error(
            jar,
            AppError::OauthFlow("token response carried no usable id_token".to_string()),
        );
    };

    let jar = match store_session(jar, &user, state.insecure_cookie) {
        Ok(jar) => jar,
        Err(err) => return AppError::Json(err).into_response(),
    };

    info!(subject = %user.subject, "OAuth callback established session");
    (jar, Redirect::to("/")).into_response()
}

/// GET /logout -> drops the session.
pub async fn logout(jar: PrivateCookieJar) -> Response {
    (clear_session(jar), Redirect::to("/")).into_response()
}

fn provider(state: &AppState) -> Result<Arc<OauthProvider>, AppError> {
    state.oauth.clone().ok_or(AppError::OauthDisabled)
}

fn store_oauth_cookies(
    jar: PrivateCookieJar,
    csrf: &CsrfToken,
    pkce_verifier: &str,
    insecure_cookie: bool,
) -> PrivateCookieJar {
    let ttl = Duration::minutes(15);
    jar.add(build_cookie(
        CSRF_COOKIE,
        csrf.secret().to_string(),
        ttl,
        insecure_cookie,
    ))
    .add(build_cookie(
        PKCE_COOKIE,
        pkce_verifier.to_string(),
        ttl,
        insecure_cookie,
    ))
}

fn load_oauth_session(
    jar: PrivateCookieJar,
) -> Result<(String, String, PrivateCookieJar), (PrivateCookieJar, AppError)> {
    let Some(csrf_cookie) = jar.get(CSRF_COOKIE).map(|c| c.value().to_owned()) else {
        let jar = clear_oauth_cookies(jar);
        return Err((
            jar,
            AppError::OauthFlow("Missing CSRF token in cookie".to_string()),
        ));
    };

    let Some(pkce_cookie) = jar.get(PKCE_COOKIE).map(|c| c.value().to_owned()) else {
        let jar = clear_oauth_cookies(jar);
        return Err((
            jar,
            AppError::OauthFlow("Missing PKCE verifier in cookie".to_string()),
        ));
    };

    let jar = clear_oauth_cookies(jar);

    Ok((pkce_cookie, csrf_cookie, jar))
}

fn clear_oauth_cookies(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(CSRF_COOKIE))
        .remove(clear_cookie(PKCE_COOKIE))
}

fn respond_with_error(jar: PrivateCookieJar, err: AppError) -> Response {
    warn!(error = %err, "OAuth callback failed");
    (jar, err.into_response()).into_response()
}
