use crate::config::AuthConfig;
use crate::error::{AppError, ConfigError};

use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, ExtraTokenFields, PkceCodeChallenge, PkceCodeVerifier,
    RedirectUrl, Scope, StandardRevocableToken, StandardTokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use url::Url;

const SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Authorization-code client for the Microsoft identity platform.
#[derive(Clone)]
pub struct OauthProvider {
    client: IdentityOauth2Client,
    http: reqwest::Client,
}

impl OauthProvider {
    pub fn from_config(cfg: &AuthConfig) -> Result<Self, ConfigError> {
        let client_id = cfg
            .client_id
            .clone()
            .ok_or(ConfigError::MissingOauthSetting("auth.client_id"))?;
        let client_secret = cfg
            .client_secret
            .clone()
            .ok_or(ConfigError::MissingOauthSetting("auth.client_secret"))?;

        let client = OAuth2Client::new(ClientId::new(client_id))
            .set_client_secret(ClientSecret::new(client_secret))
            .set_auth_uri(AuthUrl::from_url(cfg.authorize_url.clone()))
            .set_token_uri(TokenUrl::from_url(cfg.token_url.clone()))
            .set_redirect_uri(RedirectUrl::from_url(cfg.redirect_url.clone()));

        // The token endpoint must never be followed through a redirect.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client, http })
    }

    /// Build the consent-page URL for a fresh PKCE challenge.
    pub fn authorize_url(&self, challenge: PkceCodeChallenge) -> (Url, CsrfToken) {
        self.client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(SCOPES.iter().map(|s| Scope::new((*s).to_string())))
            .set_pkce_challenge(challenge)
            .url()
    }

    /// Trade the callback's authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: AuthorizationCode,
        verifier: PkceCodeVerifier,
    ) -> Result<IdentityTokenResponse, AppError> {
        let token = self
            .client
            .exchange_code(code)
            .set_pkce_verifier(verifier)
            .request_async(&self.http)
            .await?;
        info!("authorization code exchanged");
        Ok(token)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdTokenField {
    #[serde(rename = "id_token")]
    pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenField {}

pub type IdentityTokenResponse = StandardTokenResponse<IdTokenField, BasicTokenType>;

type IdentityOauth2Client = OAuth2Client<
    BasicErrorResponse,
    IdentityTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;
