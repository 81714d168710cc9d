use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use std::path::PathBuf;
use thiserror::Error as ThisError;

/// Errors raised while serving requests (the OAuth flow and its upstream calls).
#[derive(Debug, ThisError)]
pub enum AppError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("OAuth flow error: {0}")]
    OauthFlow(String),

    #[error("OAuth sign-in is not configured")]
    OauthDisabled,
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for AppError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => AppError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                AppError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => AppError::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => AppError::Oauth2Token(s),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            AppError::Json(_)
            | AppError::Oauth2Token(_)
            | AppError::Oauth2Server { .. }
            | AppError::OauthFlow(_) => {
                let status = StatusCode::UNAUTHORIZED;
                let body = ApiErrorBody {
                    code: "UNAUTHORIZED".to_string(),
                    message: "Authentication error.".to_string(),
                };
                (status, body)
            }
            AppError::OauthDisabled => {
                let status = StatusCode::NOT_FOUND;
                let body = ApiErrorBody {
                    code: "NOT_FOUND".to_string(),
                    message: "Sign-in is not enabled on this server.".to_string(),
                };
                (status, body)
            }
            AppError::UrlParse(_) => {
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                let body = ApiErrorBody {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                };
                (status, body)
            }
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// Startup misconfiguration. Both binaries refuse to start on any of these.
#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("API key is empty; set ORDER_DESK_SERVER__API_KEY or SERVER_API_KEY")]
    EmptyApiKey,

    #[error("oauth mode requires `{0}` to be configured")]
    MissingOauthSetting(&'static str),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("cookie secret must be at least 64 bytes")]
    CookieSecret,

    #[error("invalid database setting `{setting}`: {source}")]
    Database {
        setting: &'static str,
        #[source]
        source: SqlxError,
    },

    #[error("database setting `{0}` is required")]
    MissingDatabaseSetting(&'static str),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Figment(Box::new(e))
    }
}

/// Failures of one import run. Any of these aborts the whole batch.
#[derive(Debug, ThisError)]
pub enum ImportError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("sheet `{sheet}` not found in {}", .path.display())]
    SheetNotFound { path: PathBuf, sheet: String },

    #[error("failed to read delimited file: {0}")]
    Delimited(#[from] csv::Error),

    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("row {row}: missing required field `{field}`")]
    MissingField { row: usize, field: String },

    #[error("invalid SQL identifier `{0}`")]
    InvalidIdentifier(String),

    #[error("database connection failed: {0}")]
    Connectivity(#[source] SqlxError),

    #[error("could not prepare insert into `{table}`: {source}")]
    Statement {
        table: String,
        #[source]
        source: SqlxError,
    },

    #[error("row {row}: insert rejected by database: {source}")]
    Integrity {
        row: usize,
        #[source]
        source: SqlxError,
    },

    #[error("commit rejected by database: {0}")]
    Commit(#[source] SqlxError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ImportError {
    /// Map an insert-time sqlx failure to its class. Anything the server
    /// rejected is an integrity problem; everything else is the link.
    pub fn from_insert(row: usize, e: SqlxError) -> Self {
        if matches!(e, SqlxError::Database(_)) {
            ImportError::Integrity { row, source: e }
        } else {
            ImportError::Connectivity(e)
        }
    }

    /// Process exit code for the importer binary (sysexits.h classes).
    pub fn exit_code(&self) -> u8 {
        match self {
            ImportError::NotFound(_) | ImportError::SheetNotFound { .. } => 66,
            ImportError::MissingField { .. } => 65,
            ImportError::InvalidIdentifier(_) => 64,
            ImportError::Delimited(_) | ImportError::Spreadsheet(_) => 74,
            ImportError::Connectivity(_) => 69,
            ImportError::Statement { .. }
            | ImportError::Integrity { .. }
            | ImportError::Commit(_) => 70,
            ImportError::Config(_) => 78,
        }
    }
}
