use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DbErrorKind {
    /// Connection could not be opened, was lost, or the pool gave up waiting.
    Unavailable,
    /// Any unique constraint other than `users.email`, whose conflicts the insert absorbs.
    UniqueViolation,
    Query,
}

impl DbErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DbErrorKind::Unavailable => "unavailable",
            DbErrorKind::UniqueViolation => "unique_violation",
            DbErrorKind::Query => "query",
        }
    }

    fn public_message(self) -> &'static str {
        match self {
            DbErrorKind::Unavailable => "database is unavailable",
            DbErrorKind::UniqueViolation => "conflicting write, retry the request",
            DbErrorKind::Query => "database query failed",
        }
    }
}

/// Database failure with a stable kind and the driver's own message.
#[derive(Debug, Error)]
#[error("{}: {message}", .kind.as_str())]
pub struct DbError {
    pub kind: DbErrorKind,
    pub message: String,
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        let kind = match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DbErrorKind::Unavailable,
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                DbErrorKind::UniqueViolation
            }
            _ => DbErrorKind::Query,
        };
        Self {
            kind,
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("email_required")]
    EmailRequired,
    #[error("invalid_json: {0}")]
    InvalidJson(String),
    #[error("database_error: {source}")]
    Database {
        #[source]
        source: DbError,
        /// Whether `details` carries the raw driver message.
        expose: bool,
    },
}

impl ApiError {
    pub fn database(source: DbError, expose: bool) -> Self {
        ApiError::Database { source, expose }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<DbErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::EmailRequired => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "email_required",
                    kind: None,
                    details: None,
                }),
            )
                .into_response(),

            ApiError::InvalidJson(msg) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "invalid_json",
                    kind: None,
                    details: Some(msg),
                }),
            )
                .into_response(),

            ApiError::Database { source, expose } => {
                let details = if expose {
                    source.message
                } else {
                    source.kind.public_message().to_string()
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: "database_error",
                        kind: Some(source.kind),
                        details: Some(details),
                    }),
                )
                    .into_response()
            }
        }
    }
}
