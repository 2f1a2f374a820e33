use std::fmt::Display;

use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{debug, error};
use mongodb::{bson::ser::Error as BsonError, error::Error as DbError};
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Catcher, Request,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A single problem with a single input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub field: String,
    pub message: String,
}

impl Issue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    Validation { message: String, issues: Vec<Issue> },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Eligibility(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    TooManyAttempts(String),
    #[error("Too many requests, please try again later")]
    RateLimited,
    #[error("{0}")]
    Locked(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Bson(#[from] BsonError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Mail delivery failed: {0}")]
    Mail(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Input failed validation, with field-level detail.
    pub fn validation(issues: Vec<Issue>) -> Self {
        Self::Validation {
            message: "Validation failed".to_string(),
            issues,
        }
    }

    /// A single field failed validation.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::validation(vec![Issue::new(field, message)])
    }

    pub fn not_found(what: impl Display) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Validation { .. } | Self::Conflict(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::Eligibility(_) => Status::Forbidden,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::TooManyAttempts(_) | Self::RateLimited => Status::TooManyRequests,
            Self::Locked(_) => Status::Locked,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::InvalidToken
                | JwtErrorKind::InvalidSignature
                | JwtErrorKind::ExpiredSignature
                | JwtErrorKind::ImmatureSignature
                | JwtErrorKind::Base64(_)
                | JwtErrorKind::Json(_)
                | JwtErrorKind::Utf8(_) => Status::Unauthorized,
                _ => Status::InternalServerError,
            },
            Self::Db(_) | Self::Bson(_) | Self::Mail(_) | Self::Internal(_) => {
                Status::InternalServerError
            }
        }
    }

    /// The body sent to the client. Upstream failures are never described.
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::Validation { message, issues } => ErrorBody {
                error: message.clone(),
                details: Some(issues.clone()),
            },
            Self::Jwt(_) if self.status() == Status::Unauthorized => {
                ErrorBody::new("Session is invalid or has expired")
            }
            _ if self.status() == Status::InternalServerError => {
                ErrorBody::new("Internal server error")
            }
            _ => ErrorBody::new(self.to_string()),
        }
    }
}

/// The error envelope returned by every endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<Issue>>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status == Status::InternalServerError {
            error!("{} {}: {self:?}", req.method(), req.uri());
        } else {
            debug!("{} {}: {self}", req.method(), req.uri());
        }
        (status, Json(self.body())).respond_to(req)
    }
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Render guard and framework failures in the same envelope as handler errors.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    let (status, message) = match status.code {
        400 | 422 => (Status::BadRequest, "Malformed request body"),
        401 => (status, "Authentication required"),
        403 => (status, "Forbidden"),
        404 => (status, "Not found"),
        423 => (status, "Account is locked"),
        429 => (status, "Too many requests, please try again later"),
        _ if status.class().is_server_error() => {
            (Status::InternalServerError, "Internal server error")
        }
        _ => (status, "Request failed"),
    };
    (status, Json(ErrorBody::new(message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(Error::invalid("email", "bad").status(), Status::BadRequest);
        assert_eq!(Error::Conflict("dup".into()).status(), Status::BadRequest);
        assert_eq!(Error::not_found("Event").status(), Status::NotFound);
        assert_eq!(Error::Eligibility("closed".into()).status(), Status::Forbidden);
        assert_eq!(Error::Unauthorized("no".into()).status(), Status::Unauthorized);
        assert_eq!(
            Error::TooManyAttempts("stop".into()).status(),
            Status::TooManyRequests
        );
        assert_eq!(Error::RateLimited.status(), Status::TooManyRequests);
        assert_eq!(Error::Locked("locked".into()).status(), Status::Locked);
        assert_eq!(
            Error::Mail("smtp down".into()).status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn internal_details_are_hidden() {
        let body = Error::Internal("connection string leaked".into()).body();
        assert_eq!(body.error, "Internal server error");
        assert!(body.details.is_none());
    }

    #[test]
    fn validation_keeps_field_details() {
        let body = Error::invalid("studentId", "must be 7 digits").body();
        assert_eq!(body.error, "Validation failed");
        assert_eq!(
            body.details,
            Some(vec![Issue::new("studentId", "must be 7 digits")])
        );
    }
}
