use http::StatusCode;
use snafu::Snafu;

use super::context::Interrupted;

/// Errors produced while executing one request against the remote service.
///
/// [`HttpError::TooManyRequests`] is the quota-exhausted signal the
/// [`CallCoordinator`](super::CallCoordinator) retries on; every other variant is
/// passed through to the caller after a single attempt.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HttpError {
    /// The service rejected the request because the quota window is spent (429).
    #[snafu(display("too many requests"))]
    TooManyRequests,

    /// The credentials were missing or rejected (401).
    #[snafu(display("unauthorized"))]
    Unauthorized,

    /// The service answered with any other non-success status.
    #[snafu(display("unexpected response (status {}): {}", status, body))]
    ServerError { status: u16, body: String },

    /// An error occurred during the transport of the request (e.g., network issue, DNS).
    #[snafu(display("HTTP transport error: {}", source))]
    Transport { source: reqwest::Error },

    /// A timeout occurred.
    #[snafu(display("HTTP request timed out"))]
    Timeout,

    /// The request itself was malformed or invalid before sending.
    #[snafu(display("Invalid HTTP request: {}", details))]
    InvalidRequest { details: String },

    /// The caller stopped waiting for quota.
    #[snafu(display("{}", source))]
    Interrupted { source: Interrupted },
}

impl From<Interrupted> for HttpError {
    fn from(source: Interrupted) -> Self {
        HttpError::Interrupted { source }
    }
}

impl HttpError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::TooManyRequests => Some(StatusCode::TOO_MANY_REQUESTS),
            HttpError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            HttpError::ServerError { status, .. } => StatusCode::from_u16(*status).ok(),
            _ => None,
        }
    }
}

/// The error for a response whose status is not a success.
pub fn status_error(status: StatusCode, body: String) -> HttpError {
    match status {
        StatusCode::UNAUTHORIZED => HttpError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => HttpError::TooManyRequests,
        _ => HttpError::ServerError {
            status: status.as_u16(),
            body,
        },
    }
}
