//! Error types for portfolio_dash
//!
//! Domain errors are defined here with `thiserror`; the binary boundary in
//! `main.rs` wraps them into `eyre::Report`.

use thiserror::Error;

/// Failures talking to the portfolio backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("could not reach backend: {0}")]
    Network(String),

    #[error("backend returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("unexpected response body: {0}")]
    Parse(String),
}

impl ApiError {
    /// Text for the page-level error banner.
    ///
    /// Not found, unauthorized and server errors all collapse to the same
    /// message; the detailed cause goes to the log.
    pub fn user_message(&self) -> &'static str {
        match self {
            ApiError::Network(_) => "Could not connect to the portfolio service. Please try again.",
            ApiError::Status { .. } | ApiError::Parse(_) => {
                "Failed to load data from the portfolio service. Please try again."
            }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Validation errors for user input in forms and CLI arguments.
///
/// These errors are shown directly to users and should be clear and actionable.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Name is required")]
    NameRequired,

    #[error("No portfolio with id {0}")]
    UnknownPortfolio(String),

    #[error("Invalid value for exclude: {0} (expected true or false)")]
    InvalidFlag(String),
}

/// Outcome of a failed create/update/delete/archive call.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{action} failed: {source}")]
    Request {
        action: &'static str,
        #[source]
        source: ApiError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_hides_status_details() {
        let not_found = ApiError::Status {
            status: 404,
            url: "http://localhost/portfolio".to_string(),
        };
        let server = ApiError::Status {
            status: 500,
            url: "http://localhost/portfolio".to_string(),
        };
        assert_eq!(not_found.user_message(), server.user_message());
        assert!(!not_found.user_message().contains("404"));
    }

    #[test]
    fn mutation_error_names_action() {
        let err = MutationError::Request {
            action: "Delete",
            source: ApiError::Network("connection refused".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Delete failed: could not reach backend: connection refused"
        );
    }
}
