//! Crate-wide error type.
//!
//! Nothing in the reconciliation path returns these; they surface from
//! request construction, response checking, config loading and the CLI.

use thiserror::Error;

/// Errors raised outside the reconciliation core.
#[derive(Debug, Error)]
pub enum RoomlineError {
    /// The homeserver answered with a protocol error body (`errcode` + `error`).
    #[error("{errcode} (HTTP {status}): {message}")]
    Api {
        status: u16,
        errcode: String,
        message: String,
    },

    /// Non-2xx reply without a parseable error body.
    #[error("HTTP {status} without an error body")]
    Http { status: u16 },

    /// A 2xx body that does not have the expected shape.
    #[error("unexpected response shape for {expected}: {detail}")]
    Shape {
        expected: &'static str,
        detail: String,
    },

    /// A required user-supplied value was blank after trimming.
    #[error("{0} must not be empty")]
    EmptyInput(&'static str),

    /// An operation needs a current room but none is selected.
    #[error("no room selected")]
    NoRoom,

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RoomlineError {
    /// Whether the caller should retry the same request later.
    ///
    /// Rate limiting and server-side failures are transient; everything else
    /// needs a different request.
    pub fn is_retryable(&self) -> bool {
        match self {
            RoomlineError::Api { status, errcode, .. } => {
                errcode == "M_LIMIT_EXCEEDED" || *status == 429 || *status >= 500
            }
            RoomlineError::Http { status } => *status == 429 || *status >= 500,
            RoomlineError::Io(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RoomlineError>;
