//! Error types for drone-rpc.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::result::{ReportedResult, ResultCode};

/// Errors surfaced by plugin calls and subscriptions.
///
/// Only [`Error::Transport`] is retried automatically, and only by stream
/// subscriptions. A protocol failure or a rejected call is the server's
/// decided answer and is handed to the caller verbatim.
///
/// A [`tonic::Status`] converts by code: connection-level codes become
/// `Transport`, decode and data-loss codes become `Internal`, and the rest
/// become `Rejected`.
#[derive(Debug, Clone, Error)]
pub enum Error<R: ResultCode> {
    /// The server answered with a non-success result code.
    #[error("{service} request failed with {result}: {message}", service = R::SERVICE)]
    Protocol { result: R, message: String },

    /// Connection-level failure; no result was decoded.
    #[error("Transport fault: {0}")]
    Transport(tonic::Status),

    /// The server refused the call with a gRPC status (unimplemented,
    /// invalid argument, permission denied and the like).
    #[error("Call rejected: {0}")]
    Rejected(tonic::Status),

    /// A unary call did not resolve in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// A frame violated the adapter's expectations (missing result, stream
    /// closed before a terminal frame).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl<R: ResultCode> Error<R> {
    /// Build a protocol failure from a reported result.
    pub fn protocol(reported: ReportedResult) -> Self {
        Self::Protocol {
            result: R::from_code(reported.code),
            message: reported.message,
        }
    }

    /// Whether a stream should re-issue its call after this error.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// The gRPC status behind a transport fault or rejected call.
    pub const fn status(&self) -> Option<&tonic::Status> {
        match self {
            Self::Transport(status) | Self::Rejected(status) => Some(status),
            _ => None,
        }
    }

    /// The result code carried by a protocol failure.
    pub const fn result(&self) -> Option<R> {
        match self {
            Self::Protocol { result, .. } => Some(*result),
            _ => None,
        }
    }
}

impl<R: ResultCode> From<tonic::Status> for Error<R> {
    fn from(status: tonic::Status) -> Self {
        use tonic::Code;

        match status.code() {
            Code::Unavailable
            | Code::Unknown
            | Code::Cancelled
            | Code::DeadlineExceeded
            | Code::Aborted => Self::Transport(status),
            // tonic reports undecodable frames as `Internal`.
            Code::Internal | Code::DataLoss => {
                Self::Internal(format!("{:?}: {}", status.code(), status.message()))
            }
            _ => Self::Rejected(status),
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
