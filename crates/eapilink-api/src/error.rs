use serde_json::Value;
use thiserror::Error;

/// A command inside a batch was rejected by the device.
///
/// The device executes batches strictly in order and stops at the first
/// failure, so everything before `index` was applied. `partial` holds the
/// results for exactly those commands; the failing command itself has no
/// result, only the reported error text.
#[derive(Debug, Clone, Error)]
#[error("command {index} ({command:?}) failed: {message}")]
pub struct CommandError {
    /// Zero-based index of the first failing command in the batch.
    pub index: usize,
    /// The literal text of the failing command.
    pub command: String,
    /// The device-reported error text.
    pub message: String,
    /// The JSON-RPC error code from the fault envelope.
    pub code: i64,
    /// Results for the commands before the failure, in batch order.
    pub partial: Vec<Value>,
}

/// Top-level error type for the `eapilink-api` crate.
///
/// Distinguishes "my command was rejected" ([`Command`](Self::Command))
/// from "I could not reach the device" (transport-level variants) so
/// callers can pick a recovery strategy per kind.
#[derive(Debug, Error)]
pub enum Error {
    /// The device rejected the supplied credentials.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The device rejected a command mid-batch. Carries partial results.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// HTTP transport error (connection refused, DNS failure, reset peer).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Unix socket transport error.
    #[error("socket transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The round trip exceeded its deadline. No partial results exist --
    /// unlike a command fault, a timeout aborts the whole round trip.
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The reply envelope could not be interpreted.
    #[error("protocol error: {message}")]
    Protocol { message: String, body: String },

    /// Invalid construction arguments (e.g. unknown transport kind).
    /// Raised at session construction, never deferred to first use.
    #[error("invalid connection configuration: {message}")]
    Configuration { message: String },

    /// A caller-supplied argument was rejected before touching the wire.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl Error {
    /// Returns `true` if the round trip ran out of time, at either the
    /// HTTP layer or the socket layer.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Borrow the command fault detail, if that is what this error is.
    pub fn as_command_error(&self) -> Option<&CommandError> {
        match self {
            Self::Command(e) => Some(e),
            _ => None,
        }
    }
}
