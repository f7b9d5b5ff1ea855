//! Call session error types.
//!
//! Command rejections are returned to the caller of the command. Engine
//! failures that arrive asynchronously are not errors of any command; they
//! travel as notices on the update stream (see `actors::messages`).

use crate::actors::messages::CallState;
use crate::engine::EngineError;
use crate::registry::BindingKey;

use thiserror::Error;

/// Error returned by `CallSessionHandle` commands.
///
/// Maps to client error codes:
/// - `InvalidArgument`: `INVALID_ARGUMENT` (2)
/// - `InvalidState`: `INVALID_STATE` (3)
/// - `Engine`: `ENGINE_ERROR` (5)
/// - `Closed`: `INTERNAL_ERROR` (6)
#[derive(Debug, Error)]
pub enum SessionError {
    /// Command is not valid in the current state. Nothing changed.
    #[error("{command} not allowed while {state}")]
    InvalidState {
        command: &'static str,
        state: CallState,
    },

    /// Malformed command input. No engine call was made.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine refused the request.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// The session has been destroyed or its actor has stopped.
    #[error("Session closed")]
    Closed,
}

impl SessionError {
    /// Returns the client error code for this error.
    pub fn error_code(&self) -> i32 {
        match self {
            SessionError::InvalidArgument(_) => 2,
            SessionError::InvalidState { .. } => 3,
            SessionError::Engine(_) => 5,
            SessionError::Closed => 6,
        }
    }

    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            SessionError::InvalidState { command, .. } => {
                format!("{command} is not available right now")
            }
            SessionError::InvalidArgument(msg) => msg.clone(),
            SessionError::Engine(err) => {
                format!("Call engine rejected the request (code {})", err.code)
            }
            SessionError::Closed => "The call has ended".to_string(),
        }
    }
}

/// Render surface registry errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No binding exists for the key. Benign during teardown races.
    #[error("No render binding for {0}")]
    NotFound(BindingKey),
}
