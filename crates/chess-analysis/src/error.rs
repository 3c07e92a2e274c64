//! Error types for the engine session and the analysis pipeline.

use std::time::Duration;
use thiserror::Error;

use crate::game::GameError;

/// Errors that can occur when working with the analysis engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to spawn the engine process or talk to its pipes.
    #[error("Failed to spawn engine: {0}")]
    SpawnError(#[from] std::io::Error),
    /// Engine executable was not found at the specified path.
    #[error("Engine not found at path: {0}")]
    NotFound(String),
    /// The session never finished (or lost) its UCI handshake.
    #[error("Engine not ready")]
    NotReady,
    /// No terminating `bestmove` within the allotted time.
    #[error("Engine timed out after {0:?}")]
    Timeout(Duration),
    /// The caller asked not to be queued and the engine was occupied.
    #[error("Engine busy, request rejected")]
    BusyRejected,
    /// The in-flight search was cancelled through [`EngineSession::stop`](crate::EngineSession::stop).
    #[error("Search stopped")]
    Stopped,
    /// Engine returned an invalid or unexpected response.
    #[error("Invalid engine response: {0}")]
    Protocol(String),
    /// The request was rejected before reaching the engine.
    #[error("Invalid analysis request: {0}")]
    InvalidRequest(String),
    /// Engine output closed unexpectedly.
    #[error("Engine closed unexpectedly")]
    Disconnected,
    /// [`EngineSession::start`](crate::EngineSession::start) was called twice.
    #[error("Engine session already started")]
    AlreadyStarted,
}

impl EngineError {
    /// Transient faults worth another attempt at the same depth.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Timeout(_) | EngineError::Protocol(_))
    }
}

/// Errors that can occur during game analysis.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Error from the analysis engine that applies to the whole game.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    /// The requested move does not exist.
    #[error("Move index {index} out of range (game has {len} moves)")]
    MoveOutOfRange { index: usize, len: usize },
    /// Even the standard-depth evaluation was unavailable for this move.
    #[error("Analysis failed for move {index}: {source}")]
    Failed {
        index: usize,
        #[source]
        source: EngineError,
    },
    /// Invalid game data was provided.
    #[error("Invalid game data: {0}")]
    InvalidGame(#[from] GameError),
}
