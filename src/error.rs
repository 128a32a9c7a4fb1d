//! Error types for sessions and the engine boundary.
//!
//! Every variant except `InternalConsistency` is a recoverable, user-facing
//! condition: the position and history are left exactly as they were.

use crate::domain::chess::Side;
use crate::resolve::{IllegalMove, ParseError};

/// Failures of the external search engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Engine not configured, not installed or not reachable
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// Engine running but misbehaving (crash, timeout, garbled output)
    #[error("engine fault: {0}")]
    Fault(String),
}

/// Errors surfaced by session operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Input is not a move at all
    #[error("Invalid move format: {0}")]
    Parse(#[from] ParseError),

    /// Well-formed move the position does not allow
    #[error(transparent)]
    Illegal(#[from] IllegalMove),

    /// Automated opponent cannot act; a human may move instead
    #[error("AI opponent unavailable: {0}")]
    EngineUnavailable(String),

    /// Engine produced no move, an illegal move, or failed
    #[error("AI move error: {0}")]
    EngineFault(String),

    /// A validated move was refused by the rules library
    #[error("internal consistency error: {0}")]
    InternalConsistency(String),

    /// The game has ended; only a reset starts a new one
    #[error("Game over: {0}")]
    GameOver(String),

    /// Input for the automated side while its engine is searching
    #[error("{0} is controlled by the engine, which is still thinking")]
    EngineThinking(Side),
}

impl SessionError {
    /// Recoverable errors are shown to the user; the rest are defects
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SessionError::InternalConsistency(_))
    }
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
