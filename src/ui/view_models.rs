//! View models for rendering a session.
//!
//! These types are DTOs (Data Transfer Objects) that prepare session state
//! for display. They live in the UI layer, not the domain layer, and serialize
//! as-is for the JSON bridge.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::chess::Side;
use crate::domain::oracle::GameStatus;
use crate::models::session::Phase;

/// One numbered row of the move list
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MovePair {
    pub number: usize,
    /// Empty when the game started with Black to move
    pub white: Option<String>,
    pub black: Option<String>,
}

/// Squares of the most recent move, for the highlight layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LastMoveDisplay {
    pub from: String,
    pub to: String,
}

/// Everything an adapter needs to draw one state of the session
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Frame {
    pub fen: String,
    pub turn: Side,
    /// Rank 8 first; FEN piece letters with `.` for an empty square
    pub board: Vec<String>,
    /// Origin square -> legal destinations
    pub legal_moves: BTreeMap<String, Vec<String>>,
    pub last_move: Option<LastMoveDisplay>,
    pub history: Vec<MovePair>,
    pub move_counter: usize,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub status: GameStatus,
    /// Banner text ("Check!", "Checkmate! White wins!"); `None` while the
    /// game is quiet
    pub status_text: Option<String>,
    pub phase: Phase,
    pub engine_side: Option<Side>,
    /// The engine is searching
    pub thinking: bool,
}
