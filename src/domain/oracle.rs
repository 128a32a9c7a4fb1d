//! Position oracle - the chess-rules boundary of a session.
//!
//! The session never touches a board directly; everything it knows about
//! legality, turn order and game end comes through [`PositionOracle`].
//! [`ChessOracle`] implements it over shakmaty with an undo stack of
//! immutable positions.

use serde::Serialize;
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{CastlingMode, Chess, EnPassantMode, File, Move, Position, Square};

use crate::domain::chess::{CanonicalMove, Piece, PromotionPiece, Side, shakmaty_to_piece};

/// Halfmove clock value at which the seventy-five-move rule ends the game
const SEVENTY_FIVE_MOVE_PLIES: u32 = 150;

/// Occurrences of one position that end the game
const FIVEFOLD: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("move {0} is not legal in this position")]
    IllegalMove(CanonicalMove),
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
}

/// Final result of a finished game.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    White,
    Black,
    Draw,
}

/// What the status banner shows for the current position.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameStatus {
    Ongoing,
    Check,
    Checkmate { winner: Side },
    Stalemate,
    InsufficientMaterial,
    /// Any other draw (seventy-five-move rule, fivefold repetition)
    Draw,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, GameStatus::Ongoing | GameStatus::Check)
    }

    pub fn result(self) -> Option<GameResult> {
        match self {
            GameStatus::Ongoing | GameStatus::Check => None,
            GameStatus::Checkmate { winner: Side::White } => Some(GameResult::White),
            GameStatus::Checkmate { winner: Side::Black } => Some(GameResult::Black),
            GameStatus::Stalemate | GameStatus::InsufficientMaterial | GameStatus::Draw => {
                Some(GameResult::Draw)
            }
        }
    }
}

/// Chess rules as seen by a session.
pub trait PositionOracle {
    /// Every legal move, in the rules library's generation order
    fn legal_moves(&self) -> Vec<CanonicalMove>;

    fn turn(&self) -> Side;

    fn piece_at(&self, square: Square) -> Option<Piece>;

    fn status(&self) -> GameStatus;

    fn is_game_over(&self) -> bool {
        self.status().is_terminal()
    }

    fn result(&self) -> Option<GameResult> {
        self.status().result()
    }

    /// Play a move. Fails without changing anything if the move is not legal.
    fn apply(&mut self, m: CanonicalMove) -> Result<(), OracleError>;

    /// Take back the last move. Returns false (and does nothing) without history.
    fn undo(&mut self) -> bool;

    /// FEN of the current position
    fn serialize(&self) -> String;

    /// SAN of a move in the current position
    fn notate(&self, m: CanonicalMove) -> Result<String, OracleError>;

    /// Number of moves played since the starting position
    fn ply(&self) -> usize;
}

/// A position plus its repetition key
#[derive(Clone, Debug)]
struct Ply {
    position: Chess,
    key: Zobrist64,
}

impl Ply {
    fn new(position: Chess) -> Self {
        let key = position.zobrist_hash(EnPassantMode::Legal);
        Self { position, key }
    }
}

/// shakmaty-backed oracle with a linear undo stack.
#[derive(Clone, Debug)]
pub struct ChessOracle {
    start: Ply,
    /// Position after each applied move; popping one takes the move back
    stack: Vec<Ply>,
}

impl ChessOracle {
    /// A fresh game from the standard starting position
    pub fn new() -> Self {
        Self::from_position(Chess::default())
    }

    pub fn from_position(start: Chess) -> Self {
        Self {
            start: Ply::new(start),
            stack: Vec::new(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, OracleError> {
        let fen: Fen = fen
            .trim()
            .parse()
            .map_err(|e| OracleError::InvalidFen(format!("{}", e)))?;
        let position: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|e| OracleError::InvalidFen(format!("{}", e)))?;
        Ok(Self::from_position(position))
    }

    /// The position currently on the board
    pub fn position(&self) -> &Chess {
        &self.current().position
    }

    fn current(&self) -> &Ply {
        self.stack.last().unwrap_or(&self.start)
    }

    /// How often the current position has stood on the board. Positions
    /// match on placement, turn, castling rights and a capturable en
    /// passant square.
    pub fn repetitions(&self) -> usize {
        let key = self.current().key;
        std::iter::once(&self.start)
            .chain(&self.stack)
            .filter(|ply| ply.key == key)
            .count()
    }

    /// Find the shakmaty move a canonical move stands for
    fn find_move(&self, m: CanonicalMove) -> Option<Move> {
        self.position()
            .legal_moves()
            .iter()
            .find(|candidate| canonicalize(candidate) == Some(m))
            .cloned()
    }
}

impl Default for ChessOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionOracle for ChessOracle {
    fn legal_moves(&self) -> Vec<CanonicalMove> {
        self.position()
            .legal_moves()
            .iter()
            .filter_map(canonicalize)
            .collect()
    }

    fn turn(&self) -> Side {
        self.position().turn().into()
    }

    fn piece_at(&self, square: Square) -> Option<Piece> {
        self.position()
            .board()
            .piece_at(square)
            .map(shakmaty_to_piece)
    }

    fn status(&self) -> GameStatus {
        let pos = self.position();
        if pos.is_checkmate() {
            GameStatus::Checkmate {
                winner: Side::from(pos.turn()).other(),
            }
        } else if pos.is_stalemate() {
            GameStatus::Stalemate
        } else if pos.is_insufficient_material() {
            GameStatus::InsufficientMaterial
        } else if pos.halfmoves() >= SEVENTY_FIVE_MOVE_PLIES || self.repetitions() >= FIVEFOLD {
            GameStatus::Draw
        } else if pos.is_check() {
            GameStatus::Check
        } else {
            GameStatus::Ongoing
        }
    }

    fn apply(&mut self, m: CanonicalMove) -> Result<(), OracleError> {
        let mv = self.find_move(m).ok_or(OracleError::IllegalMove(m))?;
        let position = self
            .position()
            .clone()
            .play(mv)
            .map_err(|_| OracleError::IllegalMove(m))?;
        self.stack.push(Ply::new(position));
        Ok(())
    }

    fn undo(&mut self) -> bool {
        self.stack.pop().is_some()
    }

    fn serialize(&self) -> String {
        Fen::from_position(self.position(), EnPassantMode::Legal).to_string()
    }

    fn notate(&self, m: CanonicalMove) -> Result<String, OracleError> {
        let position = self.position();
        let mv = self.find_move(m).ok_or(OracleError::IllegalMove(m))?;
        let mut san = San::from_move(position, mv.clone()).to_string();

        // Check and mate suffixes, the way a move list prints them
        let after = position
            .clone()
            .play(mv)
            .map_err(|_| OracleError::IllegalMove(m))?;
        if after.is_checkmate() {
            san.push('#');
        } else if after.is_check() {
            san.push('+');
        }
        Ok(san)
    }

    fn ply(&self) -> usize {
        self.stack.len()
    }
}

/// Express a shakmaty move as the (origin, destination, promotion) triple a
/// user would enter. Castling becomes the king's two-square step.
pub fn canonicalize(m: &Move) -> Option<CanonicalMove> {
    match m {
        Move::Normal {
            from,
            to,
            promotion,
            ..
        } => Some(CanonicalMove {
            from: *from,
            to: *to,
            promotion: (*promotion).and_then(PromotionPiece::from_role),
        }),
        Move::EnPassant { from, to } => Some(CanonicalMove::new(*from, *to)),
        Move::Castle { king, rook } => {
            let file = if rook.file() > king.file() {
                File::G
            } else {
                File::C
            };
            Some(CanonicalMove::new(*king, Square::from_coords(file, king.rank())))
        }
        Move::Put { .. } => None,
    }
}

/// True when a pawn of `side` arriving on `square` must promote
pub fn is_promotion_square(side: Side, square: Square) -> bool {
    square.rank() == side.last_rank()
}
