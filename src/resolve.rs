//! Move resolution - turns raw UI input into one canonical move or a reason
//! it was refused.
//!
//! Promotion policy: a pawn reaching its last rank without a promotion letter
//! becomes a queen. This is a convenience of the input layer, not a chess
//! rule. An explicit letter always wins over the default, and anything that
//! wants to offer a piece picker must do so before the input gets here.

use std::fmt;

use shakmaty::Square;

use crate::domain::chess::{CanonicalMove, PieceKind, PromotionPiece};
use crate::domain::index::LegalMoveIndex;
use crate::domain::oracle::{PositionOracle, is_promotion_square};

/// Raw move input as the presentation layer delivers it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveInput {
    /// A piece dragged from one square to another
    Drag { from: String, to: String },
    /// Manually typed coordinate notation, e.g. `e2e4` or `a7a8n`
    Text(String),
}

impl MoveInput {
    pub fn drag(from: impl Into<String>, to: impl Into<String>) -> Self {
        MoveInput::Drag {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        MoveInput::Text(text.into())
    }

    /// The input as the user would recognise it in an error message
    pub fn display_text(&self) -> String {
        match self {
            MoveInput::Drag { from, to } => format!("{}{}", from.trim(), to.trim()),
            MoveInput::Text(text) => text.trim().to_string(),
        }
    }
}

/// Malformed input: the user typed or sent something that is not a move.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no move entered")]
    Empty,
    #[error("expected 4 or 5 characters (e.g. e2e4 or e7e8q), got {0:?}")]
    Length(String),
    #[error("{0:?} is not a square")]
    BadSquare(String),
    #[error("{0:?} is not a promotion piece (use q, r, b or n)")]
    BadPromotion(char),
    #[error("{0} cannot carry a promotion piece")]
    PromotionNotAllowed(String),
}

/// A well-formed move that the current position does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Illegal move: {attempted}")]
pub struct IllegalMove {
    pub attempted: String,
}

/// Outcome of resolving one input against the current position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Valid(CanonicalMove),
    Parse(ParseError),
    Illegal(IllegalMove),
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Valid(m) => write!(f, "{}", m),
            Resolution::Parse(e) => write!(f, "Invalid move format: {}", e),
            Resolution::Illegal(e) => write!(f, "{}", e),
        }
    }
}

/// Origin, destination and an optional explicit promotion letter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PromotionPiece>,
}

fn parse_square(name: &str) -> Result<Square, ParseError> {
    name.trim()
        .to_ascii_lowercase()
        .parse::<Square>()
        .map_err(|_| ParseError::BadSquare(name.trim().to_string()))
}

/// Parse coordinate text: `e2e4`, `e7e8q`, `e7e8Q` or `e7e8=q`.
pub fn parse_text(text: &str) -> Result<ParsedMove, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }
    if !text.is_ascii() {
        return Err(ParseError::Length(text.to_string()));
    }

    let compact: String = match text.len() {
        6 if text.as_bytes()[4] == b'=' => format!("{}{}", &text[..4], &text[5..]),
        _ => text.to_string(),
    };
    if !(4..=5).contains(&compact.len()) {
        return Err(ParseError::Length(text.to_string()));
    }

    let from = parse_square(&compact[0..2])?;
    let to = parse_square(&compact[2..4])?;
    let promotion = match compact[4..].chars().next() {
        Some(c) => Some(PromotionPiece::from_char(c).ok_or(ParseError::BadPromotion(c))?),
        None => None,
    };
    Ok(ParsedMove {
        from,
        to,
        promotion,
    })
}

/// Parse either input shape into squares and an optional promotion letter
pub fn parse_input(input: &MoveInput) -> Result<ParsedMove, ParseError> {
    match input {
        MoveInput::Drag { from, to } => Ok(ParsedMove {
            from: parse_square(from)?,
            to: parse_square(to)?,
            promotion: None,
        }),
        MoveInput::Text(text) => parse_text(text),
    }
}

/// Complete a parsed move against the position: apply the promotion policy
/// and reject promotion letters where no promotion can happen.
fn canonicalize<O: PositionOracle + ?Sized>(
    parsed: ParsedMove,
    oracle: &O,
) -> Result<CanonicalMove, ParseError> {
    let piece = oracle.piece_at(parsed.from);
    let side = piece.map(|p| p.side).unwrap_or_else(|| oracle.turn());
    let reaches_last_rank = is_promotion_square(side, parsed.to);
    let is_pawn = piece.map(|p| p.kind == PieceKind::Pawn);

    let promotion = match (parsed.promotion, is_pawn) {
        (Some(_), _) if !reaches_last_rank => {
            let text = CanonicalMove::new(parsed.from, parsed.to).to_string();
            return Err(ParseError::PromotionNotAllowed(text));
        }
        (Some(_), Some(false)) => {
            let text = CanonicalMove::new(parsed.from, parsed.to).to_string();
            return Err(ParseError::PromotionNotAllowed(text));
        }
        (Some(explicit), _) => Some(explicit),
        (None, Some(true)) if reaches_last_rank => Some(PromotionPiece::Queen),
        (None, _) => None,
    };

    Ok(CanonicalMove {
        from: parsed.from,
        to: parsed.to,
        promotion,
    })
}

/// Resolve raw input to exactly one legal move, or say why not.
///
/// The index must have been built for the oracle's current position.
pub fn resolve<O: PositionOracle + ?Sized>(
    input: &MoveInput,
    oracle: &O,
    index: &LegalMoveIndex,
) -> Resolution {
    let parsed = match parse_input(input) {
        Ok(parsed) => parsed,
        Err(e) => return Resolution::Parse(e),
    };
    let canonical = match canonicalize(parsed, oracle) {
        Ok(m) => m,
        Err(e) => return Resolution::Parse(e),
    };

    if index.contains(&canonical) {
        Resolution::Valid(canonical)
    } else {
        Resolution::Illegal(IllegalMove {
            attempted: input.display_text(),
        })
    }
}
