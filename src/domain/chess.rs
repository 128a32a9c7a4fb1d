//! Pure chess domain types and utilities.
//! No I/O and no session state - this is the domain layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::{Color as SColor, File, Rank, Role, Square};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PieceKind {
    Pawn,
    Rook,
    Knight,
    Bishop,
    Queen,
    King,
}

/// One of the two turn-taking parties.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::White => "White",
            Side::Black => "Black",
        }
    }

    /// The rank on which a pawn of this side promotes
    pub fn last_rank(self) -> Rank {
        match self {
            Side::White => Rank::Eighth,
            Side::Black => Rank::First,
        }
    }
}

impl From<SColor> for Side {
    fn from(color: SColor) -> Self {
        match color {
            SColor::White => Side::White,
            SColor::Black => Side::Black,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Piece {
    pub kind: PieceKind,
    pub side: Side,
}

impl Piece {
    /// Letter used by the text board (uppercase for white, FEN style)
    pub fn letter(&self) -> char {
        let c = match self.kind {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        match self.side {
            Side::White => c.to_ascii_uppercase(),
            Side::Black => c,
        }
    }
}

/// Convert a shakmaty piece to our domain Piece
pub fn shakmaty_to_piece(piece: shakmaty::Piece) -> Piece {
    let kind = match piece.role {
        Role::Pawn => PieceKind::Pawn,
        Role::Knight => PieceKind::Knight,
        Role::Bishop => PieceKind::Bishop,
        Role::Rook => PieceKind::Rook,
        Role::Queen => PieceKind::Queen,
        Role::King => PieceKind::King,
    };
    Piece {
        kind,
        side: piece.color.into(),
    }
}

/// Convert row/col (0-indexed, row 0 = rank 8) to a shakmaty Square
pub fn to_square(row: usize, col: usize) -> Square {
    let file = File::new(col as u32);
    let rank = Rank::new(7 - row as u32);
    Square::from_coords(file, rank)
}

/// Pieces a pawn may promote to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PromotionPiece {
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl PromotionPiece {
    /// Parse a promotion letter, either case
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'q' => Some(PromotionPiece::Queen),
            'r' => Some(PromotionPiece::Rook),
            'b' => Some(PromotionPiece::Bishop),
            'n' => Some(PromotionPiece::Knight),
            _ => None,
        }
    }

    pub fn char(self) -> char {
        match self {
            PromotionPiece::Queen => 'q',
            PromotionPiece::Rook => 'r',
            PromotionPiece::Bishop => 'b',
            PromotionPiece::Knight => 'n',
        }
    }

    pub fn from_role(role: Role) -> Option<Self> {
        match role {
            Role::Queen => Some(PromotionPiece::Queen),
            Role::Rook => Some(PromotionPiece::Rook),
            Role::Bishop => Some(PromotionPiece::Bishop),
            Role::Knight => Some(PromotionPiece::Knight),
            Role::Pawn | Role::King => None,
        }
    }
}

/// A fully disambiguated move ready for application.
///
/// Castling is expressed the way a user drags it: king origin to king
/// destination (`e1g1`), never king-takes-rook.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CanonicalMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PromotionPiece>,
}

impl CanonicalMove {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(from: Square, to: Square, piece: PromotionPiece) -> Self {
        Self {
            from,
            to,
            promotion: Some(piece),
        }
    }
}

impl fmt::Display for CanonicalMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(piece) = self.promotion {
            write!(f, "{}", piece.char())?;
        }
        Ok(())
    }
}

/// Origin and destination of the most recently applied move, for highlighting.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LastMove {
    pub from: Square,
    pub to: Square,
}

impl From<CanonicalMove> for LastMove {
    fn from(m: CanonicalMove) -> Self {
        Self {
            from: m.from,
            to: m.to,
        }
    }
}
