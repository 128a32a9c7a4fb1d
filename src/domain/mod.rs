pub mod chess;
pub mod index;
pub mod oracle;
pub mod uci;

pub use chess::{CanonicalMove, LastMove, Piece, PieceKind, PromotionPiece, Side};
pub use index::LegalMoveIndex;
pub use oracle::{ChessOracle, GameResult, GameStatus, OracleError, PositionOracle};
