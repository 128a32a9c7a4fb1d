//! Display generation for frames, the move list and the text board.
//!
//! This module transforms session state into display-ready view models.
//! It lives in the UI layer and depends on domain + models, not vice versa.

use crate::domain::chess::{Side, to_square};
use crate::domain::oracle::{GameStatus, PositionOracle};
use crate::models::session::Session;
use crate::ui::view_models::{Frame, LastMoveDisplay, MovePair};

impl<O: PositionOracle + Clone> Session<O> {
    /// Snapshot for the presentation layer
    pub fn frame(&self) -> Frame {
        let oracle = self.oracle();
        let state = self.state();
        let status = oracle.status();

        // whoever moved first in this game
        let first = if oracle.ply() % 2 == 0 {
            oracle.turn()
        } else {
            oracle.turn().other()
        };

        Frame {
            fen: oracle.serialize(),
            turn: oracle.turn(),
            board: board_rows(oracle),
            legal_moves: self.index().to_highlight_map(),
            last_move: state.last_move().map(|m| LastMoveDisplay {
                from: m.from.to_string(),
                to: m.to.to_string(),
            }),
            history: move_pairs(&state.notations(), first),
            move_counter: state.move_counter(),
            error: state.error().map(str::to_string),
            notice: self.notice().map(str::to_string),
            status,
            status_text: status_text(status),
            phase: self.phase(),
            engine_side: state.engine_side(),
            thinking: self.is_thinking(),
        }
    }
}

/// Group SAN moves into numbered rows
pub fn move_pairs(moves: &[String], first: Side) -> Vec<MovePair> {
    let mut pairs: Vec<MovePair> = Vec::new();
    let mut side = first;

    for san in moves {
        match side {
            Side::White => pairs.push(MovePair {
                number: pairs.len() + 1,
                white: Some(san.clone()),
                black: None,
            }),
            Side::Black => match pairs.last_mut() {
                Some(pair) if pair.black.is_none() => pair.black = Some(san.clone()),
                _ => pairs.push(MovePair {
                    number: pairs.len() + 1,
                    white: None,
                    black: Some(san.clone()),
                }),
            },
        }
        side = side.other();
    }

    pairs
}

/// `1. e4 e5 2. Nf3`, or `1... e5 2. Nf3` when Black moved first
pub fn move_list_text(pairs: &[MovePair]) -> String {
    let mut parts = Vec::new();
    for pair in pairs {
        match (&pair.white, &pair.black) {
            (Some(white), Some(black)) => parts.push(format!("{}. {} {}", pair.number, white, black)),
            (Some(white), None) => parts.push(format!("{}. {}", pair.number, white)),
            (None, Some(black)) => parts.push(format!("{}... {}", pair.number, black)),
            (None, None) => {}
        }
    }
    parts.join(" ")
}

pub fn status_text(status: GameStatus) -> Option<String> {
    let text = match status {
        GameStatus::Ongoing => return None,
        GameStatus::Check => "Check!".to_string(),
        GameStatus::Checkmate { winner } => format!("Checkmate! {} wins!", winner),
        GameStatus::Stalemate => "Stalemate! Game is a draw.".to_string(),
        GameStatus::InsufficientMaterial => "Draw! Insufficient material.".to_string(),
        GameStatus::Draw => "Draw!".to_string(),
    };
    Some(text)
}

/// Board as eight strings, rank 8 first
pub fn board_rows<O: PositionOracle + ?Sized>(oracle: &O) -> Vec<String> {
    (0..8)
        .map(|row| {
            (0..8)
                .map(|col| {
                    oracle
                        .piece_at(to_square(row, col))
                        .map(|p| p.letter())
                        .unwrap_or('.')
                })
                .collect()
        })
        .collect()
}

/// Board with rank and file labels; the last move's squares are bracketed
pub fn board_text(frame: &Frame) -> String {
    let marked = |square: &str| {
        frame
            .last_move
            .as_ref()
            .is_some_and(|m| m.from == square || m.to == square)
    };

    let mut out = String::new();
    for (row, rank) in frame.board.iter().enumerate() {
        let rank_number = 8 - row;
        out.push_str(&format!("{} ", rank_number));
        for (col, piece) in rank.chars().enumerate() {
            let name = to_square(row, col).to_string();
            if marked(&name) {
                out.push_str(&format!("[{}]", piece));
            } else {
                out.push_str(&format!(" {} ", piece));
            }
        }
        out.push('\n');
    }
    out.push_str("   a  b  c  d  e  f  g  h\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::oracle::ChessOracle;
    use crate::models::session::{Phase, SessionConfig};
    use crate::resolve::MoveInput;

    fn sans(moves: &[&str]) -> Vec<String> {
        moves.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_move_pairs_from_white() {
        let pairs = move_pairs(&sans(&["e4", "e5", "Nf3"]), Side::White);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].number, 1);
        assert_eq!(pairs[0].black.as_deref(), Some("e5"));
        assert_eq!(pairs[1].white.as_deref(), Some("Nf3"));
        assert_eq!(pairs[1].black, None);
        assert_eq!(move_list_text(&pairs), "1. e4 e5 2. Nf3");
    }

    #[test]
    fn test_move_pairs_from_black() {
        let pairs = move_pairs(&sans(&["e5", "Nf3", "Nc6"]), Side::Black);
        assert_eq!(move_list_text(&pairs), "1... e5 2. Nf3 Nc6");
        assert!(move_pairs(&[], Side::White).is_empty());
    }

    #[test]
    fn test_status_banners() {
        assert_eq!(status_text(GameStatus::Ongoing), None);
        assert_eq!(status_text(GameStatus::Check).as_deref(), Some("Check!"));
        assert_eq!(
            status_text(GameStatus::Checkmate {
                winner: Side::Black
            })
            .as_deref(),
            Some("Checkmate! Black wins!")
        );
        assert_eq!(
            status_text(GameStatus::Stalemate).as_deref(),
            Some("Stalemate! Game is a draw.")
        );
    }

    #[test]
    fn test_board_rows_start() {
        let rows = board_rows(&ChessOracle::new());
        assert_eq!(rows[0], "rnbqkbnr");
        assert_eq!(rows[1], "pppppppp");
        assert_eq!(rows[4], "........");
        assert_eq!(rows[7], "RNBQKBNR");
    }

    #[test]
    fn test_frame_after_move() {
        let mut session = Session::new(SessionConfig::default());
        session.submit(MoveInput::drag("e2", "e4")).unwrap();
        let frame = session.frame();

        assert_eq!(frame.turn, Side::Black);
        assert_eq!(frame.board[4], "....P...");
        assert_eq!(frame.move_counter, 1);
        assert_eq!(frame.history[0].white.as_deref(), Some("e4"));
        assert_eq!(
            frame.last_move,
            Some(LastMoveDisplay {
                from: "e2".to_string(),
                to: "e4".to_string()
            })
        );
        let mut pawn = frame.legal_moves["e7"].clone();
        pawn.sort();
        assert_eq!(pawn, vec!["e5", "e6"]);
        assert!(!frame.legal_moves.contains_key("e2"));
        assert_eq!(frame.notice.as_deref(), Some("Move played: e4"));
        assert_eq!(frame.phase, Phase::AwaitingInput);
        assert!(!frame.thinking);

        let text = board_text(&frame);
        assert!(text.contains("[P]"));
        assert!(text.starts_with("8  r  n  b  q  k  b  n  r"));
    }

    #[test]
    fn test_frame_history_from_black_fen() {
        let oracle = ChessOracle::from_fen(
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
        )
        .unwrap();
        let mut session = Session::with_oracle(oracle, SessionConfig::default());
        session.submit(MoveInput::text("e7e5")).unwrap();
        session.submit(MoveInput::text("g1f3")).unwrap();
        let frame = session.frame();
        assert_eq!(move_list_text(&frame.history), "1... e5 2. Nf3");
    }

    #[test]
    fn test_frame_serializes() {
        let mut session = Session::new(SessionConfig::default());
        session.submit(MoveInput::text("e2e5")).unwrap_err();
        let json = serde_json::to_value(session.frame()).unwrap();
        assert_eq!(json["turn"], "white");
        assert_eq!(json["phase"], "awaiting_input");
        assert_eq!(json["status"]["kind"], "ongoing");
        assert_eq!(json["error"], "Illegal move: e2e5");
        assert_eq!(json["last_move"], serde_json::Value::Null);
        assert_eq!(json["legal_moves"]["g1"], serde_json::json!(["f3", "h3"]));
    }
}
