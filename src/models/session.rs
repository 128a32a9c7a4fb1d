//! Session state model - one game between two parties, either of which may
//! be an engine.
//!
//! A `Session` is an ordinary value: there is no global "current game", and
//! any number of sessions can live side by side. Every mutation goes through
//! `reset`, `undo`, `apply_move` or the input/engine entry points, and each
//! one finishes by rebuilding the legal-move index, so the index always
//! describes the position the presentation layer is about to draw.
//!
//! Phases:
//! `AwaitingInput -> Resolving -> AwaitingInput` for human moves,
//! `AwaitingInput -> AwaitingEngine -> AwaitingInput` for engine moves, and
//! `GameOver` once the position is terminal, left only by `reset`.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::chess::{CanonicalMove, LastMove, Side};
use crate::domain::index::LegalMoveIndex;
use crate::domain::oracle::{ChessOracle, GameStatus, PositionOracle};
use crate::error::{EngineError, SessionError, SessionResult};
use crate::models::opponent::{EngineReply, Opponent};
use crate::resolve::{MoveInput, Resolution, resolve};

/// Where the session is in its turn cycle
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingInput,
    /// Only observable while a submitted input is being processed
    Resolving,
    /// An engine request is outstanding
    AwaitingEngine,
    GameOver,
}

/// Session settings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Side played by the engine, if any
    pub engine_side: Option<Side>,
}

/// One applied move
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub san: String,
    pub played: CanonicalMove,
}

/// A move that made it onto the board
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedMove {
    pub san: String,
    pub played: CanonicalMove,
    pub by: Side,
}

/// Mutable per-game state.
///
/// `move_counter` always equals `history.len()` and `last_move` is always the
/// tail of `history`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    history: Vec<HistoryEntry>,
    last_move: Option<LastMove>,
    error: Option<String>,
    move_counter: usize,
    engine_side: Option<Side>,
}

impl SessionState {
    fn new(engine_side: Option<Side>) -> Self {
        Self {
            engine_side,
            ..Self::default()
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// SAN of every move, oldest first
    pub fn notations(&self) -> Vec<String> {
        self.history.iter().map(|h| h.san.clone()).collect()
    }

    pub fn last_move(&self) -> Option<LastMove> {
        self.last_move
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn move_counter(&self) -> usize {
        self.move_counter
    }

    pub fn engine_side(&self) -> Option<Side> {
        self.engine_side
    }

    fn push(&mut self, entry: HistoryEntry) {
        self.last_move = Some(entry.played.into());
        self.history.push(entry);
        self.move_counter = self.history.len();
    }

    fn pop(&mut self) -> Option<HistoryEntry> {
        let entry = self.history.pop();
        self.last_move = self.history.last().map(|h| h.played.into());
        self.move_counter = self.history.len();
        entry
    }
}

/// Engine connection health as seen by the session
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum EngineHealth {
    Ready,
    /// Last answer was unusable; wait for a human move before asking again
    Suspended,
    /// Cannot be reached at all; never asked again until reconfigured
    Unavailable,
}

/// An interactive game session
pub struct Session<O: PositionOracle + Clone = ChessOracle> {
    initial: O,
    oracle: O,
    index: LegalMoveIndex,
    state: SessionState,
    phase: Phase,
    /// Last success notice ("Move played: e4")
    notice: Option<String>,
    /// Bumped whenever the position is replaced or taken back
    generation: u64,
    opponent: Option<Opponent>,
    engine_health: EngineHealth,
    unavailable_reported: bool,
}

impl Session<ChessOracle> {
    /// A session from the standard starting position
    pub fn new(config: SessionConfig) -> Self {
        Self::with_oracle(ChessOracle::new(), config)
    }
}

impl<O: PositionOracle + Clone> Session<O> {
    /// A session starting from `oracle`'s position. `reset` returns here.
    pub fn with_oracle(oracle: O, config: SessionConfig) -> Self {
        let index = LegalMoveIndex::build(&oracle);
        let mut session = Self {
            initial: oracle.clone(),
            oracle,
            index,
            state: SessionState::new(config.engine_side),
            phase: Phase::AwaitingInput,
            notice: None,
            generation: 0,
            opponent: None,
            engine_health: EngineHealth::Ready,
            unavailable_reported: false,
        };
        session.refresh();
        session
    }

    /// Attach the automated opponent
    pub fn with_opponent(mut self, opponent: Opponent) -> Self {
        self.attach_opponent(opponent);
        self
    }

    /// Replace the automated opponent; a previously unreachable engine gets
    /// a fresh chance
    pub fn attach_opponent(&mut self, opponent: Opponent) {
        self.opponent = Some(opponent);
        self.engine_health = EngineHealth::Ready;
        self.unavailable_reported = false;
        self.generation += 1;
        self.update_phase();
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn index(&self) -> &LegalMoveIndex {
        debug_assert_eq!(self.index.ply(), self.oracle.ply(), "stale legal-move index");
        &self.index
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> GameStatus {
        self.oracle.status()
    }

    pub fn turn(&self) -> Side {
        self.oracle.turn()
    }

    /// True while the engine is searching (the "thinking" indicator)
    pub fn is_thinking(&self) -> bool {
        self.pending_request().is_some()
    }

    pub fn has_opponent(&self) -> bool {
        self.opponent.is_some()
    }

    fn pending_request(&self) -> Option<u64> {
        self.opponent
            .as_ref()
            .and_then(Opponent::in_flight)
            .filter(|g| *g == self.generation)
    }

    fn is_engine_turn(&self) -> bool {
        self.state.engine_side == Some(self.oracle.turn())
    }

    /// Whether the engine is searching or about to be asked for this turn
    fn engine_expected(&self) -> bool {
        self.is_thinking() || (self.opponent.is_some() && self.engine_health == EngineHealth::Ready)
    }

    /// Rebuild derived state after any change to the position
    fn refresh(&mut self) {
        self.index = LegalMoveIndex::build(&self.oracle);
        self.update_phase();
    }

    fn update_phase(&mut self) {
        self.phase = if self.oracle.is_game_over() {
            Phase::GameOver
        } else if self.is_thinking() {
            Phase::AwaitingEngine
        } else {
            Phase::AwaitingInput
        };
    }

    /// Throw the game away and start again from the initial position
    pub fn reset(&mut self) {
        self.generation += 1;
        self.oracle = self.initial.clone();
        self.state = SessionState::new(self.state.engine_side);
        self.notice = None;
        if self.engine_health == EngineHealth::Suspended {
            self.engine_health = EngineHealth::Ready;
        }
        if let Some(opponent) = self.opponent.as_mut() {
            opponent.new_game();
        }
        self.refresh();
        info!(generation = self.generation, "session reset");
    }

    /// Take back the last move. Without history this does nothing at all.
    /// A finished game is only left through `reset`, so undo is refused
    /// then and the game-over message is shown instead.
    pub fn undo(&mut self) -> bool {
        if self.state.history.is_empty() {
            return false;
        }
        if self.oracle.is_game_over() {
            let _ = self.reject(SessionError::GameOver(self.game_over_text()));
            return false;
        }
        if !self.oracle.undo() {
            error!(
                history = self.state.history.len(),
                "oracle had no move to take back; session left unchanged"
            );
            return false;
        }
        let undone = self.state.pop();
        self.generation += 1;
        self.state.error = None;
        self.notice = None;
        if self.engine_health == EngineHealth::Suspended {
            self.engine_health = EngineHealth::Ready;
        }
        self.refresh();
        if let Some(undone) = undone {
            info!(san = %undone.san, generation = self.generation, "move taken back");
        }
        true
    }

    /// Put an already-validated move on the board.
    ///
    /// The oracle refusing it means the caller's validation and the rules
    /// disagree; that is reported as `InternalConsistency` and nothing changes.
    pub fn apply_move(&mut self, m: CanonicalMove) -> SessionResult<AppliedMove> {
        if self.oracle.is_game_over() {
            return Err(SessionError::GameOver(self.game_over_text()));
        }
        let by = self.oracle.turn();
        let san = self.oracle.notate(m).map_err(|e| self.inconsistent(m, e))?;
        self.oracle.apply(m).map_err(|e| self.inconsistent(m, e))?;

        self.state.push(HistoryEntry {
            san: san.clone(),
            played: m,
        });
        self.state.error = None;
        self.notice = Some(format!("Move played: {}", san));
        if self.engine_health == EngineHealth::Suspended {
            self.engine_health = EngineHealth::Ready;
        }
        self.refresh();
        info!(%san, side = %by, ply = self.state.move_counter, "move applied");

        if self.phase == Phase::GameOver {
            info!(status = ?self.oracle.status(), "game over");
        }
        Ok(AppliedMove { san, played: m, by })
    }

    fn inconsistent(&self, m: CanonicalMove, cause: impl std::fmt::Display) -> SessionError {
        error!(mv = %m, %cause, "validated move rejected by the rules");
        SessionError::InternalConsistency(format!("{} was validated but rejected: {}", m, cause))
    }

    /// Resolve and play human input
    pub fn submit(&mut self, input: MoveInput) -> SessionResult<AppliedMove> {
        if self.oracle.is_game_over() {
            return self.reject(SessionError::GameOver(self.game_over_text()));
        }
        if self.is_engine_turn() && self.engine_expected() {
            return self.reject(SessionError::EngineThinking(self.oracle.turn()));
        }

        self.phase = Phase::Resolving;
        let resolution = resolve(&input, &self.oracle, &self.index);
        debug!(input = %input.display_text(), ?resolution, "input resolved");
        match resolution {
            Resolution::Valid(m) => {
                let result = self.apply_move(m);
                self.update_phase();
                result
            }
            Resolution::Parse(e) => self.reject(e.into()),
            Resolution::Illegal(e) => self.reject(e.into()),
        }
    }

    /// Record a recoverable failure; position and history stay as they were
    fn reject(&mut self, err: SessionError) -> SessionResult<AppliedMove> {
        debug!(%err, "input rejected");
        self.state.error = Some(err.to_string());
        self.notice = None;
        self.update_phase();
        Err(err)
    }

    /// Change which side, if any, the engine plays
    pub fn set_engine_side(&mut self, side: Option<Side>) {
        info!(?side, "engine side changed");
        self.state.engine_side = side;
        // anything in flight was asked for the old assignment
        self.generation += 1;
        if self.engine_health == EngineHealth::Suspended {
            self.engine_health = EngineHealth::Ready;
        }
        self.refresh();
    }

    /// Drive the automated party without blocking: collect a finished search
    /// and start a new one when it is the engine's turn.
    ///
    /// Returns the outcome of a search that finished during this call.
    pub fn poll_engine(&mut self) -> Option<SessionResult<AppliedMove>> {
        let mut outcome = None;
        while let Some(reply) = self.opponent.as_mut().and_then(Opponent::poll) {
            if let Some(result) = self.handle_reply(reply) {
                outcome = Some(result);
            }
        }
        if let Err(e) = self.request_engine_move() {
            outcome = Some(Err(e));
        }
        outcome
    }

    /// Like [`Session::poll_engine`] but blocks up to `timeout` for the
    /// engine to answer. Returns `None` on timeout or when no search is due.
    pub fn wait_engine(&mut self, timeout: Duration) -> Option<SessionResult<AppliedMove>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Err(e) = self.request_engine_move() {
                return Some(Err(e));
            }
            self.pending_request()?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let reply = self.opponent.as_mut()?.wait(remaining)?;
            if let Some(result) = self.handle_reply(reply) {
                return Some(result);
            }
        }
    }

    /// Start a search if the engine is due to move. Errors only when the
    /// engine turns out to be unreachable, and then only the first time.
    fn request_engine_move(&mut self) -> SessionResult<()> {
        if !self.is_engine_turn()
            || self.oracle.is_game_over()
            || self.is_thinking()
            || self.engine_health != EngineHealth::Ready
        {
            return Ok(());
        }
        let generation = self.generation;
        let fen = self.oracle.serialize();
        let sent = match self.opponent.as_mut() {
            Some(opponent) => opponent.request(generation, fen),
            None => Err(EngineError::Unavailable("no engine configured".to_string())),
        };
        match sent {
            Ok(()) => {
                self.update_phase();
                Ok(())
            }
            Err(e) => match self.engine_unavailable(e) {
                Some(err) => Err(err),
                None => Ok(()),
            },
        }
    }

    /// Apply or refuse an engine answer. `None` for stale replies.
    fn handle_reply(&mut self, reply: EngineReply) -> Option<SessionResult<AppliedMove>> {
        if reply.generation != self.generation {
            debug!(
                reply = reply.generation,
                current = self.generation,
                "discarding engine reply for an outdated position"
            );
            return None;
        }
        self.update_phase();

        let text = match reply.result {
            Ok(Some(text)) => text,
            Ok(None) => return Some(self.engine_fault("engine returned no move".to_string())),
            Err(EngineError::Fault(msg)) => return Some(self.engine_fault(msg)),
            Err(e @ EngineError::Unavailable(_)) => return self.engine_unavailable(e).map(Err),
        };

        // engine output gets no more trust than typed input
        match resolve(&MoveInput::Text(text.clone()), &self.oracle, &self.index) {
            Resolution::Valid(m) => {
                let result = self.apply_move(m);
                if let Ok(applied) = &result {
                    info!(san = %applied.san, "engine move applied");
                }
                Some(result)
            }
            Resolution::Parse(e) => {
                Some(self.engine_fault(format!("engine sent unreadable move {:?}: {}", text, e)))
            }
            Resolution::Illegal(e) => {
                Some(self.engine_fault(format!("engine proposed an illegal move: {}", e.attempted)))
            }
        }
    }

    fn engine_fault(&mut self, msg: String) -> SessionResult<AppliedMove> {
        warn!(%msg, "engine fault; human may move instead");
        self.engine_health = EngineHealth::Suspended;
        self.reject(SessionError::EngineFault(msg))
    }

    /// Stop asking the engine. Yields the error to surface the first time only.
    fn engine_unavailable(&mut self, e: EngineError) -> Option<SessionError> {
        self.engine_health = EngineHealth::Unavailable;
        self.update_phase();
        if self.unavailable_reported {
            return None;
        }
        self.unavailable_reported = true;
        let msg = match e {
            EngineError::Unavailable(msg) | EngineError::Fault(msg) => msg,
        };
        warn!(%msg, "engine unavailable; automated turns left to humans");
        let err = SessionError::EngineUnavailable(msg);
        self.state.error = Some(err.to_string());
        Some(err)
    }

    fn game_over_text(&self) -> String {
        match self.oracle.status() {
            GameStatus::Checkmate { winner } => format!("checkmate, {} wins", winner),
            GameStatus::Stalemate => "stalemate".to_string(),
            GameStatus::InsufficientMaterial => "insufficient material".to_string(),
            GameStatus::Draw => "draw".to_string(),
            GameStatus::Ongoing | GameStatus::Check => "game in progress".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chess::{Piece, PieceKind, PromotionPiece};
    use crate::domain::oracle::{GameResult, OracleError};
    use crate::models::opponent::ScriptedEngine;
    use shakmaty::Square;
    use std::collections::HashSet;

    const WAIT: Duration = Duration::from_secs(5);

    fn human_game() -> Session {
        Session::new(SessionConfig::default())
    }

    fn vs_engine(engine: ScriptedEngine, engine_side: Side) -> Session {
        Session::new(SessionConfig {
            engine_side: Some(engine_side),
        })
        .with_opponent(Opponent::with_engine(engine))
    }

    fn play(session: &mut Session, moves: &[&str]) {
        for m in moves {
            session.submit(MoveInput::text(*m)).unwrap();
        }
    }

    /// Index, counter and last move all agree with the oracle
    fn assert_consistent<O: PositionOracle + Clone>(session: &Session<O>) {
        let index = session.index();
        let moves = session.oracle().legal_moves();
        let origins: HashSet<Square> = moves.iter().map(|m| m.from).collect();
        assert_eq!(origins, index.origins().collect::<HashSet<_>>());
        for from in origins {
            let expected: HashSet<Square> =
                moves.iter().filter(|m| m.from == from).map(|m| m.to).collect();
            let actual: HashSet<Square> = index.destinations(from).iter().copied().collect();
            assert_eq!(expected, actual);
        }
        let state = session.state();
        assert_eq!(state.move_counter(), state.history().len());
        assert_eq!(state.move_counter(), session.oracle().ply());
        assert_eq!(
            state.last_move(),
            state.history().last().map(|h| LastMove::from(h.played))
        );
    }

    #[test]
    fn test_opening_move_accepted() {
        let mut session = human_game();
        let applied = session.submit(MoveInput::text("e2e4")).unwrap();
        assert_eq!(applied.san, "e4");
        assert_eq!(applied.by, Side::White);
        assert_eq!(session.state().notations(), vec!["e4"]);
        assert_eq!(session.turn(), Side::Black);
        assert_eq!(session.state().move_counter(), 1);
        assert_eq!(
            session.state().last_move(),
            Some(LastMove {
                from: Square::E2,
                to: Square::E4
            })
        );
        assert_eq!(session.notice(), Some("Move played: e4"));
        assert_eq!(session.state().error(), None);
        assert_consistent(&session);
    }

    #[test]
    fn test_illegal_move_rejected() {
        let mut session = human_game();
        let before = session.oracle().serialize();
        let err = session.submit(MoveInput::text("e2e5")).unwrap_err();
        assert!(matches!(err, SessionError::Illegal(_)));
        assert_eq!(session.oracle().serialize(), before);
        assert!(session.state().history().is_empty());
        assert_eq!(session.state().move_counter(), 0);
        assert_eq!(session.state().error(), Some("Illegal move: e2e5"));
        assert_eq!(session.phase(), Phase::AwaitingInput);
        assert_consistent(&session);
    }

    #[test]
    fn test_parse_error_is_distinct() {
        let mut session = human_game();
        let err = session.submit(MoveInput::text("hello")).unwrap_err();
        assert!(matches!(err, SessionError::Parse(_)));
        assert!(session.state().error().unwrap().starts_with("Invalid move format"));
        assert_eq!(session.state().move_counter(), 0);
    }

    #[test]
    fn test_error_replaced_then_cleared() {
        let mut session = human_game();
        session.submit(MoveInput::text("e2e5")).unwrap_err();
        session.submit(MoveInput::text("zz")).unwrap_err();
        let error = session.state().error().unwrap().to_string();
        assert!(error.starts_with("Invalid move format"));
        assert!(!error.contains("e2e5"));

        session.submit(MoveInput::drag("d2", "d4")).unwrap();
        assert_eq!(session.state().error(), None);
    }

    #[test]
    fn test_reset_then_undo_is_noop() {
        let mut session = human_game();
        play(&mut session, &["e2e4", "e7e5"]);
        session.reset();
        let state = session.state().clone();
        let fen = session.oracle().serialize();
        let generation = session.generation();

        assert!(!session.undo());
        assert_eq!(session.state(), &state);
        assert_eq!(session.oracle().serialize(), fen);
        assert_eq!(session.generation(), generation);
    }

    #[test]
    fn test_apply_then_undo_restores_position() {
        let mut session = human_game();
        play(&mut session, &["e2e4", "c7c5", "g1f3"]);
        let fen = session.oracle().serialize();
        let len = session.state().history().len();

        session.submit(MoveInput::text("d7d6")).unwrap();
        assert_consistent(&session);
        assert!(session.undo());
        assert_eq!(session.oracle().serialize(), fen);
        assert_eq!(session.state().history().len(), len);
        assert_eq!(
            session.state().last_move(),
            Some(LastMove {
                from: Square::G1,
                to: Square::F3
            })
        );
        assert_consistent(&session);
    }

    #[test]
    fn test_undo_to_empty_clears_last_move() {
        let mut session = human_game();
        play(&mut session, &["e2e4"]);
        assert!(session.undo());
        assert_eq!(session.state().last_move(), None);
        assert_eq!(session.state().move_counter(), 0);
        assert_eq!(session.turn(), Side::White);
        assert_consistent(&session);
    }

    #[test]
    fn test_index_consistent_through_game() {
        let mut session = human_game();
        for m in ["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6", "e1g1"] {
            session.submit(MoveInput::text(m)).unwrap();
            assert_consistent(&session);
        }
        assert_eq!(session.state().history().last().unwrap().san, "O-O");
        while session.undo() {
            assert_consistent(&session);
        }
    }

    #[test]
    fn test_auto_queen_promotion() {
        let oracle = ChessOracle::from_fen("8/P7/8/8/8/8/8/k6K w - - 0 1").unwrap();
        let mut session = Session::with_oracle(oracle, SessionConfig::default());
        let applied = session.submit(MoveInput::text("a7a8")).unwrap();
        assert_eq!(
            applied.played,
            CanonicalMove::with_promotion(Square::A7, Square::A8, PromotionPiece::Queen)
        );
        assert!(applied.san.starts_with("a8=Q"));
        assert_eq!(
            session.oracle().piece_at(Square::A8),
            Some(Piece {
                kind: PieceKind::Queen,
                side: Side::White
            })
        );
    }

    #[test]
    fn test_explicit_knight_promotion() {
        let oracle = ChessOracle::from_fen("8/P7/8/8/8/8/8/k6K w - - 0 1").unwrap();
        let mut session = Session::with_oracle(oracle, SessionConfig::default());
        session.submit(MoveInput::text("a7a8n")).unwrap();
        assert_eq!(
            session.oracle().piece_at(Square::A8).map(|p| p.kind),
            Some(PieceKind::Knight)
        );
    }

    #[test]
    fn test_reset_returns_to_initial_position() {
        let oracle = ChessOracle::from_fen("8/P7/8/8/8/8/8/k6K w - - 0 1").unwrap();
        let fen = oracle.serialize();
        let mut session = Session::with_oracle(oracle, SessionConfig::default());
        session.submit(MoveInput::text("a7a8")).unwrap();
        session.reset();
        assert_eq!(session.oracle().serialize(), fen);
        assert_eq!(session.state().move_counter(), 0);
        assert_eq!(session.notice(), None);
    }

    #[test]
    fn test_checkmate_locks_until_reset() {
        let mut session = human_game();
        play(&mut session, &["f2f3", "e7e5", "g2g4", "d8h4"]);
        assert!(session.oracle().is_game_over());
        assert_eq!(session.oracle().result(), Some(GameResult::Black));
        assert_eq!(session.phase(), Phase::GameOver);
        assert_eq!(session.state().notations().last().unwrap(), "Qh4#");

        let err = session.submit(MoveInput::text("a2a3")).unwrap_err();
        assert!(matches!(err, SessionError::GameOver(_)));
        let m = CanonicalMove::new(Square::A2, Square::A3);
        assert!(matches!(session.apply_move(m), Err(SessionError::GameOver(_))));
        assert_eq!(session.state().move_counter(), 4);

        // the mating move cannot be taken back either
        let fen = session.oracle().serialize();
        assert!(!session.undo());
        assert_eq!(session.phase(), Phase::GameOver);
        assert_eq!(session.state().move_counter(), 4);
        assert_eq!(session.oracle().serialize(), fen);
        assert!(session.state().error().unwrap().contains("checkmate"));
        assert!(session.submit(MoveInput::text("a7a6")).is_err());

        session.reset();
        assert_eq!(session.phase(), Phase::AwaitingInput);
        session.submit(MoveInput::text("a2a3")).unwrap();
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut first = human_game();
        let second = human_game();
        play(&mut first, &["e2e4"]);
        assert_eq!(first.state().move_counter(), 1);
        assert_eq!(second.state().move_counter(), 0);
        assert_eq!(second.turn(), Side::White);
    }

    /// Oracle whose rules refuse every move it is asked to play
    #[derive(Clone)]
    struct RefusingOracle(ChessOracle);

    impl PositionOracle for RefusingOracle {
        fn legal_moves(&self) -> Vec<CanonicalMove> {
            self.0.legal_moves()
        }
        fn turn(&self) -> Side {
            self.0.turn()
        }
        fn piece_at(&self, square: Square) -> Option<Piece> {
            self.0.piece_at(square)
        }
        fn status(&self) -> GameStatus {
            self.0.status()
        }
        fn apply(&mut self, m: CanonicalMove) -> Result<(), OracleError> {
            Err(OracleError::IllegalMove(m))
        }
        fn undo(&mut self) -> bool {
            self.0.undo()
        }
        fn serialize(&self) -> String {
            self.0.serialize()
        }
        fn notate(&self, m: CanonicalMove) -> Result<String, OracleError> {
            self.0.notate(m)
        }
        fn ply(&self) -> usize {
            self.0.ply()
        }
    }

    #[test]
    fn test_internal_consistency_leaves_state_untouched() {
        let mut session =
            Session::with_oracle(RefusingOracle(ChessOracle::new()), SessionConfig::default());
        let before = session.state().clone();
        let err = session.submit(MoveInput::text("e2e4")).unwrap_err();
        assert!(matches!(err, SessionError::InternalConsistency(_)));
        assert!(!err.is_recoverable());
        assert_eq!(session.state(), &before);
        assert_eq!(session.oracle().ply(), 0);
        assert_eq!(session.phase(), Phase::AwaitingInput);
        assert_consistent(&session);
    }

    #[test]
    fn test_engine_replies_to_human_move() {
        let mut session = vs_engine(ScriptedEngine::with_moves(["e7e5"]), Side::Black);
        session.submit(MoveInput::text("e2e4")).unwrap();
        assert!(session.poll_engine().is_none());
        assert!(session.is_thinking());
        assert_eq!(session.phase(), Phase::AwaitingEngine);

        let applied = session.wait_engine(WAIT).unwrap().unwrap();
        assert_eq!(applied.san, "e5");
        assert_eq!(applied.by, Side::Black);
        assert_eq!(session.state().notations(), vec!["e4", "e5"]);
        assert_eq!(session.phase(), Phase::AwaitingInput);
        assert!(!session.is_thinking());
        assert_consistent(&session);
    }

    #[test]
    fn test_engine_opens_as_white() {
        let mut session = vs_engine(ScriptedEngine::with_moves(["d2d4"]), Side::White);
        let applied = session.wait_engine(WAIT).unwrap().unwrap();
        assert_eq!(applied.san, "d4");
        assert_eq!(session.turn(), Side::Black);
    }

    #[test]
    fn test_human_blocked_while_engine_thinks() {
        let engine = ScriptedEngine::with_moves(["e7e5"]).with_delay(Duration::from_millis(100));
        let mut session = vs_engine(engine, Side::Black);
        session.submit(MoveInput::text("e2e4")).unwrap();
        session.poll_engine();

        let err = session.submit(MoveInput::text("e7e5")).unwrap_err();
        assert_eq!(err, SessionError::EngineThinking(Side::Black));
        assert_eq!(session.state().move_counter(), 1);
        assert_eq!(session.phase(), Phase::AwaitingEngine);
    }

    #[test]
    fn test_engine_illegal_move_is_fault() {
        let mut session = vs_engine(ScriptedEngine::with_moves(["e7e4"]), Side::Black);
        session.submit(MoveInput::text("e2e4")).unwrap();
        let fen = session.oracle().serialize();

        let err = session.wait_engine(WAIT).unwrap().unwrap_err();
        assert!(matches!(err, SessionError::EngineFault(_)));
        assert_eq!(session.oracle().serialize(), fen);
        assert_eq!(session.state().move_counter(), 1);
        assert!(session.state().error().unwrap().starts_with("AI move error"));
        assert_eq!(session.phase(), Phase::AwaitingInput);

        // not asked again until a human has moved
        assert!(session.poll_engine().is_none());
        assert!(!session.is_thinking());

        // manual override for the engine's side
        let applied = session.submit(MoveInput::text("c7c5")).unwrap();
        assert_eq!(applied.by, Side::Black);
        assert_eq!(session.state().error(), None);
        assert_consistent(&session);
    }

    #[test]
    fn test_engine_garbage_and_silence_are_faults() {
        let mut engine = ScriptedEngine::with_moves(["banana"]);
        engine.push_reply(Ok(None));
        engine.push_reply(Err(EngineError::Fault("crashed".to_string())));
        let mut session = vs_engine(engine, Side::White);

        for _ in 0..3 {
            let err = session.wait_engine(WAIT).unwrap().unwrap_err();
            assert!(matches!(err, SessionError::EngineFault(_)));
            assert_eq!(session.state().move_counter(), 0);
            // a human move for white re-arms the engine; take it back to retry
            session.submit(MoveInput::text("e2e4")).unwrap();
            assert!(session.undo());
        }
    }

    #[test]
    fn test_missing_engine_reported_once() {
        let mut session = Session::new(SessionConfig {
            engine_side: Some(Side::Black),
        });
        session.submit(MoveInput::text("e2e4")).unwrap();

        let err = session.poll_engine().unwrap().unwrap_err();
        assert!(matches!(err, SessionError::EngineUnavailable(_)));
        assert!(session.poll_engine().is_none());
        assert!(session.wait_engine(WAIT).is_none());
        assert!(!session.is_thinking());

        // the automated turn stays open for a human
        session.submit(MoveInput::text("e7e5")).unwrap();
        session.submit(MoveInput::text("g1f3")).unwrap();
        assert!(session.poll_engine().is_none());
        assert_eq!(session.state().move_counter(), 3);
    }

    #[test]
    fn test_unreachable_engine_reported_once() {
        let opponent = Opponent::spawn(|| -> Result<ScriptedEngine, EngineError> {
            Err(EngineError::Unavailable("stockfish not found".to_string()))
        });
        let mut session = Session::new(SessionConfig {
            engine_side: Some(Side::White),
        })
        .with_opponent(opponent);

        let err = session.wait_engine(WAIT).unwrap().unwrap_err();
        assert_eq!(
            err,
            SessionError::EngineUnavailable("stockfish not found".to_string())
        );
        assert!(session.wait_engine(WAIT).is_none());
        session.submit(MoveInput::text("e2e4")).unwrap();
    }

    #[test]
    fn test_late_reply_after_reset_discarded() {
        let engine =
            ScriptedEngine::with_moves(["e7e5", "d7d5"]).with_delay(Duration::from_millis(100));
        let mut session = vs_engine(engine, Side::Black);
        session.submit(MoveInput::text("e2e4")).unwrap();
        session.poll_engine();
        assert!(session.is_thinking());

        // escape hatch while the engine is busy
        session.reset();
        assert!(!session.is_thinking());
        assert_eq!(session.state().move_counter(), 0);

        session.submit(MoveInput::text("d2d4")).unwrap();
        let applied = session.wait_engine(WAIT).unwrap().unwrap();
        assert_eq!(applied.san, "d5");
        assert_eq!(session.state().notations(), vec!["d4", "d5"]);
        assert_consistent(&session);
    }

    #[test]
    fn test_undo_while_thinking_discards_reply() {
        let engine = ScriptedEngine::with_moves(["e7e5"]).with_delay(Duration::from_millis(100));
        let mut session = vs_engine(engine, Side::Black);
        session.submit(MoveInput::text("e2e4")).unwrap();
        session.poll_engine();

        assert!(session.undo());
        assert_eq!(session.turn(), Side::White);
        assert!(session.wait_engine(Duration::from_millis(500)).is_none());
        std::thread::sleep(Duration::from_millis(200));
        assert!(session.poll_engine().is_none());
        assert_eq!(session.state().move_counter(), 0);
    }

    #[test]
    fn test_switching_engine_off() {
        let mut session = vs_engine(ScriptedEngine::new(), Side::Black);
        session.set_engine_side(None);
        play(&mut session, &["e2e4", "e7e5"]);
        assert!(session.poll_engine().is_none());
        assert_eq!(session.state().engine_side(), None);
    }
}
