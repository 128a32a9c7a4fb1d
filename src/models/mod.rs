pub mod engine;
pub mod opponent;
pub mod session;

pub use engine::UciEngine;
pub use opponent::{Opponent, ScriptedEngine, SearchEngine};
pub use session::{AppliedMove, Phase, Session, SessionConfig, SessionState};
