//! Interactive chess sessions: move resolution against a rules oracle, an
//! optional engine opponent, and adapters that draw the result.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod models;
pub mod resolve;
pub mod ui;

pub use error::{EngineError, SessionError, SessionResult};
pub use models::session::{Session, SessionConfig};
pub use resolve::{MoveInput, Resolution, resolve};
