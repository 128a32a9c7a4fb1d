//! Presentation layer.
//!
//! Adapters draw [`Frame`]s and turn user actions into [`UiEvent`]s. They
//! never touch a session directly; the run loop in `app` sits in between.

use std::io;
use std::time::Instant;

use crate::domain::chess::Side;
use crate::resolve::MoveInput;

pub mod display;
pub mod drag;
pub mod input;
pub mod text;
pub mod view_models;

pub use drag::DragAdapter;
pub use text::TextAdapter;
pub use view_models::Frame;

/// A user action
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiEvent {
    Move(MoveInput),
    Undo,
    Reset,
    /// Hand a side to the engine, or take it back with `None`
    SetEngine(Option<Side>),
    Quit,
}

/// Outcome of waiting for user input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Polled {
    Event(UiEvent),
    /// The deadline passed first
    Idle,
    /// Input is closed; no further events will come
    Closed,
}

/// One way of showing a session to a user
pub trait PresentationAdapter {
    fn render(&mut self, frame: &Frame) -> io::Result<()>;

    /// Wait for the next action, until `deadline` if one is given
    fn poll_event(&mut self, deadline: Option<Instant>) -> io::Result<Polled>;

    /// Block for the next action. `None` when the input is closed.
    fn next_event(&mut self) -> io::Result<Option<UiEvent>> {
        loop {
            match self.poll_event(None)? {
                Polled::Event(event) => return Ok(Some(event)),
                Polled::Closed => return Ok(None),
                Polled::Idle => continue,
            }
        }
    }
}
