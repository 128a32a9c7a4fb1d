//! JSON-lines bridge for a drag-and-drop board.
//!
//! Each input line is one request, e.g.
//! `{"type":"drag","from":"e2","to":"e4"}` or `{"type":"undo"}`.
//! Each rendered frame goes out as one line: `{"type":"frame", ...}`.
//! Lines that are not valid requests are answered with
//! `{"type":"error","message":...}` and skipped.

use std::io::{self, BufRead, Write};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::chess::Side;
use crate::resolve::MoveInput;
use crate::ui::input::{Line, LineReader};
use crate::ui::{Frame, Polled, PresentationAdapter, UiEvent};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Request {
    Drag { from: String, to: String },
    /// Typed move text, for boards that also offer a text box
    Move { text: String },
    Undo,
    Reset,
    Engine { side: Option<Side> },
    Quit,
}

impl From<Request> for UiEvent {
    fn from(request: Request) -> Self {
        match request {
            Request::Drag { from, to } => UiEvent::Move(MoveInput::Drag { from, to }),
            Request::Move { text } => UiEvent::Move(MoveInput::Text(text)),
            Request::Undo => UiEvent::Undo,
            Request::Reset => UiEvent::Reset,
            Request::Engine { side } => UiEvent::SetEngine(side),
            Request::Quit => UiEvent::Quit,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Outbound<'a> {
    Frame(&'a Frame),
    Error { message: String },
}

pub fn parse_request(line: &str) -> Result<UiEvent, serde_json::Error> {
    serde_json::from_str::<Request>(line).map(UiEvent::from)
}

pub struct DragAdapter<W> {
    input: LineReader,
    output: W,
}

impl<W: Write> DragAdapter<W> {
    pub fn new<R: BufRead + Send + 'static>(input: R, output: W) -> Self {
        Self {
            input: LineReader::spawn(input),
            output,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn send(&mut self, message: &Outbound<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut self.output, message)?;
        self.output.write_all(b"\n")?;
        self.output.flush()
    }
}

impl<W: Write> PresentationAdapter for DragAdapter<W> {
    fn render(&mut self, frame: &Frame) -> io::Result<()> {
        self.send(&Outbound::Frame(frame))
    }

    fn poll_event(&mut self, deadline: Option<Instant>) -> io::Result<Polled> {
        loop {
            let line = match self.input.next_line(deadline)? {
                Line::Text(line) => line,
                Line::Idle => return Ok(Polled::Idle),
                Line::Closed => return Ok(Polled::Closed),
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_request(&line) {
                Ok(event) => return Ok(Polled::Event(event)),
                Err(e) => {
                    debug!(error = %e, "unreadable request");
                    self.send(&Outbound::Error {
                        message: format!("bad request: {}", e),
                    })?;
                }
            }
        }
    }
}
