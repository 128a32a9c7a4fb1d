//! Line-oriented adapter: typed coordinate moves and an ASCII board.

use std::io::{self, BufRead, Write};
use std::time::Instant;

use crate::domain::chess::Side;
use crate::resolve::MoveInput;
use crate::ui::display::{board_text, move_list_text};
use crate::ui::input::{Line, LineReader};
use crate::ui::{Frame, Polled, PresentationAdapter, UiEvent};

const HELP: &str = "\
Commands:
  e2e4, e7e8q     play a move (promotion letter optional, queen by default)
  undo            take back the last move
  reset           start a new game
  engine <side>   let the engine play white or black; `engine off` to stop
  quit            leave";

/// Read one command line. Anything that is not a command is a move attempt.
pub fn parse_command(line: &str) -> Result<UiEvent, String> {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Err(String::new());
    };
    let event = match first.to_ascii_lowercase().as_str() {
        "undo" | "u" => UiEvent::Undo,
        "reset" | "new" => UiEvent::Reset,
        "quit" | "exit" | "q" => UiEvent::Quit,
        "help" | "?" => return Err(HELP.to_string()),
        "engine" => {
            let side = match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("white") => Some(Side::White),
                Some("black") => Some(Side::Black),
                Some("off") | Some("none") => None,
                _ => return Err("usage: engine white|black|off".to_string()),
            };
            UiEvent::SetEngine(side)
        }
        _ => UiEvent::Move(MoveInput::text(line.trim())),
    };
    Ok(event)
}

pub struct TextAdapter<W> {
    input: LineReader,
    output: W,
}

impl<W: Write> TextAdapter<W> {
    pub fn new<R: BufRead + Send + 'static>(input: R, output: W) -> Self {
        Self {
            input: LineReader::spawn(input),
            output,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<W: Write> PresentationAdapter for TextAdapter<W> {
    fn render(&mut self, frame: &Frame) -> io::Result<()> {
        let out = &mut self.output;
        writeln!(out)?;
        write!(out, "{}", board_text(frame))?;
        if frame.history.is_empty() {
            writeln!(out, "No moves yet")?;
        } else {
            writeln!(out, "Moves: {}", move_list_text(&frame.history))?;
        }
        if let Some(status) = &frame.status_text {
            writeln!(out, "{}", status)?;
        }
        if let Some(error) = &frame.error {
            writeln!(out, "Error: {}", error)?;
        } else if let Some(notice) = &frame.notice {
            writeln!(out, "{}", notice)?;
        }
        if frame.thinking {
            writeln!(out, "AI is thinking...")?;
        } else if frame.status.is_terminal() {
            write!(out, "Game over. reset or quit> ")?;
        } else {
            write!(out, "{} to move> ", frame.turn)?;
        }
        out.flush()
    }

    fn poll_event(&mut self, deadline: Option<Instant>) -> io::Result<Polled> {
        loop {
            let line = match self.input.next_line(deadline)? {
                Line::Text(line) => line,
                Line::Idle => return Ok(Polled::Idle),
                Line::Closed => return Ok(Polled::Closed),
            };
            match parse_command(&line) {
                Ok(event) => return Ok(Polled::Event(event)),
                Err(message) if message.is_empty() => continue,
                Err(message) => {
                    writeln!(self.output, "{}", message)?;
                    write!(self.output, "> ")?;
                    self.output.flush()?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::{Session, SessionConfig};
    use std::io::Cursor;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("undo\n"), Ok(UiEvent::Undo));
        assert_eq!(parse_command("  RESET "), Ok(UiEvent::Reset));
        assert_eq!(parse_command("quit"), Ok(UiEvent::Quit));
        assert_eq!(
            parse_command("engine Black"),
            Ok(UiEvent::SetEngine(Some(Side::Black)))
        );
        assert_eq!(parse_command("engine off"), Ok(UiEvent::SetEngine(None)));
        assert!(parse_command("engine purple").is_err());
        assert_eq!(parse_command("   "), Err(String::new()));
    }

    #[test]
    fn test_anything_else_is_a_move() {
        assert_eq!(
            parse_command(" e2e4\n"),
            Ok(UiEvent::Move(MoveInput::text("e2e4")))
        );
        assert_eq!(
            parse_command("hello"),
            Ok(UiEvent::Move(MoveInput::text("hello")))
        );
    }

    #[test]
    fn test_next_event_skips_blank_and_help() {
        let input = Cursor::new("\n\nhelp\ne2e4\n");
        let mut adapter = TextAdapter::new(input, Vec::new());
        assert_eq!(
            adapter.next_event().unwrap(),
            Some(UiEvent::Move(MoveInput::text("e2e4")))
        );
        assert_eq!(adapter.next_event().unwrap(), None);
        let output = String::from_utf8(adapter.into_output()).unwrap();
        assert!(output.contains("Commands:"));
    }

    #[test]
    fn test_render_frame() {
        let mut session = Session::new(SessionConfig::default());
        session.submit(MoveInput::text("e2e4")).unwrap();
        session.submit(MoveInput::text("e7e4")).unwrap_err();

        let mut adapter = TextAdapter::new(Cursor::new(""), Vec::new());
        adapter.render(&session.frame()).unwrap();
        let output = String::from_utf8(adapter.into_output()).unwrap();
        assert!(output.contains("Moves: 1. e4"));
        assert!(output.contains("Error: Illegal move: e7e4"));
        assert!(output.ends_with("Black to move> "));
    }
}
