//! Background line reader for adapters.
//!
//! Input is read on its own OS thread and handed over an mpsc channel, so the
//! run loop can wait for the user and the engine at the same time.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use tracing::debug;

/// Result of waiting for a line
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// Nothing arrived before the deadline
    Idle,
    /// Input is exhausted
    Closed,
}

pub struct LineReader {
    lines: Receiver<io::Result<String>>,
}

impl LineReader {
    pub fn spawn<R: BufRead + Send + 'static>(input: R) -> Self {
        let (line_tx, line_rx) = mpsc::channel::<io::Result<String>>();

        // Reader thread (blocking I/O)
        thread::spawn(move || {
            for line in input.lines() {
                let failed = line.is_err();
                if line_tx.send(line).is_err() || failed {
                    return;
                }
            }
            debug!("input reader reached end of input");
        });

        Self { lines: line_rx }
    }

    /// Next line, waiting until `deadline` when one is given and for as long
    /// as it takes otherwise
    pub fn next_line(&mut self, deadline: Option<Instant>) -> io::Result<Line> {
        let received = match deadline {
            Some(deadline) => self
                .lines
                .recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => self
                .lines
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(line) => line.map(Line::Text),
            Err(RecvTimeoutError::Timeout) => Ok(Line::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(Line::Closed),
        }
    }
}
