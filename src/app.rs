//! Application setup and the session run loop.

use std::io::{self, BufRead, BufReader, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::config::{AdapterKind, AppConfig, EngineConfig};
use crate::domain::oracle::{ChessOracle, PositionOracle};
use crate::error::SessionResult;
use crate::models::engine::UciEngine;
use crate::models::opponent::Opponent;
use crate::models::session::{AppliedMove, Session};
use crate::ui::{DragAdapter, Polled, PresentationAdapter, TextAdapter, UiEvent};

/// How long one blocking wait for the engine lasts before re-checking
const ENGINE_WAIT: Duration = Duration::from_secs(1);

/// While the engine searches, how often pending user input is looked at
const INPUT_TICK: Duration = Duration::from_millis(20);

/// Build the session described by `config` and run it on stdin/stdout
pub fn run(config: AppConfig) -> Result<()> {
    let oracle = match &config.fen {
        Some(fen) => ChessOracle::from_fen(fen).context("cannot start from the given position")?,
        None => ChessOracle::new(),
    };
    let session = Session::with_oracle(oracle, config.session_config());
    let mut app = App::new(session, config.engine.clone());

    let stdin = BufReader::new(io::stdin());
    let stdout = io::stdout();
    match config.adapter {
        AdapterKind::Text => app.drive(&mut TextAdapter::new(stdin, stdout.lock())),
        AdapterKind::Drag => app.drive(&mut DragAdapter::new(stdin, stdout.lock())),
    }
}

/// A session plus what is needed to start its engine on demand
pub struct App<O: PositionOracle + Clone = ChessOracle> {
    session: Session<O>,
    engine: EngineConfig,
}

impl<O: PositionOracle + Clone> App<O> {
    pub fn new(session: Session<O>, engine: EngineConfig) -> Self {
        let mut app = Self { session, engine };
        if app.session.state().engine_side().is_some() {
            app.ensure_opponent();
        }
        app
    }

    pub fn session(&self) -> &Session<O> {
        &self.session
    }

    /// Start the engine worker unless one is attached already. The process
    /// itself is launched on the worker thread.
    fn ensure_opponent(&mut self) {
        if self.session.has_opponent() {
            return;
        }
        let config = self.engine.clone();
        info!(path = ?config.path, "starting engine worker");
        self.session
            .attach_opponent(Opponent::spawn(move || UciEngine::start(&config)));
    }

    /// Render, read, dispatch until the user quits or input closes.
    ///
    /// While the engine searches, user input is still read, so undo and
    /// reset take effect at once and the late engine answer is dropped.
    pub fn drive<A: PresentationAdapter + ?Sized>(&mut self, adapter: &mut A) -> Result<()> {
        let mut input_open = true;
        loop {
            if let Some(outcome) = self.session.poll_engine() {
                self.report(outcome)?;
            }
            adapter
                .render(&self.session.frame())
                .context("failed to draw the session")?;

            let event = if self.session.is_thinking() {
                match self.next_event_while_thinking(adapter, &mut input_open)? {
                    Some(event) => event,
                    // the engine answered; draw the new position
                    None => continue,
                }
            } else if input_open {
                match adapter.poll_event(None).context("failed to read input")? {
                    Polled::Event(event) => event,
                    Polled::Idle => continue,
                    Polled::Closed => {
                        info!("input closed");
                        return Ok(());
                    }
                }
            } else {
                info!("input closed");
                return Ok(());
            };
            if !self.dispatch(event)? {
                return Ok(());
            }
        }
    }

    /// Wait for whichever comes first: a user action or the engine's answer.
    /// `None` once the search is over. Closed input only stops the reading;
    /// the search still runs to its end.
    fn next_event_while_thinking<A: PresentationAdapter + ?Sized>(
        &mut self,
        adapter: &mut A,
        input_open: &mut bool,
    ) -> Result<Option<UiEvent>> {
        while self.session.is_thinking() {
            if *input_open {
                match adapter
                    .poll_event(Some(Instant::now()))
                    .context("failed to read input")?
                {
                    Polled::Event(event) => return Ok(Some(event)),
                    Polled::Idle => {}
                    Polled::Closed => {
                        debug!("input closed during engine search");
                        *input_open = false;
                    }
                }
            }
            let wait = if *input_open { INPUT_TICK } else { ENGINE_WAIT };
            if let Some(outcome) = self.session.wait_engine(wait) {
                self.report(outcome)?;
                return Ok(None);
            }
        }
        Ok(None)
    }

    /// Apply one user action. `false` means quit.
    pub fn dispatch(&mut self, event: UiEvent) -> Result<bool> {
        debug!(?event, "ui event");
        match event {
            UiEvent::Move(input) => {
                let outcome = self.session.submit(input);
                self.report(outcome)?;
            }
            UiEvent::Undo => {
                if !self.session.undo() {
                    debug!("nothing to undo");
                }
            }
            UiEvent::Reset => self.session.reset(),
            UiEvent::SetEngine(side) => {
                self.session.set_engine_side(side);
                if side.is_some() {
                    self.ensure_opponent();
                }
            }
            UiEvent::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Recoverable errors are already in the next frame; anything else ends
    /// the run
    fn report(&self, outcome: SessionResult<AppliedMove>) -> Result<()> {
        match outcome {
            Ok(applied) => debug!(san = %applied.san, by = %applied.by, "move played"),
            Err(e) if e.is_recoverable() => debug!(error = %e, "move refused"),
            Err(e) => {
                error!(error = %e, fen = %self.session.oracle().serialize(), "session corrupted");
                return Err(e.into());
            }
        }
        Ok(())
    }
}

/// Run a session over arbitrary streams with the text adapter
pub fn run_text<R: BufRead + Send + 'static, W: Write, O: PositionOracle + Clone>(
    app: &mut App<O>,
    input: R,
    output: W,
) -> Result<W> {
    let mut adapter = TextAdapter::new(input, output);
    if let Err(e) = app.drive(&mut adapter) {
        warn!(error = %e, "session ended with an error");
        return Err(e);
    }
    Ok(adapter.into_output())
}
