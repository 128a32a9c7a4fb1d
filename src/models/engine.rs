//! UCI engine process - the production [`SearchEngine`].
//!
//! Architecture:
//! - Engine I/O runs on OS threads (reader/writer), exactly one process per
//!   engine value
//! - The reader forwards stdout lines over a channel; the search waits on it
//!   with a deadline so a hung engine cannot block the opponent worker forever
//! - Every search is preceded by an `isready` round trip, which also flushes
//!   a `bestmove` left over from a search that timed out

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::domain::uci::{UciCommand, UciInfo, UciOutputKind};
use crate::error::EngineError;
use crate::models::opponent::SearchEngine;

/// Time allowed for `uciok` and `readyok`
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Messages sent from the engine reader thread
#[derive(Debug)]
enum EngineEvent {
    /// A line of output from the engine
    Output(String),
    /// Engine process exited
    Exited,
    /// Error occurred
    Error(String),
}

/// How long each search may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    Depth(u32),
    Movetime(u64),
}

impl SearchLimit {
    fn command(self) -> UciCommand {
        match self {
            SearchLimit::Depth(depth) => UciCommand::GoDepth(depth),
            SearchLimit::Movetime(ms) => UciCommand::GoMovetime(ms),
        }
    }
}

/// A running UCI engine
pub struct UciEngine {
    process: Child,
    command_sender: Sender<String>,
    event_receiver: Receiver<EngineEvent>,
    limit: SearchLimit,
    search_timeout: Duration,
    /// From `id name`, if the engine sent one
    name: Option<String>,
    exited: bool,
}

impl UciEngine {
    /// Start the engine named in `config` and complete the UCI handshake.
    ///
    /// Anything that stops the engine from becoming usable (no path, spawn
    /// failure, no `uciok`) is `Unavailable`.
    pub fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        let path = config
            .path
            .as_deref()
            .ok_or_else(|| EngineError::Unavailable("no engine path configured".to_string()))?;
        let limit = match config.movetime_ms {
            Some(ms) => SearchLimit::Movetime(ms),
            None => SearchLimit::Depth(config.depth),
        };

        let mut engine = Self::spawn(path, &config.args, limit)?;
        engine.search_timeout = Duration::from_secs(config.search_timeout_secs);
        engine
            .handshake(config.threads, config.hash_mb)
            .map_err(|e| match e {
                EngineError::Fault(msg) => EngineError::Unavailable(msg),
                other => other,
            })?;
        info!(
            engine = engine.name().unwrap_or("unnamed"),
            path = %path.display(),
            ?limit,
            "engine ready"
        );
        Ok(engine)
    }

    fn spawn(path: &Path, args: &[String], limit: SearchLimit) -> Result<Self, EngineError> {
        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                EngineError::Unavailable(format!("failed to start {}: {}", path.display(), e))
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Unavailable(
                "failed to open engine stdin/stdout".to_string(),
            ));
        };

        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>();
        let (cmd_tx, cmd_rx) = mpsc::channel::<String>();

        // Reader thread (blocking I/O)
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(text) => {
                        if event_tx.send(EngineEvent::Output(text)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = event_tx.send(EngineEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
            let _ = event_tx.send(EngineEvent::Exited);
        });

        // Writer thread (blocking I/O)
        thread::spawn(move || {
            let mut writer = stdin;
            while let Ok(cmd) = cmd_rx.recv() {
                if writeln!(writer, "{}", cmd).is_err() || writer.flush().is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            process: child,
            command_sender: cmd_tx,
            event_receiver: event_rx,
            limit,
            search_timeout: Duration::from_secs(120),
            name: None,
            exited: false,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn limit(&self) -> SearchLimit {
        self.limit
    }

    fn handshake(&mut self, threads: u32, hash_mb: u32) -> Result<(), EngineError> {
        self.send(UciCommand::Uci)?;
        let mut name = None;
        self.wait_for("uciok", HANDSHAKE_TIMEOUT, |kind| match kind {
            UciOutputKind::UciOk => Some(()),
            UciOutputKind::Id(id) => {
                if let Some(n) = id.strip_prefix("name ") {
                    name = Some(n.to_string());
                }
                None
            }
            _ => None,
        })?;
        self.name = name;

        self.send(UciCommand::SetOption {
            name: "Threads".to_string(),
            value: threads.to_string(),
        })?;
        self.send(UciCommand::SetOption {
            name: "Hash".to_string(),
            value: hash_mb.to_string(),
        })?;
        self.sync()
    }

    /// `isready` round trip; anything printed before `readyok` is stale
    fn sync(&mut self) -> Result<(), EngineError> {
        self.send(UciCommand::IsReady)?;
        self.wait_for("readyok", HANDSHAKE_TIMEOUT, |kind| match kind {
            UciOutputKind::ReadyOk => Some(()),
            UciOutputKind::BestMove(stale) => {
                debug!(?stale, "discarding bestmove from an abandoned search");
                None
            }
            _ => None,
        })
    }

    fn send(&self, cmd: UciCommand) -> Result<(), EngineError> {
        if self.exited {
            return Err(EngineError::Fault("engine process has exited".to_string()));
        }
        let line = cmd.to_uci_string();
        debug!(command = %line, "to engine");
        self.command_sender
            .send(line)
            .map_err(|_| EngineError::Fault("engine stdin closed".to_string()))
    }

    /// Feed engine output to `accept` until it yields a value or the
    /// deadline passes
    fn wait_for<T>(
        &mut self,
        what: &str,
        timeout: Duration,
        mut accept: impl FnMut(UciOutputKind) -> Option<T>,
    ) -> Result<T, EngineError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.event_receiver.recv_timeout(remaining) {
                Ok(EngineEvent::Output(line)) => {
                    if let Some(value) = accept(UciOutputKind::parse(&line)) {
                        return Ok(value);
                    }
                }
                Ok(EngineEvent::Error(e)) => {
                    warn!(error = %e, "engine output unreadable");
                    return Err(EngineError::Fault(format!("reading engine output: {}", e)));
                }
                Ok(EngineEvent::Exited) | Err(RecvTimeoutError::Disconnected) => {
                    self.exited = true;
                    return Err(EngineError::Fault(format!(
                        "engine exited while waiting for {}",
                        what
                    )));
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(EngineError::Fault(format!(
                        "no {} within {:?}",
                        what, timeout
                    )));
                }
            }
        }
    }
}

impl SearchEngine for UciEngine {
    fn best_move(&mut self, fen: &str) -> Result<Option<String>, EngineError> {
        self.sync()?;
        self.send(UciCommand::PositionFen(fen.to_string()))?;
        self.send(self.limit.command())?;

        let started = Instant::now();
        let mut last_info = UciInfo::default();
        let result = self.wait_for("bestmove", self.search_timeout, |kind| match kind {
            UciOutputKind::BestMove(best) => Some(best),
            UciOutputKind::Info(text) => {
                let info = UciInfo::parse(&text);
                if info.has_analysis() {
                    last_info = info;
                }
                None
            }
            _ => None,
        });

        let best = match result {
            Ok(best) => best,
            Err(e) => {
                // the late bestmove is swallowed by the next sync
                let _ = self.send(UciCommand::Stop);
                return Err(e);
            }
        };
        info!(
            bestmove = best.mv.as_deref().unwrap_or("(none)"),
            depth = ?last_info.depth,
            score = %last_info.score.map(|s| s.display()).unwrap_or_default(),
            nodes = ?last_info.nodes,
            engine_ms = ?last_info.time,
            pv = %last_info.pv.join(" "),
            ponder = best.ponder.as_deref().unwrap_or("-"),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "engine search finished"
        );
        Ok(best.mv)
    }

    fn new_game(&mut self) -> Result<(), EngineError> {
        self.send(UciCommand::UciNewGame)?;
        self.sync()
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        let _ = self.send(UciCommand::Quit);
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}
