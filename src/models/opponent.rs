//! Opponent move orchestration - runs the search engine off the session's
//! thread.
//!
//! Architecture:
//! - A worker OS thread owns the engine and answers one request at a time
//! - Requests and replies travel over mpsc channels, tagged with the session
//!   generation that asked, so a reply for a position that no longer exists
//!   can be recognised and dropped
//! - The session polls (or waits on) the reply channel; nothing here touches
//!   session state

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::EngineError;

/// What an automated party needs from a search engine.
///
/// The returned text is untrusted: it may be malformed or illegal and must be
/// validated by the caller.
pub trait SearchEngine: Send {
    /// Best move for the position given as FEN, or `None` if the engine has
    /// nothing to play
    fn best_move(&mut self, fen: &str) -> Result<Option<String>, EngineError>;

    /// Called when the session starts a new game
    fn new_game(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// A search request, stamped with the generation of the session that made it
#[derive(Debug, Clone)]
enum WorkerMessage {
    Search { generation: u64, fen: String },
    NewGame,
}

/// An engine answer for a given generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReply {
    pub generation: u64,
    pub result: Result<Option<String>, EngineError>,
}

/// Handle to the engine worker thread
pub struct Opponent {
    request_tx: Sender<WorkerMessage>,
    reply_rx: Receiver<EngineReply>,
    /// Generation of the request still outstanding, if any
    in_flight: Option<u64>,
}

impl Opponent {
    /// Spawn the worker. `connect` runs on the worker thread, so a slow engine
    /// start-up never blocks the caller; if it fails, every request is
    /// answered with the connection error.
    pub fn spawn<E, F>(connect: F) -> Self
    where
        E: SearchEngine + 'static,
        F: FnOnce() -> Result<E, EngineError> + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<WorkerMessage>();
        let (reply_tx, reply_rx) = mpsc::channel::<EngineReply>();

        thread::spawn(move || {
            let mut engine = connect();
            if let Err(e) = &engine {
                warn!("engine worker could not connect: {}", e);
            }
            while let Ok(message) = request_rx.recv() {
                match message {
                    WorkerMessage::Search { generation, fen } => {
                        debug!(generation, %fen, "engine search started");
                        let result = match engine.as_mut() {
                            Ok(engine) => engine.best_move(&fen),
                            Err(e) => Err(e.clone()),
                        };
                        if reply_tx.send(EngineReply { generation, result }).is_err() {
                            break;
                        }
                    }
                    WorkerMessage::NewGame => {
                        if let Ok(engine) = engine.as_mut() {
                            if let Err(e) = engine.new_game() {
                                warn!("engine refused new game: {}", e);
                            }
                        }
                    }
                }
            }
            debug!("engine worker exiting");
        });

        Self {
            request_tx,
            reply_rx,
            in_flight: None,
        }
    }

    /// Wrap an already-constructed engine
    pub fn with_engine<E: SearchEngine + 'static>(engine: E) -> Self {
        Self::spawn(move || Ok(engine))
    }

    /// Queue a search. Non-blocking.
    pub fn request(&mut self, generation: u64, fen: String) -> Result<(), EngineError> {
        info!(generation, "requesting engine move");
        self.request_tx
            .send(WorkerMessage::Search { generation, fen })
            .map_err(|_| EngineError::Unavailable("engine worker has stopped".to_string()))?;
        self.in_flight = Some(generation);
        Ok(())
    }

    /// Tell the engine a new game started
    pub fn new_game(&mut self) {
        let _ = self.request_tx.send(WorkerMessage::NewGame);
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Take a reply if one has arrived
    pub fn poll(&mut self) -> Option<EngineReply> {
        match self.reply_rx.try_recv() {
            Ok(reply) => Some(self.received(reply)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self.worker_gone(),
        }
    }

    /// Block up to `timeout` for a reply
    pub fn wait(&mut self, timeout: Duration) -> Option<EngineReply> {
        match self.reply_rx.recv_timeout(timeout) {
            Ok(reply) => Some(self.received(reply)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => self.worker_gone(),
        }
    }

    fn received(&mut self, reply: EngineReply) -> EngineReply {
        if self.in_flight == Some(reply.generation) {
            self.in_flight = None;
        }
        reply
    }

    /// A dead worker answers the outstanding request, once
    fn worker_gone(&mut self) -> Option<EngineReply> {
        self.in_flight.take().map(|generation| EngineReply {
            generation,
            result: Err(EngineError::Unavailable(
                "engine worker has stopped".to_string(),
            )),
        })
    }
}

/// Engine that replays canned answers, for tests and offline demos.
///
/// Once the script runs out it has no move to offer.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    replies: VecDeque<Result<Option<String>, EngineError>>,
    delay: Duration,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with these moves, in order
    pub fn with_moves<I, S>(moves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut engine = Self::new();
        for m in moves {
            engine.push_move(m);
        }
        engine
    }

    pub fn push_move(&mut self, m: impl Into<String>) {
        self.replies.push_back(Ok(Some(m.into())));
    }

    pub fn push_reply(&mut self, reply: Result<Option<String>, EngineError>) {
        self.replies.push_back(reply);
    }

    /// Pretend to think for this long before every answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl SearchEngine for ScriptedEngine {
    fn best_move(&mut self, _fen: &str) -> Result<Option<String>, EngineError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.replies.pop_front().unwrap_or(Ok(None))
    }
}
