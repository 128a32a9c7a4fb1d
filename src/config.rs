//! Application configuration.
//!
//! Settings come from an optional TOML file, then command-line flags override
//! them. The engine path may also come from `CHESS_ENGINE_PATH` when neither
//! the file nor the flags name one.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::domain::chess::Side;
use crate::models::session::SessionConfig;

/// Environment variable consulted for the engine binary
pub const ENGINE_PATH_ENV: &str = "CHESS_ENGINE_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Which presentation adapter drives the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    /// Typed coordinate moves and an ASCII board
    #[default]
    Text,
    /// JSON lines for a drag-and-drop board
    Drag,
}

/// Side assigned to the engine, as written in config files and flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineSide {
    White,
    Black,
    #[default]
    None,
}

impl EngineSide {
    pub fn side(self) -> Option<Side> {
        match self {
            EngineSide::White => Some(Side::White),
            EngineSide::Black => Some(Side::Black),
            EngineSide::None => None,
        }
    }
}

/// The `[engine]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// UCI binary; no path means no engine
    pub path: Option<PathBuf>,
    /// Extra command-line arguments for the binary
    pub args: Vec<String>,
    pub depth: u32,
    /// Search for a fixed time instead of a fixed depth
    pub movetime_ms: Option<u64>,
    pub threads: u32,
    pub hash_mb: u32,
    /// How long to wait for `bestmove` before giving up on a search
    pub search_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: None,
            args: Vec::new(),
            depth: 18,
            movetime_ms: None,
            threads: 4,
            hash_mb: 2048,
            search_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub adapter: AdapterKind,
    pub engine_side: EngineSide,
    /// Starting position; the standard one when absent
    pub fen: Option<String>,
    pub engine: EngineConfig,
}

/// Command-line flags
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "chess-session",
    version,
    about = "Play chess by typed or dragged moves, optionally against a UCI engine"
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// UCI engine binary (falls back to CHESS_ENGINE_PATH)
    #[arg(long, value_name = "PATH")]
    pub engine_path: Option<PathBuf>,

    /// Side the engine plays
    #[arg(long, value_enum)]
    pub engine_side: Option<EngineSide>,

    /// Engine search depth
    #[arg(long)]
    pub depth: Option<u32>,

    /// Engine time per move in milliseconds (replaces depth)
    #[arg(long, value_name = "MS")]
    pub movetime: Option<u64>,

    /// Engine threads
    #[arg(long)]
    pub threads: Option<u32>,

    /// Engine hash table size in MB
    #[arg(long, value_name = "MB")]
    pub hash: Option<u32>,

    /// Presentation adapter
    #[arg(long, value_enum)]
    pub adapter: Option<AdapterKind>,

    /// Starting position as FEN
    #[arg(long)]
    pub fen: Option<String>,
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the effective configuration for a run
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        Self::resolve_with_env(cli, std::env::var_os(ENGINE_PATH_ENV))
    }

    fn resolve_with_env(cli: &Cli, env_path: Option<OsString>) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(cli);
        if config.engine.path.is_none() {
            config.engine.path = env_path.filter(|p| !p.is_empty()).map(PathBuf::from);
        }
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, cli: &Cli) {
        if let Some(path) = &cli.engine_path {
            self.engine.path = Some(path.clone());
        }
        if let Some(side) = cli.engine_side {
            self.engine_side = side;
        }
        if let Some(depth) = cli.depth {
            self.engine.depth = depth;
        }
        if let Some(ms) = cli.movetime {
            self.engine.movetime_ms = Some(ms);
        }
        if let Some(threads) = cli.threads {
            self.engine.threads = threads;
        }
        if let Some(hash) = cli.hash {
            self.engine.hash_mb = hash;
        }
        if let Some(adapter) = cli.adapter {
            self.adapter = adapter;
        }
        if let Some(fen) = &cli.fen {
            self.fen = Some(fen.clone());
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if engine.depth == 0 {
            return Err(ConfigError::Invalid("depth must be at least 1".to_string()));
        }
        if engine.movetime_ms == Some(0) {
            return Err(ConfigError::Invalid("movetime must be at least 1 ms".to_string()));
        }
        if engine.threads == 0 {
            return Err(ConfigError::Invalid("threads must be at least 1".to_string()));
        }
        if engine.hash_mb == 0 {
            return Err(ConfigError::Invalid("hash must be at least 1 MB".to_string()));
        }
        if engine.search_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "search_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            engine_side: self.engine_side.side(),
        }
    }
}
