//! UCI (Universal Chess Interface) protocol types and utilities.
//!
//! This module only builds command strings and classifies engine output.
//! Spawning and talking to the engine process lives in the models layer.

/// UCI commands that can be sent to an engine
#[derive(Debug, Clone, PartialEq)]
pub enum UciCommand {
    /// Initialize UCI mode
    Uci,
    /// Check if engine is ready
    IsReady,
    /// Forget everything about the previous game
    UciNewGame,
    /// Set an engine option
    SetOption { name: String, value: String },
    /// Set the position to search from
    PositionFen(String),
    /// Search to a fixed depth
    GoDepth(u32),
    /// Search for a fixed time in milliseconds
    GoMovetime(u64),
    /// Stop searching and report the best move so far
    Stop,
    /// Quit the engine
    Quit,
}

impl UciCommand {
    /// Convert command to UCI protocol string
    pub fn to_uci_string(&self) -> String {
        match self {
            UciCommand::Uci => "uci".to_string(),
            UciCommand::IsReady => "isready".to_string(),
            UciCommand::UciNewGame => "ucinewgame".to_string(),
            UciCommand::SetOption { name, value } => {
                format!("setoption name {} value {}", name, value)
            }
            UciCommand::PositionFen(fen) => format!("position fen {}", fen),
            UciCommand::GoDepth(d) => format!("go depth {}", d),
            UciCommand::GoMovetime(ms) => format!("go movetime {}", ms),
            UciCommand::Stop => "stop".to_string(),
            UciCommand::Quit => "quit".to_string(),
        }
    }
}

/// Categorized engine output line
#[derive(Debug, Clone, PartialEq)]
pub enum UciOutputKind {
    /// "uciok" - engine is ready for UCI
    UciOk,
    /// "readyok" - engine is ready
    ReadyOk,
    /// "info ..." - analysis information
    Info(String),
    /// "bestmove ..." - end of a search
    BestMove(BestMove),
    /// Engine identification
    Id(String),
    /// Option definition
    Option(String),
    /// Unknown/other output
    Other(String),
}

impl UciOutputKind {
    /// Parse a raw UCI output line into a categorized type
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        if line == "uciok" {
            UciOutputKind::UciOk
        } else if line == "readyok" {
            UciOutputKind::ReadyOk
        } else if let Some(rest) = line.strip_prefix("info ") {
            UciOutputKind::Info(rest.to_string())
        } else if line == "bestmove" || line.starts_with("bestmove ") {
            UciOutputKind::BestMove(BestMove::parse(&line["bestmove".len()..]))
        } else if let Some(rest) = line.strip_prefix("id ") {
            UciOutputKind::Id(rest.to_string())
        } else if let Some(rest) = line.strip_prefix("option ") {
            UciOutputKind::Option(rest.to_string())
        } else {
            UciOutputKind::Other(line.to_string())
        }
    }
}

/// The move text of a "bestmove" line.
///
/// `None` when the engine had nothing to play (`(none)` or the null move).
/// The text itself is unchecked engine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestMove {
    pub mv: Option<String>,
    pub ponder: Option<String>,
}

impl BestMove {
    /// Parse everything after the "bestmove" keyword
    pub fn parse(rest: &str) -> Self {
        let mut tokens = rest.split_whitespace();
        let mv = tokens
            .next()
            .filter(|t| *t != "(none)" && *t != "0000")
            .map(str::to_string);
        let ponder = match (tokens.next(), tokens.next()) {
            (Some("ponder"), Some(p)) => Some(p.to_string()),
            _ => None,
        };
        Self { mv, ponder }
    }
}

/// Engine evaluation score
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    /// Centipawn score from the side to move
    Centipawns(i32),
    /// Mate in N moves (negative when the side to move is mated)
    Mate(i32),
}

impl Score {
    /// Format score for display (e.g., "+0.35" or "M3" or "-M2")
    pub fn display(&self) -> String {
        match self {
            Score::Centipawns(cp) => format!("{:+.2}", *cp as f64 / 100.0),
            Score::Mate(moves) if *moves > 0 => format!("M{}", moves),
            Score::Mate(moves) => format!("-M{}", moves.abs()),
        }
    }
}

/// The parts of an info line worth logging after a search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UciInfo {
    pub depth: Option<u32>,
    pub score: Option<Score>,
    pub nodes: Option<u64>,
    pub time: Option<u64>,
    /// Principal variation as UCI moves
    pub pv: Vec<String>,
}

impl UciInfo {
    /// Parse a UCI info string (the part after "info ")
    pub fn parse(info_str: &str) -> Self {
        let mut info = UciInfo::default();
        let tokens: Vec<&str> = info_str.split_whitespace().collect();
        let next = |i: usize| tokens.get(i + 1).copied();

        let mut i = 0;
        while i < tokens.len() {
            match tokens[i] {
                "depth" => {
                    info.depth = next(i).and_then(|t| t.parse().ok());
                    i += 2;
                }
                "nodes" => {
                    info.nodes = next(i).and_then(|t| t.parse().ok());
                    i += 2;
                }
                "time" => {
                    info.time = next(i).and_then(|t| t.parse().ok());
                    i += 2;
                }
                "score" => {
                    let value = tokens.get(i + 2).and_then(|t| t.parse::<i32>().ok());
                    info.score = match (next(i), value) {
                        (Some("cp"), Some(cp)) => Some(Score::Centipawns(cp)),
                        (Some("mate"), Some(m)) => Some(Score::Mate(m)),
                        _ => info.score,
                    };
                    i += 3;
                }
                "pv" => {
                    // pv runs to the end of the line
                    info.pv = tokens[i + 1..].iter().map(|t| t.to_string()).collect();
                    break;
                }
                "string" => break,
                _ => i += 1,
            }
        }

        info
    }

    /// Check if this info line has meaningful analysis data (depth + score + pv)
    pub fn has_analysis(&self) -> bool {
        self.depth.is_some() && self.score.is_some() && !self.pv.is_empty()
    }
}
