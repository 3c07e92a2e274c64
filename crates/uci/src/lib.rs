//! UCI (Universal Chess Interface) protocol vocabulary for engine clients.
//!
//! This crate models the conversation from the GUI side: commands are
//! formatted for the engine's stdin and the engine's stdout lines are parsed
//! back into typed messages.
//!
//! # Commands sent to the engine
//!
//! - `uci` / `uciok` - Handshake, engine identification
//! - `setoption name <id> value <x>` - Configure Hash, Threads, MultiPV, ...
//! - `isready` / `readyok` - Synchronization
//! - `ucinewgame` - Reset engine state between unrelated searches
//! - `position fen <fen> [moves <move>...]` - Set position
//! - `go [depth <d>] [movetime <ms>] [nodes <n>]` - Start search
//! - `stop` - Stop search
//!
//! # Messages read from the engine
//!
//! - `id name <name>` / `id author <author>`
//! - `info ... multipv <k> score cp|mate <x> [lowerbound|upperbound] ... pv ...`
//! - `bestmove <move> [ponder <move>]`

mod command;
mod info;

pub use command::{GoOptions, GuiCommand};
pub use info::{Bound, EngineInfo, InfoBuilder, Score};

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum UciError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id {
        name: Option<String>,
        author: Option<String>,
    },
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Search information.
    Info(EngineInfo),
    /// Search finished. `mv` is `None` for `bestmove (none)`, which engines
    /// emit when the side to move has no legal move.
    BestMove {
        mv: Option<String>,
        ponder: Option<String>,
    },
    /// Anything else (`option ...`, `copyprotection ...`, banners).
    Other(String),
}

impl EngineMessage {
    /// Parse one line of engine output.
    ///
    /// Unrecognized lines become [`EngineMessage::Other`]; only a `bestmove`
    /// line without a move token is an error, since it terminates a search
    /// without telling us anything.
    pub fn parse(line: &str) -> Result<Self, UciError> {
        let line = line.trim();
        let mut parts = line.split_whitespace();

        match parts.next().unwrap_or("") {
            "uciok" => Ok(EngineMessage::UciOk),
            "readyok" => Ok(EngineMessage::ReadyOk),
            "info" => EngineInfo::parse(line)
                .map(EngineMessage::Info)
                .ok_or_else(|| UciError::ParseError(line.to_string())),
            "bestmove" => {
                let mv = parts
                    .next()
                    .ok_or_else(|| UciError::ParseError(format!("bestmove without move: '{}'", line)))?;
                let mv = if mv == "(none)" || mv == "0000" {
                    None
                } else {
                    Some(mv.to_string())
                };
                let ponder = match (parts.next(), parts.next()) {
                    (Some("ponder"), Some(p)) => Some(p.to_string()),
                    _ => None,
                };
                Ok(EngineMessage::BestMove { mv, ponder })
            }
            "id" => {
                let rest: Vec<&str> = parts.collect();
                match rest.split_first() {
                    Some((&"name", value)) => Ok(EngineMessage::Id {
                        name: Some(value.join(" ")),
                        author: None,
                    }),
                    Some((&"author", value)) => Ok(EngineMessage::Id {
                        name: None,
                        author: Some(value.join(" ")),
                    }),
                    _ => Ok(EngineMessage::Other(line.to_string())),
                }
            }
            _ => Ok(EngineMessage::Other(line.to_string())),
        }
    }

    /// Format message the way an engine writes it.
    pub fn to_uci(&self) -> String {
        match self {
            EngineMessage::Id { name, author } => {
                let mut parts = Vec::new();
                if let Some(n) = name {
                    parts.push(format!("id name {}", n));
                }
                if let Some(a) = author {
                    parts.push(format!("id author {}", a));
                }
                parts.join("\n")
            }
            EngineMessage::UciOk => "uciok".to_string(),
            EngineMessage::ReadyOk => "readyok".to_string(),
            EngineMessage::Info(info) => info.to_uci(),
            EngineMessage::BestMove { mv, ponder } => {
                let mv = mv.as_deref().unwrap_or("(none)");
                match ponder {
                    Some(p) => format!("bestmove {} ponder {}", mv, p),
                    None => format!("bestmove {}", mv),
                }
            }
            EngineMessage::Other(line) => line.clone(),
        }
    }
}
