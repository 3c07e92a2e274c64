//! Serialized access to one external UCI analysis engine.
//!
//! An [`EngineSession`] owns a single engine process. Callers submit
//! [`AnalysisRequest`]s and await an [`AnalysisResult`]; requests are
//! serviced one at a time in arrival order.

mod parser;
mod process;
mod session;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use parser::SearchParser;
pub use process::EngineIo;
pub use session::{EngineSession, QueuePolicy, SessionState};

/// One search to run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// Position to search, as FEN.
    pub position: String,
    /// Search depth, at least 1.
    pub depth: u32,
    /// Number of principal variations (`MultiPV`), at least 1.
    pub lines: u32,
    /// Overrides the session's default request timeout.
    pub timeout: Option<Duration>,
}

impl AnalysisRequest {
    pub fn new(position: impl Into<String>, depth: u32, lines: u32) -> Self {
        Self {
            position: position.into(),
            depth,
            lines,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A candidate move reported on one multi-PV line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// First move of the line (UCI notation)
    pub mv: String,
    /// Line score on the centipawn scale, side to move's point of view
    pub score_cp: i32,
    /// Mate distance when the line is a forced mate
    pub mate: Option<i32>,
    /// Full principal variation
    pub pv: Vec<String>,
}

/// Outcome of one search, scores from the side to move's point of view.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// Primary line score on the centipawn scale
    pub score_cp: i32,
    /// Mate distance of the primary line
    pub mate: Option<i32>,
    /// Move from the terminating `bestmove`; `None` when there is no legal move
    pub best_move: Option<String>,
    /// Every reported line, best score first, no duplicate moves
    pub alternatives: Vec<Candidate>,
    /// Deepest completed depth of the primary line
    pub depth: u32,
    /// The engine terminated without a usable score
    pub degraded: bool,
}
