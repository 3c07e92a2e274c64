//! Chess position evaluation types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uci::Score;

/// Centipawn value assigned to "mate now". Mate in N converts to
/// `MATE_SCORE - N * MATE_STEP` so that shorter mates rank higher.
pub const MATE_SCORE: i32 = 10_000;

/// Centipawns shaved off [`MATE_SCORE`] per move until mate.
pub const MATE_STEP: i32 = 10;

/// Represents a chess position evaluation.
///
/// Evaluations can be either centipawn scores (for normal positions)
/// or mate scores (when a forced mate is found). The perspective depends
/// on where the value came from; engine output is always relative to the
/// side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Evaluation {
    /// Centipawn evaluation
    Centipawns(i32),
    /// Mate in N moves (positive = the perspective side mates, negative = gets mated).
    /// `Mate(0)` means the perspective side is already checkmated.
    Mate(i32),
}

impl Evaluation {
    /// Collapses the evaluation onto the centipawn scale.
    pub fn to_centipawns(self) -> i32 {
        match self {
            Evaluation::Centipawns(cp) => cp,
            Evaluation::Mate(0) => -MATE_SCORE,
            Evaluation::Mate(n) if n > 0 => MATE_SCORE - n * MATE_STEP,
            Evaluation::Mate(n) => -MATE_SCORE - n * MATE_STEP,
        }
    }

    /// Same evaluation seen from the other side of the board.
    pub fn flip(self) -> Self {
        match self {
            Evaluation::Centipawns(cp) => Evaluation::Centipawns(-cp),
            // being mated now flips to "delivered mate", which has no
            // positive-N spelling in UCI; keep it on the centipawn scale
            Evaluation::Mate(0) => Evaluation::Centipawns(MATE_SCORE),
            Evaluation::Mate(n) => Evaluation::Mate(-n),
        }
    }

    pub fn mate_distance(self) -> Option<i32> {
        match self {
            Evaluation::Mate(n) => Some(n),
            Evaluation::Centipawns(_) => None,
        }
    }
}

impl From<Score> for Evaluation {
    fn from(score: Score) -> Self {
        match score {
            Score::Cp(cp) => Evaluation::Centipawns(cp),
            Score::Mate(m) => Evaluation::Mate(m),
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Centipawns(cp) => write!(f, "{:+.2}", *cp as f64 / 100.0),
            Evaluation::Mate(n) => write!(f, "M{}", n),
        }
    }
}
