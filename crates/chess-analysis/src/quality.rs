//! Move quality tiers and the per-move analysis record.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::Candidate;
use crate::game::Side;
use crate::material::{BoardDescriptor, TacticalPatterns};

/// Classification of move quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveQuality {
    /// Known opening theory
    Book,
    /// Sound sacrifice that is the only good move
    Brilliant,
    /// The best move in the position, or as good as it
    Best,
    /// Strong move with a concrete gain
    Great,
    /// Good move (small centipawn loss)
    Good,
    /// Inaccuracy (noticeable centipawn loss)
    Inaccuracy,
    /// Mistake (significant centipawn loss)
    Mistake,
    /// Blunder (major centipawn loss)
    Blunder,
}

impl MoveQuality {
    pub const ALL: [MoveQuality; 8] = [
        MoveQuality::Book,
        MoveQuality::Brilliant,
        MoveQuality::Best,
        MoveQuality::Great,
        MoveQuality::Good,
        MoveQuality::Inaccuracy,
        MoveQuality::Mistake,
        MoveQuality::Blunder,
    ];

    /// Position on the quality scale, 0 being the strongest. Book moves are
    /// theory rather than a judgement and have no rank.
    pub fn rank(self) -> Option<u8> {
        match self {
            MoveQuality::Book => None,
            MoveQuality::Brilliant => Some(0),
            MoveQuality::Best => Some(1),
            MoveQuality::Great => Some(2),
            MoveQuality::Good => Some(3),
            MoveQuality::Inaccuracy => Some(4),
            MoveQuality::Mistake => Some(5),
            MoveQuality::Blunder => Some(6),
        }
    }

    /// Conventional annotation glyph.
    pub fn symbol(self) -> &'static str {
        match self {
            MoveQuality::Book => "=",
            MoveQuality::Brilliant => "!!",
            MoveQuality::Best => "!",
            MoveQuality::Great => "!",
            MoveQuality::Good => "",
            MoveQuality::Inaccuracy => "?!",
            MoveQuality::Mistake => "?",
            MoveQuality::Blunder => "??",
        }
    }
}

impl fmt::Display for MoveQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MoveQuality::Book => "book",
            MoveQuality::Brilliant => "brilliant",
            MoveQuality::Best => "best",
            MoveQuality::Great => "great",
            MoveQuality::Good => "good",
            MoveQuality::Inaccuracy => "inaccuracy",
            MoveQuality::Mistake => "mistake",
            MoveQuality::Blunder => "blunder",
        };
        f.pad(name)
    }
}

/// How trustworthy a [`MoveAnalysis`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    /// Every depth level answered
    #[default]
    Complete,
    /// The deep pass was unavailable or the engine reported no score;
    /// standard-depth values were used
    Degraded,
    /// Not even the standard depth answered; the tier is the neutral one
    Failed,
}

/// Analysis result for a single move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveAnalysis {
    /// Index of the move in the game
    pub index: usize,
    /// The move that was played (in UCI notation)
    pub played_move: String,
    /// Side that played the move
    pub side: Side,
    /// Position before the move (FEN)
    pub position: String,
    /// The best move according to the engine
    pub best_move: Option<String>,
    /// Evaluation before the move, from the mover's point of view
    pub eval_before: i32,
    /// Evaluation after the move, from the mover's point of view
    pub eval_after: i32,
    /// Evaluation after the move from White's point of view
    pub white_eval_after: i32,
    /// Centipawn loss from playing this move (never negative)
    pub cp_loss: i32,
    /// `eval_before - eval_after` without clamping; negative when the move gained
    pub eval_delta: i32,
    /// Value of the piece given up or taken, with positional bonuses
    pub material_loss: i32,
    /// Whether the move was the engine's first choice
    pub matched_best: bool,
    /// Engine lines for the position before the move, best first
    pub alternatives: Vec<Candidate>,
    /// Descriptors of the board after the move
    pub board: BoardDescriptor,
    /// Tactical features of the move
    pub patterns: TacticalPatterns,
    /// Quality classification
    pub quality: MoveQuality,
    /// Drop in winning chances, percentage points
    pub win_prob_loss: f64,
    /// Complexity score (0-100)
    pub complexity: i32,
    /// Depth the authoritative before-move evaluation reached
    pub depth: u32,
    pub status: AnalysisStatus,
    /// Why the analysis is degraded or failed
    pub error: Option<String>,
}

impl MoveAnalysis {
    pub fn is_complete(&self) -> bool {
        self.status == AnalysisStatus::Complete
    }

    pub fn is_failed(&self) -> bool {
        self.status == AnalysisStatus::Failed
    }
}
