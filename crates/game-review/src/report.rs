//! Review output: plain text for people, JSON for tools.

use std::fmt;

use chess_analysis::{BatchSummary, MoveAnalysis, MoveQuality, PlayerStats, Side};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Review {
    pub engine: Option<String>,
    pub summary: BatchSummary,
    pub moves: Vec<MoveAnalysis>,
}

impl Review {
    pub fn new(engine: Option<String>, summary: BatchSummary, moves: Vec<MoveAnalysis>) -> Self {
        Self {
            engine,
            summary,
            moves,
        }
    }
}

/// "1." for White's first move, "1..." for Black's. `side` is the mover of
/// move `index`, so games starting with Black to move number correctly.
pub fn move_number(index: usize, side: Side) -> String {
    let white_first = (index % 2 == 0) == (side == Side::White);
    let ply = if white_first { index } else { index + 1 };
    let number = ply / 2 + 1;
    match side {
        Side::White => format!("{}.", number),
        Side::Black => format!("{}...", number),
    }
}

impl fmt::Display for Review {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(engine) = &self.engine {
            writeln!(f, "Engine: {}", engine)?;
        }
        writeln!(f)?;

        for analysis in &self.moves {
            write!(
                f,
                "{:<7} {:<6} {:<11} loss {:>5}",
                move_number(analysis.index, analysis.side),
                analysis.played_move,
                analysis.quality,
                analysis.cp_loss
            )?;
            if let Some(best) = analysis.best_move.as_deref().filter(|_| !analysis.matched_best) {
                write!(f, "  best {}", best)?;
            }
            if let Some(error) = &analysis.error {
                write!(f, "  [{}]", error)?;
            }
            writeln!(f)?;
        }

        let summary = &self.summary;
        writeln!(f)?;
        for side in [Side::White, Side::Black] {
            write_player(f, side, summary.statistics.player(side))?;
        }
        if summary.failed > 0 {
            writeln!(f, "{} moves could not be analyzed", summary.failed)?;
        }
        if summary.cancelled {
            writeln!(f, "Review cancelled before the last move")?;
        }
        Ok(())
    }
}

fn write_player(f: &mut fmt::Formatter<'_>, side: Side, stats: &PlayerStats) -> fmt::Result {
    let name = match side {
        Side::White => "White",
        Side::Black => "Black",
    };
    writeln!(
        f,
        "{}: accuracy {:.1}%, ACPL {}, {} moves",
        name, stats.accuracy, stats.acpl, stats.moves
    )?;
    let tiers: Vec<String> = MoveQuality::ALL
        .iter()
        .filter_map(|&quality| {
            let count = stats.count(quality);
            (count > 0).then(|| format!("{} {}", count, quality))
        })
        .collect();
    if !tiers.is_empty() {
        writeln!(f, "  {}", tiers.join(", "))?;
    }
    Ok(())
}
