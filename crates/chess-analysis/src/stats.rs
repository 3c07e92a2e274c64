//! Win probability, accuracy and per-player aggregation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::game::Side;
use crate::quality::{MoveAnalysis, MoveQuality};

/// Winning chances (0-100) for a centipawn score, logistic with steepness `k`.
pub fn win_probability(cp: i32, k: f64) -> f64 {
    50.0 + 50.0 * (2.0 / (1.0 + (-k * cp as f64).exp()) - 1.0)
}

/// Drop in winning chances from `before` to `after`, clamped to [0, 100].
pub fn win_prob_loss(before: i32, after: i32, k: f64) -> f64 {
    (win_probability(before, k) - win_probability(after, k)).clamp(0.0, 100.0)
}

/// Average centipawn loss over a set of losses, rounded. 0 when empty.
pub fn acpl<I: IntoIterator<Item = i32>>(losses: I) -> u32 {
    let (sum, count) = losses
        .into_iter()
        .fold((0i64, 0i64), |(sum, count), loss| (sum + loss.max(0) as i64, count + 1));
    if count == 0 {
        0
    } else {
        (sum as f64 / count as f64).round() as u32
    }
}

/// Coefficients of `intercept - slope * ln(quadratic * acpl^2 + linear * acpl + 1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracyModel {
    pub intercept: f64,
    pub slope: f64,
    pub quadratic: f64,
    pub linear: f64,
}

impl Default for AccuracyModel {
    fn default() -> Self {
        Self {
            intercept: 103.1668,
            slope: 3.9114,
            quadratic: 0.000196,
            linear: 0.0388,
        }
    }
}

impl AccuracyModel {
    /// Accuracy percentage for an ACPL, rounded to one decimal and clamped
    /// to [0, 100]. A flawless game is exactly 100.
    pub fn accuracy(&self, acpl: u32) -> f64 {
        if acpl == 0 {
            return 100.0;
        }
        let x = acpl as f64;
        let raw = self.intercept - self.slope * (self.quadratic * x * x + self.linear * x + 1.0).ln();
        ((raw * 10.0).round() / 10.0).clamp(0.0, 100.0)
    }
}

/// Statistics for a player's performance in a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Total moves analyzed, failed ones included
    pub moves: u32,
    /// Average centipawn loss
    pub acpl: u32,
    /// Accuracy percentage (0-100)
    pub accuracy: f64,
    /// Moves per quality tier
    pub counts: BTreeMap<String, u32>,
    /// Average win-probability loss, percentage points
    pub avg_win_prob_loss: f64,
}

impl PlayerStats {
    pub fn count(&self, quality: MoveQuality) -> u32 {
        self.counts.get(&quality.to_string()).copied().unwrap_or(0)
    }

    /// Aggregates `side`'s moves. Failed analyses count toward the tier
    /// tallies only.
    pub fn compute<'a, I>(side: Side, analyses: I, model: &AccuracyModel) -> Self
    where
        I: IntoIterator<Item = &'a MoveAnalysis>,
    {
        let mut counts: BTreeMap<String, u32> =
            MoveQuality::ALL.iter().map(|q| (q.to_string(), 0)).collect();
        let mut moves = 0;
        let mut losses = Vec::new();
        let mut wpl_sum = 0.0;

        for analysis in analyses.into_iter().filter(|a| a.side == side) {
            moves += 1;
            *counts.entry(analysis.quality.to_string()).or_insert(0) += 1;
            if !analysis.is_failed() {
                losses.push(analysis.cp_loss);
                wpl_sum += analysis.win_prob_loss;
            }
        }

        let acpl = acpl(losses.iter().copied());
        let avg_win_prob_loss = if losses.is_empty() {
            0.0
        } else {
            wpl_sum / losses.len() as f64
        };

        Self {
            moves,
            acpl,
            accuracy: model.accuracy(acpl),
            counts,
            avg_win_prob_loss,
        }
    }
}

/// Per-player statistics for the analyzed part of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStatistics {
    pub white: PlayerStats,
    pub black: PlayerStats,
}

impl GameStatistics {
    pub fn compute<'a, I>(analyses: I, model: &AccuracyModel) -> Self
    where
        I: IntoIterator<Item = &'a MoveAnalysis> + Clone,
    {
        Self {
            white: PlayerStats::compute(Side::White, analyses.clone(), model),
            black: PlayerStats::compute(Side::Black, analyses, model),
        }
    }

    pub fn player(&self, side: Side) -> &PlayerStats {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }
}
