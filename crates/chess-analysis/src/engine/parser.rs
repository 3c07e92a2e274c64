//! Per-request accumulation of `info` lines.

use std::collections::BTreeMap;
use tracing::warn;
use uci::{Bound, EngineInfo};

use super::{AnalysisResult, Candidate};
use crate::evaluation::Evaluation;

#[derive(Debug, Clone)]
struct LineState {
    depth: u32,
    score: Evaluation,
    pv: Vec<String>,
}

/// Collects the deepest report of every multi-PV line of one search.
#[derive(Debug, Clone)]
pub struct SearchParser {
    max_lines: u32,
    lines: BTreeMap<u32, LineState>,
}

impl SearchParser {
    pub fn new(max_lines: u32) -> Self {
        Self {
            max_lines: max_lines.max(1),
            lines: BTreeMap::new(),
        }
    }

    /// Feeds one parsed `info` line. Bound scores, lines beyond the requested
    /// count and reports shallower than what is already known are ignored.
    pub fn observe(&mut self, info: &EngineInfo) {
        if info.bound != Bound::Exact {
            return;
        }
        let (Some(depth), Some(score)) = (info.depth, info.score) else {
            return;
        };
        let index = info.line_index();
        if index == 0 || index > self.max_lines {
            return;
        }

        let replace = self
            .lines
            .get(&index)
            .map_or(true, |known| depth >= known.depth);
        if replace {
            self.lines.insert(
                index,
                LineState {
                    depth,
                    score: score.into(),
                    pv: info.pv.clone(),
                },
            );
        }
    }


    /// Assembles the result once `bestmove` arrived.
    pub fn finish(self, best_move: Option<String>) -> AnalysisResult {
        let Some(primary) = self.lines.get(&1).cloned() else {
            warn!(?best_move, "search ended without a usable score");
            return AnalysisResult {
                score_cp: 0,
                mate: None,
                best_move,
                alternatives: Vec::new(),
                depth: 0,
                degraded: true,
            };
        };

        let mut alternatives: Vec<Candidate> = self
            .lines
            .into_values()
            .filter_map(|line| {
                let mv = line.pv.first()?.clone();
                Some(Candidate {
                    mv,
                    score_cp: line.score.to_centipawns(),
                    mate: line.score.mate_distance(),
                    pv: line.pv,
                })
            })
            .collect();
        // stable: equal scores keep multi-PV order
        alternatives.sort_by(|a, b| b.score_cp.cmp(&a.score_cp));
        let mut seen = Vec::with_capacity(alternatives.len());
        alternatives.retain(|c| {
            if seen.contains(&c.mv) {
                false
            } else {
                seen.push(c.mv.clone());
                true
            }
        });
        alternatives.truncate(self.max_lines as usize);

        AnalysisResult {
            score_cp: primary.score.to_centipawns(),
            mate: primary.score.mate_distance(),
            best_move,
            alternatives,
            depth: primary.depth,
            degraded: false,
        }
    }
}
