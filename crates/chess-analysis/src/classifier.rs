//! Move classification.
//!
//! [`MoveClassifier::classify`] is a pure function of an assembled
//! [`ClassificationInput`]. Tiers are tried in a fixed order and the first
//! one whose criteria hold wins: book, brilliant, best, great, good,
//! inaccuracy, mistake, blunder.

use crate::config::{ClassificationThresholds, ClassifierConfig};
use crate::engine::Candidate;
use crate::material::{GamePhase, TacticalPatterns};
use crate::quality::MoveQuality;
use crate::stats;

/// Everything the classifier looks at for one move. All evaluations are from
/// the mover's point of view.
#[derive(Debug, Clone)]
pub struct ClassificationInput<'a> {
    pub index: usize,
    pub phase: GamePhase,
    pub eval_before: i32,
    pub eval_after: i32,
    pub cp_loss: i32,
    /// Unclamped `eval_before - eval_after`.
    pub eval_delta: i32,
    pub material_loss: i32,
    pub matched_best: bool,
    /// Engine lines for the position before the move, best first.
    pub alternatives: &'a [Candidate],
    pub patterns: TacticalPatterns,
    pub complexity: i32,
    pub win_prob_loss: f64,
}

impl ClassificationInput<'_> {
    /// Eval gain for the mover.
    pub fn gain(&self) -> i32 {
        self.eval_after - self.eval_before
    }

    /// Score gap between the two best engine lines, if there are two.
    pub fn uniqueness_gap(&self) -> Option<i32> {
        match self.alternatives {
            [first, second, ..] => Some(first.score_cp - second.score_cp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MoveClassifier {
    config: ClassifierConfig,
}

impl MoveClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Cutoffs for `phase`, relaxed when the position was already decisive.
    pub fn thresholds(&self, phase: GamePhase, eval_before: i32) -> ClassificationThresholds {
        let base = match phase {
            GamePhase::Opening => self.config.opening,
            GamePhase::Middlegame => self.config.middlegame,
            GamePhase::Endgame => self.config.endgame,
        };
        if eval_before.abs() > self.config.decisive_eval {
            base.relaxed(self.config.decisive_relax)
        } else {
            base
        }
    }

    pub fn win_prob_loss(&self, eval_before: i32, eval_after: i32) -> f64 {
        stats::win_prob_loss(eval_before, eval_after, self.config.win_probability.steepness)
    }

    /// Bonus contributed by the move's tactical features.
    pub fn pattern_bonus(&self, patterns: &TacticalPatterns) -> i32 {
        let great = &self.config.great;
        let mut bonus = 0;
        if patterns.check {
            bonus += great.check_bonus;
        }
        if patterns.capture {
            bonus += great.capture_bonus;
        }
        if patterns.promotion {
            bonus += great.promotion_bonus;
        }
        if patterns.castling {
            bonus += great.castling_bonus;
        }
        bonus
    }

    /// Complexity score in [0, 100].
    ///
    /// Up to 40 points for the spread of the engine's candidate scores (half
    /// their standard deviation), up to 30 for tactical patterns, 15 for a
    /// middlegame or 10 for an endgame, and 15 when the position is tactical.
    pub fn complexity(
        &self,
        alternatives: &[Candidate],
        patterns: &TacticalPatterns,
        phase: GamePhase,
        tactical: bool,
    ) -> i32 {
        let spread = if alternatives.len() >= 2 {
            let n = alternatives.len() as f64;
            let mean = alternatives.iter().map(|c| c.score_cp as f64).sum::<f64>() / n;
            let variance = alternatives
                .iter()
                .map(|c| (c.score_cp as f64 - mean).powi(2))
                .sum::<f64>()
                / n;
            ((variance.sqrt() / 2.0).round() as i32).min(40)
        } else {
            0
        };

        let phase_points = match phase {
            GamePhase::Opening => 0,
            GamePhase::Middlegame => 15,
            GamePhase::Endgame => 10,
        };
        let tactical_points = if tactical { 15 } else { 0 };

        (spread + self.pattern_bonus(patterns).min(30) + phase_points + tactical_points).min(100)
    }

    pub fn classify(&self, input: &ClassificationInput<'_>) -> MoveQuality {
        if self.is_book(input) {
            return MoveQuality::Book;
        }
        if self.is_brilliant(input) {
            return MoveQuality::Brilliant;
        }

        let t = self.thresholds(input.phase, input.eval_before);
        let cp = input.cp_loss;
        let wp = &self.config.win_probability;

        if self.is_best(input, &t) {
            MoveQuality::Best
        } else if cp <= t.great && self.is_great(input) {
            MoveQuality::Great
        } else if cp <= t.good {
            MoveQuality::Good
        } else if cp <= t.inaccuracy || input.win_prob_loss < wp.inaccuracy_loss {
            MoveQuality::Inaccuracy
        } else if cp <= t.mistake || input.win_prob_loss < wp.mistake_loss {
            MoveQuality::Mistake
        } else {
            MoveQuality::Blunder
        }
    }

    fn is_book(&self, input: &ClassificationInput<'_>) -> bool {
        let book = &self.config.book;
        book.enabled
            && input.phase == GamePhase::Opening
            && input.index < book.max_ply
            && input.cp_loss.abs() < book.max_cp_loss
    }

    fn is_brilliant(&self, input: &ClassificationInput<'_>) -> bool {
        let b = &self.config.brilliant;
        if !b.enabled {
            return false;
        }
        if b.disable_when_winning && input.eval_before >= b.winning_eval {
            return false;
        }

        let unique = input
            .uniqueness_gap()
            .map_or(true, |gap| gap > b.min_uniqueness_gap);
        let swing = (input.eval_before - input.eval_after).abs();

        input.material_loss >= b.min_material
            && input.eval_delta <= b.loss_allowance
            && input.gain() > b.min_gain
            && unique
            && input.complexity > b.min_complexity
            && swing > b.min_swing
    }

    fn is_best(&self, input: &ClassificationInput<'_>, t: &ClassificationThresholds) -> bool {
        let ambiguous = input
            .uniqueness_gap()
            .is_some_and(|gap| gap <= self.config.ambiguous_gap);

        input.cp_loss <= t.best
            || input.matched_best
            || (ambiguous && input.cp_loss <= t.best + self.config.ambiguous_slack)
    }

    fn is_great(&self, input: &ClassificationInput<'_>) -> bool {
        let g = &self.config.great;
        input.gain() >= g.min_gain
            || (input.eval_before >= g.strong_eval && input.eval_after >= g.strong_eval)
            || self.pattern_bonus(&input.patterns) >= g.min_pattern_bonus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(mv: &str, score_cp: i32) -> Candidate {
        Candidate {
            mv: mv.to_string(),
            score_cp,
            mate: None,
            pv: vec![mv.to_string()],
        }
    }

    fn input(cp_loss: i32) -> ClassificationInput<'static> {
        ClassificationInput {
            index: 30,
            phase: GamePhase::Middlegame,
            eval_before: 0,
            eval_after: -cp_loss,
            cp_loss,
            eval_delta: cp_loss,
            material_loss: 0,
            matched_best: false,
            alternatives: &[],
            patterns: TacticalPatterns::default(),
            complexity: 0,
            win_prob_loss: 50.0,
        }
    }

    #[test]
    fn cp_loss_bands_in_middlegame() {
        let c = MoveClassifier::default();
        assert_eq!(c.classify(&input(5)), MoveQuality::Best);
        assert_eq!(c.classify(&input(40)), MoveQuality::Good);
        assert_eq!(c.classify(&input(90)), MoveQuality::Inaccuracy);
        assert_eq!(c.classify(&input(150)), MoveQuality::Mistake);
        assert_eq!(c.classify(&input(400)), MoveQuality::Blunder);
    }

    #[test]
    fn improving_move_from_worse_position_is_best() {
        // before -50, after -40: the move gained ground
        let c = MoveClassifier::default();
        let record = ClassificationInput {
            index: 0,
            phase: GamePhase::Opening,
            eval_before: -50,
            eval_after: -40,
            cp_loss: 0,
            eval_delta: -10,
            win_prob_loss: 0.0,
            ..input(0)
        };
        let quality = c.classify(&record);
        assert!(matches!(
            quality,
            MoveQuality::Book | MoveQuality::Brilliant | MoveQuality::Best
        ));

        let past_book = ClassificationInput {
            index: 14,
            ..record
        };
        assert_eq!(c.classify(&past_book), MoveQuality::Best);
    }

    #[test]
    fn queen_sacrifice_with_unique_line_is_brilliant() {
        let c = MoveClassifier::default();
        let lines = [line("d1h5", 120), line("e1g1", -10)];
        let record = ClassificationInput {
            eval_before: 50,
            eval_after: 120,
            cp_loss: 0,
            eval_delta: -70,
            material_loss: 900,
            alternatives: &lines,
            complexity: 55,
            win_prob_loss: 0.0,
            ..input(0)
        };
        assert_eq!(c.classify(&record), MoveQuality::Brilliant);
    }

    #[test]
    fn brilliancy_guard_when_already_winning() {
        let lines = [line("d1h5", 900), line("e1g1", 600)];
        let record = ClassificationInput {
            eval_before: 650,
            eval_after: 900,
            cp_loss: 0,
            eval_delta: -250,
            material_loss: 900,
            alternatives: &lines,
            complexity: 80,
            win_prob_loss: 0.0,
            ..input(0)
        };

        let guarded = MoveClassifier::default();
        assert_ne!(guarded.classify(&record), MoveQuality::Brilliant);

        let mut config = ClassifierConfig::default();
        config.brilliant.disable_when_winning = false;
        let unguarded = MoveClassifier::new(config);
        assert_eq!(unguarded.classify(&record), MoveQuality::Brilliant);
    }

    #[test]
    fn sacrifice_without_unique_line_is_not_brilliant() {
        let c = MoveClassifier::default();
        let lines = [line("d1h5", 120), line("e1g1", 100)];
        let record = ClassificationInput {
            eval_before: 50,
            eval_after: 120,
            cp_loss: 0,
            eval_delta: -70,
            material_loss: 900,
            alternatives: &lines,
            complexity: 55,
            ..input(0)
        };
        assert_eq!(c.classify(&record), MoveQuality::Best);
    }

    #[test]
    fn opening_move_with_small_loss_is_book() {
        let c = MoveClassifier::default();
        let record = ClassificationInput {
            index: 3,
            phase: GamePhase::Opening,
            ..input(12)
        };
        assert_eq!(c.classify(&record), MoveQuality::Book);

        let late = ClassificationInput {
            index: 15,
            phase: GamePhase::Opening,
            ..input(12)
        };
        assert_eq!(c.classify(&late), MoveQuality::Best);
    }

    #[test]
    fn matched_best_overrides_loss() {
        let c = MoveClassifier::default();
        let record = ClassificationInput {
            matched_best: true,
            ..input(80)
        };
        assert_eq!(c.classify(&record), MoveQuality::Best);
    }

    #[test]
    fn ambiguous_best_uses_looser_cutoff() {
        let c = MoveClassifier::default();
        let lines = [line("e2e4", 30), line("d2d4", 22)];
        let ambiguous = ClassificationInput {
            alternatives: &lines,
            ..input(18)
        };
        assert_eq!(c.classify(&ambiguous), MoveQuality::Best);
        assert_eq!(c.classify(&input(18)), MoveQuality::Good);
    }

    #[test]
    fn great_needs_low_loss_and_a_reason() {
        let c = MoveClassifier::default();
        let strong = ClassificationInput {
            eval_before: 300,
            eval_after: 280,
            ..input(20)
        };
        assert_eq!(c.classify(&strong), MoveQuality::Great);

        let tactical = ClassificationInput {
            patterns: TacticalPatterns {
                check: true,
                capture: true,
                ..Default::default()
            },
            ..input(20)
        };
        assert_eq!(c.classify(&tactical), MoveQuality::Great);
        assert_eq!(c.classify(&input(20)), MoveQuality::Good);
    }

    #[test]
    fn small_win_probability_loss_softens_tier() {
        let c = MoveClassifier::default();
        let record = ClassificationInput {
            win_prob_loss: 4.0,
            ..input(400)
        };
        assert_eq!(c.classify(&record), MoveQuality::Inaccuracy);
    }

    #[test]
    fn thresholds_relax_in_decisive_positions() {
        let c = MoveClassifier::default();
        assert_eq!(
            c.thresholds(GamePhase::Endgame, 100),
            ClassificationThresholds::ENDGAME
        );
        assert_eq!(
            c.thresholds(GamePhase::Endgame, -800),
            ClassificationThresholds::ENDGAME.relaxed(30)
        );
    }

    #[test]
    fn complexity_is_capped() {
        let c = MoveClassifier::default();
        let lines = [line("a", 800), line("b", -800), line("c", 0)];
        let patterns = TacticalPatterns {
            check: true,
            capture: true,
            promotion: true,
            castling: false,
        };
        assert_eq!(c.complexity(&lines, &patterns, GamePhase::Middlegame, true), 100);
        assert_eq!(
            c.complexity(&[], &TacticalPatterns::default(), GamePhase::Opening, false),
            0
        );
    }

    fn phase() -> impl Strategy<Value = GamePhase> {
        prop_oneof![
            Just(GamePhase::Opening),
            Just(GamePhase::Middlegame),
            Just(GamePhase::Endgame),
        ]
    }

    proptest! {
        #[test]
        fn lower_loss_never_yields_worse_tier(
            phase in phase(),
            eval_before in -1_000i32..1_000,
            eval_after in -1_000i32..1_000,
            a in 0i32..1_000,
            b in 0i32..1_000,
            wpl in 0.0f64..100.0,
            check in any::<bool>(),
        ) {
            let c = MoveClassifier::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let make = |cp_loss: i32| ClassificationInput {
                index: 40,
                phase,
                eval_before,
                eval_after,
                cp_loss,
                eval_delta: eval_before - eval_after,
                material_loss: 0,
                matched_best: false,
                alternatives: &[],
                patterns: TacticalPatterns { check, ..Default::default() },
                complexity: 0,
                win_prob_loss: wpl,
            };

            let better = c.classify(&make(lo)).rank();
            let worse = c.classify(&make(hi)).rank();
            prop_assert!(better <= worse, "{:?} > {:?}", better, worse);
        }
    }
}
