//! Analysis configuration.
//!
//! Every tunable of the pipeline lives here so that a TOML file can override
//! any subset of it. All sections default individually, so an empty file (or
//! no file at all) yields [`AnalysisConfig::default`].
//!
//! ```toml
//! score_perspective = "side-to-move"
//!
//! [engine]
//! path = "/usr/local/bin/stockfish"
//! hash_mb = 256
//!
//! [depths]
//! standard = 16
//! deep = 22
//!
//! [classifier.middlegame]
//! best = 15
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::quality::MoveQuality;
use crate::retry::RetryPolicy;
use crate::stats::AccuracyModel;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Top-level configuration for a game analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub engine: EngineConfig,
    pub depths: DepthConfig,
    pub retry: RetryPolicy,
    pub pacing: PacingConfig,
    pub cache: CacheConfig,
    pub position: PositionConfig,
    pub classifier: ClassifierConfig,
    pub accuracy: AccuracyModel,
    pub score_perspective: ScorePerspective,
}

impl AnalysisConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file cannot be read,
    /// or [`ConfigError::ParseError`] if it contains invalid TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Which side the engine's scores are relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScorePerspective {
    /// Standard UCI: every score is from the side to move's point of view.
    #[default]
    SideToMove,
    /// Scores are always from White's point of view (some engine proxies).
    White,
}

/// External engine process and session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to the UCI engine executable. Defaults to "stockfish" (assumes it's in PATH).
    pub path: String,
    /// Transposition table size in MB.
    pub hash_mb: u32,
    pub threads: u32,
    /// `Skill Level` option (0-20); unset leaves the engine at full strength.
    pub skill_level: Option<u8>,
    /// Initial `MultiPV`; requests asking for another line count switch it on the fly.
    pub multipv: u32,
    /// Budget for the `uci`/`isready` handshake.
    pub init_timeout_ms: u64,
    /// Default budget for one search, from `go` to `bestmove`.
    pub request_timeout_ms: u64,
    /// Budget for resynchronizing (`isready`/`readyok`) after a fault.
    pub ready_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: "stockfish".to_string(),
            hash_mb: 128,
            threads: 1,
            skill_level: None,
            multipv: 3,
            init_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            ready_timeout_ms: 5_000,
        }
    }
}

impl EngineConfig {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

/// Search depths of the quick / standard / deep passes. A depth of 0
/// disables the quick or deep pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthConfig {
    pub quick: u32,
    pub standard: u32,
    pub deep: u32,
    pub standard_lines: u32,
    pub deep_lines: u32,
    /// Per-request timeout override for the deep pass.
    pub deep_timeout_ms: Option<u64>,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            quick: 8,
            standard: 14,
            deep: 18,
            standard_lines: 3,
            deep_lines: 5,
            deep_timeout_ms: Some(60_000),
        }
    }
}

/// Deliberate pauses that keep the engine from being hammered with restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Pause between depth levels of one move.
    pub depth_pause_ms: u64,
    /// Pause after a quiet move in batch mode.
    pub quiet_move_pause_ms: u64,
    /// Pause after a tactical move in batch mode.
    pub tactical_move_pause_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            depth_pause_ms: 50,
            quiet_move_pause_ms: 50,
            tactical_move_pause_ms: 150,
        }
    }
}

impl PacingConfig {
    /// No pauses at all; handy for tests and scripted engines.
    pub fn none() -> Self {
        Self {
            depth_pause_ms: 0,
            quiet_move_pause_ms: 0,
            tactical_move_pause_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries kept before the oldest-inserted one is evicted.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 1_000 }
    }
}

/// Position descriptor and material-loss parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    /// Plies (half-moves) that count as the opening.
    pub opening_ply_limit: usize,
    /// Total pieces (kings and pawns included) at or below which it is an endgame.
    pub endgame_piece_limit: u32,
    /// Total pieces below which every position is flagged tactical.
    pub tactical_piece_limit: u32,
    /// Material imbalance (centipawns) from which a position is flagged tactical.
    pub tactical_imbalance: i32,
    /// Bonus for captures on d4, e4, d5 or e5.
    pub center_capture_bonus: i32,
    /// Bonus for capturing a non-pawn piece deep in enemy territory.
    pub deep_capture_bonus: i32,
    /// Bonus for captures next to the enemy king.
    pub king_zone_capture_bonus: i32,
    /// Chebyshev distance from the enemy king that counts as "near".
    pub king_zone_radius: u8,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            opening_ply_limit: 20,
            endgame_piece_limit: 12,
            tactical_piece_limit: 10,
            tactical_imbalance: 300,
            center_capture_bonus: 20,
            deep_capture_bonus: 30,
            king_zone_capture_bonus: 40,
            king_zone_radius: 2,
        }
    }
}

/// Centipawn-loss cutoffs (inclusive) for one game phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationThresholds {
    pub best: i32,
    pub great: i32,
    pub good: i32,
    pub inaccuracy: i32,
    pub mistake: i32,
}

impl ClassificationThresholds {
    pub const OPENING: Self = Self {
        best: 15,
        great: 30,
        good: 60,
        inaccuracy: 120,
        mistake: 250,
    };

    pub const MIDDLEGAME: Self = Self {
        best: 10,
        great: 25,
        good: 50,
        inaccuracy: 100,
        mistake: 200,
    };

    pub const ENDGAME: Self = Self {
        best: 8,
        great: 20,
        good: 40,
        inaccuracy: 80,
        mistake: 160,
    };

    /// Every cutoff widened by `amount`.
    pub fn relaxed(self, amount: i32) -> Self {
        Self {
            best: self.best + amount,
            great: self.great + amount,
            good: self.good + amount,
            inaccuracy: self.inaccuracy + amount,
            mistake: self.mistake + amount,
        }
    }
}

/// Criteria a move must meet, all at once, to be brilliant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrilliantCriteria {
    pub enabled: bool,
    /// Minimum material committed by the move.
    pub min_material: i32,
    /// Largest raw (unclamped) eval delta still accepted.
    pub loss_allowance: i32,
    /// Minimum eval gain for the mover.
    pub min_gain: i32,
    /// Minimum gap between the two best engine lines.
    pub min_uniqueness_gap: i32,
    pub min_complexity: i32,
    /// Minimum absolute before/after eval swing.
    pub min_swing: i32,
    /// Refuse brilliancy when the mover was already winning by `winning_eval`.
    pub disable_when_winning: bool,
    pub winning_eval: i32,
}

impl Default for BrilliantCriteria {
    fn default() -> Self {
        Self {
            enabled: true,
            min_material: 300,
            loss_allowance: 5,
            min_gain: 0,
            min_uniqueness_gap: 100,
            min_complexity: 50,
            min_swing: 30,
            disable_when_winning: true,
            winning_eval: 500,
        }
    }
}

/// What lifts a low-loss move from good to great.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GreatCriteria {
    pub min_gain: i32,
    /// Eval that counts as "already strongly favorable" before and after.
    pub strong_eval: i32,
    /// Tactical pattern bonus needed on its own.
    pub min_pattern_bonus: i32,
    pub check_bonus: i32,
    pub capture_bonus: i32,
    pub promotion_bonus: i32,
    pub castling_bonus: i32,
}

impl Default for GreatCriteria {
    fn default() -> Self {
        Self {
            min_gain: 30,
            strong_eval: 200,
            min_pattern_bonus: 20,
            check_bonus: 15,
            capture_bonus: 10,
            promotion_bonus: 20,
            castling_bonus: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookCriteria {
    pub enabled: bool,
    /// Moves with a lower index may be book.
    pub max_ply: usize,
    pub max_cp_loss: i32,
}

impl Default for BookCriteria {
    fn default() -> Self {
        Self {
            enabled: true,
            max_ply: 12,
            max_cp_loss: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WinProbabilityConfig {
    /// Logistic steepness `k`.
    pub steepness: f64,
    /// Win-probability loss (percentage points) still counted as an inaccuracy.
    pub inaccuracy_loss: f64,
    /// Win-probability loss still counted as a mistake.
    pub mistake_loss: f64,
}

impl Default for WinProbabilityConfig {
    fn default() -> Self {
        Self {
            steepness: 0.003_682_08,
            inaccuracy_loss: 10.0,
            mistake_loss: 20.0,
        }
    }
}

/// Move classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub opening: ClassificationThresholds,
    pub middlegame: ClassificationThresholds,
    pub endgame: ClassificationThresholds,
    /// |evalBefore| beyond which every cutoff is relaxed.
    pub decisive_eval: i32,
    pub decisive_relax: i32,
    /// Top-two line gap under which the best move is ambiguous.
    pub ambiguous_gap: i32,
    /// Extra loss tolerated for "best" when the best move is ambiguous.
    pub ambiguous_slack: i32,
    pub brilliant: BrilliantCriteria,
    pub great: GreatCriteria,
    pub book: BookCriteria,
    pub win_probability: WinProbabilityConfig,
    /// Tier assigned to moves whose analysis failed.
    pub neutral_quality: MoveQuality,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            opening: ClassificationThresholds::OPENING,
            middlegame: ClassificationThresholds::MIDDLEGAME,
            endgame: ClassificationThresholds::ENDGAME,
            decisive_eval: 500,
            decisive_relax: 30,
            ambiguous_gap: 15,
            ambiguous_slack: 10,
            brilliant: BrilliantCriteria::default(),
            great: GreatCriteria::default(),
            book: BookCriteria::default(),
            win_probability: WinProbabilityConfig::default(),
            neutral_quality: MoveQuality::Good,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config.engine.path, "stockfish");
        assert_eq!(config.depths.standard, 14);
        assert_eq!(config.retry.retries, 2);
        assert_eq!(config.score_perspective, ScorePerspective::SideToMove);
        assert_eq!(config.classifier.middlegame, ClassificationThresholds::MIDDLEGAME);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            score_perspective = "white"

            [engine]
            hash_mb = 512

            [classifier.middlegame]
            best = 20
            great = 30
            good = 60
            inaccuracy = 120
            mistake = 240

            [classifier.brilliant]
            disable_when_winning = false
            "#,
        )
        .unwrap();

        assert_eq!(config.score_perspective, ScorePerspective::White);
        assert_eq!(config.engine.hash_mb, 512);
        assert_eq!(config.engine.threads, 1);
        assert_eq!(config.classifier.middlegame.best, 20);
        assert_eq!(config.classifier.endgame, ClassificationThresholds::ENDGAME);
        assert!(!config.classifier.brilliant.disable_when_winning);
        assert_eq!(config.classifier.brilliant.min_uniqueness_gap, 100);
    }

    #[test]
    fn neutral_quality_parses_lowercase() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            [classifier]
            neutral_quality = "inaccuracy"
            "#,
        )
        .unwrap();
        assert_eq!(config.classifier.neutral_quality, MoveQuality::Inaccuracy);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let result = AnalysisConfig::from_toml_str("[engine\npath = 3");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn load_reads_file_and_missing_file_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[depths]\ndeep = 0").unwrap();

        let config = AnalysisConfig::load(file.path()).unwrap();
        assert_eq!(config.depths.deep, 0);

        let missing = Path::new("/nonexistent/review.toml");
        assert!(matches!(
            AnalysisConfig::load(missing),
            Err(ConfigError::ReadError(_))
        ));
        let defaults = AnalysisConfig::load_or_default(missing).unwrap();
        assert_eq!(defaults.depths.deep, 18);
    }

    #[test]
    fn relaxed_widens_every_cutoff() {
        let relaxed = ClassificationThresholds::ENDGAME.relaxed(30);
        assert_eq!(relaxed.best, 38);
        assert_eq!(relaxed.mistake, 190);
    }

    #[test]
    fn phase_sets_get_stricter_toward_the_endgame() {
        let (o, m, e) = (
            ClassificationThresholds::OPENING,
            ClassificationThresholds::MIDDLEGAME,
            ClassificationThresholds::ENDGAME,
        );
        for (a, b) in [(o, m), (m, e)] {
            assert!(a.best >= b.best);
            assert!(a.great >= b.great);
            assert!(a.good >= b.good);
            assert!(a.inaccuracy >= b.inaccuracy);
            assert!(a.mistake >= b.mistake);
        }
    }
}
