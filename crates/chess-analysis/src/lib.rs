//! Chess move-quality analysis driven by a UCI engine.
//!
//! This crate evaluates every move of a game through a single serialized
//! engine session, classifies each move into a quality tier and aggregates
//! per-player accuracy statistics.
//!
//! # Overview
//!
//! - [`EngineSession`] - Serialized request/response access to one UCI engine
//! - [`GameAnalyzer`] - Multi-depth per-move analysis, caching and batch mode
//! - [`GameSession`] - One game under analysis: moves, cache, results
//! - [`MoveClassifier`] - Pure move classification (book, brilliant, ... blunder)
//! - [`GameStatistics`] - ACPL, accuracy and tier counts per player
//!
//! # Example
//!
//! ```no_run
//! use chess_analysis::{AnalysisConfig, EngineSession, GameAnalyzer, GameSession, GameState};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AnalysisConfig::default();
//! let engine = EngineSession::launch(config.engine.clone())?;
//! engine.wait_ready().await?;
//!
//! let game = GameState::from_uci_moves(None, &["e2e4", "e7e5", "g1f3"])?;
//! let session = GameSession::new(game, &config);
//! let analyzer = GameAnalyzer::new(engine, config);
//!
//! let summary = analyzer.analyze_all(&session).await?;
//! println!("White accuracy: {:.1}%", summary.statistics.white.accuracy);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod game;
pub mod material;
pub mod quality;
pub mod retry;
pub mod stats;

pub use analyzer::{AnalysisEvent, BatchSummary, EventListener, GameAnalyzer, GameSession};
pub use cache::{AnalysisCache, CacheKey};
pub use classifier::{ClassificationInput, MoveClassifier};
pub use config::{
    AnalysisConfig, ClassificationThresholds, ClassifierConfig, ConfigError, EngineConfig,
    ScorePerspective,
};
pub use engine::{
    AnalysisRequest, AnalysisResult, Candidate, EngineIo, EngineSession, QueuePolicy,
    SessionState,
};
pub use error::{AnalysisError, EngineError};
pub use evaluation::Evaluation;
pub use game::{GameError, GameState, MoveRecord, Side};
pub use material::{BoardDescriptor, GamePhase, TacticalPatterns};
pub use quality::{AnalysisStatus, MoveAnalysis, MoveQuality};
pub use retry::RetryPolicy;
pub use stats::{AccuracyModel, GameStatistics, PlayerStats};
