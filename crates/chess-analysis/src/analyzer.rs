//! Game analysis with move quality classification.
//!
//! A [`GameAnalyzer`] turns the moves of a [`GameSession`] into
//! [`MoveAnalysis`] records. Every move is searched at up to three depth
//! levels (quick feedback, standard, deep) through the shared
//! [`EngineSession`]; complete records are cached per (position, move).

use chess::{Board, BoardStatus};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{AnalysisCache, CacheKey};
use crate::classifier::{ClassificationInput, MoveClassifier};
use crate::config::{AnalysisConfig, ScorePerspective};
use crate::engine::{AnalysisRequest, AnalysisResult, Candidate, EngineSession};
use crate::error::{AnalysisError, EngineError};
use crate::evaluation::Evaluation;
use crate::game::{GameState, MoveRecord, Side};
use crate::material::{self, BoardDescriptor, TacticalPatterns};
use crate::quality::{AnalysisStatus, MoveAnalysis};
use crate::stats::{AccuracyModel, GameStatistics};

/// Notifications emitted while analyzing.
#[derive(Debug, Clone)]
pub enum AnalysisEvent {
    /// Shallow, non-authoritative evaluation of the position before a move.
    Preliminary { index: usize, result: AnalysisResult },
    /// A move of a batch finished (analyzed, skipped or failed).
    Progress {
        index: usize,
        /// Share of the game's moves done, in (0, 1].
        fraction: f64,
        analysis: MoveAnalysis,
        statistics: GameStatistics,
    },
}

pub type EventListener = Arc<dyn Fn(&AnalysisEvent) + Send + Sync>;

/// Outcome of [`GameAnalyzer::analyze_all`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub analyzed: usize,
    /// Moves served from the cache
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub statistics: GameStatistics,
}

/// One game under analysis: its moves, the cache and the latest record per
/// move.
pub struct GameSession {
    game: GameState,
    cache: AnalysisCache,
    analyses: Mutex<Vec<Option<MoveAnalysis>>>,
    accuracy: AccuracyModel,
    cancelled: AtomicBool,
}

impl GameSession {
    pub fn new(game: GameState, config: &AnalysisConfig) -> Self {
        let len = game.len();
        Self {
            game,
            cache: AnalysisCache::new(config.cache.max_entries),
            analyses: Mutex::new(vec![None; len]),
            accuracy: config.accuracy.clone(),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    fn records(&self) -> MutexGuard<'_, Vec<Option<MoveAnalysis>>> {
        self.analyses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Latest record for move `index`, failed ones included.
    pub fn analysis(&self, index: usize) -> Option<MoveAnalysis> {
        self.records().get(index).cloned().flatten()
    }

    /// Every recorded analysis in move order.
    pub fn analyses(&self) -> Vec<MoveAnalysis> {
        self.records().iter().flatten().cloned().collect()
    }

    /// Statistics over the moves recorded so far.
    pub fn statistics(&self) -> GameStatistics {
        let records = self.analyses();
        GameStatistics::compute(&records, &self.accuracy)
    }

    /// Forgets cached analyses; recorded results stay until re-analyzed.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Asks [`GameAnalyzer::analyze_all`] to stop before its next move. A
    /// request made before the batch starts stops it before the first move;
    /// the request is cleared when the batch returns.
    pub fn cancel_batch(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cache_key(&self, index: usize) -> Option<CacheKey> {
        let board = self.game.position_before(index)?;
        let record = self.game.get(index)?;
        Some(CacheKey::new(board.to_string(), record.uci.clone()))
    }

    fn record(&self, analysis: MoveAnalysis) {
        let index = analysis.index;
        let mut records = self.records();
        if let Some(slot) = records.get_mut(index) {
            *slot = Some(analysis);
        }
    }
}

/// Analyzes chess games to classify move quality.
pub struct GameAnalyzer {
    engine: EngineSession,
    config: AnalysisConfig,
    classifier: MoveClassifier,
    listener: Option<EventListener>,
}

impl GameAnalyzer {
    pub fn new(engine: EngineSession, config: AnalysisConfig) -> Self {
        let classifier = MoveClassifier::new(config.classifier.clone());
        Self {
            engine,
            config,
            classifier,
            listener: None,
        }
    }

    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&AnalysisEvent) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn engine(&self) -> &EngineSession {
        &self.engine
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn classifier(&self) -> &MoveClassifier {
        &self.classifier
    }

    /// Analyzes move `index` of the session's game.
    ///
    /// # Errors
    ///
    /// - `AnalysisError::MoveOutOfRange` for an index past the last move
    /// - `AnalysisError::Engine` when the engine is not ready or rejected the request
    /// - `AnalysisError::Failed` when not even the standard depth answered
    pub async fn analyze_move(
        &self,
        session: &GameSession,
        index: usize,
    ) -> Result<MoveAnalysis, AnalysisError> {
        let game = session.game();
        let out_of_range = AnalysisError::MoveOutOfRange {
            index,
            len: game.len(),
        };
        let (Some(record), Some(before), Some(after)) = (
            game.get(index),
            game.position_before(index),
            game.position_after(index),
        ) else {
            return Err(out_of_range);
        };

        let fen = before.to_string();
        let key = CacheKey::new(fen.clone(), record.uci.clone());
        if let Some(hit) = session.cache.get(&key) {
            debug!(index, mv = %record.uci, "cache hit");
            session.record(hit.clone());
            return Ok(hit);
        }

        let depths = &self.config.depths;
        let failed = |source: EngineError| failure(index, source);

        if depths.quick > 0 {
            let quick = AnalysisRequest::new(fen.clone(), depths.quick, 1);
            match self.engine.analyze(quick).await {
                Ok(result) => self.emit(AnalysisEvent::Preliminary { index, result }),
                Err(err) if is_fatal(&err) => return Err(err.into()),
                Err(err) => debug!(index, error = %err, "quick pass unavailable"),
            }
            self.pause(self.config.pacing.depth_pause_ms).await;
        }

        let standard = AnalysisRequest::new(fen.clone(), depths.standard, depths.standard_lines);
        let standard_before = self
            .request(standard, "standard before")
            .await
            .map_err(failed)?;

        let mut notes = Vec::new();
        let after_stm = match terminal_score(after) {
            Some(score) => score,
            None => {
                let request =
                    AnalysisRequest::new(after.to_string(), depths.standard, depths.standard_lines);
                let result = self.request(request, "standard after").await.map_err(failed)?;
                if result.degraded {
                    notes.push("no score for the position after the move".to_string());
                }
                self.side_relative(result.score_cp, record.side.opposite())
            }
        };

        let mut authoritative = standard_before.clone();
        if depths.deep > 0 {
            self.pause(self.config.pacing.depth_pause_ms).await;
            let mut deep = AnalysisRequest::new(fen.clone(), depths.deep, depths.deep_lines);
            deep.timeout = depths.deep_timeout_ms.map(Duration::from_millis);

            match self.request(deep, "deep before").await {
                Ok(result) if !result.degraded => authoritative = result,
                Ok(_) => notes.push("deep pass reported no score".to_string()),
                Err(err) if is_fatal(&err) => return Err(err.into()),
                Err(err) => {
                    warn!(index, error = %err, "deep pass unavailable, using standard depth");
                    notes.push(format!("deep pass unavailable: {}", err));
                }
            }
        }
        if authoritative.degraded {
            notes.push("no score for the position before the move".to_string());
        }

        let status = if notes.is_empty() {
            AnalysisStatus::Complete
        } else {
            AnalysisStatus::Degraded
        };
        let error = (!notes.is_empty()).then(|| notes.join("; "));

        let analysis = self.assemble(
            record,
            before,
            after,
            &authoritative,
            -after_stm,
            status,
            error,
        );
        debug!(
            index,
            mv = %record.uci,
            quality = %analysis.quality,
            cp_loss = analysis.cp_loss,
            "move analyzed"
        );

        // only complete records are reused
        if analysis.is_complete() {
            session.cache.insert(key, analysis.clone());
        }
        session.record(analysis.clone());
        Ok(analysis)
    }

    /// Analyzes every move in order, reusing complete cached results.
    ///
    /// A move whose analysis fails is recorded with the neutral tier and the
    /// batch moves on. The batch stops early when
    /// [`GameSession::cancel_batch`] was called, checked before each move.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::Engine` once, and stops, when the engine is
    /// not ready or rejects requests.
    pub async fn analyze_all(&self, session: &GameSession) -> Result<BatchSummary, AnalysisError> {
        let outcome = self.run_batch(session).await;
        session.cancelled.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_batch(&self, session: &GameSession) -> Result<BatchSummary, AnalysisError> {
        let total = session.game().len();
        let mut summary = BatchSummary {
            analyzed: 0,
            skipped: 0,
            failed: 0,
            cancelled: false,
            statistics: session.statistics(),
        };
        info!(moves = total, "starting game analysis");

        for index in 0..total {
            if session.is_cancelled() {
                info!(index, "game analysis cancelled");
                summary.cancelled = true;
                break;
            }

            let cached = session
                .cache_key(index)
                .and_then(|key| session.cache.get(&key))
                .filter(MoveAnalysis::is_complete);
            if let Some(analysis) = cached {
                debug!(index, "skipping cached move");
                session.record(analysis.clone());
                summary.skipped += 1;
                self.progress(session, index, total, analysis);
                continue;
            }

            let analysis = match self.analyze_move(session, index).await {
                Ok(analysis) => {
                    summary.analyzed += 1;
                    analysis
                }
                Err(AnalysisError::Failed { index, source }) => {
                    warn!(index, error = %source, "move analysis failed, continuing");
                    summary.failed += 1;
                    let placeholder = self.failed_analysis(session, index, &source)?;
                    session.record(placeholder.clone());
                    placeholder
                }
                Err(err) => {
                    warn!(index, error = %err, "aborting game analysis");
                    return Err(err);
                }
            };

            let tactical = analysis.board.tactical;
            self.progress(session, index, total, analysis);

            if index + 1 < total {
                let pacing = &self.config.pacing;
                let pause = if tactical {
                    pacing.tactical_move_pause_ms
                } else {
                    pacing.quiet_move_pause_ms
                };
                self.pause(pause).await;
            }
        }

        summary.statistics = session.statistics();
        info!(
            analyzed = summary.analyzed,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "game analysis finished"
        );
        Ok(summary)
    }

    async fn request(
        &self,
        request: AnalysisRequest,
        label: &str,
    ) -> Result<AnalysisResult, EngineError> {
        let engine = &self.engine;
        let request = &request;
        self.config
            .retry
            .run(label, move || engine.analyze(request.clone()))
            .await
    }

    /// Converts an engine score for `side_to_move` into that side's point of view.
    fn side_relative(&self, score: i32, side_to_move: Side) -> i32 {
        match (self.config.score_perspective, side_to_move) {
            (ScorePerspective::SideToMove, _) | (ScorePerspective::White, Side::White) => score,
            (ScorePerspective::White, Side::Black) => -score,
        }
    }

    /// Engine lines re-expressed for the mover, best first.
    fn mover_lines(&self, lines: &[Candidate], mover: Side) -> Vec<Candidate> {
        let flip = self.side_relative(1, mover) < 0;
        let mut lines: Vec<Candidate> = lines
            .iter()
            .map(|line| Candidate {
                score_cp: if flip { -line.score_cp } else { line.score_cp },
                mate: line.mate.map(|m| if flip { -m } else { m }),
                ..line.clone()
            })
            .collect();
        lines.sort_by(|a, b| b.score_cp.cmp(&a.score_cp));
        lines
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        record: &MoveRecord,
        before: &Board,
        after: &Board,
        authoritative: &AnalysisResult,
        eval_after: i32,
        status: AnalysisStatus,
        error: Option<String>,
    ) -> MoveAnalysis {
        let position = &self.config.position;
        let eval_before = self.side_relative(authoritative.score_cp, record.side);
        let eval_delta = eval_before - eval_after;
        let cp_loss = eval_delta.max(0);
        let material_loss = material::material_loss(record, before, position);
        let best_move = authoritative.best_move.clone();
        let matched_best = best_move.as_deref() == Some(record.uci.as_str());
        let alternatives = self.mover_lines(&authoritative.alternatives, record.side);
        let board = BoardDescriptor::describe(after, record.index, position);
        let patterns = TacticalPatterns::of(record, after);
        let complexity =
            self.classifier
                .complexity(&alternatives, &patterns, board.phase, board.tactical);
        let win_prob_loss = self.classifier.win_prob_loss(eval_before, eval_after);

        let quality = self.classifier.classify(&ClassificationInput {
            index: record.index,
            phase: board.phase,
            eval_before,
            eval_after,
            cp_loss,
            eval_delta,
            material_loss,
            matched_best,
            alternatives: &alternatives,
            patterns,
            complexity,
            win_prob_loss,
        });

        MoveAnalysis {
            index: record.index,
            played_move: record.uci.clone(),
            side: record.side,
            position: before.to_string(),
            best_move,
            eval_before,
            eval_after,
            white_eval_after: white_relative(eval_after, record.side),
            cp_loss,
            eval_delta,
            material_loss,
            matched_best,
            alternatives,
            board,
            patterns,
            quality,
            win_prob_loss,
            complexity,
            depth: authoritative.depth,
            status,
            error,
        }
    }

    /// Neutral-tier placeholder for a move the engine could not evaluate.
    fn failed_analysis(
        &self,
        session: &GameSession,
        index: usize,
        source: &EngineError,
    ) -> Result<MoveAnalysis, AnalysisError> {
        let game = session.game();
        let (Some(record), Some(before), Some(after)) = (
            game.get(index),
            game.position_before(index),
            game.position_after(index),
        ) else {
            return Err(AnalysisError::MoveOutOfRange {
                index,
                len: game.len(),
            });
        };

        let position = &self.config.position;
        Ok(MoveAnalysis {
            index,
            played_move: record.uci.clone(),
            side: record.side,
            position: before.to_string(),
            best_move: None,
            eval_before: 0,
            eval_after: 0,
            white_eval_after: 0,
            cp_loss: 0,
            eval_delta: 0,
            material_loss: material::material_loss(record, before, position),
            matched_best: false,
            alternatives: Vec::new(),
            board: BoardDescriptor::describe(after, index, position),
            patterns: TacticalPatterns::of(record, after),
            quality: self.classifier.config().neutral_quality,
            win_prob_loss: 0.0,
            complexity: 0,
            depth: 0,
            status: AnalysisStatus::Failed,
            error: Some(source.to_string()),
        })
    }

    fn progress(&self, session: &GameSession, index: usize, total: usize, analysis: MoveAnalysis) {
        let fraction = (index + 1) as f64 / total as f64;
        info!(
            index,
            mv = %analysis.played_move,
            quality = %analysis.quality,
            percent = (fraction * 100.0).round() as u32,
            "move done"
        );
        self.emit(AnalysisEvent::Progress {
            index,
            fraction,
            analysis,
            statistics: session.statistics(),
        });
    }

    fn emit(&self, event: AnalysisEvent) {
        if let Some(listener) = &self.listener {
            listener(&event);
        }
    }

    async fn pause(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

/// Side-to-move score of a finished game, without asking the engine.
fn terminal_score(board: &Board) -> Option<i32> {
    match board.status() {
        BoardStatus::Ongoing => None,
        BoardStatus::Stalemate => Some(0),
        BoardStatus::Checkmate => Some(Evaluation::Mate(0).to_centipawns()),
    }
}

fn white_relative(score: i32, side: Side) -> i32 {
    match side {
        Side::White => score,
        Side::Black => -score,
    }
}

/// Errors that concern the engine as a whole rather than one request.
fn is_fatal(err: &EngineError) -> bool {
    matches!(
        err,
        EngineError::NotReady | EngineError::BusyRejected | EngineError::Disconnected
    )
}

fn failure(index: usize, source: EngineError) -> AnalysisError {
    if is_fatal(&source) {
        AnalysisError::Engine(source)
    } else {
        AnalysisError::Failed { index, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn analyzer(perspective: ScorePerspective) -> GameAnalyzer {
        let config = AnalysisConfig {
            score_perspective: perspective,
            ..AnalysisConfig::default()
        };
        GameAnalyzer::new(EngineSession::new(EngineConfig::default()), config)
    }

    #[test]
    fn side_to_move_scores_pass_through() {
        let a = analyzer(ScorePerspective::SideToMove);
        assert_eq!(a.side_relative(-50, Side::White), -50);
        assert_eq!(a.side_relative(-50, Side::Black), -50);
    }

    #[test]
    fn white_scores_flip_for_black() {
        let a = analyzer(ScorePerspective::White);
        assert_eq!(a.side_relative(80, Side::White), 80);
        assert_eq!(a.side_relative(80, Side::Black), -80);
    }

    #[test]
    fn mover_lines_resort_after_flip() {
        let a = analyzer(ScorePerspective::White);
        let lines = vec![
            Candidate {
                mv: "e7e5".to_string(),
                score_cp: 40,
                mate: None,
                pv: vec!["e7e5".to_string()],
            },
            Candidate {
                mv: "c7c5".to_string(),
                score_cp: 10,
                mate: Some(7),
                pv: vec!["c7c5".to_string()],
            },
        ];
        let flipped = a.mover_lines(&lines, Side::Black);
        assert_eq!(flipped[0].mv, "c7c5");
        assert_eq!(flipped[0].score_cp, -10);
        assert_eq!(flipped[0].mate, Some(-7));
        assert_eq!(flipped[1].score_cp, -40);
    }

    #[test]
    fn terminal_positions_score_without_engine() {
        // fool's mate: White to move and mated
        let game = GameState::from_uci_moves(None, &["f2f3", "e7e5", "g2g4", "d8h4"]).unwrap();
        assert_eq!(terminal_score(game.current()), Some(-10_000));
        assert_eq!(terminal_score(&Board::default()), None);
    }

    #[test]
    fn fatal_errors_are_not_per_move_failures() {
        assert!(matches!(
            failure(3, EngineError::NotReady),
            AnalysisError::Engine(EngineError::NotReady)
        ));
        assert!(matches!(
            failure(3, EngineError::Timeout(Duration::from_secs(1))),
            AnalysisError::Failed { index: 3, .. }
        ));
    }

    #[tokio::test]
    async fn out_of_range_index_is_rejected() {
        let a = analyzer(ScorePerspective::SideToMove);
        let game = GameState::from_uci_moves(None, &["e2e4"]).unwrap();
        let session = GameSession::new(game, a.config());
        assert!(matches!(
            a.analyze_move(&session, 5).await,
            Err(AnalysisError::MoveOutOfRange { index: 5, len: 1 })
        ));
    }

    #[tokio::test]
    async fn unready_engine_fails_fast() {
        let a = analyzer(ScorePerspective::SideToMove);
        let game = GameState::from_uci_moves(None, &["e2e4", "e7e5"]).unwrap();
        let session = GameSession::new(game, a.config());
        assert!(matches!(
            a.analyze_all(&session).await,
            Err(AnalysisError::Engine(EngineError::NotReady))
        ));
        assert!(session.analysis(0).is_none());
    }
}
