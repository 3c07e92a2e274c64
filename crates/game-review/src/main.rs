//! Reviews a chess game with a UCI engine.
//!
//! Every move is classified (book, brilliant, best, ... blunder) and both
//! players get an accuracy score. Progress goes to stderr; the review goes
//! to stdout as text or JSON.

mod report;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chess_analysis::{
    AnalysisConfig, AnalysisEvent, EngineSession, GameAnalyzer, GameSession, GameState,
};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use report::Review;

#[derive(Parser)]
#[command(name = "game-review")]
#[command(about = "Classify the moves of a chess game with a UCI engine")]
struct Args {
    /// Configuration file (TOML); defaults apply when it does not exist
    #[arg(long, default_value = "game-review.toml")]
    config: PathBuf,

    /// Engine executable, overrides the configured path
    #[arg(long)]
    engine: Option<String>,

    /// Starting position, defaults to the standard one
    #[arg(long)]
    fen: Option<String>,

    /// Standard search depth, overrides the configured depth
    #[arg(long)]
    depth: Option<u32>,

    /// Print the review as JSON
    #[arg(long)]
    json: bool,

    /// Read whitespace-separated UCI moves from a file
    #[arg(long, conflicts_with = "moves")]
    moves_file: Option<PathBuf>,

    /// Moves in UCI notation, e.g. e2e4 e7e5 g1f3
    moves: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let config = load_config(&args)?;
    let moves = read_moves(&args)?;
    if moves.is_empty() {
        bail!("no moves given");
    }
    let game = GameState::from_uci_moves(args.fen.as_deref(), moves.as_slice())
        .context("invalid game")?;

    let engine = EngineSession::launch(config.engine.clone())
        .with_context(|| format!("failed to start engine '{}'", config.engine.path))?;
    engine
        .wait_ready()
        .await
        .context("engine did not complete the UCI handshake")?;
    info!(
        engine = engine.engine_name().as_deref().unwrap_or("unknown"),
        "engine started"
    );

    let session = Arc::new(GameSession::new(game, &config));
    let cancel = Arc::clone(&session);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing the current move");
            cancel.cancel_batch();
        }
    });

    let analyzer = GameAnalyzer::new(engine.clone(), config).with_listener(|event| {
        if let AnalysisEvent::Progress {
            index,
            fraction,
            analysis,
            ..
        } = event
        {
            eprintln!(
                "[{:>3.0}%] {} {}{} ({})",
                fraction * 100.0,
                report::move_number(*index, analysis.side),
                analysis.played_move,
                analysis.quality.symbol(),
                analysis.quality
            );
        }
    });

    let summary = analyzer.analyze_all(&session).await?;
    let review = Review::new(engine.engine_name(), summary, session.analyses());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&review)?);
    } else {
        print!("{}", review);
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = AnalysisConfig::load_or_default(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    if let Some(engine) = &args.engine {
        config.engine.path = engine.clone();
    }
    if let Some(depth) = args.depth {
        config.depths.standard = depth;
        config.depths.deep = config.depths.deep.max(depth);
    }
    Ok(config)
}

fn read_moves(args: &Args) -> Result<Vec<String>> {
    match &args.moves_file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(content.split_whitespace().map(str::to_string).collect())
        }
        None => Ok(args.moves.clone()),
    }
}
