//! Scripted in-process UCI engine for driving sessions in tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chess_analysis::{
    AnalysisConfig, EngineConfig, EngineIo, EngineSession, RetryPolicy, SessionState,
};
use chess_analysis::config::PacingConfig;
use tokio::sync::mpsc;
use uci::{EngineInfo, EngineMessage, GuiCommand, InfoBuilder};

pub const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// One `go` as seen by the fake engine.
#[derive(Debug, Clone)]
pub struct Search {
    pub fen: String,
    pub depth: u32,
    pub multipv: u32,
}

/// How the fake engine answers a `go`.
pub enum SearchReply {
    /// Writes the info lines, then `bestmove`.
    Answer {
        infos: Vec<EngineInfo>,
        best: Option<String>,
        delay: Duration,
    },
    /// Says nothing until `stop` arrives.
    Hang,
    /// Writes these lines verbatim.
    Raw(Vec<String>),
    /// Closes its output.
    Crash,
}

impl SearchReply {
    /// Single line with `best` scored `cp` at the requested depth.
    pub fn best(search: &Search, best: &str, cp: i32) -> Self {
        Self::lines(search, &[(best, cp)])
    }

    /// One multi-PV line per entry, first entry is the primary line.
    pub fn lines(search: &Search, lines: &[(&str, i32)]) -> Self {
        let infos = lines
            .iter()
            .take(search.multipv as usize)
            .enumerate()
            .map(|(i, (mv, cp))| {
                InfoBuilder::new()
                    .depth(search.depth)
                    .multipv(i as u32 + 1)
                    .score_cp(*cp)
                    .nodes(1_000)
                    .pv(&[*mv])
                    .build()
            })
            .collect();
        SearchReply::Answer {
            infos,
            best: lines.first().map(|(mv, _)| mv.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn after(self, delay: Duration) -> Self {
        match self {
            SearchReply::Answer { infos, best, .. } => SearchReply::Answer { infos, best, delay },
            other => other,
        }
    }
}

/// What the fake engine received.
#[derive(Clone, Default)]
pub struct FakeLog {
    commands: Arc<Mutex<Vec<String>>>,
    searches: Arc<Mutex<Vec<Search>>>,
    overlapped: Arc<AtomicBool>,
}

impl FakeLog {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn searches(&self) -> Vec<Search> {
        self.searches.lock().unwrap().clone()
    }

    pub fn search_count(&self) -> usize {
        self.searches.lock().unwrap().len()
    }

    /// A `go` arrived while an earlier search was still unanswered.
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

pub struct FakeEngine {
    /// Answer the `uci` handshake.
    pub handshake: bool,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self { handshake: true }
    }
}

impl FakeEngine {
    pub fn silent() -> Self {
        Self { handshake: false }
    }

    pub fn spawn<F>(self, mut script: F) -> (EngineIo, FakeLog)
    where
        F: FnMut(&Search) -> SearchReply + Send + 'static,
    {
        let (command_tx, mut commands) = mpsc::channel::<String>(64);
        let (out, line_rx) = mpsc::channel::<String>(64);
        let log = FakeLog::default();
        let recorder = log.clone();
        let handshake = self.handshake;

        tokio::spawn(async move {
            let mut fen = START.to_string();
            let mut multipv = 1;
            let mut searching = false;

            while let Some(line) = commands.recv().await {
                recorder.commands.lock().unwrap().push(line.clone());
                let Ok(command) = GuiCommand::parse(&line) else {
                    continue;
                };

                let mut output = Vec::new();
                match command {
                    GuiCommand::Uci if handshake => {
                        output.push(
                            EngineMessage::Id {
                                name: Some("FakeFish".to_string()),
                                author: None,
                            }
                            .to_uci(),
                        );
                        output.push(EngineMessage::UciOk.to_uci());
                    }
                    GuiCommand::IsReady => output.push(EngineMessage::ReadyOk.to_uci()),
                    GuiCommand::SetOption { name, value } if name == "MultiPV" => {
                        multipv = value.and_then(|v| v.parse().ok()).unwrap_or(1);
                    }
                    GuiCommand::Position { fen: Some(f), .. } => fen = f,
                    GuiCommand::Go(options) => {
                        if searching {
                            recorder.overlapped.store(true, Ordering::SeqCst);
                        }
                        let search = Search {
                            fen: fen.clone(),
                            depth: options.depth.unwrap_or(1),
                            multipv,
                        };
                        recorder.searches.lock().unwrap().push(search.clone());

                        match script(&search) {
                            SearchReply::Answer { infos, best, delay } => {
                                if !delay.is_zero() {
                                    tokio::time::sleep(delay).await;
                                }
                                output.extend(infos.iter().map(EngineInfo::to_uci));
                                output.push(
                                    EngineMessage::BestMove {
                                        mv: best,
                                        ponder: None,
                                    }
                                    .to_uci(),
                                );
                            }
                            SearchReply::Hang => searching = true,
                            SearchReply::Raw(lines) => output.extend(lines),
                            SearchReply::Crash => return,
                        }
                    }
                    GuiCommand::Stop if searching => {
                        searching = false;
                        output.push("bestmove e2e4".to_string());
                    }
                    GuiCommand::Quit => return,
                    _ => {}
                }

                for line in output {
                    if out.send(line).await.is_err() {
                        return;
                    }
                }
            }
        });

        (EngineIo::from_channels(command_tx, line_rx), log)
    }
}

/// Engine settings with short timeouts.
pub fn engine_config() -> EngineConfig {
    EngineConfig {
        init_timeout_ms: 1_000,
        request_timeout_ms: 1_000,
        ready_timeout_ms: 1_000,
        ..EngineConfig::default()
    }
}

/// Analysis settings without pauses and with a single immediate retry.
pub fn analysis_config() -> AnalysisConfig {
    let mut config = AnalysisConfig {
        engine: engine_config(),
        pacing: PacingConfig::none(),
        retry: RetryPolicy {
            retries: 1,
            delay_ms: 0,
            backoff: 1.0,
        },
        ..AnalysisConfig::default()
    };
    config.depths.quick = 4;
    config.depths.standard = 8;
    config.depths.deep = 12;
    config.depths.deep_timeout_ms = None;
    config
}

/// Starts a session on a fake engine and waits for the handshake.
pub async fn ready_session<F>(config: EngineConfig, script: F) -> (EngineSession, FakeLog)
where
    F: FnMut(&Search) -> SearchReply + Send + 'static,
{
    let (io, log) = FakeEngine::default().spawn(script);
    let session = EngineSession::new(config);
    session.start(io).unwrap();
    session.wait_ready().await.unwrap();
    (session, log)
}

/// Waits until the session reaches `state`.
pub async fn wait_for_state(session: &EngineSession, state: SessionState) {
    let mut states = session.subscribe();
    tokio::time::timeout(Duration::from_secs(2), async {
        while *states.borrow_and_update() != state {
            if states.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .expect("session never reached the expected state");
}
