//! The engine session: one driver task owns the engine conversation and
//! services queued requests strictly one after another.

use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use uci::{EngineMessage, GoOptions, GuiCommand};

use super::{AnalysisRequest, AnalysisResult, EngineIo, SearchParser};
use crate::config::EngineConfig;
use crate::error::EngineError;

/// Lifecycle of an [`EngineSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No engine attached, or the engine was lost.
    Uninitialized,
    /// Handshake in progress; requests are queued.
    Initializing,
    /// Idle; the queue may still hold requests about to be picked up.
    Ready,
    /// Exactly one request in flight.
    Busy,
    /// A request timed out, was stopped or hit a protocol error; the engine
    /// is being resynchronized.
    Faulted,
}

/// What to do with a request that cannot run right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueuePolicy {
    /// Wait in line (FIFO).
    #[default]
    Queue,
    /// Fail with [`EngineError::BusyRejected`] unless the engine is idle.
    RejectIfBusy,
}

type Reply = oneshot::Sender<Result<AnalysisResult, EngineError>>;

struct Job {
    request: AnalysisRequest,
    reply: Reply,
}

struct Control {
    jobs: Option<mpsc::UnboundedSender<Job>>,
    stops: Option<mpsc::UnboundedSender<()>>,
    /// Submitted jobs the driver has not picked up yet.
    queued: usize,
    engine_name: Option<String>,
}

struct Shared {
    config: EngineConfig,
    state: watch::Sender<SessionState>,
    control: Mutex<Control>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to a serialized UCI engine. Cheap to clone; all clones talk to
/// the same engine.
///
/// ```no_run
/// use chess_analysis::{AnalysisRequest, EngineConfig, EngineSession};
///
/// # async fn run() -> Result<(), chess_analysis::EngineError> {
/// let engine = EngineSession::launch(EngineConfig::default())?;
/// engine.wait_ready().await?;
///
/// let start = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
/// let result = engine.analyze(AnalysisRequest::new(start, 12, 3)).await?;
/// println!("{:?} {}", result.best_move, result.score_cp);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EngineSession {
    shared: Arc<Shared>,
}

impl EngineSession {
    /// Creates an idle session with no engine attached.
    pub fn new(config: EngineConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            shared: Arc::new(Shared {
                config,
                state,
                control: Mutex::new(Control {
                    jobs: None,
                    stops: None,
                    queued: 0,
                    engine_name: None,
                }),
            }),
        }
    }

    /// Spawns the configured engine executable and starts the handshake.
    /// Must be called from within a tokio runtime.
    pub fn launch(config: EngineConfig) -> Result<Self, EngineError> {
        let io = EngineIo::spawn(&config.path)?;
        let session = Self::new(config);
        session.start(io)?;
        Ok(session)
    }

    /// Attaches an engine and starts the handshake in a driver task.
    ///
    /// A session that fell back to `Uninitialized` may be started again.
    pub fn start(&self, io: EngineIo) -> Result<(), EngineError> {
        let mut control = self.shared.lock();
        if control.jobs.is_some() {
            return Err(EngineError::AlreadyStarted);
        }

        let (job_tx, jobs) = mpsc::unbounded_channel();
        let (stop_tx, stops) = mpsc::unbounded_channel();
        control.jobs = Some(job_tx);
        control.stops = Some(stop_tx);
        control.queued = 0;
        self.shared.state.send_replace(SessionState::Initializing);
        drop(control);

        let driver = Driver {
            shared: Arc::downgrade(&self.shared),
            config: self.shared.config.clone(),
            commands: io.commands,
            lines: io.lines,
            _child: io.child,
            jobs,
            stops,
            multipv: 0,
        };
        tokio::spawn(driver.run());

        Ok(())
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Watches state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Name the engine reported during the handshake.
    pub fn engine_name(&self) -> Option<String> {
        self.shared.lock().engine_name.clone()
    }

    /// Resolves once the handshake completed. Fails with `NotReady` if the
    /// session is, or falls back to, `Uninitialized`.
    pub async fn wait_ready(&self) -> Result<(), EngineError> {
        let mut states = self.subscribe();
        loop {
            let state = *states.borrow_and_update();
            match state {
                SessionState::Uninitialized => return Err(EngineError::NotReady),
                SessionState::Initializing => {
                    if states.changed().await.is_err() {
                        return Err(EngineError::NotReady);
                    }
                }
                SessionState::Ready | SessionState::Busy | SessionState::Faulted => return Ok(()),
            }
        }
    }

    /// Analyzes a position, waiting in line behind earlier requests.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, EngineError> {
        self.analyze_with(request, QueuePolicy::Queue).await
    }

    pub async fn analyze_with(
        &self,
        request: AnalysisRequest,
        policy: QueuePolicy,
    ) -> Result<AnalysisResult, EngineError> {
        validate(&request)?;

        let (reply, response) = oneshot::channel();
        {
            let mut control = self.shared.lock();
            let state = *self.shared.state.borrow();
            if state == SessionState::Uninitialized {
                return Err(EngineError::NotReady);
            }
            if policy == QueuePolicy::RejectIfBusy
                && (state != SessionState::Ready || control.queued > 0)
            {
                return Err(EngineError::BusyRejected);
            }

            let jobs = control.jobs.as_ref().ok_or(EngineError::NotReady)?;
            jobs.send(Job { request, reply })
                .map_err(|_| EngineError::NotReady)?;
            control.queued += 1;
        }

        response.await.unwrap_or(Err(EngineError::NotReady))
    }

    /// Cancels the in-flight search, which fails with
    /// [`EngineError::Stopped`]. Has no effect on queued requests.
    pub fn stop(&self) {
        let control = self.shared.lock();
        if let Some(stops) = &control.stops {
            let _ = stops.send(());
        }
    }
}

fn validate(request: &AnalysisRequest) -> Result<(), EngineError> {
    if request.depth == 0 {
        return Err(EngineError::InvalidRequest("depth must be at least 1".to_string()));
    }
    if request.lines == 0 {
        return Err(EngineError::InvalidRequest(
            "line count must be at least 1".to_string(),
        ));
    }
    if chess::Board::from_str(&request.position).is_err() {
        return Err(EngineError::InvalidRequest(format!(
            "invalid FEN '{}'",
            request.position
        )));
    }
    Ok(())
}

/// Owns the engine conversation. Holds only a weak reference to the
/// session so that dropping every handle shuts the engine down.
struct Driver {
    shared: Weak<Shared>,
    config: EngineConfig,
    commands: mpsc::Sender<String>,
    lines: mpsc::Receiver<String>,
    _child: Option<Child>,
    jobs: mpsc::UnboundedReceiver<Job>,
    stops: mpsc::UnboundedReceiver<()>,
    /// `MultiPV` currently configured on the engine.
    multipv: u32,
}

impl Driver {
    async fn run(mut self) {
        if let Err(err) = self.initialize().await {
            warn!(error = %err, "engine initialization failed");
            self.shut_down();
            return;
        }
        self.set_state(SessionState::Ready);

        while let Some(job) = self.jobs.recv().await {
            if !self.begin() {
                break;
            }
            if job.reply.is_closed() {
                debug!("skipping request abandoned by its caller");
                self.set_state(SessionState::Ready);
                continue;
            }
            if !self.service(job).await {
                return;
            }
        }

        let _ = self.commands.send(GuiCommand::Quit.to_uci()).await;
        info!("engine session closed");
    }

    async fn initialize(&mut self) -> Result<(), EngineError> {
        let budget = self.config.init_timeout();
        tokio::time::timeout(budget, self.handshake())
            .await
            .map_err(|_| EngineError::Timeout(budget))?
    }

    async fn handshake(&mut self) -> Result<(), EngineError> {
        self.send(GuiCommand::Uci).await?;

        let mut name = None;
        loop {
            let line = self.next_line().await?;
            match EngineMessage::parse(&line) {
                Ok(EngineMessage::Id { name: Some(n), .. }) => name = Some(n),
                Ok(EngineMessage::UciOk) => break,
                _ => {}
            }
        }

        let config = self.config.clone();
        self.send(GuiCommand::set_option("Hash", config.hash_mb)).await?;
        self.send(GuiCommand::set_option("Threads", config.threads)).await?;
        if let Some(level) = config.skill_level {
            self.send(GuiCommand::set_option("Skill Level", level)).await?;
        }
        let multipv = config.multipv.max(1);
        self.send(GuiCommand::set_option("MultiPV", multipv)).await?;
        self.multipv = multipv;

        self.send(GuiCommand::IsReady).await?;
        self.wait_ready_ok().await?;

        info!(
            engine = name.as_deref().unwrap_or("unknown"),
            hash_mb = config.hash_mb,
            threads = config.threads,
            "engine ready"
        );
        if let Some(shared) = self.shared.upgrade() {
            shared.lock().engine_name = name;
        }
        Ok(())
    }

    /// Marks the dequeued job as in flight. False once every handle is gone.
    fn begin(&self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let mut control = shared.lock();
        control.queued = control.queued.saturating_sub(1);
        shared.state.send_replace(SessionState::Busy);
        true
    }

    /// Runs one job to completion. False when the engine was lost.
    async fn service(&mut self, job: Job) -> bool {
        // stop signals sent while idle must not cancel this search
        while self.stops.try_recv().is_ok() {}

        let request = job.request;
        let timeout = request
            .timeout
            .unwrap_or_else(|| self.config.request_timeout());
        debug!(
            fen = %request.position,
            depth = request.depth,
            lines = request.lines,
            "starting search"
        );

        match self.search(&request, timeout).await {
            Ok(result) => {
                let _ = job.reply.send(Ok(result));
                self.set_state(SessionState::Ready);
                true
            }
            Err(EngineError::Disconnected) => {
                warn!("engine output closed during search");
                let _ = job.reply.send(Err(EngineError::Disconnected));
                self.shut_down();
                false
            }
            Err(err) => {
                warn!(error = %err, fen = %request.position, "search failed, resynchronizing engine");
                self.set_state(SessionState::Faulted);
                let _ = job.reply.send(Err(err));

                match self.recover().await {
                    Ok(()) => {
                        self.set_state(SessionState::Ready);
                        true
                    }
                    Err(err) => {
                        warn!(error = %err, "engine did not resynchronize");
                        self.shut_down();
                        false
                    }
                }
            }
        }
    }

    async fn search(
        &mut self,
        request: &AnalysisRequest,
        timeout: Duration,
    ) -> Result<AnalysisResult, EngineError> {
        self.send(GuiCommand::Stop).await?;
        if request.lines != self.multipv {
            self.send(GuiCommand::set_option("MultiPV", request.lines))
                .await?;
            self.multipv = request.lines;
        }
        self.send(GuiCommand::position_fen(&request.position)).await?;
        self.send(GuiCommand::Go(GoOptions::depth(request.depth)))
            .await?;

        let deadline = Instant::now() + timeout;
        let mut parser = SearchParser::new(request.lines);

        loop {
            tokio::select! {
                Some(()) = self.stops.recv() => return Err(EngineError::Stopped),
                _ = sleep_until(deadline) => return Err(EngineError::Timeout(timeout)),
                line = self.lines.recv() => {
                    let line = line.ok_or(EngineError::Disconnected)?;
                    debug!(line = %line, "engine >>");
                    match EngineMessage::parse(&line) {
                        Ok(EngineMessage::Info(info)) => parser.observe(&info),
                        Ok(EngineMessage::BestMove { mv, .. }) => return Ok(parser.finish(mv)),
                        Ok(_) => {}
                        Err(err) => return Err(EngineError::Protocol(err.to_string())),
                    }
                }
            }
        }
    }

    /// Halts any search, forgets it, and discards output until the engine
    /// confirms it is in sync again.
    async fn recover(&mut self) -> Result<(), EngineError> {
        self.send(GuiCommand::Stop).await?;
        self.send(GuiCommand::UciNewGame).await?;
        self.send(GuiCommand::IsReady).await?;

        let budget = self.config.ready_timeout();
        tokio::time::timeout(budget, self.wait_ready_ok())
            .await
            .map_err(|_| EngineError::Timeout(budget))?
    }

    async fn wait_ready_ok(&mut self) -> Result<(), EngineError> {
        loop {
            let line = self.next_line().await?;
            if matches!(EngineMessage::parse(&line), Ok(EngineMessage::ReadyOk)) {
                return Ok(());
            }
        }
    }

    async fn next_line(&mut self) -> Result<String, EngineError> {
        let line = self.lines.recv().await.ok_or(EngineError::Disconnected)?;
        debug!(line = %line, "engine >>");
        Ok(line)
    }

    async fn send(&self, command: GuiCommand) -> Result<(), EngineError> {
        let line = command.to_uci();
        debug!(line = %line, "engine <<");
        self.commands
            .send(line)
            .await
            .map_err(|_| EngineError::Disconnected)
    }

    fn set_state(&self, state: SessionState) {
        if let Some(shared) = self.shared.upgrade() {
            let _control = shared.lock();
            shared.state.send_replace(state);
        }
    }

    /// Falls back to `Uninitialized` and fails everything still queued.
    fn shut_down(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            let mut control = shared.lock();
            control.jobs = None;
            control.stops = None;
            control.queued = 0;
            shared.state.send_replace(SessionState::Uninitialized);
        }

        self.jobs.close();
        let mut rejected = 0;
        while let Ok(job) = self.jobs.try_recv() {
            let _ = job.reply.send(Err(EngineError::NotReady));
            rejected += 1;
        }
        info!(rejected, "engine session uninitialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[tokio::test]
    async fn uninitialized_session_fails_fast() {
        let session = EngineSession::new(EngineConfig::default());
        let result = session.analyze(AnalysisRequest::new(START, 10, 1)).await;
        assert!(matches!(result, Err(EngineError::NotReady)));
        assert_eq!(session.shared.lock().queued, 0);
        assert!(matches!(session.wait_ready().await, Err(EngineError::NotReady)));
    }

    #[test]
    fn validation_rejects_bad_requests() {
        assert!(validate(&AnalysisRequest::new(START, 10, 1)).is_ok());
        assert!(matches!(
            validate(&AnalysisRequest::new(START, 0, 1)),
            Err(EngineError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate(&AnalysisRequest::new(START, 10, 0)),
            Err(EngineError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate(&AnalysisRequest::new("garbage", 10, 1)),
            Err(EngineError::InvalidRequest(_))
        ));
    }
}
