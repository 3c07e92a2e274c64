//! Line-oriented I/O with the engine process.

use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::error::EngineError;

const CHANNEL_CAPACITY: usize = 256;

/// The two halves of an engine conversation: commands go out one line at a
/// time, output lines come back in order.
///
/// [`spawn`](Self::spawn) wires the halves to a child process. Anything
/// else that speaks UCI over channels (an in-process engine, a scripted test
/// double) can be plugged in with [`from_channels`](Self::from_channels).
pub struct EngineIo {
    pub(crate) commands: mpsc::Sender<String>,
    pub(crate) lines: mpsc::Receiver<String>,
    pub(crate) child: Option<Child>,
}

impl EngineIo {
    pub fn from_channels(commands: mpsc::Sender<String>, lines: mpsc::Receiver<String>) -> Self {
        Self {
            commands,
            lines,
            child: None,
        }
    }

    /// Spawns the engine executable. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `EngineError::NotFound` if the executable does not exist
    /// - `EngineError::SpawnError` if the process fails to start
    pub fn spawn(path: &str) -> Result<Self, EngineError> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => EngineError::NotFound(path.to_string()),
                _ => EngineError::SpawnError(err),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Protocol("engine stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Protocol("engine stdout unavailable".to_string()))?;

        let (commands, mut command_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (line_tx, lines) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(cmd) = command_rx.recv().await {
                if stdin.write_all(cmd.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.write_all(b"\n").await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if line_tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            commands,
            lines,
            child: Some(child),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_executable_is_not_found() {
        let result = EngineIo::spawn("/nonexistent/path/to/stockfish");
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }
}
