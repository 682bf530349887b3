//! Supervision of the external rendering process.
//!
//! The process is spawned once with its configured arguments. Its standard
//! output is scanned line by line for the readiness marker; every line is
//! forwarded to the log. There is no restart: an exit is final, and an exit
//! before readiness is a fatal startup error.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::errors::{MusicError, Result};

/// How to launch the rendering process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub executable: PathBuf,
    pub directory: PathBuf,
    /// Whitespace-separated argument string, passed through as-is.
    pub args: String,
    /// Regex matched against each output line.
    pub ready_marker: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendStatus {
    Starting,
    Ready,
    /// Exit code when the OS reported one.
    Exited(Option<i32>),
}

/// Handle on a running rendering process.
pub struct BackendProcess {
    pid: Option<u32>,
    status: watch::Receiver<BackendStatus>,
    kill: Mutex<Option<oneshot::Sender<()>>>,
}

impl BackendProcess {
    /// Spawns the process and the tasks watching it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &SupervisorConfig) -> Result<Self> {
        let marker = Regex::new(&config.ready_marker)
            .map_err(|e| MusicError::Config(format!("invalid ready marker: {}", e)))?;

        info!(
            executable = %config.executable.display(),
            directory = %config.directory.display(),
            args = %config.args,
            "starting rendering backend"
        );

        let mut child = Command::new(&config.executable)
            .args(config.args.split_whitespace())
            .current_dir(&config.directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MusicError::BackendSpawn(format!("{}: {}", config.executable.display(), e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MusicError::BackendSpawn("stdout was not captured".to_string()))?;
        let pid = child.id();

        let (status_tx, status_rx) = watch::channel(BackendStatus::Starting);
        let status_tx = Arc::new(status_tx);
        let (kill_tx, kill_rx) = oneshot::channel();

        tokio::spawn(scan_output(stdout, marker, Arc::clone(&status_tx)));
        tokio::spawn(watch_process(child, kill_rx, status_tx));

        Ok(Self {
            pid,
            status: status_rx,
            kill: Mutex::new(Some(kill_tx)),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn status(&self) -> BackendStatus {
        self.status.borrow().clone()
    }

    /// Parks until the readiness marker shows up or the process exits.
    ///
    /// No timer: the bound is the process's own exit.
    pub async fn wait_for_ready(&self) -> Result<()> {
        let mut status = self.status.clone();
        let settled = status
            .wait_for(|s| *s != BackendStatus::Starting)
            .await
            .map_err(|_| MusicError::BackendExited("supervisor stopped".to_string()))?
            .clone();

        match settled {
            BackendStatus::Ready => Ok(()),
            BackendStatus::Exited(code) => {
                error!(?code, "rendering backend exited before it was ready");
                Err(MusicError::BackendExited(format!(
                    "exited with code {:?} before reporting readiness",
                    code
                )))
            }
            BackendStatus::Starting => Err(MusicError::BackendExited(
                "readiness never settled".to_string(),
            )),
        }
    }

    /// Terminates the process and waits for its exit.
    pub async fn stop(&self) {
        let kill = self.kill.lock().unwrap().take();
        if let Some(kill) = kill {
            info!(pid = ?self.pid, "stopping rendering backend");
            let _ = kill.send(());
        }
        let mut status = self.status.clone();
        let _ = status
            .wait_for(|s| matches!(s, BackendStatus::Exited(_)))
            .await;
    }
}

async fn scan_output(stdout: ChildStdout, marker: Regex, status: Arc<watch::Sender<BackendStatus>>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(target: "biggs::backend", "{}", line);
                if marker.is_match(&line) {
                    status.send_if_modified(|s| {
                        if *s == BackendStatus::Starting {
                            info!("rendering backend is ready");
                            *s = BackendStatus::Ready;
                            true
                        } else {
                            false
                        }
                    });
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("cannot read backend output: {}", e);
                break;
            }
        }
    }
}

async fn watch_process(
    mut child: Child,
    kill: oneshot::Receiver<()>,
    status: Arc<watch::Sender<BackendStatus>>,
) {
    let mut requested = false;
    let exit = tokio::select! {
        result = child.wait() => result,
        _ = kill => {
            requested = true;
            if let Err(e) = child.kill().await {
                warn!("cannot kill rendering backend: {}", e);
            }
            child.wait().await
        }
    };

    let code = match exit {
        Ok(exit) => exit.code(),
        Err(e) => {
            warn!("cannot collect backend exit status: {}", e);
            None
        }
    };

    if requested {
        info!(?code, "rendering backend stopped");
    } else if *status.borrow() == BackendStatus::Ready {
        error!(?code, "rendering backend exited; every attached room is lost");
    }
    status.send_replace(BackendStatus::Exited(code));
}
