//! Playback seam and an external-process implementation.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Placeholder replaced by the stream URI in player command arguments.
pub const URI_PLACEHOLDER: &str = "{uri}";

pub const DEFAULT_PLAYER_COMMAND: &[&str] = &["gst-play-1.0", URI_PLACEHOLDER];

pub trait Player: Send {
    /// Starts playing `uri`. Returns `false` when playback could not start.
    fn play(&mut self, uri: &str) -> bool;

    fn stop(&mut self);

    fn is_playing(&self) -> bool;

    /// End-of-stream notifications, one `()` per stream that ended on its own.
    ///
    /// Handed out once; players without such a signal return `None`.
    fn end_of_stream(&mut self) -> Option<mpsc::UnboundedReceiver<()>> {
        None
    }
}

struct RunningChild {
    stop: oneshot::Sender<()>,
    finished: Arc<AtomicBool>,
}

/// Plays streams by launching an external command, one child at a time.
///
/// The child exiting by itself counts as end of stream; a child killed by
/// [`stop`](Player::stop) does not.
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    running: Option<RunningChild>,
    /// Set once [`end_of_stream`](Player::end_of_stream) has been handed out;
    /// natural exits are only reported from then on.
    eos_tx: Option<mpsc::UnboundedSender<()>>,
}

impl CommandPlayer {
    /// `command[0]` is the program, the rest its arguments. `{uri}` in an
    /// argument is replaced by the stream URI; without any placeholder the
    /// URI is appended.
    pub fn new(command: Vec<String>) -> Self {
        let mut parts = command.into_iter();
        let (program, args) = match parts.next() {
            Some(program) => (program, parts.collect()),
            None => (
                DEFAULT_PLAYER_COMMAND[0].to_string(),
                DEFAULT_PLAYER_COMMAND[1..].iter().map(|s| s.to_string()).collect(),
            ),
        };
        Self {
            program,
            args,
            running: None,
            eos_tx: None,
        }
    }

    fn command_args(&self, uri: &str) -> Vec<String> {
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(URI_PLACEHOLDER, uri))
            .collect();
        if !self.args.iter().any(|arg| arg.contains(URI_PLACEHOLDER)) {
            args.push(uri.to_string());
        }
        args
    }
}

impl Default for CommandPlayer {
    fn default() -> Self {
        Self::new(DEFAULT_PLAYER_COMMAND.iter().map(|s| s.to_string()).collect())
    }
}

impl Player for CommandPlayer {
    fn play(&mut self, uri: &str) -> bool {
        self.stop();

        let spawned = Command::new(&self.program)
            .args(self.command_args(uri))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %self.program, error = %e, "cannot start player");
                return false;
            }
        };
        info!(program = %self.program, pid = ?child.id(), "player started");

        let (stop_tx, stop_rx) = oneshot::channel();
        let finished = Arc::new(AtomicBool::new(false));
        let watcher_finished = finished.clone();
        let eos_tx = self.eos_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    watcher_finished.store(true, Ordering::SeqCst);
                    debug!(?status, "player exited");
                    if let Some(eos_tx) = eos_tx {
                        let _ = eos_tx.send(());
                    }
                }
                // Explicit stop, or the player itself went away.
                _ = stop_rx => {
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "cannot kill player");
                    }
                    watcher_finished.store(true, Ordering::SeqCst);
                }
            }
        });

        self.running = Some(RunningChild {
            stop: stop_tx,
            finished,
        });
        true
    }

    fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop.send(());
            debug!("player stopped");
        }
    }

    fn is_playing(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.finished.load(Ordering::SeqCst))
    }

    fn end_of_stream(&mut self) -> Option<mpsc::UnboundedReceiver<()>> {
        if self.eos_tx.is_some() {
            return None;
        }
        let (eos_tx, eos_rx) = mpsc::unbounded_channel();
        self.eos_tx = Some(eos_tx);
        Some(eos_rx)
    }
}
