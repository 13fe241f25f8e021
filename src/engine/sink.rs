//! Result handoff from the dispatcher to the action layer.
//!
//! Sinks run on the worker thread after each classification, in capture
//! order. They must not block for long: `CommandSink` spawns its process and
//! hands it to a reaper thread instead of waiting on it.

use std::collections::BTreeMap;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::analysis::classifier::MatchResult;
use crate::config::CaptureMode;

/// One classification emitted by a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationEvent {
    /// Per-session emission counter, starting at 0
    pub sequence: u64,
    pub mode: CaptureMode,
    pub result: MatchResult,
    /// False when the threshold policy reported "no match"
    pub accepted: bool,
    /// Milliseconds since the session started
    pub timestamp_ms: u64,
    /// Sequence number of the newest audio block in the window
    pub last_block: u64,
}

impl ClassificationEvent {
    /// Label to act on, if the match was accepted
    pub fn accepted_label(&self) -> Option<&str> {
        self.accepted.then_some(self.result.label.as_str())
    }
}

/// Receiver of classification events
pub trait ResultSink: Send {
    fn deliver(&mut self, event: &ClassificationEvent);
}

/// Logs every event at info level.
#[derive(Debug, Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn deliver(&mut self, event: &ClassificationEvent) {
        if event.accepted {
            tracing::info!(
                "[Result] #{} matched '{}' (distance {:.3})",
                event.sequence,
                event.result.label,
                event.result.distance
            );
        } else {
            tracing::info!(
                "[Result] #{} no match (nearest '{}' at {:.3})",
                event.sequence,
                event.result.label,
                event.result.distance
            );
        }
    }
}

/// Publishes events on a tokio broadcast channel.
pub struct BroadcastSink {
    tx: broadcast::Sender<ClassificationEvent>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<ClassificationEvent>) -> Self {
        Self { tx }
    }
}

impl ResultSink for BroadcastSink {
    fn deliver(&mut self, event: &ClassificationEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event.clone());
    }
}

/// Forwards events over a std channel.
pub struct ChannelSink {
    tx: mpsc::Sender<ClassificationEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ClassificationEvent>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end
    pub fn pair() -> (Self, mpsc::Receiver<ClassificationEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(tx), rx)
    }
}

impl ResultSink for ChannelSink {
    fn deliver(&mut self, event: &ClassificationEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Runs a shell command mapped from the accepted label.
///
/// Labels without a mapping and rejected matches are ignored. The command
/// gets `PHRASE_LABEL` and `PHRASE_DISTANCE` in its environment. Every
/// spawned process is waited on by a short-lived reaper thread, so finished
/// commands never linger as zombies on a long-running listener.
#[derive(Debug, Clone, Default)]
pub struct CommandSink {
    commands: BTreeMap<String, String>,
}

impl CommandSink {
    pub fn new(commands: BTreeMap<String, String>) -> Self {
        Self { commands }
    }

    pub fn command_for(&self, label: &str) -> Option<&str> {
        self.commands.get(label).map(String::as_str)
    }

    fn shell(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }

    fn reap(label: &str, command: &str, mut child: Child) {
        let pid = child.id();
        let label = label.to_string();
        let command = command.to_string();
        let reaper = thread::Builder::new()
            .name(format!("action-reaper-{pid}"))
            .spawn(move || match child.wait() {
                Ok(status) if status.success() => {
                    tracing::debug!("[Action] '{}' (pid {}) finished", label, pid);
                }
                Ok(status) => {
                    tracing::warn!("[Action] `{}` for '{}' exited with {}", command, label, status);
                }
                Err(err) => {
                    tracing::warn!("[Action] Failed to wait on pid {}: {}", pid, err);
                }
            });
        if let Err(err) = reaper {
            tracing::warn!("[Action] No reaper thread for pid {}: {}", pid, err);
        }
    }
}

impl ResultSink for CommandSink {
    fn deliver(&mut self, event: &ClassificationEvent) {
        let Some(label) = event.accepted_label() else {
            return;
        };
        let Some(command) = self.command_for(label) else {
            tracing::debug!("[Action] No command mapped for '{}'", label);
            return;
        };

        let spawned = Self::shell(command)
            .env("PHRASE_LABEL", label)
            .env("PHRASE_DISTANCE", format!("{:.4}", event.result.distance))
            .stdin(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => {
                tracing::info!("[Action] '{}' -> `{}` (pid {})", label, command, child.id());
                Self::reap(label, command, child);
            }
            Err(err) => {
                tracing::warn!("[Action] Failed to run `{}` for '{}': {}", command, label, err);
            }
        }
    }
}
