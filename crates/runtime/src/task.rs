//! C8 Task Serializer: a single-consumer FIFO queue draining onto one
//! `Orchestrator` — one `Arc<...>` state, a `watch::channel(false)`
//! shutdown signal, and `tokio::select!` over "do the next unit of work"
//! vs. "shut down".
//!
//! `Task` is a closed enum of concrete orchestrator operations rather than
//! boxed closures: closures over a generic `Transport` borrow awkwardly
//! across an `mpsc` channel, and a closed enum is no less expressive for
//! the fixed operation set spec §8 actually calls for.

use std::sync::Arc;
use std::time::Instant;

use chrono::DateTime;
use chrono_tz::Tz;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use kestrel_orchestrator::{DeviceState, Orchestrator};
use kestrel_protocol::{ListeningMode, Transport};

pub enum Task {
    EnterState { to: DeviceState, mode: ListeningMode, button_wake_recent: bool },
    SendButtonWake,
    ToggleChat,
    StopListeningFast,
    HandleProtocolTimeout,
    AudioLoopTick { now: DateTime<Tz>, tick_instant: Instant },
    OnAlarmTimerFired { now: DateTime<Tz> },
    HandleDownlink { payload: Value },
    HandleRecognizedText { text: String },
}

impl Task {
    fn label(&self) -> &'static str {
        match self {
            Task::EnterState { .. } => "enter_state",
            Task::SendButtonWake => "send_button_wake",
            Task::ToggleChat => "toggle_chat",
            Task::StopListeningFast => "stop_listening_fast",
            Task::HandleProtocolTimeout => "handle_protocol_timeout",
            Task::AudioLoopTick { .. } => "audio_loop_tick",
            Task::OnAlarmTimerFired { .. } => "on_alarm_timer_fired",
            Task::HandleDownlink { .. } => "handle_downlink",
            Task::HandleRecognizedText { .. } => "handle_recognized_text",
        }
    }
}

/// Handle for submitting work onto the serializer's queue. Cheap to clone;
/// every background loop (clock tick, audio loop, downlink receiver) holds
/// one.
#[derive(Clone)]
pub struct TaskHandle {
    sender: mpsc::UnboundedSender<Task>,
}

impl TaskHandle {
    /// Enqueues a task. Silently dropped if the serializer has already shut
    /// down — callers don't treat a closed queue as an error this late in
    /// the shutdown sequence.
    pub fn submit(&self, task: Task) {
        if self.sender.send(task).is_err() {
            debug!("task dropped, serializer is shut down");
        }
    }
}

/// Owns the receiving half and drives tasks to completion one at a time
/// against a shared `Orchestrator`.
pub struct TaskSerializer<T: Transport> {
    orchestrator: Arc<Orchestrator<T>>,
    receiver: mpsc::UnboundedReceiver<Task>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<T: Transport> TaskSerializer<T> {
    pub fn new(
        orchestrator: Arc<Orchestrator<T>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, TaskHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { orchestrator, receiver, shutdown_rx }, TaskHandle { sender })
    }

    /// Runs until the queue closes or shutdown is signalled. Every task
    /// this loop dispatches completes before the next one starts, which is
    /// the whole point: no two `Orchestrator` methods ever run
    /// concurrently with each other.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        debug!("task serializer shutting down");
                        break;
                    }
                }
                maybe_task = self.receiver.recv() => {
                    match maybe_task {
                        Some(task) => self.dispatch(task).await,
                        None => break,
                    }
                }
            }
        }
    }

    async fn dispatch(&self, task: Task) {
        let label = task.label();
        debug!(task = label, "dispatching task");
        match task {
            Task::EnterState { to, mode, button_wake_recent } => {
                self.orchestrator.enter_state(to, mode, button_wake_recent).await;
            }
            Task::SendButtonWake => {
                self.orchestrator.send_button_wake().await;
            }
            Task::ToggleChat => {
                self.orchestrator.toggle_chat().await;
            }
            Task::StopListeningFast => {
                self.orchestrator.stop_listening_fast().await;
            }
            Task::HandleProtocolTimeout => {
                self.orchestrator.handle_protocol_timeout().await;
            }
            Task::AudioLoopTick { now, tick_instant } => {
                self.orchestrator.audio_loop_tick(now, tick_instant).await;
            }
            Task::OnAlarmTimerFired { now } => {
                self.orchestrator.on_alarm_timer_fired(now);
            }
            Task::HandleDownlink { payload } => {
                self.orchestrator.handle_downlink(&payload).await;
            }
            Task::HandleRecognizedText { text } => {
                self.orchestrator.handle_recognized_text(&text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_submit_after_shutdown_does_not_panic() {
        let (sender, receiver) = mpsc::unbounded_channel::<Task>();
        drop(receiver);
        let handle = TaskHandle { sender };
        handle.submit(Task::SendButtonWake);
    }
}
