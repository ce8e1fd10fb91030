//! Top-level wiring: assembles one `Orchestrator` from `AppConfig`,
//! registers the built-in IoT things, and spawns the background loops that
//! feed the task serializer — the clock tick (watchdog recovery + alarm
//! fire + telemetry heartbeat), the audio loop, and the downlink receive
//! loop. Startup builds the state once, spawns a handful of
//! `tokio::select!` loops against one `watch::channel(false)` shutdown
//! signal, and returns a join handle per loop.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use kestrel_alarm::{AlarmScheduler, AlarmTable};
use kestrel_audio::{AudioPipeline, NullDecoder, NullEncoder, OpusDecoder};
use kestrel_config::AppConfig;
use kestrel_iot::{IotDispatcher, IotPolicy};
use kestrel_iot_things::{AlarmThing, Screen, Speaker, Telemetry};
use kestrel_orchestrator::{DeviceState, NullAssetPlayer, NullDisplay, NullWakeWord, Orchestrator};
use kestrel_protocol::{LoopbackTransport, ProtocolFacade, Transport, Watchdog};

use crate::task::{Task, TaskHandle, TaskSerializer};
use crate::telemetry::{self, TelemetrySource};

/// Everything a running instance owns: the orchestrator, the task handle
/// background loops submit through, and the shutdown switch.
pub struct App<T: Transport> {
    pub orchestrator: Arc<Orchestrator<T>>,
    pub tasks: TaskHandle,
    shutdown_tx: watch::Sender<bool>,
}

impl App<LoopbackTransport> {
    /// Builds an instance wired against the in-memory `LoopbackTransport`
    /// and no-op audio/display collaborators — the host simulator's
    /// configuration, and what every integration test in this crate uses.
    pub fn build_simulated(config: AppConfig) -> (Self, TaskSerializer<LoopbackTransport>) {
        let transport = LoopbackTransport::new(config.network.downlink_topic());
        Self::build(config, transport)
    }
}

impl<T: Transport + 'static> App<T> {
    pub fn build(config: AppConfig, transport: T) -> (Self, TaskSerializer<T>) {
        let watchdog = Watchdog::new(Duration::from_secs(10), Instant::now());
        let protocol = ProtocolFacade::new(transport, config.network.clone(), watchdog);

        let decoder_factory = Box::new(|rate, frame_ms| {
            Box::new(NullDecoder::new(rate, frame_ms)) as Box<dyn OpusDecoder>
        });
        let audio = AudioPipeline::new(
            Box::new(NullEncoder::default()),
            Box::new(NullDecoder::new(
                config.audio.default_decode_sample_rate_hz,
                config.audio.default_decode_frame_ms,
            )),
            decoder_factory,
        );

        let alarms = Arc::new(AlarmScheduler::new(AlarmTable::new(config.alarm.store_path.clone())));
        // Boot-time catch-up (spec §4.2): recurring alarms whose `next_fire`
        // fell in the past while the device was off are advanced to the next
        // future occurrence before anything else reads the table; overdue
        // `Once` alarms are swept separately since they have no "next" to
        // advance to.
        let tz = Tz::from_str(&config.alarm.timezone).unwrap_or(chrono_tz::UTC);
        let boot_now = Utc::now().with_timezone(&tz);
        alarms.catch_up(boot_now);
        alarms.clear_overdue(boot_now);

        let iot = IotDispatcher::new(IotPolicy::new(Vec::new()));
        iot.register(Box::new(Speaker::default()));
        iot.register(Box::new(Screen::default()));
        iot.register(Box::new(Telemetry::default()));
        iot.register(Box::new(AlarmThing::new(alarms.clone())));

        let orchestrator = Arc::new(Orchestrator::new(
            audio,
            protocol,
            alarms,
            iot,
            config.audio.clone(),
            config.preemption.clone(),
            Box::new(NullDisplay),
            Box::new(NullWakeWord),
            Box::new(NullAssetPlayer),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (serializer, tasks) = TaskSerializer::new(orchestrator.clone(), shutdown_rx);

        let app = Self { orchestrator, tasks, shutdown_tx };
        (app, serializer)
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator<T>> {
        self.orchestrator.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Spawns the clock tick, audio loop, downlink receive, and telemetry
    /// heartbeat loops. Returns their join handles so the caller can await
    /// them all at shutdown.
    pub fn spawn_background_loops(
        &self,
        config: AppConfig,
        telemetry_source: Arc<dyn TelemetrySource>,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        let tz = Tz::from_str(&config.alarm.timezone).unwrap_or(chrono_tz::UTC);

        handles.push(self.spawn_clock_tick(tz));
        handles.push(self.spawn_audio_loop(tz));
        handles.push(self.spawn_downlink_loop());
        handles.push(self.spawn_telemetry_heartbeat(config, telemetry_source));
        handles
    }

    fn spawn_clock_tick(&self, tz: Tz) -> JoinHandle<()> {
        let tasks = self.tasks.clone();
        let orchestrator = self.orchestrator.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = Utc::now().with_timezone(&tz);
                        tasks.submit(Task::OnAlarmTimerFired { now });
                        if orchestrator.protocol.should_attempt_recovery(Instant::now()) {
                            tasks.submit(Task::HandleProtocolTimeout);
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    fn spawn_audio_loop(&self, tz: Tz) -> JoinHandle<()> {
        let tasks = self.tasks.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(20));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = Utc::now().with_timezone(&tz);
                        tasks.submit(Task::AudioLoopTick { now, tick_instant: Instant::now() });
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    fn spawn_downlink_loop(&self) -> JoinHandle<()> {
        let tasks = self.tasks.clone();
        let orchestrator = self.orchestrator.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = orchestrator.protocol.recv_event(Instant::now()) => {
                        match event {
                            Ok(kestrel_protocol::ProtocolEvent::IncomingJson(payload)) => {
                                tasks.submit(Task::HandleDownlink { payload });
                            }
                            Ok(kestrel_protocol::ProtocolEvent::ChannelClosed { local: false }) => {
                                warn!("audio channel closed by remote");
                                // spec §4.4: an open -> closed edge observed while the
                                // device is mid-dialogue, with no local close request,
                                // is the silent timeout signal itself.
                                if matches!(
                                    orchestrator.state.current(),
                                    DeviceState::Connecting | DeviceState::Listening | DeviceState::Speaking
                                ) {
                                    tasks.submit(Task::HandleProtocolTimeout);
                                }
                            }
                            Ok(_) => {}
                            Err(err) => {
                                error!(%err, "transport receive failed");
                                orchestrator.errors.push(err.into());
                            }
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    fn spawn_telemetry_heartbeat(
        &self,
        config: AppConfig,
        source: Arc<dyn TelemetrySource>,
    ) -> JoinHandle<()> {
        let orchestrator = self.orchestrator.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval_secs = config.telemetry.heartbeat_interval_secs.max(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let iot_states = serde_json::from_str(&orchestrator.iot.get_states_json()).ok();
                        let payload = telemetry::build_payload(
                            &config.device,
                            &config.network.client_id,
                            Utc::now().timestamp(),
                            source.as_ref(),
                            iot_states,
                        );
                        if let Err(err) = orchestrator.protocol.send_uplink(&payload).await {
                            warn!(%err, "telemetry heartbeat failed to publish");
                            orchestrator.errors.push(err.into());
                        } else {
                            info!("telemetry heartbeat sent");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_simulated_starts_unknown_state() {
        let (app, serializer) = App::build_simulated(AppConfig::default());
        assert_eq!(app.orchestrator.state.current(), DeviceState::Unknown);
        app.shutdown();
        serializer.run().await;
    }

    #[tokio::test]
    async fn toggle_chat_task_drives_state_transition() {
        let (app, serializer) = App::build_simulated(AppConfig::default());
        let handle = tokio::spawn(serializer.run());
        app.tasks.submit(Task::ToggleChat);
        tokio::time::sleep(Duration::from_millis(50)).await;
        app.shutdown();
        let _ = handle.await;
    }
}
