//! Top-level runtime (C8 Task Serializer, spec §5): assembles one
//! `kestrel_orchestrator::Orchestrator` from config, spawns the background
//! loops that feed it, and serializes every call onto a single consumer —
//! the one piece of this crate's ancestry borrowed directly from the
//! teacher's `runtime::server`.

pub mod app;
pub mod task;
pub mod telemetry;

pub use app::App;
pub use kestrel_orchestrator::{ErrorRing, OrchestratorError};
pub use task::{Task, TaskHandle, TaskSerializer};
pub use telemetry::{BatteryReading, NullTelemetrySource, TelemetrySource};
