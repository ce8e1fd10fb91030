//! The Interaction Orchestrator core: C3 Audio Pipeline Controller glue,
//! C5 Downlink Handler, C6 Device State Machine, and C7 Alarm Pre-emption
//! Protocol, wired around the `kestrel-audio`/`kestrel-protocol`/
//! `kestrel-alarm`/`kestrel-iot` collaborator crates.

pub mod downlink;
pub mod error;
pub mod orchestrator;
pub mod peripherals;
pub mod preemption;
pub mod state;

pub use downlink::{DownlinkError, ParsedDownlink};
pub use error::{ErrorRing, OrchestratorError};
pub use orchestrator::Orchestrator;
pub use peripherals::{AssetPlayer, DisplaySink, NullAssetPlayer, NullDisplay, NullWakeWord, WakeWordSink};
pub use preemption::{PendingAlarm, PreemptionState};
pub use state::{DeviceState, StateMachine, StateTransitionError};
