//! Concrete IoT Things (spec §4.8 device surface): the built-in devices
//! every orchestrator instance registers with a `kestrel_iot::IotDispatcher`
//! at startup.

pub mod builtins;

pub use builtins::{AlarmThing, Screen, Speaker, Telemetry};
