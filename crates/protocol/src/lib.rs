pub mod events;
pub mod facade;
pub mod messages;
pub mod transport;
pub mod watchdog;

pub use events::ProtocolEvent;
pub use facade::{ProtocolError, ProtocolFacade};
pub use messages::{ListenState, ListeningMode, OutboundMessage};
pub use transport::{InboundFrame, LoopbackTransport, Transport, TransportError};
pub use watchdog::{Watchdog, WatchdogState};
