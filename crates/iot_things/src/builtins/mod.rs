pub mod alarm_thing;
pub mod screen;
pub mod speaker;
pub mod telemetry;

pub use alarm_thing::AlarmThing;
pub use screen::Screen;
pub use speaker::Speaker;
pub use telemetry::Telemetry;
