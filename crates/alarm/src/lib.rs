pub mod model;
pub mod persistence;
pub mod recurrence;
pub mod scheduler;

pub use model::{Alarm, Repeat, MAX_NAME_LEN, STORE_CAPACITY};
pub use persistence::AlarmTable;
pub use scheduler::{AlarmError, AlarmScheduler};
