pub mod event;
pub mod log;

pub use event::LiveEvent;
pub use log::{LogLevel, LogRecord};
