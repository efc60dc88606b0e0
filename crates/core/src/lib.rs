#![forbid(unsafe_code)]

pub mod error;
pub mod model;
mod navigation;
mod recorder;
pub mod time;
pub mod timer;

pub use error::SessionError;
pub use time::Clock;
pub use timer::TimerState;
