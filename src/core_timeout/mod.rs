pub mod timeout;

pub use timeout::{TimeoutScheduler, TimerToken};
