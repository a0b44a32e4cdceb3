pub mod annotation;
pub mod command;
pub mod config;
pub mod error;
pub mod kernel;

pub use error::{Error, Result};
pub use kernel::reactor::Reactor;
pub use kernel::scheduler::{PlaybackScheduler, SchedulerHandle};
