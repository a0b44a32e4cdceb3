pub mod event;
pub mod reactor;
pub mod scheduler;
pub mod source;
pub mod time;
