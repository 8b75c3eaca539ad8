#![forbid(unsafe_code)]

pub mod calendar;
pub mod completion;
pub mod model;
pub mod time;

pub use completion::CompletionModel;
pub use time::Clock;
