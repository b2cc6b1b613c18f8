//! Core types shared by the client and instrumentation layers.

mod command;
mod outcome;
mod value;

pub use command::Command;
pub use outcome::{CallOutcome, CallStatus};
pub use value::Value;
