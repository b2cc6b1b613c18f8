//! Configuration types.
//!
//! - [`TraceOptions`]: how an instrumented client traces its calls
//! - [`CommandToggles`]: which commands open spans

mod commands;
mod trace_options;

pub use commands::CommandToggles;
pub use trace_options::{DEFAULT_INSTANCE_NAME, TraceOptions};
