//! Fetch tool supervision: command building, process control, output
//! classification, and outcome diagnosis.

mod classify;
mod command;
mod error_log;
mod lines;
mod outcome;
mod probe;
mod progress;
mod supervisor;

pub use classify::*;
pub use command::*;
pub use error_log::*;
pub use lines::*;
pub use outcome::*;
pub use probe::*;
pub use progress::*;
pub use supervisor::*;
