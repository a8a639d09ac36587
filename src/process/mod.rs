//! Running helper programs (such as `df`) whose output feeds a source

mod command;
mod error;

pub use command::Command;
pub use error::{ProcessError, ProcessResult};
