//! Process-level helpers

pub mod host;
pub mod logging;

pub use self::host::local_hostname;
