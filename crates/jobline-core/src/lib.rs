//! `jobline-core`: identifiers, configuration and errors shared by the
//! jobline crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{JoblineConfig, SchedulerConfig};
pub use error::{JoblineError, Result};
pub use types::{JobId, PauseToken, SchedulerId};
