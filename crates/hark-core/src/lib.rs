pub mod config;
pub mod error;
pub mod types;

pub use config::HarkConfig;
pub use error::{ErrorKind, Result, SpeechError};
pub use types::*;
