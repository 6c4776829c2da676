pub mod config;
pub mod error;
pub mod types;

pub use config::RiseConfig;
pub use error::{Result, RiseError};
pub use types::*;
