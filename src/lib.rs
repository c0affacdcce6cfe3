pub mod cli;
pub mod config;
pub mod extractors;
pub mod interceptor;
pub mod models;
pub mod providers;
pub mod services;

pub mod env;
pub mod error;
pub mod logging;

pub use error::{ChatVaultError, Result};
pub use logging::{init_logging, LoggingConfig};
