//! Configuration for the boxrotate worker.
//!
//! Everything is environment-driven with a `BOXROTATE_` prefix so the worker
//! can run stateless on a scheduler. No global configuration state: the
//! loaded struct is handed to the components that need it.

mod config;
mod loader;

pub use config::*;
pub use loader::*;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("failed to load config: {0}")]
    LoadError(#[from] ::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
