#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::{FlowsConfig, ResultsBackend, DEFAULT_CONFIG_PATH};
