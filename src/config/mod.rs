#[cfg(feature = "cli")]
pub mod cli;
pub mod format;
pub mod import_config;

#[cfg(feature = "cli")]
pub use cli::CliArgs;
pub use format::FileFormat;
pub use import_config::{EnvConfig, ImportConfig, ModulesConfig, StoreConfig};
