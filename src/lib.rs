pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;

pub use adapters::{LocalShopStore, MemoryStore};
pub use config::{FileFormat, ImportConfig};
pub use crate::core::{engine::ImportEngine, infer::infer, layer::LayerMerger};
pub use utils::error::{ImportError, Result};
