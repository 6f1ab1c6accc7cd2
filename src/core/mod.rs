pub mod engine;
pub mod infer;
pub mod layer;
pub mod orchestrator;
pub mod writer;

pub use crate::domain::model::{ConfigLayer, ImportReport, ImportWarning, ShopVar, VarType};
pub use crate::domain::ports::{ConfigStore, ModuleCatalog};
pub use crate::utils::error::Result;
