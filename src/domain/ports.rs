use crate::domain::model::{ModuleDescriptor, ShopVar};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Per-shop key/value persistence. One call writes exactly one slot.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn save_config_var(&self, var: &ShopVar) -> Result<()>;
}

/// Installed extensions and their lifecycle hooks.
#[async_trait]
pub trait ModuleCatalog: Send + Sync {
    /// Stateless lookup; `None` when the id is unknown.
    async fn resolve(&self, shop_id: &str, module_id: &str) -> Result<Option<ModuleDescriptor>>;

    /// Scans the install directory, so modules never enabled before are included.
    async fn enumerate_installed(&self, shop_id: &str) -> Result<Vec<ModuleDescriptor>>;

    async fn set_config_param(
        &self,
        shop_id: &str,
        module_id: &str,
        name: &str,
        value: &Value,
    ) -> Result<()>;

    async fn fix_state(&self, shop_id: &str, module: &ModuleDescriptor) -> Result<()>;

    async fn activate(&self, shop_id: &str, module: &ModuleDescriptor) -> Result<()>;
}
