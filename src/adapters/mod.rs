// Adapters layer: concrete ConfigStore / ModuleCatalog implementations.

pub mod local;
pub mod memory;

pub use local::LocalShopStore;
pub use memory::{MemoryStore, StoreEvent};

use serde_json::Value;

/// General shop var listing modules that must stay inactive.
pub const DISABLED_MODULES_VAR: &str = "aDisabledModules";

/// Accepts both the list form and a mapping whose values are module ids.
pub(crate) fn is_module_disabled(disabled: Option<&Value>, module_id: &str) -> bool {
    let matches = |v: &Value| v.as_str() == Some(module_id);
    match disabled {
        Some(Value::Array(items)) => items.iter().any(matches),
        Some(Value::Object(map)) => map.values().any(matches),
        Some(Value::String(s)) => s.split('&').any(|id| id == module_id),
        _ => false,
    }
}
