use crate::adapters::{is_module_disabled, DISABLED_MODULES_VAR};
use crate::domain::model::{ModuleDescriptor, Namespace, ShopVar, VarType};
use crate::domain::ports::{ConfigStore, ModuleCatalog};
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

/// Everything the import asked the store or catalog to do, in call order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    SaveVar(ShopVar),
    SetConfigParam {
        shop_id: String,
        module_id: String,
        name: String,
        value: Value,
    },
    FixState {
        shop_id: String,
        module_id: String,
    },
    Activate {
        shop_id: String,
        module_id: String,
    },
}

type VarKey = (String, String, String);

#[derive(Debug, Default)]
struct MemoryState {
    modules: BTreeMap<String, ModuleDescriptor>,
    vars: BTreeMap<VarKey, (VarType, Value)>,
    module_settings: BTreeMap<VarKey, Value>,
    active: BTreeMap<(String, String), bool>,
    failing_vars: BTreeSet<String>,
    events: Vec<StoreEvent>,
}

/// In-memory store and catalog. Used for dry runs and as a test double.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(self, module: ModuleDescriptor) -> Self {
        self.install(module);
        self
    }

    pub fn install(&self, module: ModuleDescriptor) {
        if let Ok(mut state) = self.state.lock() {
            state.modules.insert(module.id.clone(), module);
        }
    }

    /// Makes every later write of `name` fail, to exercise store errors.
    pub fn fail_writes_for(&self, name: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_vars.insert(name.to_string());
        }
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.state
            .lock()
            .map(|s| s.events.clone())
            .unwrap_or_default()
    }

    pub fn var(&self, shop_id: &str, namespace: &Namespace, name: &str) -> Option<(VarType, Value)> {
        let key = (shop_id.to_string(), namespace.to_string(), name.to_string());
        self.state.lock().ok()?.vars.get(&key).cloned()
    }

    pub fn var_count(&self) -> usize {
        self.state.lock().map(|s| s.vars.len()).unwrap_or(0)
    }

    pub fn module_setting(&self, shop_id: &str, module_id: &str, name: &str) -> Option<Value> {
        let key = (shop_id.to_string(), module_id.to_string(), name.to_string());
        self.state.lock().ok()?.module_settings.get(&key).cloned()
    }

    /// Stored vars and module settings; two runs over the same input must produce equal snapshots.
    pub fn snapshot(&self) -> (Vec<(VarKey, (VarType, Value))>, Vec<(VarKey, Value)>) {
        match self.state.lock() {
            Ok(state) => (
                state.vars.clone().into_iter().collect(),
                state.module_settings.clone().into_iter().collect(),
            ),
            Err(_) => (Vec::new(), Vec::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| ImportError::ConfigError {
            message: "memory store lock poisoned".to_string(),
        })
    }
}

impl MemoryState {
    fn descriptor_for(&self, shop_id: &str, module: &ModuleDescriptor) -> ModuleDescriptor {
        let mut module = module.clone();
        if let Some(active) = self.active.get(&(shop_id.to_string(), module.id.clone())) {
            module.active = *active;
        }
        module
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn save_config_var(&self, var: &ShopVar) -> Result<()> {
        let mut state = self.lock()?;
        if state.failing_vars.contains(&var.name) {
            return Err(ImportError::store(&var.shop_id, &var.name, "write rejected"));
        }
        let key = (var.shop_id.clone(), var.namespace.to_string(), var.name.clone());
        state
            .vars
            .insert(key, (var.var_type.clone(), var.value.clone()));
        state.events.push(StoreEvent::SaveVar(var.clone()));
        Ok(())
    }
}

#[async_trait]
impl ModuleCatalog for MemoryStore {
    async fn resolve(&self, shop_id: &str, module_id: &str) -> Result<Option<ModuleDescriptor>> {
        let state = self.lock()?;
        Ok(state
            .modules
            .get(module_id)
            .map(|m| state.descriptor_for(shop_id, m)))
    }

    async fn enumerate_installed(&self, shop_id: &str) -> Result<Vec<ModuleDescriptor>> {
        let state = self.lock()?;
        Ok(state
            .modules
            .values()
            .map(|m| state.descriptor_for(shop_id, m))
            .collect())
    }

    async fn set_config_param(
        &self,
        shop_id: &str,
        module_id: &str,
        name: &str,
        value: &Value,
    ) -> Result<()> {
        let mut state = self.lock()?;
        if state.failing_vars.contains(name) {
            return Err(ImportError::store(shop_id, name, "write rejected"));
        }
        let key = (shop_id.to_string(), module_id.to_string(), name.to_string());
        state.module_settings.insert(key, value.clone());
        state.events.push(StoreEvent::SetConfigParam {
            shop_id: shop_id.to_string(),
            module_id: module_id.to_string(),
            name: name.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    async fn fix_state(&self, shop_id: &str, module: &ModuleDescriptor) -> Result<()> {
        let mut state = self.lock()?;
        let disabled_key = (
            shop_id.to_string(),
            Namespace::General.to_string(),
            DISABLED_MODULES_VAR.to_string(),
        );
        let disabled = state.vars.get(&disabled_key).map(|(_, v)| v);
        let active = !is_module_disabled(disabled, &module.id);
        state
            .active
            .insert((shop_id.to_string(), module.id.clone()), active);
        state.events.push(StoreEvent::FixState {
            shop_id: shop_id.to_string(),
            module_id: module.id.clone(),
        });
        Ok(())
    }

    async fn activate(&self, shop_id: &str, module: &ModuleDescriptor) -> Result<()> {
        let mut state = self.lock()?;
        state.events.push(StoreEvent::Activate {
            shop_id: shop_id.to_string(),
            module_id: module.id.clone(),
        });
        Ok(())
    }
}
