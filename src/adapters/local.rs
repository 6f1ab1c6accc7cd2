use crate::adapters::{is_module_disabled, DISABLED_MODULES_VAR};
use crate::config::format::FileFormat;
use crate::domain::model::{value_to_text, ModuleDescriptor, ModuleSetting, Namespace, ShopVar};
use crate::domain::ports::{ConfigStore, ModuleCatalog};
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const METADATA_FILES: [(&str, FileFormat); 3] = [
    ("metadata.json", FileFormat::Json),
    ("metadata.yaml", FileFormat::Yaml),
    ("metadata.yml", FileFormat::Yaml),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVar {
    #[serde(rename = "type")]
    pub var_type: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// Last activation of a module; re-activating the same version keeps the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationEntry {
    pub version: String,
    pub activated_at: DateTime<Utc>,
}

/// Persisted state of one shop, `<store>/<shop>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShopState {
    /// namespace ("" or "theme:<id>") → name → value
    #[serde(default)]
    pub vars: BTreeMap<String, BTreeMap<String, StoredVar>>,
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleState>,
    /// module id → last activation
    #[serde(default)]
    pub activations: BTreeMap<String, ActivationEntry>,
}

#[derive(Debug, Deserialize)]
struct ModuleMetadata {
    id: Option<String>,
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    settings: Vec<ModuleSetting>,
}

/// File-backed store: JSON state per shop plus module metadata read from the install directory.
#[derive(Debug, Clone)]
pub struct LocalShopStore {
    state_dir: PathBuf,
    modules_dir: PathBuf,
}

impl LocalShopStore {
    pub fn new(state_dir: impl Into<PathBuf>, modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            modules_dir: modules_dir.into(),
        }
    }

    fn state_path(&self, shop_id: &str) -> PathBuf {
        self.state_dir.join(format!("{}.json", shop_id))
    }

    pub fn load_state(&self, shop_id: &str) -> Result<ShopState> {
        let path = self.state_path(shop_id);
        if !path.exists() {
            return Ok(ShopState::default());
        }
        let data = fs::read(&path)?;
        serde_json::from_slice(&data).map_err(|e| {
            ImportError::decode("json", path.display().to_string(), e)
        })
    }

    fn save_state(&self, shop_id: &str, state: &ShopState) -> Result<()> {
        let path = self.state_path(shop_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(state)?)?;
        Ok(())
    }

    fn update_state<F>(&self, shop_id: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut ShopState),
    {
        let mut state = self.load_state(shop_id)?;
        update(&mut state);
        self.save_state(shop_id, &state)
            .map_err(|e| ImportError::store(shop_id, "state", e.to_string()))
    }

    fn with_shop_state(mut module: ModuleDescriptor, state: &ShopState) -> ModuleDescriptor {
        if let Some(module_state) = state.modules.get(&module.id) {
            if let Some(active) = module_state.active {
                module.active = active;
            }
            if module_state.path.is_some() {
                module.path = module_state.path.clone();
            }
        }
        module
    }
}

/// Reads `<dir>/<module>/metadata.{json,yaml,yml}`; the directory name is the fallback id.
pub fn scan_modules(modules_dir: &Path) -> Result<Vec<ModuleDescriptor>> {
    if !modules_dir.is_dir() {
        tracing::warn!("Module directory {} not found", modules_dir.display());
        return Ok(Vec::new());
    }

    let mut modules = Vec::new();
    for entry in fs::read_dir(modules_dir)? {
        let entry = entry?;
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }

        let Some((file, format)) = METADATA_FILES
            .iter()
            .map(|(name, format)| (dir.join(name), *format))
            .find(|(path, _)| path.is_file())
        else {
            continue;
        };

        let metadata: ModuleMetadata = serde_json::from_value(format.read_file(&file)?)
            .map_err(|e| ImportError::decode(format.extension(), file.display().to_string(), e))?;
        let dir_name = entry.file_name().to_string_lossy().to_string();

        modules.push(ModuleDescriptor {
            id: metadata.id.unwrap_or_else(|| dir_name.clone()),
            version: metadata.version.map(|v| value_to_text(&v)).unwrap_or_default(),
            active: false,
            path: Some(dir_name),
            settings: metadata.settings,
        });
    }

    modules.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(modules)
}

#[async_trait]
impl ConfigStore for LocalShopStore {
    async fn save_config_var(&self, var: &ShopVar) -> Result<()> {
        let namespace = var.namespace.to_string();
        let stored = StoredVar {
            var_type: var.var_type.code().to_string(),
            value: var.value.clone(),
        };
        self.update_state(&var.shop_id, |state| {
            state
                .vars
                .entry(namespace)
                .or_default()
                .insert(var.name.clone(), stored);
        })
    }
}

#[async_trait]
impl ModuleCatalog for LocalShopStore {
    async fn resolve(&self, shop_id: &str, module_id: &str) -> Result<Option<ModuleDescriptor>> {
        let state = self.load_state(shop_id)?;
        Ok(scan_modules(&self.modules_dir)?
            .into_iter()
            .find(|m| m.id == module_id)
            .map(|m| Self::with_shop_state(m, &state)))
    }

    async fn enumerate_installed(&self, shop_id: &str) -> Result<Vec<ModuleDescriptor>> {
        let state = self.load_state(shop_id)?;
        Ok(scan_modules(&self.modules_dir)?
            .into_iter()
            .map(|m| Self::with_shop_state(m, &state))
            .collect())
    }

    async fn set_config_param(
        &self,
        shop_id: &str,
        module_id: &str,
        name: &str,
        value: &Value,
    ) -> Result<()> {
        self.update_state(shop_id, |state| {
            state
                .modules
                .entry(module_id.to_string())
                .or_default()
                .settings
                .insert(name.to_string(), value.clone());
        })
    }

    async fn fix_state(&self, shop_id: &str, module: &ModuleDescriptor) -> Result<()> {
        self.update_state(shop_id, |state| {
            let disabled = state
                .vars
                .get(&Namespace::General.to_string())
                .and_then(|vars| vars.get(DISABLED_MODULES_VAR))
                .map(|v| &v.value);
            let active = !is_module_disabled(disabled, &module.id);

            let module_state = state.modules.entry(module.id.clone()).or_default();
            module_state.active = Some(active);
            module_state.path = module.path.clone();
        })
    }

    async fn activate(&self, shop_id: &str, module: &ModuleDescriptor) -> Result<()> {
        self.update_state(shop_id, |state| {
            let unchanged = state
                .activations
                .get(&module.id)
                .is_some_and(|entry| entry.version == module.version);
            if !unchanged {
                state.activations.insert(
                    module.id.clone(),
                    ActivationEntry {
                        version: module.version.clone(),
                        activated_at: Utc::now(),
                    },
                );
            }
        })
    }
}
