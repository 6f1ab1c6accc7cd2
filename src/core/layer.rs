use crate::core::writer::VariableWriter;
use crate::domain::model::{value_to_text, ConfigLayer, ImportWarning, Namespace};
use crate::domain::ports::{ConfigStore, ModuleCatalog};
use crate::utils::error::Result;
use serde_json::{Map, Value};

/// Extension point registrations: base class → ordered override classes.
pub const MODULES_VAR: &str = "aModules";
/// Module id → version recorded at export time. Never written directly.
pub const MODULE_VERSIONS_VAR: &str = "aModuleVersions";
pub const OVERRIDE_SEPARATOR: &str = "&";

#[derive(Debug, Default, Clone)]
pub struct LayerOutcome {
    pub writes: usize,
    pub warnings: Vec<ImportWarning>,
}

/// Applies one layer to one shop.
///
/// Step order is fixed: module defaults (optional), general settings,
/// module overrides, theme overrides, then version reconciliation.
pub struct LayerMerger<'a, S: ConfigStore, M: ModuleCatalog> {
    store: &'a S,
    catalog: &'a M,
    execute_activation_events: bool,
}

impl<'a, S: ConfigStore, M: ModuleCatalog> LayerMerger<'a, S, M> {
    pub fn new(store: &'a S, catalog: &'a M, execute_activation_events: bool) -> Self {
        Self {
            store,
            catalog,
            execute_activation_events,
        }
    }

    pub async fn apply_layer(
        &self,
        layer: &ConfigLayer,
        shop_id: &str,
        restore_defaults: bool,
    ) -> Result<LayerOutcome> {
        tracing::debug!("Applying {} layer to shop {}", layer.kind, shop_id);
        let mut outcome = LayerOutcome::default();
        let mut writer = VariableWriter::new(self.store, shop_id);

        // 必須在其他步驟之前：之後的 fix_state 可能停用模組
        if restore_defaults {
            outcome.writes += self.restore_module_defaults(shop_id).await?;
        }

        let versions = self.apply_general_settings(layer, &mut writer).await?;
        outcome.writes += self
            .apply_module_overrides(layer, shop_id, &mut outcome.warnings)
            .await?;
        self.apply_theme_overrides(layer, &mut writer).await?;
        self.reconcile_module_versions(&versions, shop_id, &mut outcome.warnings)
            .await?;

        outcome.writes += writer.writes();
        Ok(outcome)
    }

    async fn restore_module_defaults(&self, shop_id: &str) -> Result<usize> {
        let modules = self.catalog.enumerate_installed(shop_id).await?;
        tracing::debug!("Restoring defaults of {} installed modules", modules.len());

        let mut writes = 0;
        for module in &modules {
            for setting in &module.settings {
                self.catalog
                    .set_config_param(shop_id, &module.id, &setting.name, &setting.value)
                    .await?;
                writes += 1;
            }
        }
        Ok(writes)
    }

    /// Returns the captured `aModuleVersions` mapping.
    async fn apply_general_settings(
        &self,
        layer: &ConfigLayer,
        writer: &mut VariableWriter<'_, S>,
    ) -> Result<Map<String, Value>> {
        let mut versions = Map::new();

        for (name, value) in &layer.general {
            match name.as_str() {
                MODULE_VERSIONS_VAR => {
                    if let Value::Object(map) = value {
                        versions = map.clone();
                    }
                }
                MODULES_VAR => {
                    writer
                        .write_inferred(name, flatten_extensions(value.clone()), &Namespace::General)
                        .await?;
                }
                _ => {
                    writer
                        .write_inferred(name, value.clone(), &Namespace::General)
                        .await?;
                }
            }
        }

        Ok(versions)
    }

    /// Module settings go straight to the module's own config, without type inference.
    async fn apply_module_overrides(
        &self,
        layer: &ConfigLayer,
        shop_id: &str,
        warnings: &mut Vec<ImportWarning>,
    ) -> Result<usize> {
        let mut writes = 0;

        for (module_id, settings) in &layer.modules {
            let Some(module) = self.catalog.resolve(shop_id, module_id).await? else {
                warnings.push(unknown_module(shop_id, module_id));
                continue;
            };
            let Value::Object(settings) = settings else {
                if !settings.is_null() {
                    tracing::debug!("Skipping non-mapping settings of module {}", module.id);
                }
                continue;
            };

            for (name, value) in settings {
                self.catalog
                    .set_config_param(shop_id, &module.id, name, value)
                    .await?;
                writes += 1;
            }
        }

        Ok(writes)
    }

    async fn apply_theme_overrides(
        &self,
        layer: &ConfigLayer,
        writer: &mut VariableWriter<'_, S>,
    ) -> Result<()> {
        for (theme_id, settings) in &layer.themes {
            let Value::Object(settings) = settings else {
                continue;
            };
            let namespace = Namespace::Theme(theme_id.clone());
            for (name, value) in settings {
                writer.write_inferred(name, value.clone(), &namespace).await?;
            }
        }
        Ok(())
    }

    async fn reconcile_module_versions(
        &self,
        versions: &Map<String, Value>,
        shop_id: &str,
        warnings: &mut Vec<ImportWarning>,
    ) -> Result<()> {
        for (module_id, declared) in versions {
            let Some(module) = self.catalog.resolve(shop_id, module_id).await? else {
                warnings.push(unknown_module(shop_id, module_id));
                continue;
            };

            self.catalog.fix_state(shop_id, &module).await?;

            if self.execute_activation_events {
                // the state fix may have switched the module on or off
                let module = self
                    .catalog
                    .resolve(shop_id, module_id)
                    .await?
                    .unwrap_or_else(|| module.clone());
                if module.active {
                    tracing::debug!("Running activation events of {}", module.id);
                    self.catalog.activate(shop_id, &module).await?;
                }
            }

            let declared = value_to_text(declared);
            if !versions_match(&declared, &module.version) {
                let warning = ImportWarning::VersionMismatch {
                    shop_id: shop_id.to_string(),
                    module_id: module_id.clone(),
                    declared,
                    current: module.version.clone(),
                };
                tracing::warn!("⚠️ {}", warning);
                warnings.push(warning);
            }
        }
        Ok(())
    }
}

/// Numeric versions ("1.10" from YAML becomes 1.1) compare by value, everything else by text.
fn versions_match(declared: &str, current: &str) -> bool {
    if declared == current {
        return true;
    }
    match (declared.trim().parse::<f64>(), current.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn unknown_module(shop_id: &str, module_id: &str) -> ImportWarning {
    let warning = ImportWarning::UnknownModule {
        shop_id: shop_id.to_string(),
        module_id: module_id.to_string(),
    };
    tracing::warn!("⚠️ {}", warning);
    warning
}

/// Joins each override list with `&` so the first entry keeps precedence.
fn flatten_extensions(value: Value) -> Value {
    let Value::Object(map) = value else {
        return value;
    };

    let flattened = map
        .into_iter()
        .map(|(base_class, overrides)| {
            let joined = match overrides {
                Value::Array(classes) => Value::String(
                    classes
                        .iter()
                        .map(value_to_text)
                        .collect::<Vec<_>>()
                        .join(OVERRIDE_SEPARATOR),
                ),
                other => other,
            };
            (base_class, joined)
        })
        .collect();

    Value::Object(flattened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryStore, StoreEvent};
    use crate::config::format::FileFormat;
    use crate::domain::model::{LayerKind, ModuleDescriptor, VarType};
    use serde_json::json;

    fn layer(value: Value) -> ConfigLayer {
        ConfigLayer::from_value(LayerKind::Base, "test.json", value).unwrap()
    }

    #[test]
    fn test_flatten_extensions() {
        assert_eq!(
            flatten_extensions(json!({"oxorder": ["a/b/order", "c/d/order"], "oxbasket": "x/basket"})),
            json!({"oxorder": "a/b/order&c/d/order", "oxbasket": "x/basket"})
        );
        assert_eq!(flatten_extensions(json!([])), json!([]));
    }

    #[test]
    fn test_versions_match() {
        assert!(versions_match("2.1.0", "2.1.0"));
        assert!(versions_match("1.1", "1.10"));
        assert!(versions_match("2", "2.0"));
        assert!(!versions_match("2.1.0", "2.2.0"));
        assert!(!versions_match("1.1", "1.1.0"));
    }

    #[tokio::test]
    async fn test_numeric_yaml_version_does_not_warn() {
        let store = MemoryStore::new().with_module(ModuleDescriptor::new("oepaypal", "1.10"));
        let merger = LayerMerger::new(&store, &store, false);
        let value = FileFormat::Yaml
            .decode_str("GeneralShopSettings:\n  aModuleVersions:\n    oepaypal: 1.10\n", "shop1.yaml")
            .unwrap();
        let layer = layer(value);

        let outcome = merger.apply_layer(&layer, "1", false).await.unwrap();

        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_general_and_theme_settings() {
        let store = MemoryStore::new();
        let merger = LayerMerger::new(&store, &store, false);
        let layer = layer(json!({
            "GeneralShopSettings": {"sShopName": "Demo", "blShowTags": false},
            "theme": {"flow": {"sLogo": "logo.png"}, "azure": null}
        }));

        let outcome = merger.apply_layer(&layer, "1", false).await.unwrap();

        assert_eq!(outcome.writes, 3);
        assert!(outcome.warnings.is_empty());
        assert_eq!(
            store.var("1", &Namespace::General, "blShowTags"),
            Some((VarType::Bool, json!(false)))
        );
        assert_eq!(
            store.var("1", &Namespace::Theme("flow".into()), "sLogo"),
            Some((VarType::Str, json!("logo.png")))
        );
    }

    #[tokio::test]
    async fn test_modules_var_is_flattened_before_inference() {
        let store = MemoryStore::new();
        let merger = LayerMerger::new(&store, &store, false);
        let layer = layer(json!({
            "GeneralShopSettings": {"aModules": {"BaseClass": ["OverrideA", "OverrideB"]}}
        }));

        merger.apply_layer(&layer, "1", false).await.unwrap();

        // a single base class is a one-key mapping, so the key becomes the type tag
        assert_eq!(
            store.var("1", &Namespace::General, MODULES_VAR),
            Some((VarType::Named("BaseClass".into()), json!("OverrideA&OverrideB")))
        );
    }

    #[tokio::test]
    async fn test_multiple_extensions_stay_assoc() {
        let store = MemoryStore::new();
        let merger = LayerMerger::new(&store, &store, false);
        let layer = layer(json!({
            "GeneralShopSettings": {"aModules": {"oxorder": ["a", "b"], "oxbasket": ["c"]}}
        }));

        merger.apply_layer(&layer, "1", false).await.unwrap();

        assert_eq!(
            store.var("1", &Namespace::General, MODULES_VAR),
            Some((VarType::AssocList, json!({"oxorder": "a&b", "oxbasket": "c"})))
        );
    }

    #[tokio::test]
    async fn test_unknown_module_is_skipped_with_warning() {
        let store = MemoryStore::new().with_module(ModuleDescriptor::new("oepaypal", "2.0"));
        let merger = LayerMerger::new(&store, &store, false);
        let layer = layer(json!({
            "GeneralShopSettings": {"sShopName": "Demo"},
            "module": {
                "ghost": {"sKey": "x"},
                "oepaypal": {"blSandbox": true, "aCountries": ["DE"]}
            }
        }));

        let outcome = merger.apply_layer(&layer, "1", false).await.unwrap();

        assert_eq!(
            outcome.warnings,
            vec![ImportWarning::UnknownModule {
                shop_id: "1".into(),
                module_id: "ghost".into()
            }]
        );
        assert_eq!(store.module_setting("1", "oepaypal", "blSandbox"), Some(json!(true)));
        assert_eq!(
            store.module_setting("1", "oepaypal", "aCountries"),
            Some(json!(["DE"]))
        );
        assert!(store.module_setting("1", "ghost", "sKey").is_none());
        assert!(store.var("1", &Namespace::General, "sShopName").is_some());
    }

    #[tokio::test]
    async fn test_scalar_module_entries_do_not_stop_layer() {
        let store = MemoryStore::new()
            .with_module(ModuleDescriptor::new("oepaypal", "2.0"))
            .with_module(ModuleDescriptor::new("ddoe", "1.0"));
        let merger = LayerMerger::new(&store, &store, false);
        let layer = layer(json!({
            "GeneralShopSettings": {"sA": "1"},
            "module": {
                "ghost": "legacy",
                "ddoe": "on",
                "oepaypal": {"blSandbox": false}
            },
            "theme": {"flow": 7}
        }));

        let outcome = merger.apply_layer(&layer, "1", false).await.unwrap();

        assert_eq!(
            outcome.warnings,
            vec![ImportWarning::UnknownModule {
                shop_id: "1".into(),
                module_id: "ghost".into()
            }]
        );
        assert_eq!(outcome.writes, 2);
        assert_eq!(
            store.var("1", &Namespace::General, "sA"),
            Some((VarType::Str, json!("1")))
        );
        assert_eq!(store.module_setting("1", "oepaypal", "blSandbox"), Some(json!(false)));
        assert!(store.module_setting("1", "ddoe", "on").is_none());
    }

    #[tokio::test]
    async fn test_restore_defaults_runs_first() {
        let store = MemoryStore::new()
            .with_module(ModuleDescriptor::new("oepaypal", "2.0").with_setting("blSandbox", json!(true)))
            .with_module(ModuleDescriptor::new("ddoe", "1.0").with_setting("sMode", json!("test")));
        let merger = LayerMerger::new(&store, &store, false);
        let layer = layer(json!({"GeneralShopSettings": {"sShopName": "Demo"}}));

        merger.apply_layer(&layer, "1", true).await.unwrap();

        let events = store.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], StoreEvent::SetConfigParam { .. }));
        assert!(matches!(events[1], StoreEvent::SetConfigParam { .. }));
        assert!(matches!(&events[2], StoreEvent::SaveVar(v) if v.name == "sShopName"));
    }

    #[tokio::test]
    async fn test_versions_fix_state_and_activation() {
        let store = MemoryStore::new()
            .with_module(ModuleDescriptor::new("oepaypal", "2.0").activated())
            .with_module(ModuleDescriptor::new("ddoe", "1.0"));
        let merger = LayerMerger::new(&store, &store, true);
        let layer = layer(json!({
            "GeneralShopSettings": {
                "aDisabledModules": ["ddoe"],
                "aModuleVersions": {"oepaypal": "1.9", "ddoe": "1.0", "ghost": "0.1"}
            }
        }));

        let outcome = merger.apply_layer(&layer, "1", false).await.unwrap();

        // aModuleVersions itself is never stored
        assert!(store.var("1", &Namespace::General, MODULE_VERSIONS_VAR).is_none());

        let events = store.events();
        let fixed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                StoreEvent::FixState { module_id, .. } => Some(module_id.as_str()),
                _ => None,
            })
            .collect();
        let activated: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                StoreEvent::Activate { module_id, .. } => Some(module_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(fixed, vec!["oepaypal", "ddoe"]);
        assert_eq!(activated, vec!["oepaypal"]);

        assert_eq!(outcome.warnings.len(), 2);
        assert!(matches!(
            &outcome.warnings[0],
            ImportWarning::VersionMismatch { module_id, declared, current, .. }
                if module_id == "oepaypal" && declared == "1.9" && current == "2.0"
        ));
        assert!(matches!(
            &outcome.warnings[1],
            ImportWarning::UnknownModule { module_id, .. } if module_id == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_activation_disabled_by_config() {
        let store = MemoryStore::new().with_module(ModuleDescriptor::new("oepaypal", "2.0").activated());
        let merger = LayerMerger::new(&store, &store, false);
        let layer = layer(json!({
            "GeneralShopSettings": {"aModuleVersions": {"oepaypal": "2.0"}}
        }));

        let outcome = merger.apply_layer(&layer, "1", false).await.unwrap();

        assert!(outcome.warnings.is_empty());
        assert!(store
            .events()
            .iter()
            .all(|e| !matches!(e, StoreEvent::Activate { .. })));
        assert!(store
            .events()
            .iter()
            .any(|e| matches!(e, StoreEvent::FixState { .. })));
    }

    #[tokio::test]
    async fn test_store_failure_aborts_layer() {
        let store = MemoryStore::new();
        store.fail_writes_for("sBroken");
        let merger = LayerMerger::new(&store, &store, false);
        let layer = layer(json!({
            "GeneralShopSettings": {"sBroken": "x", "sAfter": "y"}
        }));

        assert!(merger.apply_layer(&layer, "1", false).await.is_err());
        assert!(store.var("1", &Namespace::General, "sAfter").is_none());
    }
}
