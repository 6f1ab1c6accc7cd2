use crate::config::format::FileFormat;
use crate::config::import_config::ImportConfig;
use crate::core::layer::LayerMerger;
use crate::core::orchestrator::ShopImporter;
use crate::domain::model::{ConfigLayer, ImportReport, LayerKind, Manifest};
use crate::domain::ports::{ConfigStore, ModuleCatalog};
use crate::utils::error::{ImportError, Result};
use crate::utils::validation;
use std::path::PathBuf;

/// Top-level import run: every shop of the manifest, in manifest order.
pub struct ImportEngine<'a, S: ConfigStore, M: ModuleCatalog> {
    config: &'a ImportConfig,
    store: &'a S,
    catalog: &'a M,
    environment: Option<String>,
    shop_filter: Option<String>,
}

impl<'a, S: ConfigStore, M: ModuleCatalog> ImportEngine<'a, S, M> {
    pub fn new(config: &'a ImportConfig, store: &'a S, catalog: &'a M) -> Self {
        Self {
            config,
            store,
            catalog,
            environment: None,
            shop_filter: None,
        }
    }

    pub fn with_environment(mut self, environment: Option<&str>) -> Self {
        self.environment = environment.map(str::to_string);
        self
    }

    pub fn with_shop_filter(mut self, shop_id: Option<&str>) -> Self {
        self.shop_filter = shop_id.map(str::to_string);
        self
    }

    pub async fn run(&self) -> Result<ImportReport> {
        let mut report = ImportReport::new(self.environment.clone());

        // 所有致命檢查都在第一次寫入之前完成
        let defaults = self.load_defaults()?;
        let environment_dir = self.resolve_environment_dir()?;
        let manifest = self.load_manifest()?;
        let shops = self.select_shops(&manifest)?;

        let importer = ShopImporter::new(
            LayerMerger::new(
                self.store,
                self.catalog,
                self.config.execute_module_activation_events,
            ),
            &defaults,
            self.config.format,
            self.config.config_dir(),
            environment_dir,
        );

        for (shop_id, relative_path) in shops {
            tracing::info!("🏪 Importing shop {}", shop_id);
            let shop_report = importer
                .import_shop(shop_id, relative_path, &mut report.warnings)
                .await?;
            tracing::debug!("Shop {}: {} writes", shop_id, shop_report.writes());
            report.shops.push(shop_report);
        }

        report.finish();
        tracing::info!("done");
        Ok(report)
    }

    fn load_defaults(&self) -> Result<ConfigLayer> {
        match self.config.defaults_path() {
            Some(path) => {
                let value = FileFormat::Yaml.read_file(&path)?;
                ConfigLayer::from_value(LayerKind::Defaults, &path.display().to_string(), value)
            }
            None => {
                tracing::debug!("No defaults file configured, starting from an empty defaults layer");
                Ok(ConfigLayer::empty(LayerKind::Defaults))
            }
        }
    }

    fn resolve_environment_dir(&self) -> Result<Option<PathBuf>> {
        let Some(environment) = &self.environment else {
            return Ok(None);
        };

        let dir = self.config.environment_dir(environment);
        if std::fs::read_dir(&dir).is_err() {
            tracing::error!("There is no such {} config dir. stopping", dir.display());
            return Err(ImportError::EnvironmentDirUnreadable { path: dir });
        }
        Ok(Some(dir))
    }

    fn load_manifest(&self) -> Result<Manifest> {
        let path = self.config.manifest_path();
        let value = self.config.format.read_file(&path)?;
        Manifest::from_value(&path.display().to_string(), value)
    }

    fn select_shops<'m>(&self, manifest: &'m Manifest) -> Result<Vec<(&'m str, &'m str)>> {
        let shops: Vec<(&str, &str)> = manifest
            .shops
            .iter()
            .map(|(shop, path)| (shop.as_str(), path.as_str()))
            .filter(|(shop, _)| self.shop_filter.as_deref().map_or(true, |wanted| wanted == *shop))
            .collect();

        for (shop, _) in &shops {
            validation::validate_identifier("shops", shop)?;
        }

        if let Some(wanted) = &self.shop_filter {
            if shops.is_empty() {
                return Err(ImportError::ConfigError {
                    message: format!("shop {} is not listed in the manifest", wanted),
                });
            }
        }

        Ok(shops)
    }
}
