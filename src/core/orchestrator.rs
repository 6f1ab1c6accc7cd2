use crate::config::format::FileFormat;
use crate::core::layer::LayerMerger;
use crate::domain::model::{AppliedLayer, ConfigLayer, ImportWarning, LayerKind, ShopReport};
use crate::domain::ports::{ConfigStore, ModuleCatalog};
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// Runs the layer sequence {defaults, base, environment} for one shop.
pub struct ShopImporter<'a, S: ConfigStore, M: ModuleCatalog> {
    merger: LayerMerger<'a, S, M>,
    defaults: &'a ConfigLayer,
    format: FileFormat,
    config_dir: PathBuf,
    environment_dir: Option<PathBuf>,
}

impl<'a, S: ConfigStore, M: ModuleCatalog> ShopImporter<'a, S, M> {
    pub fn new(
        merger: LayerMerger<'a, S, M>,
        defaults: &'a ConfigLayer,
        format: FileFormat,
        config_dir: PathBuf,
        environment_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            merger,
            defaults,
            format,
            config_dir,
            environment_dir,
        }
    }

    pub async fn import_shop(
        &self,
        shop_id: &str,
        relative_path: &str,
        warnings: &mut Vec<ImportWarning>,
    ) -> Result<ShopReport> {
        let mut report = ShopReport {
            shop_id: shop_id.to_string(),
            layers: Vec::new(),
        };

        tracing::info!("Importing default config");
        // defaults are seeded once per shop; file layers only override
        let outcome = self.merger.apply_layer(self.defaults, shop_id, true).await?;
        warnings.extend(outcome.warnings);
        report.layers.push(AppliedLayer {
            kind: LayerKind::Defaults,
            source: self.defaults.source.clone(),
            writes: outcome.writes,
        });

        let base_file = self.config_dir.join(relative_path);
        report.layers.push(
            self.import_file(shop_id, LayerKind::Base, &base_file, warnings)
                .await?,
        );

        if let Some(environment_dir) = &self.environment_dir {
            let env_file = environment_dir.join(relative_path);
            report.layers.push(
                self.import_file(shop_id, LayerKind::Environment, &env_file, warnings)
                    .await?,
            );
        }

        Ok(report)
    }

    async fn import_file(
        &self,
        shop_id: &str,
        kind: LayerKind,
        path: &Path,
        warnings: &mut Vec<ImportWarning>,
    ) -> Result<AppliedLayer> {
        let source = path.display().to_string();
        let layer = ConfigLayer::from_value(kind, &source, self.format.read_file(path)?)?;

        tracing::info!("Importing shop config file {}", source);
        let outcome = self.merger.apply_layer(&layer, shop_id, false).await?;
        warnings.extend(outcome.warnings);

        Ok(AppliedLayer {
            kind,
            source: Some(source),
            writes: outcome.writes,
        })
    }
}
