use crate::config::format::FileFormat;
use crate::utils::error::{ImportError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "modules-config.toml";
pub const MANIFEST_STEM: &str = "shops";

/// Importer settings, read once at start-up and passed down by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Base directory holding `shops.<type>` and the per-shop files.
    pub dir: String,
    #[serde(rename = "type")]
    pub format: FileFormat,
    /// Defaults layer, always YAML.
    pub defaults: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, EnvConfig>,
    #[serde(default, rename = "envFields")]
    pub env_fields: Vec<String>,
    #[serde(default, rename = "excludeFields")]
    pub exclude_fields: Vec<String>,
    #[serde(default, rename = "executeModuleActivationEvents")]
    pub execute_module_activation_events: bool,
    pub store: Option<StoreConfig>,
    pub modules: Option<ModulesConfig>,
    /// Directory of the file this was loaded from; relative paths resolve against it.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvConfig {
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    pub dir: String,
}

impl ImportConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ImportError::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ImportError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SHOP_CONFIG_DIR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ImportError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("dir", &self.dir)?;

        if let Some(defaults) = &self.defaults {
            validation::validate_path("defaults", defaults)?;
        }

        for (name, env) in &self.env {
            validation::validate_identifier("env", name)?;
            if let Some(dir) = &env.dir {
                validation::validate_path(&format!("env.{}.dir", name), dir)?;
            }
        }

        if let Some(store) = &self.store {
            validation::validate_path("store.path", &store.path)?;
        }
        if let Some(modules) = &self.modules {
            validation::validate_path("modules.dir", &modules.dir)?;
        }

        Ok(())
    }

    pub fn resolve_path(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn config_dir(&self) -> PathBuf {
        self.resolve_path(&self.dir)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.config_dir()
            .join(format!("{}.{}", MANIFEST_STEM, self.format.extension()))
    }

    pub fn defaults_path(&self) -> Option<PathBuf> {
        self.defaults.as_deref().map(|p| self.resolve_path(p))
    }

    /// `env.<name>.dir` when configured, otherwise `<dir>/<name>`.
    pub fn environment_dir(&self, env: &str) -> PathBuf {
        match self.env.get(env).and_then(|e| e.dir.as_deref()) {
            Some(dir) if !dir.is_empty() => self.resolve_path(dir),
            _ => self.config_dir().join(env),
        }
    }

    /// `excludeFields` plus `envFields`; loaded for completeness, the importer does not filter on them.
    pub fn excluded_fields(&self) -> Vec<String> {
        let mut fields = self.exclude_fields.clone();
        for field in &self.env_fields {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        fields
    }

    pub fn store_dir(&self) -> PathBuf {
        match &self.store {
            Some(store) => self.resolve_path(&store.path),
            None => self.config_dir().join(".store"),
        }
    }

    pub fn modules_dir(&self) -> PathBuf {
        match &self.modules {
            Some(modules) => self.resolve_path(&modules.dir),
            None => self.config_dir().join("modules"),
        }
    }
}

impl Validate for ImportConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
dir = "/srv/shop/config"
type = "yaml"
defaults = "/srv/shop/defaults.yaml"
executeModuleActivationEvents = true
envFields = ["sMailHost"]
excludeFields = ["aSerials", "sMailHost"]

[env.production]
dir = "/srv/shop/prod"

[env.develop]
"#;

    #[test]
    fn test_parse_basic_config() {
        let config = ImportConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.format, FileFormat::Yaml);
        assert!(config.execute_module_activation_events);
        assert_eq!(
            config.manifest_path(),
            PathBuf::from("/srv/shop/config/shops.yaml")
        );
        assert_eq!(
            config.environment_dir("production"),
            PathBuf::from("/srv/shop/prod")
        );
        assert_eq!(
            config.environment_dir("develop"),
            PathBuf::from("/srv/shop/config/develop")
        );
        assert_eq!(
            config.environment_dir("staging"),
            PathBuf::from("/srv/shop/config/staging")
        );
        assert_eq!(config.excluded_fields(), vec!["aSerials", "sMailHost"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_SHOP_CONFIG_DIR", "/tmp/shop-config");

        let config = ImportConfig::from_toml_str(
            r#"
dir = "${TEST_SHOP_CONFIG_DIR}"
type = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.dir, "/tmp/shop-config");
        assert!(!config.execute_module_activation_events);

        std::env::remove_var("TEST_SHOP_CONFIG_DIR");
    }

    #[test]
    fn test_unsupported_type_is_rejected() {
        let result = ImportConfig::from_toml_str(
            r#"
dir = "./config"
type = "xml"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation() {
        let config = ImportConfig::from_toml_str(
            r#"
dir = ""
type = "json"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_paths_resolve_against_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"dir = \"config\"\ntype = \"json\"\n[store]\npath = \"state\"\n")
            .unwrap();

        let config = ImportConfig::from_file(temp_file.path()).unwrap();
        let parent = temp_file.path().parent().unwrap();
        assert_eq!(config.config_dir(), parent.join("config"));
        assert_eq!(config.store_dir(), parent.join("state"));
        assert_eq!(config.modules_dir(), parent.join("config").join("modules"));
        assert_eq!(config.manifest_path(), parent.join("config").join("shops.json"));
    }
}
