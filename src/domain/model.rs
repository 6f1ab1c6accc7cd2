use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::utils::error::{ImportError, Result};

pub const GENERAL_SECTION: &str = "GeneralShopSettings";
pub const MODULE_SECTION: &str = "module";
pub const THEME_SECTION: &str = "theme";

/// Storage type tag of a shop variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    Bool,
    Str,
    List,
    AssocList,
    /// Type name taken from a single-key `{ "<type>": value }` wrapper.
    Named(String),
}

impl VarType {
    /// Type code understood by the store.
    pub fn code(&self) -> &str {
        match self {
            VarType::Bool => "bool",
            VarType::Str => "str",
            VarType::List => "arr",
            VarType::AssocList => "aarr",
            VarType::Named(name) => name,
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    General,
    Theme(String),
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::General => Ok(()),
            Namespace::Theme(id) => write!(f, "theme:{}", id),
        }
    }
}

/// One typed variable slot; (name, namespace, shop_id) identifies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopVar {
    pub name: String,
    pub var_type: VarType,
    pub value: Value,
    pub shop_id: String,
    pub namespace: Namespace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSetting {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub settings: Vec<ModuleSetting>,
}

impl ModuleDescriptor {
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            active: false,
            path: None,
            settings: Vec::new(),
        }
    }

    pub fn with_setting(mut self, name: &str, value: Value) -> Self {
        self.settings.push(ModuleSetting {
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn activated(mut self) -> Self {
        self.active = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Defaults,
    Base,
    Environment,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerKind::Defaults => "defaults",
            LayerKind::Base => "base",
            LayerKind::Environment => "environment",
        };
        f.write_str(name)
    }
}

/// A decoded configuration source. Missing or `null` sections are empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayer {
    pub kind: LayerKind,
    pub source: Option<String>,
    pub general: Map<String, Value>,
    pub modules: Map<String, Value>,
    pub themes: Map<String, Value>,
}

impl ConfigLayer {
    pub fn empty(kind: LayerKind) -> Self {
        Self {
            kind,
            source: None,
            general: Map::new(),
            modules: Map::new(),
            themes: Map::new(),
        }
    }

    pub fn from_value(kind: LayerKind, source: &str, value: Value) -> Result<Self> {
        let mut root = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ImportError::decode(
                    "layer",
                    source,
                    format!("expected a mapping at the top level, got {}", kind_of(&other)),
                ))
            }
        };

        let general = take_section(&mut root, GENERAL_SECTION, source)?;
        let modules = take_section(&mut root, MODULE_SECTION, source)?;
        let themes = take_section(&mut root, THEME_SECTION, source)?;

        Ok(Self {
            kind,
            source: Some(source.to_string()),
            general,
            modules,
            themes,
        })
    }
}

fn take_section(root: &mut Map<String, Value>, name: &str, source: &str) -> Result<Map<String, Value>> {
    match root.remove(name) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(ImportError::decode(
            "layer",
            source,
            format!("section {} must be a mapping, got {}", name, kind_of(&other)),
        )),
    }
}

/// Text form used for versions and joined override lists; strings are not quoted.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

/// Shop id → config file path relative to the config directory, in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    pub shops: Vec<(String, String)>,
}

impl Manifest {
    pub fn from_value(source: &str, value: Value) -> Result<Self> {
        let shops = match value.get("shops") {
            Some(Value::Object(map)) => map,
            _ => {
                return Err(ImportError::decode(
                    "manifest",
                    source,
                    "missing \"shops\" mapping",
                ))
            }
        };

        let mut entries = Vec::with_capacity(shops.len());
        for (shop_id, path) in shops {
            let path = match path {
                Value::String(path) => path.clone(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(ImportError::decode(
                        "manifest",
                        source,
                        format!("shop {} maps to {}, expected a file name", shop_id, kind_of(other)),
                    ))
                }
            };
            entries.push((shop_id.clone(), path));
        }

        Ok(Self { shops: entries })
    }
}

/// Non-fatal findings collected during an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportWarning {
    UnknownModule {
        shop_id: String,
        module_id: String,
    },
    VersionMismatch {
        shop_id: String,
        module_id: String,
        declared: String,
        current: String,
    },
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportWarning::UnknownModule { module_id, .. } => {
                write!(f, "{} does not exist - skipping", module_id)
            }
            ImportWarning::VersionMismatch {
                module_id,
                declared,
                current,
                ..
            } => write!(
                f,
                "{} version on export {} vs current version {}",
                module_id, declared, current
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedLayer {
    pub kind: LayerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub writes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShopReport {
    pub shop_id: String,
    pub layers: Vec<AppliedLayer>,
}

impl ShopReport {
    pub fn writes(&self) -> usize {
        self.layers.iter().map(|l| l.writes).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub environment: Option<String>,
    pub shops: Vec<ShopReport>,
    pub warnings: Vec<ImportWarning>,
}

impl ImportReport {
    pub fn new(environment: Option<String>) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            environment,
            shops: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn total_writes(&self) -> usize {
        self.shops.iter().map(ShopReport::writes).sum()
    }
}
