use crate::utils::error::{ImportError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::path::Path;

/// Text format shared by the manifest and every layer file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Yaml => "yaml",
        }
    }

    pub fn decode_str(&self, content: &str, source: &str) -> Result<Value> {
        match self {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ImportError::decode("json", source, e)),
            FileFormat::Yaml => {
                // 空檔案視為空設定
                if content.trim().is_empty() {
                    return Ok(Value::Null);
                }
                let yaml: serde_yaml::Value = serde_yaml::from_str(content)
                    .map_err(|e| ImportError::decode("yaml", source, e))?;
                Ok(yaml_to_json(yaml))
            }
        }
    }

    pub fn read_file(&self, path: &Path) -> Result<Value> {
        let content = std::fs::read_to_string(path).map_err(|source| ImportError::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Decoding {} as {}", path.display(), self);
        self.decode_str(&content, &path.display().to_string())
    }
}

impl TryFrom<String> for FileFormat {
    type Error = ImportError;

    fn try_from(value: String) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(FileFormat::Json),
            "yaml" | "yml" => Ok(FileFormat::Yaml),
            _ => Err(ImportError::UnsupportedFormatError(value)),
        }
    }
}

impl From<FileFormat> for String {
    fn from(format: FileFormat) -> Self {
        format.extension().to_string()
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// YAML mapping keys may be numbers or booleans; they become strings here.
fn yaml_to_json(yaml: serde_yaml::Value) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => Value::Array(seq.into_iter().map(yaml_to_json).collect()),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                map.insert(yaml_key(key), yaml_to_json(value));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => {
            let tagged = *tagged;
            yaml_to_json(tagged.value)
        }
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
