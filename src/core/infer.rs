use crate::domain::model::VarType;
use serde_json::{Map, Value};

const BOOL_PREFIX: &str = "bl";

/// Decides the storage type of a variable and normalizes its value.
///
/// - associative mapping: empty → `List`, several entries → `AssocList`,
///   a single entry `{ "<type>": v }` → `Named(<type>)` with `v` as value
/// - any other sequence (including mappings keyed `"0".."n-1"`) → `List`
/// - scalars → `Bool` for `bl*` names, otherwise `Str`
pub fn infer(name: &str, raw: Value) -> (VarType, Value) {
    match raw {
        Value::Object(map) if is_dense_sequence(&map) => {
            (VarType::List, Value::Array(map.into_iter().map(|(_, v)| v).collect()))
        }
        Value::Object(map) => match map.len() {
            0 => (VarType::List, Value::Object(map)),
            1 => {
                let (type_name, inner) = map
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| (String::new(), Value::Null));
                (VarType::Named(type_name), inner)
            }
            _ => (VarType::AssocList, Value::Object(map)),
        },
        Value::Array(items) => (VarType::List, Value::Array(items)),
        scalar if name.starts_with(BOOL_PREFIX) => (VarType::Bool, scalar),
        scalar => (VarType::Str, scalar),
    }
}

/// Keys are exactly "0", "1", … in order. An empty map is not a sequence.
fn is_dense_sequence(map: &Map<String, Value>) -> bool {
    !map.is_empty()
        && map
            .keys()
            .enumerate()
            .all(|(i, key)| *key == i.to_string())
}
