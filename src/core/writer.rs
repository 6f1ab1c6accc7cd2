use crate::core::infer::infer;
use crate::domain::model::{Namespace, ShopVar};
use crate::domain::ports::ConfigStore;
use crate::utils::error::Result;
use serde_json::Value;

/// Writes typed shop vars for a single shop and counts them.
pub struct VariableWriter<'a, S: ConfigStore + ?Sized> {
    store: &'a S,
    shop_id: &'a str,
    writes: usize,
}

impl<'a, S: ConfigStore + ?Sized> VariableWriter<'a, S> {
    pub fn new(store: &'a S, shop_id: &'a str) -> Self {
        Self {
            store,
            shop_id,
            writes: 0,
        }
    }

    pub async fn write(&mut self, var: &ShopVar) -> Result<()> {
        tracing::debug!(
            "save {} [{}] ns='{}' shop={}",
            var.name,
            var.var_type,
            var.namespace,
            var.shop_id
        );
        self.store.save_config_var(var).await?;
        self.writes += 1;
        Ok(())
    }

    pub async fn write_inferred(&mut self, name: &str, raw: Value, namespace: &Namespace) -> Result<()> {
        let (var_type, value) = infer(name, raw);
        let var = ShopVar {
            name: name.to_string(),
            var_type,
            value,
            shop_id: self.shop_id.to_string(),
            namespace: namespace.clone(),
        };
        self.write(&var).await
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::domain::model::VarType;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_inferred_uses_namespace() {
        let store = MemoryStore::new();
        let mut writer = VariableWriter::new(&store, "1");

        writer
            .write_inferred("sColor", json!("red"), &Namespace::Theme("flow".into()))
            .await
            .unwrap();
        writer
            .write_inferred("blShow", json!(true), &Namespace::General)
            .await
            .unwrap();

        assert_eq!(writer.writes(), 2);
        assert_eq!(
            store.var("1", &Namespace::Theme("flow".into()), "sColor"),
            Some((VarType::Str, json!("red")))
        );
        assert!(store.var("1", &Namespace::General, "sColor").is_none());
        assert_eq!(
            store.var("1", &Namespace::General, "blShow"),
            Some((VarType::Bool, json!(true)))
        );
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = MemoryStore::new();
        store.fail_writes_for("sBroken");
        let mut writer = VariableWriter::new(&store, "1");

        let result = writer
            .write_inferred("sBroken", json!("x"), &Namespace::General)
            .await;
        assert!(result.is_err());
        assert_eq!(writer.writes(), 0);
    }
}
