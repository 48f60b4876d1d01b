//! The value-producer seam between decorators and the vault.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors from value production (crate-local, not in opal-core).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProduceError {
    /// The producer does not know this raw expression.
    #[error("unknown expression: {0}")]
    UnknownExpression(String),

    /// Backend communication failure (network, timeout, etc.).
    #[error("backend error: {0}")]
    BackendError(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Produce typed values for raw expression texts.
///
/// This is the only contract the vault side has with value-producing
/// decorators (`@var`, `@env`, …): hand over the raw texts of one
/// resolution batch, get a value per raw back. Batching is the point —
/// a provider backed by a remote store can collect the whole batch into
/// a single round trip before the vault freezes anything.
///
/// Producers return cleartext; the values go straight into the vault
/// and nowhere else.
#[async_trait]
pub trait ValueProducer: Send + Sync {
    /// Produce a value for every raw text in the batch.
    async fn produce(&self, raws: &[String]) -> Result<HashMap<String, Value>, ProduceError>;
}

/// A fixed raw → value table. Handy for tests and literal-only plans.
#[async_trait]
impl ValueProducer for HashMap<String, Value> {
    async fn produce(&self, raws: &[String]) -> Result<HashMap<String, Value>, ProduceError> {
        let mut out = HashMap::new();
        for raw in raws {
            let value = self
                .get(raw)
                .ok_or_else(|| ProduceError::UnknownExpression(raw.clone()))?;
            out.insert(raw.clone(), value.clone());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn _assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn producer_is_object_safe_send_sync() {
        _assert_send_sync::<Box<dyn ValueProducer>>();
        _assert_send_sync::<Arc<dyn ValueProducer>>();
    }

    #[tokio::test]
    async fn map_producer_returns_known_values() {
        let mut table = HashMap::new();
        table.insert("@env.TOKEN".to_string(), json!("secret-value"));
        let out = table.produce(&["@env.TOKEN".to_string()]).await.unwrap();
        assert_eq!(out["@env.TOKEN"], json!("secret-value"));
    }

    #[tokio::test]
    async fn map_producer_rejects_unknown_raw() {
        let table: HashMap<String, Value> = HashMap::new();
        let err = table
            .produce(&["@env.MISSING".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ProduceError::UnknownExpression(_)));
    }

    #[test]
    fn produce_error_display_all_variants() {
        assert_eq!(
            ProduceError::UnknownExpression("@env.X".into()).to_string(),
            "unknown expression: @env.X"
        );
        assert_eq!(
            ProduceError::BackendError("timeout".into()).to_string(),
            "backend error: timeout"
        );
    }
}
