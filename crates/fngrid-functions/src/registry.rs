//! Function registry.
//!
//! Maps function names to handler callbacks. Handlers are registered at
//! startup (built-ins) or at runtime through [`FunctionRegistry::register`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Decoded query parameters of a call.
pub type Query = HashMap<String, String>;

/// One invocation as seen by a handler.
#[derive(Debug, Clone, Default)]
pub struct FunctionRequest {
    pub function: String,
    pub query: Query,
}

pub type HandlerFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<Value>> + Send>>;

/// Callback type for a function.
///
/// An `Err` is turned into an `{"error": ..., "message": ...}` result by the
/// caller; handlers may also return such an object themselves.
pub type FunctionHandler = Arc<dyn Fn(FunctionRequest) -> HandlerFuture + Send + Sync>;

/// Names that collide with the dispatcher's own routes.
const RESERVED: &[&str] = &["status", "metrics", "index.html"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("function already registered: {0}")]
    Duplicate(String),

    #[error("function name is reserved: {0}")]
    Reserved(String),

    #[error("invalid function name: {0:?}")]
    InvalidName(String),
}

/// Shared name → handler map.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    handlers: Arc<RwLock<BTreeMap<String, FunctionHandler>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in functions.
    pub async fn with_builtins() -> Self {
        let registry = Self::new();
        for (name, handler) in crate::builtin::all() {
            // Built-in names are valid and distinct.
            let _ = registry.register(name, handler).await;
        }
        registry
    }

    /// Register an async handler under `name`.
    pub async fn register(
        &self,
        name: &str,
        handler: FunctionHandler,
    ) -> Result<(), RegistryError> {
        validate_name(name)?;
        let mut handlers = self.handlers.write().await;
        if handlers.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        handlers.insert(name.to_string(), handler);
        info!(function = %name, "function registered");
        Ok(())
    }

    /// Register a synchronous handler.
    pub async fn register_fn<F>(&self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: Fn(&Query) -> Value + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let handler: FunctionHandler = Arc::new(move |req: FunctionRequest| -> HandlerFuture {
            let f = f.clone();
            Box::pin(async move { Ok(f(&req.query)) })
        });
        self.register(name, handler).await
    }

    pub async fn get(&self, name: &str) -> Option<FunctionHandler> {
        self.handlers.read().await.get(name).cloned()
    }

    /// Sorted list of registered names.
    pub async fn names(&self) -> Vec<String> {
        self.handlers.read().await.keys().cloned().collect()
    }
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    if RESERVED.contains(&name) {
        return Err(RegistryError::Reserved(name.to_string()));
    }
    Ok(())
}

/// Whether a handler result marks the call as failed.
///
/// A non-null `error` field means failure, regardless of any `success` flag.
pub fn is_error_result(result: &Value) -> bool {
    result.get("error").is_some_and(|e| !e.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn register_and_call() {
        let registry = FunctionRegistry::new();
        registry
            .register_fn("hello", |q| json!({ "hi": q.get("name").cloned() }))
            .await
            .unwrap();

        let handler = registry.get("hello").await.unwrap();
        let mut query = Query::new();
        query.insert("name".to_string(), "ada".to_string());
        let out = handler(FunctionRequest {
            function: "hello".to_string(),
            query,
        })
        .await
        .unwrap();
        assert_eq!(out, json!({ "hi": "ada" }));
    }

    #[tokio::test]
    async fn rejects_duplicates_and_reserved_names() {
        let registry = FunctionRegistry::new();
        registry.register_fn("a", |_| json!({})).await.unwrap();

        assert_eq!(
            registry.register_fn("a", |_| json!({})).await,
            Err(RegistryError::Duplicate("a".to_string()))
        );
        assert_eq!(
            registry.register_fn("status", |_| json!({})).await,
            Err(RegistryError::Reserved("status".to_string()))
        );
        assert!(matches!(
            registry.register_fn("a/b", |_| json!({})).await,
            Err(RegistryError::InvalidName(_))
        ));
        assert!(matches!(
            registry.register_fn("", |_| json!({})).await,
            Err(RegistryError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn builtins_are_present() {
        let registry = FunctionRegistry::with_builtins().await;
        assert_eq!(registry.names().await, vec!["calculate", "echo", "weather"]);
        assert!(registry.get("missing").await.is_none());
    }

    #[test]
    fn error_marker_detection() {
        assert!(is_error_result(&json!({ "error": "boom" })));
        assert!(is_error_result(&json!({ "error": "boom", "success": true })));
        assert!(!is_error_result(&json!({ "success": true })));
        assert!(!is_error_result(&json!({ "error": null })));
        assert!(!is_error_result(&json!("plain")));
    }
}
