//! Handler registry for capability lookup.
//!
//! The router only reads from the registry. `InMemoryHandlerRegistry` keeps
//! one id-indexed map per handler kind so the same id may exist as, say, both
//! a retriever and a tool; lookups then follow the kind search order.

use std::collections::HashMap;

use conductor_types::handler::HandlerKind;

use super::box_handler::BoxHandler;

/// Read-only capability lookup consumed by the router.
pub trait HandlerRegistry: Send + Sync {
    /// Find a handler by capability id, searching kinds in
    /// [`HandlerKind::SEARCH_ORDER`].
    fn lookup(&self, capability_id: &str) -> Option<BoxHandler>;

    /// All handlers of one kind.
    fn list_by_kind(&self, kind: HandlerKind) -> Vec<BoxHandler>;
}

/// Registry backed by per-kind hash maps.
#[derive(Debug, Default)]
pub struct InMemoryHandlerRegistry {
    by_kind: HashMap<HandlerKind, HashMap<String, BoxHandler>>,
}

impl InMemoryHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own id and kind.
    ///
    /// If a handler with the same id and kind exists, it is replaced.
    pub fn register(&mut self, handler: BoxHandler) {
        let kind = handler.kind();
        let id = handler.id().to_string();
        if self
            .by_kind
            .entry(kind)
            .or_default()
            .insert(id.clone(), handler)
            .is_some()
        {
            tracing::debug!(capability = id.as_str(), %kind, "replaced registered handler");
        }
    }

    pub fn len(&self) -> usize {
        self.by_kind.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HandlerRegistry for InMemoryHandlerRegistry {
    fn lookup(&self, capability_id: &str) -> Option<BoxHandler> {
        HandlerKind::SEARCH_ORDER.iter().find_map(|kind| {
            self.by_kind
                .get(kind)
                .and_then(|handlers| handlers.get(capability_id))
                .cloned()
        })
    }

    fn list_by_kind(&self, kind: HandlerKind) -> Vec<BoxHandler> {
        let mut handlers: Vec<BoxHandler> = self
            .by_kind
            .get(&kind)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        handlers.sort_by(|a, b| a.id().cmp(b.id()));
        handlers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Handler, HandlerError};
    use serde_json::{json, Value};

    struct Named {
        id: &'static str,
        kind: HandlerKind,
    }

    impl Handler for Named {
        fn id(&self) -> &str {
            self.id
        }

        fn kind(&self) -> HandlerKind {
            self.kind
        }

        async fn invoke(&self, _method: &str, _params: &Value) -> Result<Value, HandlerError> {
            Ok(json!(self.kind.to_string()))
        }
    }

    fn registry() -> InMemoryHandlerRegistry {
        let mut registry = InMemoryHandlerRegistry::new();
        registry.register(BoxHandler::new(Named { id: "search", kind: HandlerKind::Plugin }));
        registry.register(BoxHandler::new(Named { id: "search", kind: HandlerKind::Tool }));
        registry.register(BoxHandler::new(Named { id: "fs", kind: HandlerKind::Tool }));
        registry.register(BoxHandler::new(Named { id: "docs", kind: HandlerKind::Retriever }));
        registry
    }

    #[test]
    fn test_lookup_follows_search_order() {
        let registry = registry();
        let handler = registry.lookup("search").unwrap();
        assert_eq!(handler.kind(), HandlerKind::Tool);
        assert_eq!(registry.lookup("docs").unwrap().kind(), HandlerKind::Retriever);
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_list_by_kind_sorted() {
        let registry = registry();
        let tools: Vec<String> = registry
            .list_by_kind(HandlerKind::Tool)
            .iter()
            .map(|h| h.id().to_string())
            .collect();
        assert_eq!(tools, vec!["fs", "search"]);
        assert_eq!(registry.list_by_kind(HandlerKind::Plugin).len(), 1);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_register_replaces_same_id_and_kind() {
        let mut registry = registry();
        registry.register(BoxHandler::new(Named { id: "fs", kind: HandlerKind::Tool }));
        assert_eq!(registry.len(), 4);
    }

    #[tokio::test]
    async fn test_boxed_invoke_delegates() {
        let registry = registry();
        let handler = registry.lookup("docs").unwrap();
        let out = handler.invoke("get", &json!({})).await.unwrap();
        assert_eq!(out, json!("retriever"));
        assert!(!handler.is_remote());
        assert!(handler.sub_workflow_id().is_none());
    }
}
