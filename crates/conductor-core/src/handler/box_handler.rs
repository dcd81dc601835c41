//! BoxHandler -- object-safe dynamic dispatch wrapper for Handler.
//!
//! Same blanket-impl pattern as the agent wrapper:
//! 1. Define an object-safe `HandlerDyn` trait with boxed futures
//! 2. Blanket-impl `HandlerDyn` for all `T: Handler`
//! 3. `BoxHandler` wraps `Arc<dyn HandlerDyn>` and delegates

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use conductor_types::handler::HandlerKind;
use serde_json::Value;

use super::capability::{Handler, HandlerError};

/// Object-safe version of [`Handler`] with boxed futures.
pub trait HandlerDyn: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> HandlerKind;

    fn is_remote(&self) -> bool;

    fn endpoint(&self) -> Option<&str>;

    fn sub_workflow_id(&self) -> Option<&str>;

    fn invoke_boxed<'a>(
        &'a self,
        method: &'a str,
        params: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send + 'a>>;
}

impl<T: Handler> HandlerDyn for T {
    fn id(&self) -> &str {
        Handler::id(self)
    }

    fn kind(&self) -> HandlerKind {
        Handler::kind(self)
    }

    fn is_remote(&self) -> bool {
        Handler::is_remote(self)
    }

    fn endpoint(&self) -> Option<&str> {
        Handler::endpoint(self)
    }

    fn sub_workflow_id(&self) -> Option<&str> {
        Handler::sub_workflow_id(self)
    }

    fn invoke_boxed<'a>(
        &'a self,
        method: &'a str,
        params: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send + 'a>> {
        Box::pin(self.invoke(method, params))
    }
}

/// Type-erased, shareable handler.
///
/// Cloning is cheap (reference counted), so registries hand out clones and
/// the router can hold one across await points.
#[derive(Clone)]
pub struct BoxHandler {
    inner: Arc<dyn HandlerDyn>,
}

impl BoxHandler {
    pub fn new<T: Handler + 'static>(handler: T) -> Self {
        Self {
            inner: Arc::new(handler),
        }
    }

    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn kind(&self) -> HandlerKind {
        self.inner.kind()
    }

    pub fn is_remote(&self) -> bool {
        self.inner.is_remote()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.inner.endpoint()
    }

    pub fn sub_workflow_id(&self) -> Option<&str> {
        self.inner.sub_workflow_id()
    }

    pub async fn invoke(&self, method: &str, params: &Value) -> Result<Value, HandlerError> {
        self.inner.invoke_boxed(method, params).await
    }
}

impl fmt::Debug for BoxHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxHandler")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("is_remote", &self.is_remote())
            .finish()
    }
}
