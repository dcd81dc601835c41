//! BoxAgent -- object-safe dynamic dispatch wrapper for Agent.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::chat::{Agent, AgentError};

/// Object-safe version of [`Agent`] with a boxed future.
pub trait AgentDyn: Send + Sync {
    fn name(&self) -> &str;

    fn chat_boxed<'a>(
        &'a self,
        input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AgentError>> + Send + 'a>>;
}

impl<T: Agent> AgentDyn for T {
    fn name(&self) -> &str {
        Agent::name(self)
    }

    fn chat_boxed<'a>(
        &'a self,
        input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AgentError>> + Send + 'a>> {
        Box::pin(self.chat(input))
    }
}

/// Type-erased, shareable agent.
#[derive(Clone)]
pub struct BoxAgent {
    inner: Arc<dyn AgentDyn>,
}

impl BoxAgent {
    pub fn new<T: Agent + 'static>(agent: T) -> Self {
        Self {
            inner: Arc::new(agent),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn chat(&self, input: &str) -> Result<String, AgentError> {
        self.inner.chat_boxed(input).await
    }
}

impl fmt::Debug for BoxAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxAgent").field("name", &self.name()).finish()
    }
}
