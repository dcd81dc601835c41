//! Agent registry for runtime agent lookup.
//!
//! A simple name-indexed registry of boxed agents. An optional default agent
//! serves every name that is not registered explicitly.

use std::collections::HashMap;

use super::box_agent::BoxAgent;

#[derive(Debug, Default, Clone)]
pub struct AgentRegistry {
    agents: HashMap<String, BoxAgent>,
    default_agent: Option<BoxAgent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under the given name, replacing any existing one.
    pub fn register(&mut self, name: impl Into<String>, agent: BoxAgent) {
        self.agents.insert(name.into(), agent);
    }

    /// Serve unregistered names with `agent`.
    pub fn set_default(&mut self, agent: BoxAgent) {
        self.default_agent = Some(agent);
    }

    pub fn get(&self, name: &str) -> Option<&BoxAgent> {
        self.agents.get(name).or(self.default_agent.as_ref())
    }

    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentError};

    struct Fixed(&'static str);

    impl Agent for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn chat(&self, input: &str) -> Result<String, AgentError> {
            Ok(format!("{}: {input}", self.0))
        }
    }

    #[tokio::test]
    async fn test_get_registered_agent() {
        let mut registry = AgentRegistry::new();
        registry.register("writer", BoxAgent::new(Fixed("writer")));

        let agent = registry.get("writer").unwrap();
        assert_eq!(agent.chat("hi").await.unwrap(), "writer: hi");
        assert!(registry.get("critic").is_none());
    }

    #[tokio::test]
    async fn test_default_agent_serves_unknown_names() {
        let mut registry = AgentRegistry::new();
        registry.register("writer", BoxAgent::new(Fixed("writer")));
        registry.set_default(BoxAgent::new(Fixed("echo")));

        assert_eq!(registry.get("writer").unwrap().name(), "writer");
        assert_eq!(registry.get("critic").unwrap().name(), "echo");
        assert_eq!(registry.list_names(), vec!["writer"]);
    }
}
