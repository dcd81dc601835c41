//! Stand-in agents for dry runs.

use conductor_core::agent::{Agent, AgentError, AgentRegistry, BoxAgent};

/// Replies with its input.
pub struct EchoAgent;

impl Agent for EchoAgent {
    fn name(&self) -> &str {
        "echo"
    }

    async fn chat(&self, input: &str) -> Result<String, AgentError> {
        Ok(input.to_string())
    }
}

/// Always gives the same reply.
pub struct FixedAgent {
    name: String,
    reply: String,
}

impl Agent for FixedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, _input: &str) -> Result<String, AgentError> {
        Ok(self.reply.clone())
    }
}

/// Echo by default; the named agents give their fixed reply.
pub fn dry_run_agents(replies: &[(String, String)]) -> AgentRegistry {
    let mut agents = AgentRegistry::new();
    agents.set_default(BoxAgent::new(EchoAgent));
    for (name, reply) in replies {
        agents.register(
            name.clone(),
            BoxAgent::new(FixedAgent {
                name: name.clone(),
                reply: reply.clone(),
            }),
        );
    }
    agents
}
