//! HttpHandler -- a [`Handler`] served by a remote HTTP endpoint.
//!
//! Each invocation POSTs `{"method": ..., "params": ...}` as JSON to the
//! configured endpoint. A 2xx response body is the handler output: parsed as
//! JSON when possible, otherwise returned as a string. Timeouts are enforced
//! by the router, not by the HTTP client.

use conductor_core::handler::{BoxHandler, Handler, HandlerError, InMemoryHandlerRegistry};
use conductor_types::config::RemoteToolConfig;
use conductor_types::handler::HandlerKind;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct InvokeRequest<'a> {
    method: &'a str,
    params: &'a Value,
}

pub struct HttpHandler {
    client: reqwest::Client,
    id: String,
    kind: HandlerKind,
    endpoint: String,
    sub_workflow: Option<String>,
}

impl HttpHandler {
    pub fn new(client: reqwest::Client, config: &RemoteToolConfig) -> Self {
        Self {
            client,
            id: config.id.clone(),
            kind: config.kind,
            endpoint: config.endpoint.clone(),
            sub_workflow: config.sub_workflow.clone(),
        }
    }
}

impl Handler for HttpHandler {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> HandlerKind {
        self.kind
    }

    fn is_remote(&self) -> bool {
        true
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.endpoint)
    }

    fn sub_workflow_id(&self) -> Option<&str> {
        self.sub_workflow.as_deref()
    }

    async fn invoke(&self, method: &str, params: &Value) -> Result<Value, HandlerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&InvokeRequest { method, params })
            .send()
            .await
            .map_err(|e| HandlerError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| HandlerError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(handler = self.id.as_str(), %status, "remote handler returned an error status");
            return Err(HandlerError::Failed(format!("{}: {}", status, body.trim())));
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

/// Register every configured remote tool, sharing one HTTP client.
///
/// Returns the number of handlers registered.
pub fn register_remote_tools(
    registry: &mut InMemoryHandlerRegistry,
    tools: &[RemoteToolConfig],
) -> Result<usize, reqwest::Error> {
    if tools.is_empty() {
        return Ok(0);
    }
    let client = reqwest::Client::builder().build()?;
    for tool in tools {
        tracing::info!(
            capability = tool.id.as_str(),
            kind = %tool.kind,
            endpoint = tool.endpoint.as_str(),
            "registering remote handler"
        );
        registry.register(BoxHandler::new(HttpHandler::new(client.clone(), tool)));
    }
    Ok(tools.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::handler::HandlerRegistry;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn tool(id: &str, endpoint: &str) -> RemoteToolConfig {
        RemoteToolConfig {
            id: id.to_string(),
            kind: HandlerKind::Tool,
            endpoint: endpoint.to_string(),
            sub_workflow: None,
        }
    }

    /// Serve one HTTP request, replying with `status` and the request body
    /// wrapped as `{"echo": <body>}`.
    async fn serve_once(status: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let body = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if text.len() >= split + 4 + length {
                        break text[split + 4..split + 4 + length].to_string();
                    }
                }
                if n == 0 {
                    break String::new();
                }
            };
            let reply = format!(r#"{{"echo": {body}}}"#);
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                reply.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}/invoke")
    }

    #[tokio::test]
    async fn test_invoke_posts_method_and_params() {
        let endpoint = serve_once("200 OK").await;
        let handler = HttpHandler::new(reqwest::Client::new(), &tool("remote", &endpoint));

        let output = handler.invoke("search", &json!({"q": "rust"})).await.unwrap();

        assert_eq!(output["echo"]["method"], json!("search"));
        assert_eq!(output["echo"]["params"]["q"], json!("rust"));
    }

    #[tokio::test]
    async fn test_error_status_is_a_failure() {
        let endpoint = serve_once("500 Internal Server Error").await;
        let handler = HttpHandler::new(reqwest::Client::new(), &tool("remote", &endpoint));

        let err = handler.invoke("search", &json!({})).await.unwrap_err();
        assert!(matches!(err, HandlerError::Failed(msg) if msg.starts_with("500")));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let handler = HttpHandler::new(reqwest::Client::new(), &tool("remote", "http://127.0.0.1:1/"));
        let err = handler.invoke("ping", &json!({})).await.unwrap_err();
        assert!(matches!(err, HandlerError::Transport(_)));
    }

    #[test]
    fn test_register_remote_tools() {
        let mut registry = InMemoryHandlerRegistry::new();
        let mut support = tool("support", "http://localhost:9000/support");
        support.sub_workflow = Some("support_flow".to_string());
        let tools = vec![tool("search", "http://localhost:9000/search"), support];

        assert_eq!(register_remote_tools(&mut registry, &tools).unwrap(), 2);

        let handler = registry.lookup("support").unwrap();
        assert!(handler.is_remote());
        assert_eq!(handler.endpoint(), Some("http://localhost:9000/support"));
        assert_eq!(handler.sub_workflow_id(), Some("support_flow"));
        assert_eq!(registry.list_by_kind(HandlerKind::Tool).len(), 2);
    }
}
