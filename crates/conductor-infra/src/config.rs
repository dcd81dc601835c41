//! Configuration loader for Conductor.
//!
//! Reads a TOML file into [`ConductorConfig`]. Every field is defaulted, so an
//! empty file is a valid configuration.

use std::path::{Path, PathBuf};

use conductor_types::config::ConductorConfig;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "conductor.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load configuration.
///
/// - `Some(path)`: the file is required to parse. A missing file still
///   yields defaults.
/// - `None`: [`DEFAULT_CONFIG_FILE`] in the working directory is used if
///   present; a malformed file logs a warning and yields defaults.
pub async fn load_config(path: Option<&Path>) -> Result<ConductorConfig, ConfigError> {
    match path {
        Some(path) => load_from(path).await,
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            match load_from(path).await {
                Ok(config) => Ok(config),
                Err(err) => {
                    tracing::warn!("{err}, using defaults");
                    Ok(ConductorConfig::default())
                }
            }
        }
    }
}

async fn load_from(path: &Path) -> Result<ConductorConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return Ok(ConductorConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let config = parse_config(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(
        path = %path.display(),
        tools = config.tools.len(),
        "loaded configuration"
    );
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<ConductorConfig, toml::de::Error> {
    toml::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_types::config::UnresolvedPolicy;
    use conductor_types::handler::HandlerKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(Some(&tmp.path().join("conductor.toml")))
            .await
            .unwrap();
        assert!(config.middleware.enabled);
        assert_eq!(config.middleware.action_timeout_secs, 30);
        assert!(config.tools.is_empty());
    }

    #[tokio::test]
    async fn test_valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conductor.toml");
        tokio::fs::write(
            &path,
            r#"
[middleware]
action_timeout_secs = 5

[orchestrator]
retry_backoff_ms = 250
unresolved_policy = "error"

[[tools]]
id = "search"
kind = "retriever"
endpoint = "http://localhost:9000/search"

[[tools]]
id = "support"
endpoint = "http://localhost:9000/support"
sub_workflow = "support_flow"
"#,
        )
        .await
        .unwrap();

        let config = load_config(Some(&path)).await.unwrap();
        assert_eq!(config.middleware.action_timeout_secs, 5);
        assert_eq!(config.orchestrator.retry_backoff_ms, 250);
        assert_eq!(config.orchestrator.unresolved_policy, UnresolvedPolicy::Error);
        assert_eq!(config.tools.len(), 2);
        assert_eq!(config.tools[0].kind, HandlerKind::Retriever);
        assert_eq!(config.tools[1].kind, HandlerKind::Tool);
        assert_eq!(config.tools[1].sub_workflow.as_deref(), Some("support_flow"));
    }

    #[tokio::test]
    async fn test_invalid_toml_at_explicit_path_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conductor.toml");
        tokio::fs::write(&path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let err = load_config(Some(&path)).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("conductor.toml"));
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert_eq!(config.orchestrator.max_sub_workflow_depth, 5);
    }
}
