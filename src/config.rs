use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Bearer token for the /api routes. When neither this nor the layered
    /// secret lookup yields a token, the API is served unauthenticated.
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            auth_token: None,
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:8787".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "habitd.db".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Inline API key; highest-priority layer of the secret lookup. Prefer
    /// the OS keychain or environment for anything that leaves your machine.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    OpenaiCompatible,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EvaluationConfig {
    /// Keep evaluating a user's remaining goals after one fails. Off by
    /// default: the first failure aborts the whole request.
    #[serde(default)]
    pub continue_on_error: bool,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8787");
        assert_eq!(config.state.db_path, "habitd.db");
        assert_eq!(config.provider.kind, ProviderKind::OpenaiCompatible);
        assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
        assert!(!config.evaluation.continue_on_error);
    }

    #[test]
    fn test_full_config_parses() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            bind_addr = "0.0.0.0:9000"
            auth_token = "tok"

            [state]
            db_path = "/var/lib/habitd/habitd.db"

            [provider]
            kind = "openai_compatible"
            base_url = "http://localhost:11434/v1"
            model = "llama3"

            [evaluation]
            continue_on_error = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.server.auth_token.as_deref(), Some("tok"));
        assert_eq!(config.state.db_path, "/var/lib/habitd/habitd.db");
        assert_eq!(config.provider.model, "llama3");
        assert!(config.evaluation.continue_on_error);
    }
}
