use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use zeroize::Zeroize;

use crate::providers::ProviderError;
use crate::traits::CompletionProvider;
use crate::utils::truncate_str;

/// Completion calls are bounded; a slow provider surfaces as an error rather
/// than hanging the evaluation request.
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl Drop for OpenAiCompatibleProvider {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

/// Validate the base URL for security.
/// - HTTPS is required for remote URLs to protect API keys in transit
/// - HTTP is allowed only for localhost/127.0.0.1 (local LLM servers)
fn validate_base_url(base_url: &str) -> Result<(), String> {
    let parsed = reqwest::Url::parse(base_url)
        .map_err(|e| format!("Invalid base_url '{}': {}", base_url, e))?;

    let scheme = parsed.scheme();
    let host = parsed.host_str().unwrap_or("");

    match scheme {
        "https" => Ok(()),
        "http" => {
            let is_localhost =
                host == "localhost" || host == "127.0.0.1" || host == "[::1]" || host == "::1";

            if is_localhost {
                warn!(
                    "Using unencrypted HTTP for local LLM server at '{}'. \
                     API key will be transmitted in cleartext.",
                    base_url
                );
                Ok(())
            } else {
                Err(format!(
                    "HTTP is not allowed for remote URLs (base_url: '{}'). \
                     Use HTTPS to protect your API key in transit.",
                    base_url
                ))
            }
        }
        _ => Err(format!(
            "Unsupported URL scheme '{}' in base_url '{}'. Only http and https are allowed.",
            scheme, base_url
        )),
    }
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> anyhow::Result<Self> {
        validate_base_url(base_url).map_err(|e| anyhow::anyhow!(e))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
        current_time: &str,
    ) -> anyhow::Result<String> {
        // Deterministic extraction: temperature 0, no sampling cutoff.
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {
                    "role": "user",
                    "content": format!("USER_TEXT: {}\nCURRENT_TIME: {}", user_text, current_time),
                },
            ],
            "temperature": 0,
            "top_p": 1,
        });

        let url = format!("{}/chat/completions", self.base_url);
        info!(model = %self.model, url = %url, "Calling completion API");

        let resp = match self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!("Completion request failed: {}", e);
                return Err(ProviderError::network(&e).into());
            }
        };

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            error!(status = %status, "Completion API error: {}", truncate_str(&text, 500));
            return Err(ProviderError::from_status(status.as_u16(), &text).into());
        }

        debug!("Completion response: {}", truncate_str(&text, 2000));

        let data: Value = serde_json::from_str(&text)?;
        let choice = data["choices"]
            .get(0)
            .ok_or_else(|| anyhow::anyhow!("Completion service returned no choices"))?;
        let content = choice["message"]["content"].as_str().unwrap_or("");
        if content.is_empty() {
            anyhow::bail!("Completion service returned empty content");
        }

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_urls_are_accepted() {
        assert!(validate_base_url("https://api.openai.com/v1").is_ok());
    }

    #[test]
    fn test_http_localhost_is_accepted() {
        assert!(validate_base_url("http://localhost:11434/v1").is_ok());
        assert!(validate_base_url("http://127.0.0.1:8080/v1").is_ok());
    }

    #[test]
    fn test_http_remote_is_rejected() {
        assert!(validate_base_url("http://api.example.com/v1").is_err());
    }

    #[test]
    fn test_other_schemes_are_rejected() {
        assert!(validate_base_url("ftp://api.example.com/v1").is_err());
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let provider =
            OpenAiCompatibleProvider::new("https://api.openai.com/v1/", "gpt-4o-mini", "sk-test")
                .unwrap();
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
    }
}
