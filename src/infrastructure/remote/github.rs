//! GitHub contents API client, used to mirror applied updates into a repo

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::application::errors::{BotError, ConfigError};
use crate::infrastructure::config::GithubConfig;

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "threadkeeper";

/// Decode the base64 payload of a contents API response; GitHub wraps it at 60 columns
pub fn decode_content(encoded: &str) -> Result<Vec<u8>, BotError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| BotError::Parse(format!("Invalid base64 content: {}", e)))
}

pub struct GithubClient {
    client: Client,
    config: GithubConfig,
}

#[derive(Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

impl GithubClient {
    pub fn new(client: Client, config: GithubConfig) -> Self {
        Self { client, config }
    }

    pub fn can_push(&self) -> bool {
        self.config.usable_token().is_some()
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            API_BASE,
            self.config.owner,
            self.config.repo,
            path.trim_start_matches('/')
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");
        match self.config.usable_token() {
            Some(token) => request.header("Authorization", format!("token {}", token)),
            None => request,
        }
    }

    async fn get_contents(&self, path: &str) -> Result<Option<ContentsResponse>, BotError> {
        let response = self
            .authorized(self.client.get(self.contents_url(path)))
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(BotError::Network(format!("GitHub API error: {}", response.status())));
        }

        let contents: ContentsResponse = response
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))?;
        Ok(Some(contents))
    }

    /// `version` field of a JSON file in the repo; `None` if the file is absent
    pub async fn repo_version(&self, path: &str) -> Result<Option<String>, BotError> {
        let Some(contents) = self.get_contents(path).await? else {
            return Ok(None);
        };
        let bytes = decode_content(contents.content.as_deref().unwrap_or_default())?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| BotError::Parse(e.to_string()))?;
        Ok(value
            .get("version")
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    /// Create or overwrite `path` on the configured branch
    pub async fn push_file(&self, path: &str, bytes: &[u8], message: &str) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct PutRequest<'a> {
            message: &'a str,
            content: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            sha: Option<String>,
            branch: &'a str,
        }

        if !self.can_push() {
            return Err(ConfigError::MissingField("github.token".to_string()).into());
        }

        let sha = self.get_contents(path).await?.map(|c| c.sha);
        let request = PutRequest {
            message,
            content: STANDARD.encode(bytes),
            sha,
            branch: &self.config.branch,
        };

        let response = self
            .authorized(self.client.put(self.contents_url(path)))
            .json(&request)
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Network(format!("GitHub push of {} failed: {} {}", path, status, body)));
        }

        tracing::info!("Pushed {} to {}/{}@{}", path, self.config.owner, self.config.repo, self.config.branch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_content_ignores_line_breaks() {
        let encoded = "eyJ2ZXJzaW9u\nIjogIjEuMi4z\nIn0=\n";
        let bytes = decode_content(encoded).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"version": "1.2.3"}"#);
    }

    #[test]
    fn test_contents_url() {
        let client = GithubClient::new(
            Client::new(),
            GithubConfig {
                owner: "acme".to_string(),
                repo: "bot".to_string(),
                token: None,
                branch: "main".to_string(),
            },
        );
        assert_eq!(
            client.contents_url("/commands/help.yaml"),
            "https://api.github.com/repos/acme/bot/contents/commands/help.yaml"
        );
        assert!(!client.can_push());
    }
}
