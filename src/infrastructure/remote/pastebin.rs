//! Pastebin client

use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::Client;
use serde::Serialize;

use crate::application::errors::BotError;

const API_POST: &str = "https://pastebin.com/api/api_post.php";

static PASTE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(https?://(?:www\.)?pastebin\.com/(?:raw/)?[a-z0-9]+)")
        .expect("paste link pattern is valid")
});

/// First pastebin link in `text`, rewritten to its raw form
pub fn extract_raw_link(text: &str) -> Option<String> {
    let link = PASTE_LINK.captures(text)?.get(1)?.as_str();
    Some(to_raw_url(link))
}

pub fn to_raw_url(link: &str) -> String {
    const HOST: &str = "pastebin.com/";
    let lower = link.to_ascii_lowercase();
    if lower.contains("/raw/") {
        return link.to_string();
    }
    match lower.find(HOST) {
        Some(pos) => {
            let split = pos + HOST.len();
            format!("{}raw/{}", &link[..split], &link[split..])
        }
        None => link.to_string(),
    }
}

/// Pastebin syntax name for a file extension
pub fn format_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "rs" => "rust",
        "js" => "javascript",
        "ts" => "typescript",
        "html" => "html5",
        "css" => "css",
        "py" => "python",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "ini",
        "xml" => "xml",
        "sql" => "sql",
        "go" => "go",
        "sh" => "bash",
        "md" => "markdown",
        _ => "text",
    }
}

pub struct PastebinClient {
    client: Client,
    dev_key: Option<String>,
}

impl PastebinClient {
    pub fn new(client: Client, dev_key: Option<String>) -> Self {
        Self { client, dev_key }
    }

    /// Upload `code` as a public, never-expiring paste and return its URL
    pub async fn create_paste(&self, name: &str, code: &str, format: &str) -> Result<String, BotError> {
        #[derive(Serialize)]
        struct PasteRequest<'a> {
            api_dev_key: &'a str,
            api_option: &'a str,
            api_paste_code: &'a str,
            api_paste_name: &'a str,
            api_paste_format: &'a str,
            api_paste_private: u8,
            api_paste_expire_date: &'a str,
        }

        let dev_key = self
            .dev_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| BotError::Platform("pastebin.devKey is not configured".to_string()))?;

        let request = PasteRequest {
            api_dev_key: dev_key,
            api_option: "paste",
            api_paste_code: code,
            api_paste_name: name,
            api_paste_format: format,
            api_paste_private: 1,
            api_paste_expire_date: "N",
        };

        let response = self.client
            .post(API_POST)
            .form(&request)
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        // Errors come back as 200/422 with a "Bad API request" body
        if !status.is_success() || !body.starts_with("http") {
            return Err(BotError::Platform(format!("Pastebin error: {}", body.trim())));
        }
        Ok(body.trim().to_string())
    }

    /// Fetch the raw content of a paste
    pub async fn fetch_raw(&self, link: &str) -> Result<String, BotError> {
        let url = to_raw_url(link);
        let response = self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BotError::Network(format!("Pastebin fetch error: {}", response.status())));
        }

        response
            .text()
            .await
            .map_err(|e| BotError::Network(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_raw_link() {
        assert_eq!(
            extract_raw_link("here: https://pastebin.com/AbC123 thanks").as_deref(),
            Some("https://pastebin.com/raw/AbC123")
        );
        assert_eq!(
            extract_raw_link("HTTPS://www.Pastebin.com/raw/xyz").as_deref(),
            Some("HTTPS://www.Pastebin.com/raw/xyz")
        );
        assert_eq!(
            extract_raw_link("http://Pastebin.com/q1").as_deref(),
            Some("http://Pastebin.com/raw/q1")
        );
        assert!(extract_raw_link("no link here").is_none());
    }

    #[test]
    fn test_format_for() {
        assert_eq!(format_for("YAML"), "yaml");
        assert_eq!(format_for("rs"), "rust");
        assert_eq!(format_for("weird"), "text");
    }
}
