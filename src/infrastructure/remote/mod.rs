//! Remote HTTP integrations: pastebin, the update manifest host and GitHub
//!
//! Clients are cheap views over one shared `reqwest::Client`, built from the
//! current config each time so config edits apply without a restart.

pub mod github;
pub mod pastebin;
pub mod updates;

use reqwest::Client;

use crate::infrastructure::config::BotConfig;

pub use github::GithubClient;
pub use pastebin::PastebinClient;
pub use updates::{UpdateClient, UpdateManifest, UpdatePlan, VersionEntry};

#[derive(Clone, Default)]
pub struct RemoteClients {
    pub http: Client,
}

impl RemoteClients {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    pub fn pastebin(&self, config: &BotConfig) -> PastebinClient {
        PastebinClient::new(self.http.clone(), config.pastebin.dev_key.clone())
    }

    /// `None` until `update.baseUrl` is configured
    pub fn updates(&self, config: &BotConfig) -> Option<UpdateClient> {
        let base_url = config.update.base_url.as_deref()?.trim();
        if base_url.is_empty() {
            return None;
        }
        Some(UpdateClient::new(self.http.clone(), base_url))
    }

    /// `None` unless both owner and repo are configured
    pub fn github(&self, config: &BotConfig) -> Option<GithubClient> {
        let github = config.github.as_ref()?;
        if github.owner.is_empty() || github.repo.is_empty() {
            return None;
        }
        Some(GithubClient::new(self.http.clone(), github.clone()))
    }
}
