use std::net::SocketAddr;

/// Branch credited with mirrored debt payments when none is given.
pub const DEFAULT_BRANCH: &str = "Rawson";

/// Credentials for the chat-bot webhook used to message clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub url: String,
    pub api_key: String,
    /// Image attached to every message
    pub media_url: Option<String>,
}

/// Runtime configuration, assembled from command-line flags and environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file
    pub database: String,
    /// Address the HTTP API listens on
    pub bind: SocketAddr,
    pub webhook: Option<WebhookConfig>,
    pub default_branch: String,
}

impl Config {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            webhook: None,
            default_branch: DEFAULT_BRANCH.to_string(),
        }
    }

    /// Webhook settings are only usable when both URL and key are present.
    pub fn with_webhook(
        mut self,
        url: Option<String>,
        api_key: Option<String>,
        media_url: Option<String>,
    ) -> Self {
        self.webhook = match (url, api_key) {
            (Some(url), Some(api_key)) if !url.is_empty() && !api_key.is_empty() => {
                Some(WebhookConfig {
                    url,
                    api_key,
                    media_url: media_url.filter(|m| !m.is_empty()),
                })
            }
            _ => None,
        };
        self
    }

    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        let branch = branch.into();
        if !branch.trim().is_empty() {
            self.default_branch = branch.trim().to_string();
        }
        self
    }

    /// SQLite URL that creates the file when missing.
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.database)
    }
}
