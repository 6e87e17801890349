use std::{process::Command, time::Duration};

use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_LABEL: &str = "autoapprove";
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variables consulted for the API token, in order.
pub const TOKEN_ENV_VARS: [&str; 3] = ["TOKEN", "GITHUB_TOKEN", "GH_TOKEN"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no GitHub token found: set TOKEN (or GITHUB_TOKEN / GH_TOKEN) or run 'gh auth login'"
    )]
    MissingToken,

    #[error("no GitHub user configured: set USER or pass --user")]
    MissingUser,

    #[error("the auto-approve label must not be empty")]
    EmptyLabel,

    #[error("invalid API URL '{url}': {source}")]
    InvalidApiUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("API URL '{0}' cannot be used as a base URL")]
    NotABaseUrl(String),
}

/// Connection settings for the GitHub REST API.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub api_base: Url,
    pub timeout: Duration,
}

impl Config {
    pub fn new(
        token: impl Into<String>,
        api_url: &str,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(ConfigError::MissingToken);
        }

        Ok(Self {
            token,
            api_base: parse_api_base(api_url)?,
            timeout,
        })
    }
}

/// Parses the API base and guarantees a trailing slash so that relative
/// endpoints join underneath it instead of replacing its last segment.
pub fn parse_api_base(api_url: &str) -> Result<Url, ConfigError> {
    let mut base = Url::parse(api_url.trim()).map_err(|source| ConfigError::InvalidApiUrl {
        url: api_url.to_string(),
        source,
    })?;

    if base.cannot_be_a_base() {
        return Err(ConfigError::NotABaseUrl(api_url.to_string()));
    }

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    Ok(base)
}

/// Resolves the token from `lookup`, trying [`TOKEN_ENV_VARS`] in order and
/// ignoring blank values.
pub fn token_from_lookup<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    TOKEN_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

pub fn get_github_token() -> Result<String, ConfigError> {
    // Prefer environment variables over gh CLI to avoid subprocess overhead.
    if let Some(token) = token_from_lookup(|name| std::env::var(name).ok()) {
        return Ok(token);
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .map_err(|_| ConfigError::MissingToken)?;

    if !output.status.success() {
        return Err(ConfigError::MissingToken);
    }

    let token = String::from_utf8(output.stdout)
        .map_err(|_| ConfigError::MissingToken)?
        .trim()
        .to_string();

    if token.is_empty() {
        return Err(ConfigError::MissingToken);
    }

    Ok(token)
}
