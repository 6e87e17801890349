use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
    config::Config,
    types::{Forge, Label, Notification, PullRequestRef, Review},
};

pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";
pub const GITHUB_API_VERSION: &str = "2022-11-28";
pub const APPROVE_EVENT: &str = "APPROVE";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Failures talking to the GitHub REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("error making request to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status code: {status} from {url}, body: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("error decoding response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("error building endpoint URL: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Body of a review submission.
#[derive(Debug, Serialize)]
pub struct ReviewRequest<'a> {
    pub event: &'a str,
}

impl ReviewRequest<'static> {
    pub fn approve() -> Self {
        Self {
            event: APPROVE_EVENT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PullRequestDetail {
    #[serde(default)]
    labels: Vec<Label>,
}

/// Client for the subset of the GitHub REST API used for auto-approval.
#[derive(Debug, Clone)]
pub struct GitHub {
    client: Client,
    api_base: Url,
}

impl GitHub {
    pub fn new(config: &Config) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .context("GitHub token contains characters not allowed in a header")?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            HeaderName::from_static("x-github-api-version"),
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
        })
    }

    pub fn notifications_url(&self) -> Result<Url, ApiError> {
        Ok(self.api_base.join("notifications")?)
    }

    pub fn review_url(&self, pr: &PullRequestRef) -> Result<Url, ApiError> {
        Ok(self.api_base.join(&format!(
            "repos/{}/{}/pulls/{}/reviews",
            pr.owner(),
            pr.repo(),
            pr.number()
        ))?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        let body = read_ok_body(url, response).await?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    pub async fn submit_approval(&self, pr: &PullRequestRef) -> Result<(), ApiError> {
        let url = self.review_url(pr)?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url.clone())
            .json(&ReviewRequest::approve())
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        read_ok_body(url.as_str(), response).await?;
        Ok(())
    }
}

/// Reads the response body, failing unless the status is exactly 200.
async fn read_ok_body(url: &str, response: reqwest::Response) -> Result<String, ApiError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

    if status != StatusCode::OK {
        return Err(ApiError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }

    Ok(body)
}

fn reviews_url(pull_url: &str) -> String {
    format!("{}/reviews", pull_url.trim_end_matches('/'))
}

#[async_trait]
impl Forge for GitHub {
    async fn notifications(&self) -> Result<Vec<Notification>> {
        let url = self.notifications_url()?;
        Ok(self.get_json(url.as_str()).await?)
    }

    async fn labels(&self, pull_url: &str) -> Result<Vec<Label>> {
        let detail: PullRequestDetail = self.get_json(pull_url).await?;
        Ok(detail.labels)
    }

    async fn reviews(&self, pull_url: &str) -> Result<Vec<Review>> {
        Ok(self.get_json(&reviews_url(pull_url)).await?)
    }

    async fn approve(&self, pr: &PullRequestRef) -> Result<()> {
        Ok(self.submit_approval(pr).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_API_URL;

    fn test_client() -> GitHub {
        let config = Config::new("secret", DEFAULT_API_URL, Duration::from_secs(5)).unwrap();
        GitHub::new(&config).unwrap()
    }

    #[test]
    fn test_review_request_body() {
        let body = serde_json::to_value(ReviewRequest::approve()).unwrap();
        assert_eq!(body, serde_json::json!({"event": "APPROVE"}));
    }

    #[test]
    fn test_endpoint_urls() {
        let github = test_client();
        let pr = PullRequestRef::new("acme", "widgets", 42);

        assert_eq!(
            github.review_url(&pr).unwrap().as_str(),
            "https://api.github.com/repos/acme/widgets/pulls/42/reviews"
        );
        assert_eq!(
            github.notifications_url().unwrap().as_str(),
            "https://api.github.com/notifications"
        );
    }

    #[test]
    fn test_reviews_url() {
        assert_eq!(
            reviews_url("https://api.github.com/repos/acme/widgets/pulls/1/"),
            "https://api.github.com/repos/acme/widgets/pulls/1/reviews"
        );
    }

    #[test]
    fn test_status_error_message() {
        let err = ApiError::Status {
            status: 422,
            url: "https://api.github.com/x".to_string(),
            body: "Can not approve your own pull request".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("422"));
        assert!(message.contains("Can not approve your own pull request"));
    }
}
