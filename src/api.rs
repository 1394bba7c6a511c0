use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://jsonplaceholder.typicode.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

pub type UserId = u64;
pub type PostId = u64;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("api client user agent required")]
    MissingUserAgent,
    #[error("invalid api url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    #[serde(rename = "catchPhrase", default)]
    pub catch_phrase: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub company: Company,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(rename = "postId")]
    pub post_id: PostId,
    pub name: String,
    pub email: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub http_client: Option<HttpClient>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            user_agent: format!("staffroll/{}", crate::VERSION),
            timeout: DEFAULT_TIMEOUT,
            http_client: None,
        }
    }
}

/// Blocking client for the users/posts/comments REST API.
///
/// Every method issues exactly one GET and reports failures as [`ApiError`];
/// deciding what a failure means for the caller is left to the data layer.
pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        if config.user_agent.trim().is_empty() {
            return Err(ApiError::MissingUserAgent);
        }

        let base = config.base_url.trim_end_matches('/');
        let base_url = Url::parse(&format!("{base}/")).map_err(|source| ApiError::InvalidUrl {
            url: config.base_url.clone(),
            source,
        })?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout)
                .build()
                .map_err(|source| ApiError::Transport {
                    url: base_url.to_string(),
                    source,
                })?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn users(&self) -> Result<Vec<User>, ApiError> {
        let url = self.endpoint("users", &[])?;
        self.get_json(url)
    }

    pub fn user(&self, user_id: UserId) -> Result<User, ApiError> {
        let url = self.endpoint(&format!("users/{user_id}"), &[])?;
        self.get_json(url)
    }

    pub fn user_posts(&self, user_id: UserId) -> Result<Vec<Post>, ApiError> {
        let url = self.endpoint("posts", &[("userId", user_id.to_string())])?;
        self.get_json(url)
    }

    pub fn post_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError> {
        let url = self.endpoint(&format!("posts/{post_id}/comments"), &[])?;
        self.get_json(url)
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|source| ApiError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
                source,
            })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        tracing::debug!(%url, "GET");
        let response = self
            .http
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
