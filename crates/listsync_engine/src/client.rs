use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use listsync_core::{ProviderKind, SourceConfig};
use reqwest::header::RETRY_AFTER;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sync_logging::{sync_debug, sync_trace};

use crate::normalize::{OwnedBookResource, RawItem, RawPage, ReviewResource};
use crate::{FailureKind, FetchError};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub base_url: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_page_bytes: u64,
    pub requests_per_second: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.goodreads.com".to_string(),
            user_agent: concat!("listsync/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_page_bytes: 5 * 1024 * 1024,
            requests_per_second: 1,
        }
    }
}

/// Fetches one page of provider-native items for a source.
#[async_trait::async_trait]
pub trait SourceClient: Send + Sync {
    async fn fetch_page(&self, config: &SourceConfig, page: u32) -> Result<RawPage, FetchError>;
}

/// Resolves a source's `auth_ref` to a bearer token.
pub trait CredentialProvider: Send + Sync {
    fn token(&self, auth_ref: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    tokens: BTreeMap<String, String>,
}

impl StaticCredentials {
    pub fn new(tokens: BTreeMap<String, String>) -> Self {
        Self { tokens }
    }
}

impl CredentialProvider for StaticCredentials {
    fn token(&self, auth_ref: &str) -> Option<String> {
        self.tokens.get(auth_ref).cloned()
    }
}

/// Page envelope shared by the owned-books and shelf endpoints.
#[derive(Debug, Deserialize)]
struct PageEnvelope<T> {
    #[serde(default)]
    end: Option<u32>,
    #[serde(default)]
    total: Option<u32>,
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

impl<T> PageEnvelope<T> {
    fn has_more(&self) -> bool {
        match (self.end, self.total) {
            (Some(end), Some(total)) => end < total,
            _ => !self.items.is_empty(),
        }
    }

    fn into_page(self, page: u32, wrap: fn(T) -> RawItem) -> RawPage {
        let has_more = self.has_more();
        RawPage {
            page,
            items: self.items.into_iter().map(wrap).collect(),
            has_more,
        }
    }
}

/// Client for the Goodreads-style owned-books and shelf endpoints.
pub struct GoodreadsClient {
    settings: FetchSettings,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    limiter: DefaultDirectRateLimiter,
}

impl GoodreadsClient {
    pub fn new(
        settings: FetchSettings,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        let per_second = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            settings,
            http,
            credentials,
            limiter,
        })
    }

    fn page_url(&self, config: &SourceConfig, page: u32) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.settings.base_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                FetchError::new(FailureKind::InvalidUrl, "base url cannot carry a path")
            })?;
            segments.pop_if_empty();
            match &config.provider {
                ProviderKind::GoodreadsOwnedBooks => {
                    segments.extend(["owned_books", "user"]);
                }
                ProviderKind::GoodreadsBookshelf { .. } => {
                    segments.extend(["review", "list", config.user_id.as_str()]);
                }
            }
        }
        {
            let mut query = url.query_pairs_mut();
            match &config.provider {
                ProviderKind::GoodreadsOwnedBooks => {
                    query.append_pair("id", &config.user_id);
                }
                ProviderKind::GoodreadsBookshelf { shelf } => {
                    query.append_pair("shelf", shelf);
                }
            }
            query.append_pair("page", &page.to_string());
        }
        Ok(url)
    }

    fn bearer_token(&self, config: &SourceConfig) -> Result<Option<String>, FetchError> {
        let Some(auth_ref) = config.auth_ref.as_deref() else {
            return Ok(None);
        };
        self.credentials.token(auth_ref).map(Some).ok_or_else(|| {
            FetchError::new(
                FailureKind::Auth,
                format!("no credential stored for {auth_ref}"),
            )
        })
    }

    async fn get_body(&self, config: &SourceConfig, page: u32) -> Result<Vec<u8>, FetchError> {
        let url = self.page_url(config, page)?;
        let mut request = self.http.get(url.clone());
        if let Some(token) = self.bearer_token(config)? {
            request = request.bearer_auth(token);
        }

        self.limiter.until_ready().await;
        sync_debug!("GET {} (source {}, page {})", url, config.id, page);
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::new(FailureKind::Auth, status.to_string()));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok());
            return Err(FetchError::new(
                FailureKind::RateLimited { retry_after_secs },
                status.to_string(),
            ));
        }
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let max_bytes = self.settings.max_page_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        sync_trace!("Got:\n{}", String::from_utf8_lossy(&bytes));
        Ok(bytes)
    }
}

#[async_trait::async_trait]
impl SourceClient for GoodreadsClient {
    async fn fetch_page(&self, config: &SourceConfig, page: u32) -> Result<RawPage, FetchError> {
        let body = self.get_body(config, page).await?;
        let raw_page = match &config.provider {
            ProviderKind::GoodreadsOwnedBooks => {
                decode::<OwnedBookResource>(&body)?.into_page(page, RawItem::OwnedBook)
            }
            ProviderKind::GoodreadsBookshelf { .. } => {
                decode::<ReviewResource>(&body)?.into_page(page, RawItem::Review)
            }
        };
        Ok(raw_page)
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<PageEnvelope<T>, FetchError> {
    serde_json::from_slice(body)
        .map_err(|err| FetchError::new(FailureKind::InvalidResponse, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
