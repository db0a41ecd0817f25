//! HTTP content source.
//!
//! Requests go through [`HttpClient`]; applications plug in whichever HTTP
//! library they already ship with.

use crate::error::{SourceError, SourceResult};
use crate::source::{CollectionPage, ContentSource, QueryParams, SyncPage};
use contentmirror_core::Record;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Header carrying the number of seconds until the rate limit resets.
const RATE_LIMIT_RESET_HEADER: &str = "x-contentful-ratelimit-reset";

/// Rate-limited responses tolerated per request, whatever the reset value.
const MAX_RATE_LIMIT_RETRIES: u32 = 10;

/// A raw HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers, names lower-cased.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response with a body and no headers.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Returns a header value by (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request with the given headers.
    ///
    /// Returns `Err` only for failures below HTTP (DNS, TLS, connection).
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, String>;
}

/// Connection settings for [`HttpSource`].
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Base URL of the delivery API.
    pub base_url: String,
    /// Space id.
    pub space: String,
    /// Environment id.
    pub environment: String,
    /// Bearer token.
    pub access_token: String,
    /// Longest total time to wait on rate limits before failing.
    pub max_rate_limit_wait: Duration,
}

impl HttpSourceConfig {
    /// Creates a configuration for the `master` environment.
    pub fn new(
        base_url: impl Into<String>,
        space: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            space: space.into(),
            environment: "master".into(),
            access_token: access_token.into(),
            max_rate_limit_wait: Duration::from_secs(60),
        }
    }

    /// Sets the environment.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Sets the rate-limit wait budget.
    #[must_use]
    pub fn with_max_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.max_rate_limit_wait = wait;
        self
    }
}

/// Body of a sync response.
#[derive(Debug, Deserialize)]
struct SyncBody {
    #[serde(default)]
    items: Vec<Record>,
    #[serde(rename = "nextPageUrl")]
    next_page_url: Option<String>,
    #[serde(rename = "nextSyncUrl")]
    next_sync_url: Option<String>,
}

/// A [`ContentSource`] speaking the delivery API over HTTP.
pub struct HttpSource<C: HttpClient> {
    config: HttpSourceConfig,
    client: C,
}

impl<C: HttpClient> HttpSource<C> {
    /// Creates a new HTTP source.
    pub fn new(config: HttpSourceConfig, client: C) -> Self {
        Self { config, client }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HttpSourceConfig {
        &self.config
    }

    fn url(&self, path: &str, params: &QueryParams) -> String {
        let mut url = format!(
            "{}/spaces/{}/environments/{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.space,
            self.config.environment,
            path
        );
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.to_query_string());
        }
        url
    }

    /// Issues a GET, waiting out rate limits until the budget is spent.
    fn fetch(&self, url: &str) -> SourceResult<HttpResponse> {
        let headers = vec![(
            "authorization".to_string(),
            format!("Bearer {}", self.config.access_token),
        )];
        let mut waited = Duration::ZERO;
        let mut retries = 0u32;

        loop {
            let response = self
                .client
                .get(url, &headers)
                .map_err(SourceError::transport_retryable)?;

            if response.status != 429 {
                return Ok(response);
            }

            let reset = response
                .header(RATE_LIMIT_RESET_HEADER)
                .or_else(|| response.header("retry-after"))
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(1));

            retries += 1;
            let total = match waited.checked_add(reset) {
                Some(total) if total <= self.config.max_rate_limit_wait => total,
                _ => return Err(SourceError::RateLimitExceeded { waited }),
            };
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(SourceError::RateLimitExceeded { waited });
            }

            info!(wait = ?reset, retries, "rate limited, backing off");
            std::thread::sleep(reset);
            waited = total;
        }
    }

    fn check_status(response: &HttpResponse, path: &str) -> SourceResult<()> {
        match response.status {
            200..=299 => Ok(()),
            404 => Err(SourceError::NotFound {
                path: path.to_string(),
            }),
            401 | 403 => Err(SourceError::transport_fatal(format!(
                "access denied ({}) for {path}",
                response.status
            ))),
            500..=599 => Err(SourceError::transport_retryable(format!(
                "server error ({}) for {path}",
                response.status
            ))),
            status => Err(SourceError::Protocol(format!(
                "unexpected status {status} for {path}"
            ))),
        }
    }
}

/// Extracts the `sync_token` parameter from a next-page or next-sync URL.
fn token_from_url(url: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "sync_token").then(|| {
            urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
    })
}

impl<C: HttpClient> ContentSource for HttpSource<C> {
    fn sync(&self, cursor: Option<&str>) -> SourceResult<SyncPage> {
        let params = match cursor {
            Some(token) => QueryParams::new().with("sync_token", token),
            None => QueryParams::new().with("initial", "true"),
        };
        let url = self.url("/sync", &params);
        let response = self.fetch(&url)?;
        Self::check_status(&response, "/sync")?;

        let body: SyncBody = serde_json::from_slice(&response.body)?;
        let (next_url, has_more) = match (body.next_page_url, body.next_sync_url) {
            (Some(url), _) => (url, true),
            (None, Some(url)) => (url, false),
            (None, None) => {
                return Err(SourceError::Protocol(
                    "sync response carries neither nextPageUrl nor nextSyncUrl".into(),
                ))
            }
        };
        let next_cursor = token_from_url(&next_url).ok_or_else(|| {
            SourceError::Protocol(format!("no sync_token in {next_url}"))
        })?;

        debug!(items = body.items.len(), has_more, "sync page received");
        Ok(SyncPage {
            items: body.items,
            next_cursor,
            has_more,
        })
    }

    fn get(&self, path: &str, params: &QueryParams) -> SourceResult<Option<CollectionPage>> {
        let url = self.url(path, params);
        let response = self.fetch(&url)?;
        let is_point_lookup = path.trim_end_matches('/').matches('/').count() >= 2;

        match Self::check_status(&response, path) {
            Ok(()) => {}
            Err(SourceError::NotFound { .. }) if is_point_lookup => return Ok(None),
            Err(e) => return Err(e),
        }

        if is_point_lookup {
            let record: Record = serde_json::from_slice(&response.body)?;
            return Ok(Some(CollectionPage::of(vec![record])));
        }
        Ok(Some(serde_json::from_slice(&response.body)?))
    }
}
