//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests to the catalog API, including:
//! - Building the HTTP client with a proper user agent string
//! - Client-credentials authentication with a cached token
//! - Retry with backoff for transient failures and rate limits
//! - Error classification
//! - Pagination for search and playlist endpoints

use crate::catalog::{Artist, PlaylistSummary};
use crate::collector::retry::RetryPolicy;
use crate::collector::traits::CatalogApi;
use crate::config::ApiConfig;
use crate::output::{Counter, MetricsSink, Timer};
use crate::{ApiError, ApiResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

const USER_AGENT: &str = concat!("GenreHarvest/", env!("CARGO_PKG_VERSION"));

/// Tokens are refreshed this long before the API says they expire
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

/// The search endpoint refuses offsets past this point
const SEARCH_OFFSET_LIMIT: usize = 1000;

/// Largest page the playlist-items endpoint serves
const PLAYLIST_PAGE_SIZE: u32 = 100;

/// Safety stop for `next` links that never end
const MAX_PLAYLIST_PAGES: usize = 100;

/// Longest error body kept in an error message
const ERROR_BODY_LIMIT: usize = 200;

/// Client id and secret for the client-credentials flow
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Reads `SPOTIFY_CLIENT_ID` and `SPOTIFY_CLIENT_SECRET`
    ///
    /// Returns None unless both are set and non-blank.
    pub fn from_env() -> Option<Self> {
        let id = std::env::var("SPOTIFY_CLIENT_ID").ok()?;
        let secret = std::env::var("SPOTIFY_CLIENT_SECRET").ok()?;
        if id.trim().is_empty() || secret.trim().is_empty() {
            return None;
        }
        Some(Self::new(id.trim(), secret.trim()))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The API configuration (timeouts)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Reads a `Retry-After` header given in seconds
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let secs = value.parse::<f64>().ok()?;
    // Negative, NaN and out-of-range values are dropped
    Duration::try_from_secs_f64(secs).ok()
}

fn truncate(body: &str) -> String {
    let mut text: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    if body.chars().count() > ERROR_BODY_LIMIT {
        text.push_str("...");
    }
    text
}

/// Sends one request and classifies the outcome
///
/// # Classification
///
/// | Outcome | Error |
/// |---------|-------|
/// | HTTP 2xx with a JSON body | none |
/// | HTTP 429 | RateLimited (with `Retry-After`) |
/// | HTTP 5xx | Transient |
/// | Other HTTP 4xx | Fatal |
/// | Timeout, connection or body error | Transient |
/// | Request could not be built | Fatal |
async fn send_once(request: RequestBuilder, url: &str) -> ApiResult<Value> {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) if e.is_builder() => {
            return Err(ApiError::Fatal {
                url: url.to_string(),
                status: None,
                message: e.to_string(),
            })
        }
        Err(e) => {
            return Err(ApiError::Transient {
                url: url.to_string(),
                message: e.to_string(),
            })
        }
    };

    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ApiError::RateLimited {
            url: url.to_string(),
            retry_after: parse_retry_after(response.headers()),
        });
    }

    if status.is_server_error() {
        return Err(ApiError::Transient {
            url: url.to_string(),
            message: format!("HTTP {}", status),
        });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Fatal {
            url: url.to_string(),
            status: Some(status.as_u16()),
            message: format!(
                "HTTP {}: {}",
                status.as_u16(),
                if body.is_empty() {
                    status.canonical_reason().unwrap_or("Unknown").to_string()
                } else {
                    truncate(&body)
                }
            ),
        });
    }

    response.json::<Value>().await.map_err(|e| ApiError::Transient {
        url: url.to_string(),
        message: format!("unreadable body: {}", e),
    })
}

/// Spotify Web API client
pub struct SpotifyClient {
    http: Client,
    accounts_url: String,
    base_url: String,
    credentials: Option<Credentials>,
    token: Mutex<Option<AccessToken>>,
    retry: RetryPolicy,
    metrics: Arc<dyn MetricsSink>,
    page_size: usize,
}

impl SpotifyClient {
    /// Creates a client; no network traffic happens until the first call
    ///
    /// Without credentials every call fails with `MissingCredentials`.
    pub fn new(
        config: &ApiConfig,
        retry: RetryPolicy,
        credentials: Option<Credentials>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: build_http_client(config)?,
            accounts_url: config.accounts_url.trim_end_matches('/').to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            token: Mutex::new(None),
            retry,
            metrics,
            page_size: config.page_size.clamp(1, 50) as usize,
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetches `<base_url>/<endpoint>?<params>`
    pub async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> ApiResult<Value> {
        let url = Url::parse_with_params(
            &format!("{}/{}", self.base_url, endpoint.trim_start_matches('/')),
            params,
        )?;
        self.fetch_url(url.as_str()).await
    }

    /// Fetches an absolute URL, e.g. a `next` pagination link
    pub async fn fetch_url(&self, url: &str) -> ApiResult<Value> {
        let token = self.access_token().await?;
        self.execute(url, || self.http.get(url).bearer_auth(&token))
            .await
    }

    /// Runs a request under the retry policy
    ///
    /// Every attempt counts as one API call in the metrics.
    async fn execute<F>(&self, url: &str, build: F) -> ApiResult<Value>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let outcome = send_once(build(), url).await;

            self.metrics.incr(Counter::ApiCalls, 1);
            self.metrics.observe(Timer::ApiLatency, started.elapsed());

            let error = match outcome {
                Ok(body) => {
                    debug!(url = %url, attempt, "Request succeeded");
                    return Ok(body);
                }
                Err(error) => error,
            };

            if !self.retry.should_retry(&error, attempt) {
                self.metrics.incr(Counter::ApiErrors, 1);
                if error.is_retryable() {
                    warn!(url = %url, attempts = attempt, error = %error, "Retries exhausted");
                }
                return Err(error);
            }

            let delay = self.retry.next_delay(attempt, error.retry_after());
            match &error {
                ApiError::RateLimited { .. } => self.metrics.incr(Counter::ApiRateLimited, 1),
                _ => self.metrics.incr(Counter::ApiRetries, 1),
            }
            warn!(
                url = %url,
                attempt,
                max_attempts = self.retry.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Returns a valid access token, requesting a new one when needed
    async fn access_token(&self) -> ApiResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let credentials = self
            .credentials
            .as_ref()
            .ok_or(ApiError::MissingCredentials)?;
        let url = format!("{}/api/token", self.accounts_url);

        let body = self
            .execute(&url, || {
                self.http
                    .post(&url)
                    .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
                    .form(&[("grant_type", "client_credentials")])
            })
            .await?;

        let value = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Fatal {
                url: url.clone(),
                status: None,
                message: "token response has no access_token".to_string(),
            })?
            .to_string();
        let expires_in = body
            .get("expires_in")
            .and_then(Value::as_u64)
            .unwrap_or(3600);

        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now()
                + Duration::from_secs(expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS)),
        });
        info!(expires_in, "Acquired access token");

        Ok(value)
    }
}

#[async_trait]
impl CatalogApi for SpotifyClient {
    async fn available_genres(&self) -> Vec<String> {
        match self.fetch("recommendations/available-genre-seeds", &[]).await {
            Ok(body) => body
                .get("genres")
                .and_then(Value::as_array)
                .map(|genres| {
                    genres
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Genre seed listing unavailable");
                Vec::new()
            }
        }
    }

    async fn search_artists(&self, genre: &str, limit: usize) -> ApiResult<Vec<Artist>> {
        let mut artists: Vec<Artist> = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = 0;

        while artists.len() < limit && offset < SEARCH_OFFSET_LIMIT {
            let requested = self
                .page_size
                .min(limit - artists.len())
                .min(SEARCH_OFFSET_LIMIT - offset);

            let body = self
                .fetch(
                    "search",
                    &[
                        ("q", format!("genre:\"{}\"", genre)),
                        ("type", "artist".to_string()),
                        ("limit", requested.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await?;

            let items = body
                .pointer("/artists/items")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if items.is_empty() {
                break;
            }

            let returned = items.len();
            for artist in items.iter().filter_map(Artist::from_value) {
                if seen.insert(artist.id.clone()) {
                    artists.push(artist);
                }
            }

            offset += returned;
            debug!(genre = %genre, offset, collected = artists.len(), "Artist search page");
            if returned < requested {
                break;
            }
        }

        artists.truncate(limit);
        Ok(artists)
    }

    async fn search_playlists(
        &self,
        query: &str,
        limit: usize,
    ) -> ApiResult<Vec<PlaylistSummary>> {
        let body = self
            .fetch(
                "search",
                &[
                    ("q", query.to_string()),
                    ("type", "playlist".to_string()),
                    ("limit", limit.clamp(1, 50).to_string()),
                ],
            )
            .await?;

        Ok(body
            .pointer("/playlists/items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| !item.is_null())
                    .filter_map(PlaylistSummary::from_value)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> ApiResult<Vec<Value>> {
        let mut tracks = Vec::new();
        let mut body = self
            .fetch(
                &format!("playlists/{}/tracks", playlist_id),
                &[("limit", PLAYLIST_PAGE_SIZE.to_string())],
            )
            .await?;

        for page in 1.. {
            if let Some(items) = body.get("items").and_then(Value::as_array) {
                tracks.extend(
                    items
                        .iter()
                        .filter_map(|item| item.get("track"))
                        .filter(|track| track.is_object())
                        .filter(|track| {
                            !track
                                .get("is_local")
                                .and_then(Value::as_bool)
                                .unwrap_or(false)
                        })
                        .cloned(),
                );
            }

            let Some(next) = body.get("next").and_then(Value::as_str).map(str::to_string) else {
                break;
            };
            if page >= MAX_PLAYLIST_PAGES {
                warn!(playlist_id = %playlist_id, pages = page, "Stopping playlist pagination");
                break;
            }
            body = self.fetch_url(&next).await?;
        }

        Ok(tracks)
    }

    async fn artist_top_tracks(&self, artist_id: &str, market: &str) -> ApiResult<Value> {
        self.fetch(
            &format!("artists/{}/top-tracks", artist_id),
            &[("market", market.to_string())],
        )
        .await
    }
}
