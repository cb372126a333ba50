//! `FeedClient` - EPG feed server client implementation.

use std::borrow::Cow;
use std::io::Read;
use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use reqwest::{Client, StatusCode};
use tracing::instrument;
use url::Url;

use super::api::LocalFeedApi;
use super::params::{SlotId, detail_path, logo_path};
use super::types::{BasicFeed, ProgramDetail, SlotResponse};

/// Default feed server.
const DEFAULT_BASE_URL: &str = "http://w1.zt6.nl/";

/// Number of retries after a transport failure on detail and logo requests.
const MAX_RETRIES: u32 = 1;

/// Default delay before the retry.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Leading bytes of a gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// EPG feed server client.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct FeedClient {
    /// HTTP client (reqwest, gzip enabled).
    http_client: Client,
    /// Server root.
    base_url: Url,
    /// Delay before retrying a failed detail or logo request.
    retry_delay: Duration,
}

/// Builder for `FeedClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct FeedClientBuilder {
    base_url: Option<Url>,
    user_agent: Option<String>,
    local_address: Option<IpAddr>,
    retry_delay: Option<Duration>,
}

impl FeedClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            base_url: None,
            user_agent: None,
            local_address: None,
            retry_delay: None,
        }
    }

    /// Overrides the server root (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Binds outgoing connections to a local source address.
    #[must_use]
    pub const fn local_address(mut self, addr: IpAddr) -> Self {
        self.local_address = Some(addr);
        self
    }

    /// Sets the delay before retrying a failed detail or logo request
    /// (default: 10s).
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `user_agent` is not set.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<FeedClient> {
        let user_agent = self.user_agent.context("user_agent is required")?;

        let base_url = if let Some(url) = self.base_url {
            url
        } else {
            let result = Url::parse(DEFAULT_BASE_URL);
            result.context("invalid default base URL")?
        };

        let mut builder = Client::builder().user_agent(&user_agent).gzip(true);
        if let Some(addr) = self.local_address {
            builder = builder.local_address(addr);
        }
        let http_client = builder.build().context("failed to build HTTP client")?;

        Ok(FeedClient {
            http_client,
            base_url,
            retry_delay: self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
        })
    }
}

impl FeedClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> FeedClientBuilder {
        FeedClientBuilder::new()
    }

    /// Resolves a path against the server root.
    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("failed to join URL path: {path}"))
    }

    /// Decodes a slot document.
    ///
    /// The body is gunzipped unless the transport already decoded it (no
    /// gzip magic).
    pub(crate) fn decode_slot(body: &[u8]) -> Result<BasicFeed> {
        let json: Cow<'_, [u8]> = if body.starts_with(&GZIP_MAGIC) {
            let mut decoded = Vec::new();
            GzDecoder::new(body)
                .read_to_end(&mut decoded)
                .context("failed to decompress slot document")?;
            Cow::Owned(decoded)
        } else {
            Cow::Borrowed(body)
        };
        let raw_result: std::result::Result<BasicFeed, _> = serde_json::from_slice(&json);
        raw_result.context("failed to decode slot document")
    }

    /// Sends one GET request and reads the whole body.
    async fn get_once(&self, url: &Url) -> Result<(StatusCode, Vec<u8>)> {
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("request failed: {url}"))?;

        let status = response.status();
        tracing::trace!(%url, %status, headers = ?response.headers(), "Response headers");

        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed to read response body: {url}"))?;
        Ok((status, body.to_vec()))
    }

    /// Sends a GET request, retrying once after `retry_delay` when the
    /// transport fails.
    ///
    /// reqwest never pools a connection that failed, so the retry runs on
    /// a new connection.
    async fn get_with_retry(&self, command: &str, url: &Url) -> Result<(StatusCode, Vec<u8>)> {
        let mut last_err = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.get_once(url).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(
                        %command,
                        attempt,
                        error = %e,
                        "Request failed"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{command} failed after retries")))
    }
}

impl LocalFeedApi for FeedClient {
    #[instrument(skip_all, fields(slot = %slot))]
    async fn fetch_slot(&self, slot: SlotId) -> Result<SlotResponse> {
        let url = self.url(&slot.path())?;
        tracing::debug!(%url, "Slot request");

        let (status, body) = self
            .get_once(&url)
            .await
            .with_context(|| format!("failed to download slot {slot}"))?;

        if !status.is_success() {
            tracing::info!(code = status.as_u16(), "Slot unavailable");
            return Ok(SlotResponse::Unavailable {
                status: status.as_u16(),
            });
        }

        tracing::debug!(body_len = body.len(), "Slot document received");
        let feed = Self::decode_slot(&body).with_context(|| format!("invalid slot {slot}"))?;
        Ok(SlotResponse::Available(feed))
    }

    #[instrument(skip_all, fields(program_id = %program_id))]
    async fn fetch_detail(&self, program_id: &str) -> Result<Option<ProgramDetail>> {
        let url = self.url(&detail_path(program_id))?;
        let (status, body) = self.get_with_retry("detail", &url).await?;

        if !status.is_success() {
            tracing::debug!(code = status.as_u16(), "Detail unavailable");
            return Ok(None);
        }

        let raw_result: std::result::Result<ProgramDetail, _> = serde_json::from_slice(&body);
        let detail = raw_result
            .with_context(|| format!("failed to decode detail document for {program_id}"))?;
        Ok(Some(detail))
    }

    #[instrument(skip_all, fields(channel = %channel))]
    async fn fetch_logo(&self, channel: &str) -> Result<Option<Vec<u8>>> {
        let url = self.url(&logo_path(channel))?;
        let (status, body) = self.get_with_retry("logo", &url).await?;

        if !status.is_success() {
            tracing::debug!(code = status.as_u16(), "Logo unavailable");
            return Ok(None);
        }
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::NaiveDate;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    const SLOT_JSON: &str = r#"{
        "npo1": [
            {"id": "P1", "start": 1704103200, "end": 1704106800, "name": "Journaal"},
            {"id": "P2", "start": 1704106800, "end": 1704110400}
        ]
    }"#;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn test_client(server: &wiremock::MockServer) -> FeedClient {
        FeedClient::builder()
            .base_url(server.uri().parse().unwrap())
            .user_agent("test/0.0.0")
            .retry_delay(Duration::from_millis(0))
            .build()
            .unwrap()
    }

    fn slot() -> SlotId {
        SlotId::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 2)
    }

    #[test]
    fn test_builder_requires_user_agent() {
        // Arrange & Act
        let result = FeedClient::builder().build();

        // Assert
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("user_agent is required")
        );
    }

    #[test]
    fn test_builder_defaults() {
        // Arrange & Act
        let client = FeedClient::builder().user_agent("test/0.0.0").build().unwrap();

        // Assert
        assert_eq!(client.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(client.retry_delay, DEFAULT_RETRY_DELAY);
    }

    #[test]
    fn test_builder_with_custom_base_url() {
        // Arrange
        let custom_url = Url::parse("http://localhost:8080/").unwrap();

        // Act
        let client = FeedClient::builder()
            .base_url(custom_url.clone())
            .user_agent("test/0.0.0")
            .build()
            .unwrap();

        // Assert
        assert_eq!(client.base_url, custom_url);
    }

    #[test]
    fn test_decode_gzipped_slot() {
        // Arrange
        let body = gzip(SLOT_JSON.as_bytes());

        // Act
        let feed = FeedClient::decode_slot(&body).unwrap();

        // Assert
        assert_eq!(feed.channels["npo1"].len(), 2);
        assert_eq!(feed.channels["npo1"][1].name, None);
    }

    #[test]
    fn test_decode_plain_slot() {
        // Arrange: transport already removed the gzip layer

        // Act
        let feed = FeedClient::decode_slot(SLOT_JSON.as_bytes()).unwrap();

        // Assert
        assert_eq!(feed.channels["npo1"][0].id.as_deref(), Some("P1"));
    }

    #[test]
    fn test_decode_corrupt_slot_fails() {
        // Arrange
        let mut body = gzip(SLOT_JSON.as_bytes());
        body.truncate(12);

        // Act
        let result = FeedClient::decode_slot(&body);

        // Assert
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_slot_via_http() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(
                "/epgdata/epgdata.20240101.2.json.gz",
            ))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_bytes(gzip(SLOT_JSON.as_bytes())),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
        let client = test_client(&mock_server);

        // Act
        let response = client.fetch_slot(slot()).await.unwrap();

        // Assert
        let SlotResponse::Available(feed) = response else {
            panic!("expected an available slot");
        };
        assert_eq!(feed.channels["npo1"].len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_slot_not_found_is_unavailable() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let client = test_client(&mock_server);

        // Act
        let response = client.fetch_slot(slot()).await.unwrap();

        // Assert
        assert_eq!(response, SlotResponse::Unavailable { status: 404 });
    }

    #[tokio::test]
    async fn test_fetch_slot_is_not_retried() {
        // Arrange: nothing listens on the discard port
        let client = FeedClient::builder()
            .base_url(Url::parse("http://127.0.0.1:9/").unwrap())
            .user_agent("test/0.0.0")
            .retry_delay(Duration::from_millis(0))
            .build()
            .unwrap();

        // Act
        let result = client.fetch_slot(slot()).await;

        // Assert
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("failed to download slot 20240101.2"));
    }

    #[test]
    fn test_decode_slot_keeps_batches_around_non_object_items() {
        // Arrange
        let body = br#"{"npo1": [{"id": "P1", "start": 1, "end": 2, "name": "A"}, null],
                        "npo2": [{"id": "P2", "start": 1, "end": 2, "name": "B"}]}"#;

        // Act
        let feed = FeedClient::decode_slot(body).unwrap();

        // Assert
        assert_eq!(feed.channels["npo1"].len(), 2);
        assert_eq!(feed.channels["npo2"][0].id.as_deref(), Some("P2"));
    }

    #[tokio::test]
    async fn test_fetch_slot_with_invalid_json_fails() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(gzip(b"<html>")))
            .mount(&mock_server)
            .await;
        let client = test_client(&mock_server);

        // Act
        let result = client.fetch_slot(slot()).await;

        // Assert
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_detail_uses_shard_path() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/epgdata/45/12345.json"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
                r#"{"episodeTitle": "Pilot", "genres": ["Drama"], "aspectratio": "16:9"}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;
        let client = test_client(&mock_server);

        // Act
        let detail = client.fetch_detail("12345").await.unwrap().unwrap();

        // Assert
        assert_eq!(detail.episode_title.as_deref(), Some("Pilot"));
        assert_eq!(detail.genres, Some(vec![String::from("Drama")]));
        assert_eq!(detail.aspect_ratio.as_deref(), Some("16:9"));
    }

    #[tokio::test]
    async fn test_fetch_detail_not_found_returns_none() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;
        let client = test_client(&mock_server);

        // Act
        let detail = client.fetch_detail("12345").await.unwrap();

        // Assert: non-success is not retried (mock expects exactly one call)
        assert_eq!(detail, None);
    }

    #[tokio::test]
    async fn test_fetch_detail_gives_up_after_one_retry() {
        // Arrange: nothing listens on the discard port
        let client = FeedClient::builder()
            .base_url(Url::parse("http://127.0.0.1:9/").unwrap())
            .user_agent("test/0.0.0")
            .retry_delay(Duration::from_millis(10))
            .build()
            .unwrap();

        // Act
        let start = std::time::Instant::now();
        let result = client.fetch_detail("12345").await;

        // Assert: the retry waited for the back-off delay before failing
        assert!(result.is_err());
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_fetch_detail_retries_once_on_new_connection() {
        // Arrange: the first connection is closed without a response,
        // the second one is served
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    drop(socket);
                    continue;
                }
                let mut request = Vec::new();
                let mut chunk = [0_u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let read = socket.read(&mut chunk).await.unwrap();
                    if read == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..read]);
                }
                let body = r#"{"episodeTitle": "Pilot"}"#;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });
        let client = FeedClient::builder()
            .base_url(Url::parse(&format!("http://{addr}/")).unwrap())
            .user_agent("test/0.0.0")
            .retry_delay(Duration::from_millis(0))
            .build()
            .unwrap();

        // Act
        let detail = client.fetch_detail("12345").await.unwrap();

        // Assert
        assert_eq!(detail.unwrap().episode_title.as_deref(), Some("Pilot"));
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_detail_makes_two_attempts_at_most() {
        // Arrange: every connection is closed without a response
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        });
        let client = FeedClient::builder()
            .base_url(Url::parse(&format!("http://{addr}/")).unwrap())
            .user_agent("test/0.0.0")
            .retry_delay(Duration::from_millis(0))
            .build()
            .unwrap();

        // Act
        let result = client.fetch_detail("12345").await;

        // Assert
        assert!(result.is_err());
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_logo_via_http() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/tvmenu/images/channels/npo1.png"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(vec![0x89, 0x50]))
            .mount(&mock_server)
            .await;
        let client = test_client(&mock_server);

        // Act
        let logo = client.fetch_logo("npo1").await.unwrap();
        let missing = client.fetch_logo("npo2").await.unwrap();

        // Assert
        assert_eq!(logo, Some(vec![0x89, 0x50]));
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_user_agent_is_sent() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::header("User-Agent", "epggrab/0.1.0"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;
        let client = FeedClient::builder()
            .base_url(mock_server.uri().parse().unwrap())
            .user_agent("epggrab/0.1.0")
            .build()
            .unwrap();

        // Act & Assert (mock expect(1) verifies User-Agent header)
        client.fetch_slot(slot()).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_address_binding() {
        // Arrange
        let mock_server = wiremock::MockServer::start().await;
        let client = FeedClient::builder()
            .base_url(mock_server.uri().parse().unwrap())
            .user_agent("test/0.0.0")
            .local_address(IpAddr::from([127, 0, 0, 1]))
            .build()
            .unwrap();

        // Act
        let response = client.fetch_slot(slot()).await.unwrap();

        // Assert
        assert_eq!(response, SlotResponse::Unavailable { status: 404 });
    }
}
