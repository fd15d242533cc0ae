use crate::feed::parser::{parse_feed, ParsedFeed};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

pub(crate) const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while downloading a catalog or feed document.
///
/// Failed downloads are never retried; the caller logs the error and moves
/// on to the next source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Document could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Downloads a document and returns its body.
///
/// The whole exchange, headers and body, must finish within `timeout`.
///
/// # Errors
///
/// - [`FetchError::Timeout`] - `timeout` elapsed
/// - [`FetchError::Network`] - Connection or TLS errors
/// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
/// - [`FetchError::ResponseTooLarge`] - Body exceeded `limit` bytes
/// - [`FetchError::IncompleteResponse`] - Body shorter than Content-Length
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    tokio::time::timeout(timeout, async {
        let response = client.get(url).send().await.map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, limit).await
    })
    .await
    .map_err(|_| FetchError::Timeout)?
}

/// Downloads and parses an RSS/Atom feed.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<ParsedFeed, FetchError> {
    let bytes = download(client, url, timeout, MAX_FEED_SIZE).await?;
    parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <link>https://example.com/</link>
    <item><guid>1</guid><title>Test</title></item>
</channel></rss>"#;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_fetch_feed_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let feed = fetch_feed(&client, &format!("{}/feed", mock_server.uri()), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.site_link.as_deref(), Some("https://example.com/"));
    }

    #[tokio::test]
    async fn test_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = fetch_feed(&client, &format!("{}/feed", mock_server.uri()), TIMEOUT).await;
        match result.unwrap_err() {
            FetchError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = download(&client, &mock_server.uri(), TIMEOUT, MAX_FEED_SIZE).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(500))));
    }

    #[tokio::test]
    async fn test_malformed_feed_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = fetch_feed(&client, &mock_server.uri(), TIMEOUT).await;
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_response_over_limit_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = download(&client, &mock_server.uri(), TIMEOUT, 1024).await;
        assert!(matches!(result, Err(FetchError::ResponseTooLarge)));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = download(
            &client,
            &mock_server.uri(),
            Duration::from_millis(100),
            MAX_FEED_SIZE,
        )
        .await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let uri = {
            let mock_server = MockServer::start().await;
            mock_server.uri()
        };

        let client = reqwest::Client::new();
        let result = download(&client, &format!("{}/feed", uri), TIMEOUT, MAX_FEED_SIZE).await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }
}
