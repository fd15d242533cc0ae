use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a configured or catalog-declared URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// No URL was configured (absent or blank).
    #[error("URL is empty")]
    Empty,
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a URL string for use as a catalog or feed source.
///
/// Leading and trailing whitespace is ignored. Only absolute `http` and
/// `https` URLs with a host are accepted.
///
/// # Errors
///
/// Returns [`UrlValidationError`] if:
/// - The string is blank ([`UrlValidationError::Empty`])
/// - The URL cannot be parsed ([`UrlValidationError::InvalidUrl`])
/// - The scheme is not `http` or `https` ([`UrlValidationError::UnsupportedScheme`])
/// - There is no host ([`UrlValidationError::MissingHost`])
///
/// # Examples
///
/// ```
/// use blogsync::util::validate_url;
///
/// let url = validate_url("https://example.com/bloggers.json").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::Empty);
    }

    let url = Url::parse(trimmed)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost),
    }
}
