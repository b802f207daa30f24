use thiserror::Error;
use url::Url;

/// Reasons an update URL is not usable as-is.
///
/// Loading an appcast only requires URLs to be non-empty; these checks are
/// for reporting and for callers that want to be stricter before handing a
/// URL to a downloader or a browser.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host to connect to.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a download or web URL taken from an appcast.
///
/// Rejects anything that does not parse, uses a scheme other than `http` or
/// `https` (e.g. `file://`, `javascript:`), or has no host.
///
/// # Examples
///
/// ```
/// use appcast_reader::util::validate_url;
///
/// let url = validate_url("https://example.com/app-2.0.exe").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("file:///etc/passwd").is_err());
/// assert!(validate_url("not a url").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_url("https://example.com/app.exe").is_ok());
        assert!(validate_url("http://updates.example.org/appcast.xml").is_ok());
        assert!(validate_url("https://example.com:8443/app.exe?arch=x64").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_url("ftp://example.com/app.exe").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_unparseable() {
        assert!(matches!(
            validate_url("example.com/app.exe"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
        assert!(validate_url("").is_err());
    }

    #[test]
    fn test_private_hosts_allowed() {
        // Intranet update servers are legitimate for installers
        assert!(validate_url("http://192.168.1.10/app.exe").is_ok());
        assert!(validate_url("http://localhost:8080/app.exe").is_ok());
    }
}
