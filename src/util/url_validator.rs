use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

/// Errors produced while turning user input into a validated feed URL.
///
/// Raised before any network I/O is attempted: a string that fails here
/// must never reach the HTTP client.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The input was empty or contained only whitespace.
    #[error("URL is empty")]
    Empty,
    /// The input contains whitespace or control characters.
    ///
    /// The WHATWG parser would silently strip or percent-encode these, so an
    /// explicit pre-check is required to reject them instead.
    #[error("URL contains whitespace or control characters")]
    IllegalCharacter,
    /// The input could not be parsed as an absolute URL.
    #[error("Invalid URL: {0}")]
    Parse(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL points at a loopback, private, or link-local address and the
    /// active policy forbids fetching from private networks.
    #[error("Private or local address not allowed: {0}")]
    PrivateAddress(String),
}

/// Policy knobs for feed URL validation.
///
/// `allow_private_hosts` defaults to off: a subscription tool has no business
/// fetching loopback or RFC 1918 addresses unless the user opted in via
/// config (useful for self-hosted feeds and for exercising the flow against
/// a local server).
#[derive(Debug, Clone, Default)]
pub struct UrlPolicy {
    pub allow_private_hosts: bool,
}

impl UrlPolicy {
    /// Policy that accepts loopback and private addresses.
    pub fn permissive() -> Self {
        Self {
            allow_private_hosts: true,
        }
    }
}

/// Validates a user-entered string as a feed source URL.
///
/// Leading and trailing whitespace is tolerated (copy-paste padding);
/// anything else that is not a well-formed absolute http(s) URL with a host
/// is rejected with a specific [`UrlValidationError`]. Under the default
/// policy, loopback/private/link-local hosts are rejected as well.
///
/// # Examples
///
/// ```
/// use feedkeep::util::{validate_feed_url, UrlPolicy};
///
/// let policy = UrlPolicy::default();
/// let url = validate_feed_url("https://example.com/feed.xml", &policy).unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_feed_url("", &policy).is_err());
/// assert!(validate_feed_url("https://exa mple.com/feed", &policy).is_err());
/// assert!(validate_feed_url("http://127.0.0.1/feed", &policy).is_err());
/// ```
pub fn validate_feed_url(raw: &str, policy: &UrlPolicy) -> Result<Url, UrlValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::Empty);
    }
    if trimmed
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(UrlValidationError::IllegalCharacter);
    }

    let url = Url::parse(trimmed)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host().ok_or(UrlValidationError::MissingHost)?;

    if !policy.allow_private_hosts {
        reject_private_host(&host)?;
    }

    Ok(url)
}

fn reject_private_host(host: &Host<&str>) -> Result<(), UrlValidationError> {
    match host {
        Host::Domain(name) => {
            if name.eq_ignore_ascii_case("localhost") {
                return Err(UrlValidationError::PrivateAddress((*name).to_owned()));
            }
        }
        Host::Ipv4(addr) => {
            if addr.is_loopback()
                || addr.is_private()
                || addr.is_link_local()
                || addr.is_unspecified()
            {
                return Err(UrlValidationError::PrivateAddress(addr.to_string()));
            }
        }
        Host::Ipv6(addr) => {
            if is_private_v6(&IpAddr::V6(*addr)) {
                return Err(UrlValidationError::PrivateAddress(addr.to_string()));
            }
        }
    }
    Ok(())
}

fn is_private_v6(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(_) => false,
        IpAddr::V6(v6) => {
            if v6.is_loopback() || v6.is_unspecified() {
                return true;
            }
            let segments = v6.segments();
            // Unique Local (fc00::/7) and Link-Local (fe80::/10)
            (segments[0] & 0xfe00) == 0xfc00 || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strict() -> UrlPolicy {
        UrlPolicy::default()
    }

    #[test]
    fn test_valid_public_urls() {
        assert!(validate_feed_url("https://example.com/feed.xml", &strict()).is_ok());
        assert!(validate_feed_url("http://news.example.org", &strict()).is_ok());
        assert!(validate_feed_url("https://example.com:8443/rss", &strict()).is_ok());
    }

    #[test]
    fn test_outer_whitespace_trimmed() {
        let url = validate_feed_url("  https://example.com/feed.xml\n", &strict()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/feed.xml");
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(
            validate_feed_url("", &strict()),
            Err(UrlValidationError::Empty)
        ));
        assert!(matches!(
            validate_feed_url("   ", &strict()),
            Err(UrlValidationError::Empty)
        ));
    }

    #[test]
    fn test_embedded_whitespace_rejected() {
        assert!(matches!(
            validate_feed_url("https://exa mple.com/feed", &strict()),
            Err(UrlValidationError::IllegalCharacter)
        ));
        assert!(matches!(
            validate_feed_url("https://example.com/fe\ted", &strict()),
            Err(UrlValidationError::IllegalCharacter)
        ));
    }

    #[test]
    fn test_control_characters_rejected() {
        assert!(matches!(
            validate_feed_url("https://example.com/\x07feed", &strict()),
            Err(UrlValidationError::IllegalCharacter)
        ));
    }

    #[test]
    fn test_relative_url_rejected() {
        assert!(matches!(
            validate_feed_url("/feed.xml", &strict()),
            Err(UrlValidationError::Parse(_))
        ));
        assert!(matches!(
            validate_feed_url("example.com/feed", &strict()),
            Err(UrlValidationError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_schemes_rejected() {
        assert!(matches!(
            validate_feed_url("file:///etc/passwd", &strict()),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_feed_url("ftp://example.com/feed", &strict()),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_localhost_rejected_by_default() {
        assert!(matches!(
            validate_feed_url("http://localhost/feed", &strict()),
            Err(UrlValidationError::PrivateAddress(_))
        ));
        assert!(matches!(
            validate_feed_url("http://127.0.0.1/feed", &strict()),
            Err(UrlValidationError::PrivateAddress(_))
        ));
        assert!(matches!(
            validate_feed_url("http://[::1]/feed", &strict()),
            Err(UrlValidationError::PrivateAddress(_))
        ));
    }

    #[test]
    fn test_private_ranges_rejected_by_default() {
        for url in [
            "http://192.168.1.1/feed",
            "http://10.0.0.1/feed",
            "http://172.16.0.1:8080/feed",
            "http://169.254.1.1/feed",
            "http://0.0.0.0/feed",
            "http://[fe80::1]/feed",
            "http://[fd00::1]/feed",
        ] {
            assert!(
                matches!(
                    validate_feed_url(url, &strict()),
                    Err(UrlValidationError::PrivateAddress(_))
                ),
                "expected PrivateAddress for {url}"
            );
        }
    }

    #[test]
    fn test_permissive_policy_allows_local_hosts() {
        let policy = UrlPolicy::permissive();
        assert!(validate_feed_url("http://localhost:8080/feed", &policy).is_ok());
        assert!(validate_feed_url("http://127.0.0.1:3000/feed", &policy).is_ok());
    }

    proptest! {
        // Validation must never panic, whatever the input looks like.
        #[test]
        fn prop_never_panics(input in ".*") {
            let _ = validate_feed_url(&input, &UrlPolicy::default());
            let _ = validate_feed_url(&input, &UrlPolicy::permissive());
        }

        // Any accepted URL is absolute, http(s), and has a host.
        #[test]
        fn prop_accepted_urls_are_absolute(input in ".*") {
            if let Ok(url) = validate_feed_url(&input, &UrlPolicy::permissive()) {
                prop_assert!(url.scheme() == "http" || url.scheme() == "https");
                prop_assert!(url.host().is_some());
            }
        }
    }
}
