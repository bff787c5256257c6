use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a remote image URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates an image URL before the client probes it.
///
/// Article payloads come from third-party feeds, so an image field can
/// point anywhere. Probing is limited to public http(s) hosts:
/// - Non-HTTP(S) schemes (`data:`, `file://`, `javascript:`) are rejected
/// - Localhost addresses (`localhost`, `127.0.0.1`, `::1`) are rejected
/// - Private IP ranges (RFC 1918, link-local, unique local IPv6) are rejected
///
/// Protocol-relative candidates (`//cdn.example.com/a.jpg`) are resolved
/// against `https:`.
///
/// # Examples
///
/// ```
/// use newsdeck::util::validate_image_url;
///
/// let url = validate_image_url("//cdn.example.com/a.jpg").unwrap();
/// assert_eq!(url.scheme(), "https");
///
/// assert!(validate_image_url("http://192.168.1.1/a.jpg").is_err());
/// assert!(validate_image_url("data:image/png;base64,AAAA").is_err());
/// ```
pub fn validate_image_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let trimmed = url_str.trim();
    let url = match trimmed.strip_prefix("//") {
        Some(rest) => Url::parse(&format!("https://{rest}"))?,
        None => Url::parse(trimmed)?,
    };

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if let Some(host) = url.host_str() {
        if host.eq_ignore_ascii_case("localhost") {
            return Err(UrlValidationError::Localhost);
        }

        // Strip brackets from IPv6 addresses for parsing
        let host_for_parse = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
            if ip.is_loopback() {
                return Err(UrlValidationError::Localhost);
            }
            if is_private_ip(&ip) {
                return Err(UrlValidationError::PrivateIp(ip.to_string()));
            }
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
