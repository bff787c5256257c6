use url::Url;

/// Decides which failed image loads are worth one retry through the relay.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    restricted_hosts: Vec<String>,
    proxy_base: Option<Url>,
}

impl CorsPolicy {
    /// An unparseable relay URL disables proxying; failures then go straight
    /// to the placeholder.
    pub fn new(restricted_hosts: &[String], proxy_base: &str) -> Self {
        let proxy_base = match Url::parse(proxy_base.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
            Ok(url) => {
                tracing::warn!(scheme = url.scheme(), "Image proxy must be http(s), proxying disabled");
                None
            }
            Err(e) => {
                tracing::warn!(proxy = %proxy_base, error = %e, "Invalid image proxy URL, proxying disabled");
                None
            }
        };

        Self {
            restricted_hosts: restricted_hosts
                .iter()
                .map(|h| h.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            proxy_base,
        }
    }

    /// True when the URL's host is, or is a subdomain of, a restricted host.
    pub fn is_likely_blocked(&self, image_url: &str) -> bool {
        let Some(host) = Url::parse(image_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return false;
        };

        self.restricted_hosts.iter().any(|restricted| {
            host == *restricted
                || host
                    .strip_suffix(restricted.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    pub fn is_proxied(&self, image_url: &str) -> bool {
        self.proxy_base
            .as_ref()
            .is_some_and(|base| image_url.starts_with(base.as_str()))
    }

    /// Relay URL for `image_url`, or `None` when proxying is disabled.
    pub fn proxied(&self, image_url: &str) -> Option<String> {
        let mut url = self.proxy_base.clone()?;
        url.query_pairs_mut().append_pair("url", image_url);
        Some(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn policy() -> CorsPolicy {
        CorsPolicy::new(
            &["ichef.bbci.co.uk".to_string(), ".cloudfront.net".to_string()],
            "https://images.weserv.nl/",
        )
    }

    #[test]
    fn test_exact_and_subdomain_match() {
        let p = policy();
        assert!(p.is_likely_blocked("https://ichef.bbci.co.uk/news/1.jpg"));
        assert!(p.is_likely_blocked("https://d111.CloudFront.net/a.png"));
        assert!(!p.is_likely_blocked("https://evilcloudfront.net/a.png"));
        assert!(!p.is_likely_blocked("https://example.com/a.png"));
        assert!(!p.is_likely_blocked("not a url"));
    }

    #[test]
    fn test_proxied_url() {
        let p = policy();
        let proxied = p.proxied("https://ichef.bbci.co.uk/a b.jpg").unwrap();
        assert_eq!(
            proxied,
            "https://images.weserv.nl/?url=https%3A%2F%2Fichef.bbci.co.uk%2Fa+b.jpg"
        );
        assert!(p.is_proxied(&proxied));
        assert!(!p.is_proxied("https://ichef.bbci.co.uk/a.jpg"));
    }

    #[test]
    fn test_invalid_proxy_disables_relay() {
        let p = CorsPolicy::new(&["cdn.cnn.com".to_string()], "ftp://relay");
        assert_eq!(p.proxied("https://cdn.cnn.com/a.jpg"), None);
        assert!(!p.is_proxied("ftp://relay/x"));
    }
}
