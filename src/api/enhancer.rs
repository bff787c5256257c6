use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use std::time::Duration;
use url::Url;

use super::{ApiError, ImageEnhancer};
use crate::model::Article;
use crate::util::{validate_image_url, UrlValidationError};

/// Enhancer that never improves on the raw candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnhancer;

#[async_trait]
impl ImageEnhancer for NoEnhancer {
    async fn enhance(&self, _: &Article, _: Option<&str>) -> Result<Option<String>, ApiError> {
        Ok(None)
    }
}

/// Confirms a raw candidate with a `HEAD` request before it is rendered.
///
/// The candidate is accepted only when it answers 2xx with an `image/*`
/// content type; redirects are followed and the final URL is returned, so
/// a `http://` candidate that upgrades to `https://` is rewritten.
/// Private and loopback hosts are never probed, including as redirect
/// targets.
#[derive(Clone)]
pub struct ProbeEnhancer {
    http: reqwest::Client,
    timeout: Duration,
    allow_loopback: bool,
}

/// Checks a probe target, optionally letting loopback hosts through.
fn check_target(raw: &str, allow_loopback: bool) -> Result<Url, UrlValidationError> {
    match validate_image_url(raw) {
        Err(UrlValidationError::Localhost) if allow_loopback => Ok(Url::parse(raw.trim())?),
        other => other,
    }
}

/// Like the client's redirect policy, but every hop is validated again so
/// a public host cannot bounce the probe to an internal address.
fn probe_redirect_policy(allow_loopback: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }
        if let Err(e) = check_target(attempt.url().as_str(), allow_loopback) {
            tracing::debug!(to = %attempt.url(), error = %e, "Image redirect refused");
            return attempt.error(e);
        }
        attempt.follow()
    })
}

impl ProbeEnhancer {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        Self::build(timeout, false)
    }

    fn build(timeout: Duration, allow_loopback: bool) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .redirect(probe_redirect_policy(allow_loopback))
            .build()?;
        Ok(Self {
            http,
            timeout,
            allow_loopback,
        })
    }
}

#[async_trait]
impl ImageEnhancer for ProbeEnhancer {
    async fn enhance(
        &self,
        article: &Article,
        raw_candidate: Option<&str>,
    ) -> Result<Option<String>, ApiError> {
        let Some(raw) = raw_candidate else {
            return Ok(None);
        };

        let url = match check_target(raw, self.allow_loopback) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(candidate = %raw, error = %e, "Image candidate not probed");
                return Ok(None);
            }
        };

        let response = match tokio::time::timeout(self.timeout, self.http.head(url).send()).await {
            Err(_) => return Err(ApiError::Timeout),
            Ok(Err(e)) if e.is_redirect() => {
                tracing::debug!(candidate = %raw, error = %e, "Image probe redirect rejected");
                return Ok(None);
            }
            Ok(result) => result?,
        };

        let is_image = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("image/"));

        if response.status().is_success() && is_image {
            Ok(Some(response.url().to_string()))
        } else {
            tracing::debug!(
                article = %article.title,
                status = response.status().as_u16(),
                is_image,
                "Image probe rejected candidate"
            );
            Ok(None)
        }
    }
}
