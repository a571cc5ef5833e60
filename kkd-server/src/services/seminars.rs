//! Seminar listing scraper
//!
//! Pulls seminar/event links from an external board page. Each element
//! matched by the configured CSS selector becomes one [`Seminar`]; when the
//! matched element is not itself a link, its first descendant `a[href]` is
//! used.
//!
//! Results are cached for the configured TTL. If a refresh fails while an
//! older copy is cached, the stale copy is served.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ApiError;

const USER_AGENT: &str = concat!("kkodurami/", env!("CARGO_PKG_VERSION"));

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector is valid"));

/// Scraper errors
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Invalid selector {0:?}")]
    InvalidSelector(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Source returned HTTP {0}")]
    Status(u16),
}

impl From<ScraperError> for ApiError {
    fn from(err: ScraperError) -> Self {
        match err {
            ScraperError::InvalidSelector(_) => ApiError::Internal(err.to_string()),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

/// One scraped listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seminar {
    pub title: String,
    pub link: String,
}

/// Extract seminar entries from a listing page
///
/// Titles are whitespace-collapsed and links resolved against `base`.
/// Entries without a title or link, `javascript:` links and repeated links
/// are skipped.
pub fn parse_seminars(html: &str, base: &Url, selector: &Selector) -> Vec<Seminar> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut seminars = Vec::new();

    for element in document.select(selector) {
        let Some(anchor) = link_element(element) else {
            continue;
        };

        let title = collapse_whitespace(&element.text().collect::<String>());
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };

        if title.is_empty() || href.is_empty() || href.starts_with('#') {
            continue;
        }
        if href.to_ascii_lowercase().starts_with("javascript:") {
            continue;
        }

        let Ok(link) = base.join(href) else {
            debug!(href, "Skipping unresolvable link");
            continue;
        };

        let link = link.to_string();
        if seen.insert(link.clone()) {
            seminars.push(Seminar { title, link });
        }
    }

    seminars
}

fn link_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if element.value().name() == "a" && element.value().attr("href").is_some() {
        return Some(element);
    }
    element.select(&LINK_SELECTOR).next()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct CachedListing {
    fetched_at: Instant,
    seminars: Vec<Seminar>,
}

/// Cached scraper for one listing page
pub struct SeminarService {
    http_client: reqwest::Client,
    source: Url,
    selector: Selector,
    ttl: Duration,
    cache: RwLock<Option<CachedListing>>,
}

impl SeminarService {
    pub fn new(
        source: Url,
        item_selector: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Self, ScraperError> {
        let selector = Selector::parse(item_selector)
            .map_err(|_| ScraperError::InvalidSelector(item_selector.to_string()))?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            source,
            selector,
            ttl,
            cache: RwLock::new(None),
        })
    }

    pub fn source(&self) -> &Url {
        &self.source
    }

    /// Current listing, from cache while fresh
    pub async fn list(&self) -> Result<Vec<Seminar>, ScraperError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(cached.seminars.clone());
                }
            }
        }

        match self.fetch().await {
            Ok(seminars) => {
                info!(source = %self.source, count = seminars.len(), "Refreshed seminar listing");
                *self.cache.write().await = Some(CachedListing {
                    fetched_at: Instant::now(),
                    seminars: seminars.clone(),
                });
                Ok(seminars)
            }
            Err(e) => {
                let cache = self.cache.read().await;
                match cache.as_ref() {
                    Some(stale) => {
                        warn!(source = %self.source, error = %e, "Refresh failed, serving cached listing");
                        Ok(stale.seminars.clone())
                    }
                    None => Err(e),
                }
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<Seminar>, ScraperError> {
        let response = self
            .http_client
            .get(self.source.clone())
            .send()
            .await
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        // Html is !Send; parse only after the last await
        Ok(parse_seminars(&body, &self.source, &self.selector))
    }
}
