use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use thiserror::Error;
use tracing::info;

use crate::selector::Article;

/// The one error class a page load can hit: the feed was unreachable or the
/// payload didn't parse. Callers log it and render nothing rather than fail
/// the page.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed payload invalid: {0}")]
    Payload(#[from] serde_json::Error),
}

pub struct Fetcher {
    client: Client,
    feed_url: String,
}

impl Fetcher {
    pub fn new(feed_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("ClayNews/1.0 (news feed)")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            feed_url: feed_url.to_string(),
        }
    }

    /// Fetch the article feed fresh. The timestamp query parameter busts any
    /// intermediate cache so every page load sees the current feed.
    pub async fn fetch_articles(&self) -> Result<Vec<Article>, FeedError> {
        let url = format!("{}?v={}", self.feed_url, Utc::now().timestamp_millis());

        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let articles: Vec<Article> = serde_json::from_str(&body)?;
        info!("Fetched {} articles from feed", articles.len());
        Ok(articles)
    }
}
