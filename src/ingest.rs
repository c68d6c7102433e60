//! Builds the JSON article feed from the upstream radio-station RSS feed:
//! cleans station branding out of the text, tags each story with the towns
//! it mentions, drops blacklisted content, and dedupes by normalized title.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use feed_rs::parser;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::selector::Article;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
// Snaps punctuation back onto the preceding word after tag stripping
static LOOSE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([.,!?;:])").unwrap());
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").unwrap());

pub struct Ingester {
    client: Client,
    source_url: Option<String>,
    data_path: PathBuf,
    excluded_keywords: Vec<String>,
    strip_patterns: Vec<Regex>,
    town_matchers: Vec<(String, Regex)>,
    refreshing: Arc<RwLock<bool>>,
}

impl Ingester {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("ClayNews/1.0 (feed ingest)")
            .build()
            .expect("Failed to create HTTP client");

        let strip_patterns = config
            .strip_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Ignoring invalid strip pattern {:?}: {}", pattern, e);
                    None
                }
            })
            .collect();

        // Word-boundary matchers per town name, whitespace-flexible so
        // "Clay  City" still tags Clay City
        let town_matchers = config
            .towns
            .iter()
            .filter_map(|town| {
                let pattern = format!(
                    r"(?i)\b{}\b",
                    regex::escape(&town.name).replace(' ', r"\s+")
                );
                match Regex::new(&pattern) {
                    Ok(re) => Some((town.name.clone(), re)),
                    Err(e) => {
                        warn!("Skipping town matcher for {:?}: {}", town.name, e);
                        None
                    }
                }
            })
            .collect();

        Self {
            client,
            source_url: config.source_url.clone(),
            data_path: PathBuf::from(&config.data_file),
            excluded_keywords: config.excluded_keywords.clone(),
            strip_patterns,
            town_matchers,
            refreshing: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn is_refreshing(&self) -> bool {
        *self.refreshing.read().await
    }

    pub async fn refresh(&self) -> anyhow::Result<()> {
        // Check if already refreshing
        {
            let mut refreshing = self.refreshing.write().await;
            if *refreshing {
                info!("Ingest already in progress, skipping");
                return Ok(());
            }
            *refreshing = true;
        }

        let result = self.do_refresh().await;

        // Clear refreshing flag
        {
            let mut refreshing = self.refreshing.write().await;
            *refreshing = false;
        }

        result
    }

    async fn do_refresh(&self) -> anyhow::Result<()> {
        let Some(source_url) = &self.source_url else {
            info!("No upstream source configured, skipping ingest");
            return Ok(());
        };

        info!("Ingesting upstream feed: {}", source_url);
        let response = self.client.get(source_url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        let parsed = parser::parse(&bytes[..])?;

        let articles = self.collect_articles(parsed.entries);
        let json = serde_json::to_string_pretty(&articles)?;

        if let Some(parent) = self.data_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.data_path, json).await?;

        info!(
            "Wrote {} unique stories to {}",
            articles.len(),
            self.data_path.display()
        );
        Ok(())
    }

    /// Turn parsed feed entries into articles. First occurrence of a story
    /// id wins; blacklisted stories are dropped here so they never reach the
    /// feed at all.
    pub fn collect_articles(&self, entries: Vec<feed_rs::model::Entry>) -> Vec<Article> {
        let mut seen = HashSet::new();
        let mut articles = Vec::new();

        for entry in entries {
            let Some(raw_title) = entry.title.as_ref().map(|t| t.content.clone()) else {
                warn!("Skipping entry with no title: {}", entry.id);
                continue;
            };
            let title = self.clean_text(&raw_title);
            if title.is_empty() {
                continue;
            }

            let id = story_id(&title);
            if id.is_empty() || !seen.insert(id.clone()) {
                continue;
            }

            let raw_body = entry
                .content
                .as_ref()
                .and_then(|c| c.body.clone())
                .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()))
                .unwrap_or_default();
            let full_story = self.clean_text(&raw_body);

            let haystack = format!("{} {}", title, full_story);
            if self.excluded_keywords.iter().any(|k| haystack.contains(k)) {
                continue;
            }

            let tags: Vec<String> = self
                .town_matchers
                .iter()
                .filter(|(_, re)| re.is_match(&haystack))
                .map(|(name, _)| name.clone())
                .collect();

            let date = entry
                .published
                .or(entry.updated)
                .map(|d| d.format("%B %-d, %Y").to_string())
                .unwrap_or_default();

            let link = entry.links.first().map(|l| l.href.clone());

            let image = entry
                .media
                .first()
                .and_then(|m| m.content.first())
                .and_then(|c| c.url.as_ref())
                .map(|u| u.to_string());

            articles.push(Article {
                id,
                title,
                date,
                tags,
                full_story,
                image,
                link,
                is_primary: false,
            });
        }

        articles
    }

    /// Strip HTML tags and configured branding patterns, then weld the text
    /// back together so punctuation doesn't float after the stripping.
    pub fn clean_text(&self, text: &str) -> String {
        let mut text = HTML_TAG.replace_all(text, " ").into_owned();
        for re in &self.strip_patterns {
            text = re.replace_all(&text, "").into_owned();
        }
        let collapsed = WHITESPACE.replace_all(&text, " ");
        LOOSE_PUNCT.replace_all(&collapsed, "$1").trim().to_string()
    }
}

/// Story id used as the anchor/lookup key and the dedup key: the title with
/// non-word characters removed, lowercased.
pub fn story_id(title: &str) -> String {
    NON_WORD.replace_all(title, "").to_lowercase()
}

pub async fn start_background_ingest(ingester: Arc<Ingester>, interval_minutes: u64) {
    let interval = Duration::from_secs(interval_minutes * 60);

    // Do initial ingest
    info!("Starting initial feed ingest");
    if let Err(e) = ingester.refresh().await {
        error!("Initial feed ingest failed: {}", e);
    }

    // Then schedule periodic refreshes
    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled feed ingest");
        if let Err(e) = ingester.refresh().await {
            error!("Scheduled feed ingest failed: {}", e);
        }
    }
}
