use serde::Deserialize;
use std::path::Path;

use crate::selector::{ModePolicy, SelectorConfig};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// URL of the JSON article feed the pages read from
    pub feed_url: String,
    /// Hub page URL; summary links append `?id=<article id>` to it
    pub hub_url: String,
    /// Upstream RSS feed the ingester builds the article feed from
    #[serde(default)]
    pub source_url: Option<String>,
    /// Where the ingester writes the article feed
    #[serde(default = "default_data_file")]
    pub data_file: String,
    /// Path substring that marks the hub page for URL-driven mode detection
    #[serde(default = "default_hub_path_marker")]
    pub hub_path_marker: String,
    /// Tag meaning "applies to the whole county"
    #[serde(default = "default_sentinel_tag")]
    pub sentinel_tag: String,
    /// Title keywords that hard-block an article (case-sensitive substring)
    #[serde(default = "default_excluded_keywords")]
    pub excluded_keywords: Vec<String>,
    /// Character budget for summary-mode story text
    #[serde(default = "default_summary_length")]
    pub summary_length: usize,
    /// Whether `is_primary` admits an article onto a town page its tags
    /// would otherwise exclude
    #[serde(default)]
    pub primary_overrides_locality: bool,
    #[serde(default)]
    pub mode_policy: ModePolicy,
    /// Ingest refresh interval in minutes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    /// Branding/byline patterns stripped from ingested text (regex)
    #[serde(default)]
    pub strip_patterns: Vec<String>,
    pub towns: Vec<TownConfig>,
}

fn default_data_file() -> String {
    "data/news_data.json".to_string()
}

fn default_hub_path_marker() -> String {
    "local-news".to_string()
}

fn default_sentinel_tag() -> String {
    "Clay County".to_string()
}

fn default_excluded_keywords() -> Vec<String> {
    vec![
        "Fairfield".to_string(),
        "Wayne County".to_string(),
        "Cisne".to_string(),
    ]
}

fn default_summary_length() -> usize {
    180
}

fn default_refresh_interval() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct TownConfig {
    pub slug: String,
    pub name: String,
    #[serde(default = "default_town_background")]
    pub background: String,
    #[serde(default = "default_town_text")]
    pub text: String,
}

fn default_town_background() -> String {
    "#0c71c3".to_string()
}

fn default_town_text() -> String {
    "#ffffff".to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn town_for_slug(&self, slug: &str) -> Option<&TownConfig> {
        self.towns.iter().find(|t| t.slug.eq_ignore_ascii_case(slug))
    }

    /// Collapse the selection-related settings into the parameter object the
    /// feed selector takes
    pub fn selector(&self) -> SelectorConfig {
        SelectorConfig {
            sentinel_tag: self.sentinel_tag.clone(),
            excluded_keywords: self.excluded_keywords.clone(),
            primary_overrides_locality: self.primary_overrides_locality,
            mode_policy: self.mode_policy,
            hub_path_marker: self.hub_path_marker.clone(),
            town_slugs: self.towns.iter().map(|t| t.slug.to_lowercase()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn minimal_config() -> &'static str {
        r#"
            feed_url = "https://example.com/news_data.json"
            hub_url = "/local-news"

            [[towns]]
            slug = "flora"
            name = "Flora"
        "#
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_str(minimal_config()).unwrap();

        assert_eq!(config.sentinel_tag, "Clay County");
        assert_eq!(config.hub_path_marker, "local-news");
        assert_eq!(config.summary_length, 180);
        assert_eq!(config.refresh_interval, 15);
        assert!(!config.primary_overrides_locality);
        assert_eq!(config.mode_policy, ModePolicy::Container);
        assert_eq!(
            config.excluded_keywords,
            vec!["Fairfield", "Wayne County", "Cisne"]
        );
        assert!(config.source_url.is_none());
        assert!(config.strip_patterns.is_empty());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r##"
            feed_url = "https://example.com/news_data.json"
            hub_url = "https://example.com/local-news"
            source_url = "https://example.com/category/local/feed"
            summary_length = 160
            refresh_interval = 30
            mode_policy = "url"
            primary_overrides_locality = true

            [[towns]]
            slug = "flora"
            name = "Flora"
            background = "#0c0b82"
            text = "#ffffff"

            [[towns]]
            slug = "clay-city"
            name = "Clay City"
        "##;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.summary_length, 160);
        assert_eq!(config.refresh_interval, 30);
        assert_eq!(config.mode_policy, ModePolicy::Url);
        assert!(config.primary_overrides_locality);
        assert_eq!(config.towns.len(), 2);
        assert_eq!(config.towns[0].background, "#0c0b82");
        // Theme defaults apply per town
        assert_eq!(config.towns[1].background, "#0c71c3");
        assert_eq!(config.towns[1].text, "#ffffff");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/site.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let content = "this is not valid toml {{{";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_missing_required_fields() {
        let content = r#"
            hub_url = "/local-news"
            # Missing feed_url

            [[towns]]
            slug = "flora"
            name = "Flora"
        "#;

        let result = Config::from_str(content);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_mode_policy_rejected() {
        let content = r#"
            feed_url = "https://example.com/news_data.json"
            hub_url = "/local-news"
            mode_policy = "telepathy"
            towns = []
        "#;

        let result = Config::from_str(content);
        assert!(result.is_err());
    }

    #[test]
    fn test_town_for_slug_case_insensitive() {
        let config = Config::from_str(minimal_config()).unwrap();

        assert!(config.town_for_slug("flora").is_some());
        assert!(config.town_for_slug("Flora").is_some());
        assert!(config.town_for_slug("xenia").is_none());
    }

    #[test]
    fn test_selector_config_lowercases_slugs() {
        let content = r#"
            feed_url = "https://example.com/news_data.json"
            hub_url = "/local-news"

            [[towns]]
            slug = "Clay-City"
            name = "Clay City"
        "#;

        let config = Config::from_str(content).unwrap();
        let selector = config.selector();

        assert_eq!(selector.town_slugs, vec!["clay-city"]);
        assert_eq!(selector.sentinel_tag, "Clay County");
    }

    #[test]
    fn test_empty_towns_list() {
        let content = r#"
            feed_url = "https://example.com/news_data.json"
            hub_url = "/local-news"
            towns = []
        "#;

        let config = Config::from_str(content).unwrap();
        assert!(config.towns.is_empty());
        assert!(config.selector().town_slugs.is_empty());
    }
}
