//! The feed selector: decides which articles a page shows and in which mode.
//!
//! Every page load runs one fetch-filter-render cycle. This module is the
//! filter step: given the raw article list and the page's site context it
//! produces the ordered subset to display plus a display mode. It never
//! mutates articles and never re-sorts them.

use serde::{Deserialize, Serialize};

/// One story from the article feed. Optional fields default to
/// empty-equivalents so a sparse feed entry never fails deserialization.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub full_story: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    /// County-wide/urgent stories that bypass locality filtering
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Summary,
    Full,
}

/// Which render container the current page carries. Town pages carry the
/// summary container, the hub carries the full-story container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageContainer {
    Summary,
    Full,
}

/// How the display mode is decided. Container presence is the primary
/// strategy; URL matching is kept as a fallback for deployments where the
/// page markup is not under our control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModePolicy {
    #[default]
    Container,
    Url,
}

/// Selection parameters, one object per deployment. Collapses the knobs the
/// site variants used to disagree on: excluded keywords, sentinel tag,
/// primary-flag precedence, and the mode policy.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub sentinel_tag: String,
    pub excluded_keywords: Vec<String>,
    pub primary_overrides_locality: bool,
    pub mode_policy: ModePolicy,
    pub hub_path_marker: String,
    /// Registered town slugs, lowercase. These are the valid locality tags.
    pub town_slugs: Vec<String>,
}

/// The page's site context, derived once per page load from read-only
/// environment data.
#[derive(Debug, Clone)]
pub struct SiteContext {
    /// Detected locality slug, lowercase. `None` on the hub.
    pub locality: Option<String>,
    pub container: Option<PageContainer>,
    /// Whether the page URL carries the hub path marker
    pub is_hub: bool,
}

impl SiteContext {
    /// Derive a context from a raw URL. The locality is a case-insensitive
    /// substring match against the registered slugs, first match wins in
    /// registry order.
    pub fn detect(url: &str, container: Option<PageContainer>, config: &SelectorConfig) -> Self {
        let lower = url.to_lowercase();
        let locality = config
            .town_slugs
            .iter()
            .find(|slug| lower.contains(slug.as_str()))
            .cloned();
        let is_hub = !config.hub_path_marker.is_empty()
            && lower.contains(&config.hub_path_marker.to_lowercase());

        Self {
            locality,
            container,
            is_hub,
        }
    }

    /// Context for a server-rendered town page: the locality comes from
    /// deployment routing, not from URL text sniffing.
    pub fn for_town(slug: &str) -> Self {
        Self {
            locality: Some(slug.to_lowercase()),
            container: Some(PageContainer::Summary),
            is_hub: false,
        }
    }

    /// Context for the hub page
    pub fn for_hub() -> Self {
        Self {
            locality: None,
            container: Some(PageContainer::Full),
            is_hub: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub items: Vec<Article>,
    pub mode: DisplayMode,
}

/// Run the selection for one page load. Returns `None` when no display mode
/// can be resolved (no recognizable container or URL), which callers treat
/// as a no-op rather than an error.
///
/// The filter is stable: surviving articles keep the feed's order.
pub fn select_articles(
    articles: &[Article],
    context: &SiteContext,
    config: &SelectorConfig,
) -> Option<Selection> {
    let mode = resolve_mode(context, config)?;

    let items = articles
        .iter()
        .filter(|article| !title_excluded(article, config))
        .filter(|article| match mode {
            DisplayMode::Summary => eligible_for_summary(article, context, config),
            DisplayMode::Full => eligible(article, context, config),
        })
        .cloned()
        .collect();

    Some(Selection { items, mode })
}

fn resolve_mode(context: &SiteContext, config: &SelectorConfig) -> Option<DisplayMode> {
    match config.mode_policy {
        ModePolicy::Container => match context.container {
            Some(PageContainer::Summary) => Some(DisplayMode::Summary),
            Some(PageContainer::Full) => Some(DisplayMode::Full),
            None => None,
        },
        // The hub marker forces full mode regardless of any locality match
        ModePolicy::Url => {
            if context.is_hub {
                Some(DisplayMode::Full)
            } else if context.locality.is_some() {
                Some(DisplayMode::Summary)
            } else {
                None
            }
        }
    }
}

/// The exclusion check wins over every inclusion rule, `is_primary` included.
/// Keywords are matched case-sensitively against the title only.
fn title_excluded(article: &Article, config: &SelectorConfig) -> bool {
    config
        .excluded_keywords
        .iter()
        .any(|keyword| article.title.contains(keyword))
}

/// Tags are compared in slug form, so the display tag "Clay City" matches
/// the registered slug "clay-city".
fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Locality match. On a town page the tag must equal the detected slug; on
/// the hub, where no single locality is detected, any registered town tag
/// counts (the hub covers the whole county).
fn matches_locality(article: &Article, context: &SiteContext, config: &SelectorConfig) -> bool {
    match &context.locality {
        Some(slug) => article.tags.iter().any(|t| &normalize_tag(t) == slug),
        None => has_locality_tag(article, config),
    }
}

fn has_sentinel(article: &Article, config: &SelectorConfig) -> bool {
    let sentinel = normalize_tag(&config.sentinel_tag);
    article.tags.iter().any(|t| normalize_tag(t) == sentinel)
}

fn has_locality_tag(article: &Article, config: &SelectorConfig) -> bool {
    article
        .tags
        .iter()
        .any(|t| config.town_slugs.contains(&normalize_tag(t)))
}

/// The base inclusion predicate: locality tag, sentinel tag, primary flag,
/// or no locality tag at all (general news applies everywhere).
fn eligible(article: &Article, context: &SiteContext, config: &SelectorConfig) -> bool {
    matches_locality(article, context, config)
        || has_sentinel(article, config)
        || article.is_primary
        || !has_locality_tag(article, config)
}

/// Summary mode restricts further: the article must belong to the specific
/// detected town, carry the sentinel, or carry no locality tag. An article
/// tagged for a different town is dropped even when `is_primary` is set,
/// unless the deployment opts into primary override.
fn eligible_for_summary(
    article: &Article,
    context: &SiteContext,
    config: &SelectorConfig,
) -> bool {
    matches_locality(article, context, config)
        || has_sentinel(article, config)
        || !has_locality_tag(article, config)
        || (article.is_primary && config.primary_overrides_locality)
}
