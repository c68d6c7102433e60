use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{error, warn};

use crate::config::Config;
use crate::fetcher::Fetcher;
use crate::ingest::Ingester;
use crate::selector::{select_articles, Article, DisplayMode, SiteContext};

// Currency amounts must never wrap across lines
static MONEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$\d+(?:,\d{3})*(?:\.\d{2})?)").unwrap());

pub struct AppState {
    pub config: Config,
    pub selector: crate::selector::SelectorConfig,
    pub fetcher: Fetcher,
    pub ingester: Arc<Ingester>,
}

// Template structs
#[derive(Template)]
#[template(path = "town.html")]
pub struct TownTemplate {
    pub town_name: String,
    pub theme_color: String,
    pub masthead_date: String,
    pub items: Vec<SummaryItem>,
    pub feed_failed: bool,
}

pub struct SummaryItem {
    pub id: String,
    pub title_html: String,
    pub date: String,
    pub image: String,
    pub brief_html: String,
    pub hub_link: String,
}

#[derive(Template)]
#[template(path = "hub.html")]
pub struct HubTemplate {
    pub masthead_date: String,
    pub items: Vec<StoryView>,
    pub feed_failed: bool,
    pub scroll_target: String,
}

pub struct StoryView {
    pub id: String,
    pub title_html: String,
    pub date_line: String,
    pub image: String,
    pub body_html: String,
    /// Upstream story URL for source attribution; empty when unknown
    pub source_link: String,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.0),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

/// Truncate story text to the configured character budget. Text at or under
/// the budget passes through unchanged with no ellipsis.
pub fn truncate_summary(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{}...", cut.trim_end())
}

/// Escape text for HTML, then wrap currency amounts in a no-wrap span.
pub fn format_money(text: &str) -> String {
    let escaped = html_escape(text);
    MONEY
        .replace_all(&escaped, r#"<span class="money">$1</span>"#)
        .into_owned()
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn masthead_date() -> String {
    Local::now().format("%B %-d, %Y").to_string()
}

/// Fetch the feed for one page load. Feed unavailable is not fatal: the page
/// renders with its placeholder untouched.
async fn load_articles(state: &AppState) -> (Vec<Article>, bool) {
    match state.fetcher.fetch_articles().await {
        Ok(articles) => (articles, false),
        Err(e) => {
            warn!("Feed unavailable, leaving page in pre-render state: {}", e);
            (Vec::new(), true)
        }
    }
}

// Route handlers
pub async fn town(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let Some(town) = state.config.town_for_slug(&slug) else {
        return Ok((StatusCode::NOT_FOUND, "No such town").into_response());
    };

    let (articles, feed_failed) = load_articles(&state).await;

    let context = SiteContext::for_town(&town.slug);
    let items = match select_articles(&articles, &context, &state.selector) {
        Some(selection) if selection.mode == DisplayMode::Summary => selection.items,
        _ => Vec::new(),
    };

    let items = items
        .iter()
        .map(|article| SummaryItem {
            id: article.id.clone(),
            title_html: format_money(&article.title),
            date: article.date.clone(),
            image: article.image.clone().unwrap_or_default(),
            brief_html: format_money(&truncate_summary(
                &article.full_story,
                state.config.summary_length,
            )),
            hub_link: format!("{}?id={}", state.config.hub_url, article.id),
        })
        .collect();

    Ok(HtmlTemplate(TownTemplate {
        town_name: town.name.clone(),
        theme_color: town.background.clone(),
        masthead_date: masthead_date(),
        items,
        feed_failed,
    })
    .into_response())
}

#[derive(Deserialize)]
pub struct HubQuery {
    #[serde(default)]
    pub id: Option<String>,
}

pub async fn hub(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HubQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (articles, feed_failed) = load_articles(&state).await;

    let context = SiteContext::for_hub();
    let items = match select_articles(&articles, &context, &state.selector) {
        Some(selection) if selection.mode == DisplayMode::Full => selection.items,
        _ => Vec::new(),
    };

    let items = items
        .iter()
        .map(|article| StoryView {
            id: article.id.clone(),
            title_html: format_money(&article.title),
            date_line: if article.tags.is_empty() {
                article.date.clone()
            } else {
                format!("{} | {}", article.date, article.tags.join(" | "))
            },
            image: article.image.clone().unwrap_or_default(),
            body_html: format_money(&article.full_story),
            source_link: article.link.clone().unwrap_or_default(),
        })
        .collect();

    // The scroll target feeds an element id lookup; strip anything that
    // couldn't be part of a story id
    let scroll_target = query
        .id
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    Ok(HtmlTemplate(HubTemplate {
        masthead_date: masthead_date(),
        items,
        feed_failed,
        scroll_target,
    }))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    // Spawn the ingest task; status is observable via logs
    let ingester = state.ingester.clone();
    tokio::spawn(async move {
        if let Err(e) = ingester.refresh().await {
            error!("Manual ingest failed: {}", e);
        }
    });

    Ok(Html("Refresh started"))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
