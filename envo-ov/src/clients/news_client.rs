//! NewsAPI client
//!
//! Fetches recent headlines that could explain an anomalous reading. The
//! query combines category event terms with the service-area name of the
//! submitted point.

use super::{check_status, http_client};
use crate::types::{CollaboratorError, NewsFeed, NewsSummary};
use chrono::{Duration as ChronoDuration, Utc};
use envo_common::geo::service_area_for;
use envo_common::Category;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const NEWS_API_BASE_URL: &str = "https://newsapi.org";

/// How far back headlines are searched
const LOOKBACK_DAYS: i64 = 3;
const PAGE_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    source: Option<ArticleSource>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

pub struct NewsApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NewsApiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CollaboratorError::NotAvailable("news API key is empty".to_string()));
        }
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

/// Search terms per category
pub fn category_terms(category: Category) -> &'static str {
    match category {
        Category::Air => "(air pollution OR smog OR dust storm OR wildfire OR stubble burning OR fireworks)",
        Category::Water => "(water contamination OR sewage OR flood OR algal bloom OR chemical spill)",
        Category::Soil => "(flood OR heavy rain OR drought OR landslide OR chemical spill)",
        Category::Noise => "(construction OR festival OR concert OR protest OR fireworks)",
        Category::Biodiversity => "(migration OR wildlife OR bird count OR bloom)",
        Category::Waste => "(garbage OR landfill fire OR waste strike OR dumping)",
        Category::Weather => "(heatwave OR cold wave OR cyclone OR storm OR heavy rain)",
        Category::Radiation => "(heatwave OR UV index OR radiation leak)",
    }
}

pub fn build_query(category: Category, lat: f64, long: f64) -> String {
    match service_area_for(lat, long) {
        Some(area) => format!("{} AND {}", category_terms(category), area.name),
        None => category_terms(category).to_string(),
    }
}

fn summaries(response: EverythingResponse) -> Result<Vec<NewsSummary>, CollaboratorError> {
    if response.status != "ok" {
        return Err(CollaboratorError::Api(
            response
                .message
                .unwrap_or_else(|| format!("status {}", response.status)),
        ));
    }

    Ok(response
        .articles
        .into_iter()
        .filter_map(|a| {
            let title = a.title.filter(|t| !t.trim().is_empty())?;
            Some(NewsSummary {
                title,
                description: a.description,
                source: a.source.and_then(|s| s.name),
                published_at: a.published_at,
                url: a.url,
            })
        })
        .collect())
}

#[async_trait::async_trait]
impl NewsFeed for NewsApiClient {
    fn name(&self) -> &'static str {
        "NewsAPI"
    }

    async fn recent_news(
        &self,
        category: Category,
        lat: f64,
        long: f64,
    ) -> Result<Vec<NewsSummary>, CollaboratorError> {
        let query = build_query(category, lat, long);
        let from = (Utc::now() - ChronoDuration::days(LOOKBACK_DAYS))
            .format("%Y-%m-%d")
            .to_string();
        let url = format!("{}/v2/everything", self.base_url);
        debug!(query = %query, from = %from, "Searching news");

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", query),
                ("from", from),
                ("sortBy", "publishedAt".to_string()),
                ("language", "en".to_string()),
                ("pageSize", PAGE_SIZE.to_string()),
            ])
            .send()
            .await?;
        let response = check_status(self.name(), response).await?;

        let body: EverythingResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(e.to_string()))?;
        summaries(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_articles_become_summaries() {
        let body: EverythingResponse = serde_json::from_str(
            r#"{"status": "ok", "totalResults": 2, "articles": [
                {"title": "Dust storm engulfs Jaipur", "description": "Visibility drops",
                 "source": {"id": null, "name": "The Hindu"}, "publishedAt": "2024-05-01T08:00:00Z",
                 "url": "https://example.org/a"},
                {"title": "", "description": "untitled"}
            ]}"#,
        )
        .unwrap();
        let news = summaries(body).unwrap();
        assert_eq!(news.len(), 1);
        assert_eq!(news[0].title, "Dust storm engulfs Jaipur");
        assert_eq!(news[0].source.as_deref(), Some("The Hindu"));
    }

    #[test]
    fn test_error_status_is_api_error() {
        let body: EverythingResponse = serde_json::from_str(
            r#"{"status": "error", "code": "apiKeyInvalid", "message": "Your API key is invalid"}"#,
        )
        .unwrap();
        assert!(matches!(summaries(body), Err(CollaboratorError::Api(m)) if m.contains("invalid")));
    }

    #[test]
    fn test_query_includes_service_area() {
        assert!(build_query(Category::Air, 26.9, 75.8).ends_with("AND India"));
        assert!(!build_query(Category::Air, 51.5, -0.1).contains("AND"));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(NewsApiClient::new(NEWS_API_BASE_URL, "  ", Duration::from_secs(1)).is_err());
    }
}
