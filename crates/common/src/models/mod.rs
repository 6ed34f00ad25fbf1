//! Read models served by the API
//!
//! These are the nested, immutable entities produced by materialization.
//! Derived counts are methods so they never drift from the embedded data.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub url: String,
    pub favicon_url: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub subtitle: Option<String>,
    pub date: NaiveDate,
    /// Publication timestamp, the recency key for ordering
    pub published_at: DateTime<Utc>,
    pub url: String,
    pub provider: Provider,
}

/// A de-duplicated news event with its source articles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    pub title: String,
    pub ts: DateTime<Utc>,
    pub summary: Vec<String>,
    pub coverage: Vec<String>,
    /// Most recent first
    pub articles: Vec<Article>,
    pub images: Vec<Image>,
}

impl Story {
    pub fn article_count(&self) -> usize {
        self.articles.len()
    }

    /// Distinct providers, counted by name
    pub fn provider_count(&self) -> usize {
        self.articles
            .iter()
            .map(|a| a.provider.name.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn country_count(&self) -> usize {
        self.articles
            .iter()
            .map(|a| a.provider.country.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Unsegmented projection of a story, embedded in timelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorySummary {
    pub id: i64,
    pub title: String,
    pub ts: DateTime<Utc>,
    pub summary: String,
    pub coverage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub story_id: i64,
    pub description: String,
    pub date: NaiveDate,
    pub date_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub subject: String,
    pub headline: String,
    pub summary: Vec<String>,
    pub events: Vec<TimelineEvent>,
    pub stories: Vec<StorySummary>,
}

impl Timeline {
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn story_count(&self) -> usize {
        self.stories.len()
    }
}

/// One publishing cycle: ranked stories and timelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub status: String,
    pub stories: Vec<Arc<Story>>,
    pub timelines: Vec<Arc<Timeline>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(provider: &str, country: &str) -> Article {
        Article {
            title: "t".to_string(),
            subtitle: None,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            published_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            url: "https://example.com".to_string(),
            provider: Provider {
                name: provider.to_string(),
                url: String::new(),
                favicon_url: String::new(),
                country: country.to_string(),
            },
        }
    }

    #[test]
    fn test_story_counts() {
        let story = Story {
            id: 1,
            title: "Storm".to_string(),
            ts: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            summary: vec![],
            coverage: vec![],
            articles: vec![article("AP", "US"), article("AP", "US"), article("BBC", "GB"), article("NYT", "US")],
            images: vec![],
        };
        assert_eq!(story.article_count(), 4);
        assert_eq!(story.provider_count(), 3);
        assert_eq!(story.country_count(), 2);
    }

    #[test]
    fn test_image_metadata_omitted_when_absent() {
        let image = Image {
            url: "https://img.example.com/a.jpg".to_string(),
            source_page: None,
            height: Some(10),
            width: None,
            format: None,
            title: None,
        };
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json, serde_json::json!({"url": "https://img.example.com/a.jpg", "height": 10}));
    }
}
