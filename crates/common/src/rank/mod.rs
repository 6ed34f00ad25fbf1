//! Deterministic ordering of materialized entities
//!
//! All orderings are descending and use stable sorts, so entities with
//! equal keys keep the order they were supplied in.

use crate::models::{Article, Story, Timeline};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;

pub fn article_recency(article: &Article) -> DateTime<Utc> {
    article.published_at
}

/// Distinct providers times articles
pub fn story_score(story: &Story) -> usize {
    story.provider_count() * story.article_count()
}

/// Stories times events
pub fn timeline_score(timeline: &Timeline) -> usize {
    timeline.story_count() * timeline.event_count()
}

/// Most recent first
pub fn sort_articles(articles: &mut [Article]) {
    articles.sort_by_key(|a| Reverse(article_recency(a)));
}

pub fn rank_stories(stories: &mut [Story]) {
    // Cached key: provider_count builds a set per call
    stories.sort_by_cached_key(|s| Reverse(story_score(s)));
}

pub fn rank_timelines(timelines: &mut [Timeline]) {
    timelines.sort_by_key(|t| Reverse(timeline_score(t)));
}
