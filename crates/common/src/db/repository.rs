//! Repository for read operations
//!
//! Runs the named queries against a [`RowStore`] and maps the results into
//! row records, bundled the way the materializer consumes them.

use super::queries::{self, Query, READY_STATUS};
use super::rows::{
    map_keyed_rows, map_rows, DigestRow, FromRawRow, ImageRow, ProviderRow, StoryRow,
    TimelineEventRow, TimelineRow, ArticleRow,
};
use super::{Cell, RowStore};
use crate::errors::Result;
use crate::materialize::{provider_table, DigestRows, StoryRows, TimelineRows};
use std::sync::Arc;
use tracing::debug;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn RowStore>,
}

impl Repository {
    /// Create a new repository over the given store
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    // ========================================================================
    // Digests
    // ========================================================================

    /// Most recent digest whose status is READY
    pub async fn latest_ready_digest(&self) -> Result<Option<DigestRow>> {
        self.fetch_optional(&queries::LATEST_READY_DIGEST, &[Cell::from(READY_STATUS)])
            .await
    }

    pub async fn find_digest(&self, id: i64) -> Result<Option<DigestRow>> {
        self.fetch_optional(&queries::DIGEST_BY_ID, &[Cell::Int(id)]).await
    }

    /// Every row scoped to digest `id`, or `None` if the digest is absent.
    ///
    /// All sub-queries bind the same id, so a digest published mid-fetch
    /// cannot leak into the bundle.
    pub async fn digest_rows(&self, id: i64) -> Result<Option<DigestRows>> {
        let Some(digest) = self.find_digest(id).await? else {
            return Ok(None);
        };

        let params = [Cell::Int(id)];
        let (stories, story_articles, images, providers, timelines, events, timeline_stories) = futures::try_join!(
            self.fetch::<StoryRow>(&queries::STORIES_BY_DIGEST, &params),
            self.fetch_keyed::<ArticleRow>(&queries::STORY_ARTICLES_BY_DIGEST, &params),
            self.fetch::<ImageRow>(&queries::IMAGES_BY_DIGEST, &params),
            self.fetch::<ProviderRow>(&queries::PROVIDERS_BY_DIGEST, &params),
            self.fetch::<TimelineRow>(&queries::TIMELINES_BY_DIGEST, &params),
            self.fetch::<TimelineEventRow>(&queries::EVENTS_BY_DIGEST, &params),
            self.fetch_keyed::<StoryRow>(&queries::TIMELINE_STORIES_BY_DIGEST, &params),
        )?;

        debug!(
            digest_id = id,
            stories = stories.len(),
            articles = story_articles.len(),
            timelines = timelines.len(),
            "Fetched digest rows"
        );

        Ok(Some(DigestRows {
            digest,
            stories,
            story_articles,
            images,
            providers: provider_table(providers),
            timelines,
            events,
            timeline_stories,
        }))
    }

    // ========================================================================
    // Stories
    // ========================================================================

    pub async fn story_rows(&self, id: i64) -> Result<Option<StoryRows>> {
        let params = [Cell::Int(id)];
        let Some(story) = self.fetch_optional::<StoryRow>(&queries::STORY_BY_ID, &params).await? else {
            return Ok(None);
        };

        let (articles, images, providers) = futures::try_join!(
            self.fetch::<ArticleRow>(&queries::ARTICLES_BY_STORY, &params),
            self.fetch::<ImageRow>(&queries::IMAGES_BY_STORY, &params),
            self.fetch::<ProviderRow>(&queries::PROVIDERS_BY_STORY, &params),
        )?;

        Ok(Some(StoryRows {
            story,
            articles,
            images,
            providers: provider_table(providers),
        }))
    }

    // ========================================================================
    // Timelines
    // ========================================================================

    pub async fn timeline_rows(&self, id: i64) -> Result<Option<TimelineRows>> {
        let params = [Cell::Int(id)];
        let Some(timeline) = self
            .fetch_optional::<TimelineRow>(&queries::TIMELINE_BY_ID, &params)
            .await?
        else {
            return Ok(None);
        };

        let (events, stories) = futures::try_join!(
            self.fetch::<TimelineEventRow>(&queries::EVENTS_BY_TIMELINE, &params),
            self.fetch::<StoryRow>(&queries::STORIES_BY_TIMELINE, &params),
        )?;

        Ok(Some(TimelineRows {
            timeline,
            events,
            stories,
        }))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn fetch<T: FromRawRow>(&self, query: &Query, params: &[Cell]) -> Result<Vec<T>> {
        map_rows(self.store.fetch_rows(query, params).await?)
    }

    async fn fetch_keyed<T: FromRawRow>(
        &self,
        query: &Query,
        params: &[Cell],
    ) -> Result<Vec<(i64, T)>> {
        map_keyed_rows(self.store.fetch_rows(query, params).await?)
    }

    async fn fetch_optional<T: FromRawRow>(
        &self,
        query: &Query,
        params: &[Cell],
    ) -> Result<Option<T>> {
        Ok(self.fetch::<T>(query, params).await?.into_iter().next())
    }
}
