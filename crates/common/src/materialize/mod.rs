//! Materialization: flat row sets into nested read models
//!
//! Every entry point is synchronous and pure given its rows. Child rows
//! are bucketed with [`grouping::OwnerGroups`], prose fields are run
//! through the configured [`Segmenter`], and lists are ordered with the
//! functions in [`crate::rank`].

pub mod grouping;

pub use grouping::{group_by_owner, OwnerGroups};

use crate::db::rows::{
    ArticleRow, DigestRow, ImageRow, ProviderRow, StoryRow, TimelineEventRow, TimelineRow,
};
use crate::errors::{AppError, Result};
use crate::models::{
    Article, Digest, Image, Provider, Story, StorySummary, Timeline, TimelineEvent,
};
use crate::rank;
use crate::text::{PunctuationSegmenter, Segmenter};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything needed to build one story
#[derive(Debug, Clone)]
pub struct StoryRows {
    pub story: StoryRow,
    pub articles: Vec<ArticleRow>,
    pub images: Vec<ImageRow>,
    pub providers: HashMap<i64, ProviderRow>,
}

/// Everything needed to build one timeline
#[derive(Debug, Clone)]
pub struct TimelineRows {
    pub timeline: TimelineRow,
    pub events: Vec<TimelineEventRow>,
    pub stories: Vec<StoryRow>,
}

/// All rows scoped to one digest
#[derive(Debug, Clone)]
pub struct DigestRows {
    pub digest: DigestRow,
    pub stories: Vec<StoryRow>,
    /// `(story_id, article)`
    pub story_articles: Vec<(i64, ArticleRow)>,
    pub images: Vec<ImageRow>,
    pub providers: HashMap<i64, ProviderRow>,
    pub timelines: Vec<TimelineRow>,
    pub events: Vec<TimelineEventRow>,
    /// `(timeline_id, story)`
    pub timeline_stories: Vec<(i64, StoryRow)>,
}

/// Index provider rows by id
pub fn provider_table(rows: Vec<ProviderRow>) -> HashMap<i64, ProviderRow> {
    rows.into_iter().map(|p| (p.id, p)).collect()
}

#[derive(Clone)]
pub struct Materializer {
    segmenter: Arc<dyn Segmenter>,
}

impl Default for Materializer {
    fn default() -> Self {
        Self::new(Arc::new(PunctuationSegmenter::new()))
    }
}

impl Materializer {
    pub fn new(segmenter: Arc<dyn Segmenter>) -> Self {
        Self { segmenter }
    }

    pub fn story(&self, rows: &StoryRows) -> Result<Story> {
        self.story_from(&rows.story, &rows.articles, &rows.images, &rows.providers)
    }

    pub fn timeline(&self, rows: &TimelineRows) -> Timeline {
        self.timeline_from(&rows.timeline, &rows.events, &rows.stories)
    }

    /// Build a story; articles end up most recent first.
    ///
    /// Fails with `DanglingReference` if any article names a provider
    /// missing from `providers`.
    pub fn story_from(
        &self,
        story: &StoryRow,
        articles: &[ArticleRow],
        images: &[ImageRow],
        providers: &HashMap<i64, ProviderRow>,
    ) -> Result<Story> {
        let mut embedded = articles
            .iter()
            .map(|row| {
                let provider = providers.get(&row.provider_id).ok_or_else(|| {
                    AppError::DanglingReference {
                        entity: "article",
                        entity_id: row.id,
                        target: "provider",
                        target_id: row.provider_id,
                    }
                })?;
                Ok(embed_article(row, provider))
            })
            .collect::<Result<Vec<_>>>()?;

        rank::sort_articles(&mut embedded);

        Ok(Story {
            id: story.id,
            title: story.title.clone(),
            ts: story.ts,
            summary: self.segmenter.segment(&story.summary),
            coverage: self.segmenter.segment(&story.coverage),
            articles: embedded,
            images: images.iter().map(embed_image).collect(),
        })
    }

    /// Build a timeline; events keep store order
    pub fn timeline_from(
        &self,
        timeline: &TimelineRow,
        events: &[TimelineEventRow],
        stories: &[StoryRow],
    ) -> Timeline {
        Timeline {
            id: timeline.id,
            ts: timeline.ts,
            subject: timeline.subject.clone(),
            headline: timeline.headline.clone(),
            summary: self.segmenter.segment(&timeline.summary),
            events: events
                .iter()
                .map(|e| TimelineEvent {
                    story_id: e.story_id,
                    description: e.description.clone(),
                    date: e.date,
                    date_type: e.date_type.clone(),
                })
                .collect(),
            stories: stories.iter().map(summarize_story).collect(),
        }
    }

    /// Build every story and timeline of a digest and rank both lists
    pub fn digest(&self, rows: DigestRows) -> Result<Digest> {
        let DigestRows {
            digest,
            stories,
            story_articles,
            images,
            providers,
            timelines,
            events,
            timeline_stories,
        } = rows;

        let articles = OwnerGroups::from_pairs(story_articles);
        let images = group_by_owner(images, |i| i.story_id);
        let events = group_by_owner(events, |e| e.timeline_id);
        let linked = OwnerGroups::from_pairs(timeline_stories);

        let mut stories = stories
            .iter()
            .map(|s| self.story_from(s, articles.get(s.id), images.get(s.id), &providers))
            .collect::<Result<Vec<_>>>()?;
        rank::rank_stories(&mut stories);

        let mut timelines: Vec<Timeline> = timelines
            .iter()
            .map(|t| self.timeline_from(t, events.get(t.id), linked.get(t.id)))
            .collect();
        rank::rank_timelines(&mut timelines);

        Ok(Digest {
            id: digest.id,
            ts: digest.ts,
            status: digest.status,
            stories: stories.into_iter().map(Arc::new).collect(),
            timelines: timelines.into_iter().map(Arc::new).collect(),
        })
    }
}

fn embed_article(row: &ArticleRow, provider: &ProviderRow) -> Article {
    Article {
        title: row.title.clone(),
        subtitle: row.subtitle.clone(),
        date: row.date,
        published_at: row.ts,
        url: row.url.clone(),
        provider: Provider {
            name: provider.name.clone(),
            url: provider.url.clone(),
            favicon_url: provider.favicon_url.clone(),
            country: provider.country.clone(),
        },
    }
}

fn embed_image(row: &ImageRow) -> Image {
    Image {
        url: row.url.clone(),
        source_page: row.source_page.clone(),
        height: row.height,
        width: row.width,
        format: row.format.clone(),
        title: row.title.clone(),
    }
}

fn summarize_story(row: &StoryRow) -> StorySummary {
    StorySummary {
        id: row.id,
        title: row.title.clone(),
        ts: row.ts,
        summary: row.summary.clone(),
        coverage: row.coverage.clone(),
    }
}
