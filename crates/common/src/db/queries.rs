//! SQL for every read the service performs.
//!
//! Column lists are spelled out so each row shape has a fixed arity.
//! Join queries that feed a grouping step select the owning id first.
//! Digest-scoped queries take the pinned digest id as `$1`.

/// A named, static query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    /// Stable label for logs, metrics and fixtures
    pub name: &'static str,
    pub sql: &'static str,
}

/// Lifecycle tag of digests that may be served as "latest"
pub const READY_STATUS: &str = "READY";

macro_rules! provider_columns {
    () => {
        "p.id, p.name, p.url, p.favicon_url, p.country"
    };
}

macro_rules! article_columns {
    () => {
        "a.id, a.ts, a.provider_id, a.title, a.subtitle, a.url, a.body, a.image_url, a.image_urls, a.date"
    };
}

macro_rules! image_columns {
    () => {
        "i.id, i.story_id, i.url, i.source_page, i.height, i.width, i.format, i.title"
    };
}

macro_rules! story_columns {
    () => {
        "s.id, s.ts, s.title, s.summary, s.coverage, s.digest_id, s.digest_description"
    };
}

macro_rules! timeline_columns {
    () => {
        "t.id, t.digest_id, t.ts, t.subject, t.headline, t.summary"
    };
}

macro_rules! event_columns {
    () => {
        "te.timeline_id, te.story_id, te.description, te.date, te.date_type"
    };
}

macro_rules! digest_columns {
    () => {
        "d.id, d.ts, d.status"
    };
}

// ============================================================================
// Digests
// ============================================================================

/// `$1` = status
pub const LATEST_READY_DIGEST: Query = Query {
    name: "latest_ready_digest",
    sql: concat!(
        "SELECT ", digest_columns!(),
        " FROM digests d WHERE d.status = $1 ORDER BY d.ts DESC, d.id DESC LIMIT 1"
    ),
};

pub const DIGEST_BY_ID: Query = Query {
    name: "digest_by_id",
    sql: concat!("SELECT ", digest_columns!(), " FROM digests d WHERE d.id = $1"),
};

pub const STORIES_BY_DIGEST: Query = Query {
    name: "stories_by_digest",
    sql: concat!(
        "SELECT ", story_columns!(),
        " FROM stories s WHERE s.digest_id = $1 ORDER BY s.id"
    ),
};

pub const STORY_ARTICLES_BY_DIGEST: Query = Query {
    name: "story_articles_by_digest",
    sql: concat!(
        "SELECT sa.story_id, ", article_columns!(),
        " FROM story_articles sa",
        " JOIN articles a ON a.id = sa.article_id",
        " JOIN stories s ON s.id = sa.story_id",
        " WHERE s.digest_id = $1"
    ),
};

pub const IMAGES_BY_DIGEST: Query = Query {
    name: "images_by_digest",
    sql: concat!(
        "SELECT ", image_columns!(),
        " FROM images i JOIN stories s ON s.id = i.story_id",
        " WHERE s.digest_id = $1 ORDER BY i.id"
    ),
};

pub const PROVIDERS_BY_DIGEST: Query = Query {
    name: "providers_by_digest",
    sql: concat!(
        "SELECT DISTINCT ", provider_columns!(),
        " FROM providers p",
        " JOIN articles a ON a.provider_id = p.id",
        " JOIN story_articles sa ON sa.article_id = a.id",
        " JOIN stories s ON s.id = sa.story_id",
        " WHERE s.digest_id = $1"
    ),
};

pub const TIMELINES_BY_DIGEST: Query = Query {
    name: "timelines_by_digest",
    sql: concat!(
        "SELECT ", timeline_columns!(),
        " FROM timelines t WHERE t.digest_id = $1 ORDER BY t.id"
    ),
};

pub const EVENTS_BY_DIGEST: Query = Query {
    name: "events_by_digest",
    sql: concat!(
        "SELECT ", event_columns!(),
        " FROM timeline_events te JOIN timelines t ON t.id = te.timeline_id",
        " WHERE t.digest_id = $1"
    ),
};

pub const TIMELINE_STORIES_BY_DIGEST: Query = Query {
    name: "timeline_stories_by_digest",
    sql: concat!(
        "SELECT ts.timeline_id, ", story_columns!(),
        " FROM timeline_stories ts",
        " JOIN stories s ON s.id = ts.story_id",
        " JOIN timelines t ON t.id = ts.timeline_id",
        " WHERE t.digest_id = $1"
    ),
};

// ============================================================================
// Single story
// ============================================================================

pub const STORY_BY_ID: Query = Query {
    name: "story_by_id",
    sql: concat!("SELECT ", story_columns!(), " FROM stories s WHERE s.id = $1"),
};

pub const ARTICLES_BY_STORY: Query = Query {
    name: "articles_by_story",
    sql: concat!(
        "SELECT ", article_columns!(),
        " FROM articles a JOIN story_articles sa ON sa.article_id = a.id",
        " WHERE sa.story_id = $1"
    ),
};

pub const IMAGES_BY_STORY: Query = Query {
    name: "images_by_story",
    sql: concat!(
        "SELECT ", image_columns!(),
        " FROM images i WHERE i.story_id = $1 ORDER BY i.id"
    ),
};

pub const PROVIDERS_BY_STORY: Query = Query {
    name: "providers_by_story",
    sql: concat!(
        "SELECT DISTINCT ", provider_columns!(),
        " FROM providers p",
        " JOIN articles a ON a.provider_id = p.id",
        " JOIN story_articles sa ON sa.article_id = a.id",
        " WHERE sa.story_id = $1"
    ),
};

// ============================================================================
// Single timeline
// ============================================================================

pub const TIMELINE_BY_ID: Query = Query {
    name: "timeline_by_id",
    sql: concat!("SELECT ", timeline_columns!(), " FROM timelines t WHERE t.id = $1"),
};

pub const EVENTS_BY_TIMELINE: Query = Query {
    name: "events_by_timeline",
    sql: concat!(
        "SELECT ", event_columns!(),
        " FROM timeline_events te WHERE te.timeline_id = $1"
    ),
};

pub const STORIES_BY_TIMELINE: Query = Query {
    name: "stories_by_timeline",
    sql: concat!(
        "SELECT ", story_columns!(),
        " FROM stories s JOIN timeline_stories ts ON ts.story_id = s.id",
        " WHERE ts.timeline_id = $1"
    ),
};
