//! Typed row records and positional mapping.
//!
//! Each record mirrors its table's column order. Mapping checks arity and
//! coerces cell types; it does no semantic validation.

use super::{Cell, RawRow};
use crate::errors::{AppError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRow {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub favicon_url: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRow {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub provider_id: i64,
    pub title: String,
    pub subtitle: Option<String>,
    pub url: String,
    pub body: Option<String>,
    pub image_url: Option<String>,
    pub image_urls: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRow {
    pub id: i64,
    pub story_id: i64,
    pub url: String,
    pub source_page: Option<String>,
    pub height: Option<i64>,
    pub width: Option<i64>,
    pub format: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoryRow {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub title: String,
    pub summary: String,
    pub coverage: String,
    pub digest_id: i64,
    pub digest_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRow {
    pub id: i64,
    pub digest_id: i64,
    pub ts: DateTime<Utc>,
    pub subject: String,
    pub headline: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEventRow {
    pub timeline_id: i64,
    pub story_id: i64,
    pub description: String,
    pub date: NaiveDate,
    pub date_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DigestRow {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub status: String,
}

/// A row record that can be built from a positional row
pub trait FromRawRow: Sized {
    /// Label used in `MalformedRow` errors
    const KIND: &'static str;
    /// Expected number of columns
    const ARITY: usize;

    fn from_cells(cells: &mut CellReader) -> Result<Self>;
}

/// Sequential, typed access to the cells of one row
pub struct CellReader {
    kind: &'static str,
    cells: std::vec::IntoIter<Cell>,
    position: usize,
}

impl CellReader {
    fn new(kind: &'static str, row: RawRow) -> Self {
        Self {
            kind,
            cells: row.into_iter(),
            position: 0,
        }
    }

    fn malformed(&self, column: &str, reason: impl std::fmt::Display) -> AppError {
        AppError::MalformedRow {
            kind: self.kind,
            reason: format!("column {} ({}): {}", self.position, column, reason),
        }
    }

    fn next_cell(&mut self, column: &str) -> Result<Cell> {
        self.position += 1;
        self.cells
            .next()
            .ok_or_else(|| self.malformed(column, "missing value"))
    }

    pub fn int(&mut self, column: &str) -> Result<i64> {
        match self.next_cell(column)? {
            Cell::Int(v) => Ok(v),
            other => Err(self.malformed(column, format!("expected int, got {}", other.type_name()))),
        }
    }

    pub fn opt_int(&mut self, column: &str) -> Result<Option<i64>> {
        match self.next_cell(column)? {
            Cell::Null => Ok(None),
            Cell::Int(v) => Ok(Some(v)),
            other => Err(self.malformed(column, format!("expected int, got {}", other.type_name()))),
        }
    }

    pub fn text(&mut self, column: &str) -> Result<String> {
        match self.next_cell(column)? {
            Cell::Text(v) => Ok(v),
            other => Err(self.malformed(column, format!("expected text, got {}", other.type_name()))),
        }
    }

    pub fn opt_text(&mut self, column: &str) -> Result<Option<String>> {
        match self.next_cell(column)? {
            Cell::Null => Ok(None),
            Cell::Text(v) => Ok(Some(v)),
            other => Err(self.malformed(column, format!("expected text, got {}", other.type_name()))),
        }
    }

    pub fn timestamp(&mut self, column: &str) -> Result<DateTime<Utc>> {
        match self.next_cell(column)? {
            Cell::Timestamp(v) => Ok(v),
            Cell::Text(v) => parse_timestamp(&v)
                .ok_or_else(|| self.malformed(column, format!("unparseable timestamp {:?}", v))),
            other => Err(self.malformed(column, format!("expected timestamp, got {}", other.type_name()))),
        }
    }

    pub fn date(&mut self, column: &str) -> Result<NaiveDate> {
        match self.next_cell(column)? {
            Cell::Date(v) => Ok(v),
            Cell::Timestamp(v) => Ok(v.date_naive()),
            Cell::Text(v) => parse_date(&v)
                .ok_or_else(|| self.malformed(column, format!("unparseable date {:?}", v))),
            other => Err(self.malformed(column, format!("expected date, got {}", other.type_name()))),
        }
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(value).map(|ts| ts.date_naive()))
}

fn check_arity(kind: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(AppError::MalformedRow {
            kind,
            reason: format!("expected {} columns, got {}", expected, actual),
        })
    }
}

/// Map one positional row into `T`
pub fn map_row<T: FromRawRow>(row: RawRow) -> Result<T> {
    check_arity(T::KIND, T::ARITY, row.len())?;
    T::from_cells(&mut CellReader::new(T::KIND, row))
}

pub fn map_rows<T: FromRawRow>(rows: Vec<RawRow>) -> Result<Vec<T>> {
    rows.into_iter().map(map_row).collect()
}

/// Map a join row whose first column is the owning entity's id
pub fn map_keyed<T: FromRawRow>(row: RawRow) -> Result<(i64, T)> {
    check_arity(T::KIND, T::ARITY + 1, row.len())?;
    let mut reader = CellReader::new(T::KIND, row);
    let owner = reader.int("owner_id")?;
    Ok((owner, T::from_cells(&mut reader)?))
}

pub fn map_keyed_rows<T: FromRawRow>(rows: Vec<RawRow>) -> Result<Vec<(i64, T)>> {
    rows.into_iter().map(map_keyed).collect()
}

impl FromRawRow for ProviderRow {
    const KIND: &'static str = "provider";
    const ARITY: usize = 5;

    fn from_cells(cells: &mut CellReader) -> Result<Self> {
        Ok(Self {
            id: cells.int("id")?,
            name: cells.text("name")?,
            url: cells.text("url")?,
            favicon_url: cells.text("favicon_url")?,
            country: cells.text("country")?,
        })
    }
}

impl FromRawRow for ArticleRow {
    const KIND: &'static str = "article";
    const ARITY: usize = 10;

    fn from_cells(cells: &mut CellReader) -> Result<Self> {
        Ok(Self {
            id: cells.int("id")?,
            ts: cells.timestamp("ts")?,
            provider_id: cells.int("provider_id")?,
            title: cells.text("title")?,
            subtitle: cells.opt_text("subtitle")?,
            url: cells.text("url")?,
            body: cells.opt_text("body")?,
            image_url: cells.opt_text("image_url")?,
            image_urls: cells.opt_text("image_urls")?,
            date: cells.date("date")?,
        })
    }
}

impl FromRawRow for ImageRow {
    const KIND: &'static str = "image";
    const ARITY: usize = 8;

    fn from_cells(cells: &mut CellReader) -> Result<Self> {
        Ok(Self {
            id: cells.int("id")?,
            story_id: cells.int("story_id")?,
            url: cells.text("url")?,
            source_page: cells.opt_text("source_page")?,
            height: cells.opt_int("height")?,
            width: cells.opt_int("width")?,
            format: cells.opt_text("format")?,
            title: cells.opt_text("title")?,
        })
    }
}

impl FromRawRow for StoryRow {
    const KIND: &'static str = "story";
    const ARITY: usize = 7;

    fn from_cells(cells: &mut CellReader) -> Result<Self> {
        Ok(Self {
            id: cells.int("id")?,
            ts: cells.timestamp("ts")?,
            title: cells.text("title")?,
            summary: cells.opt_text("summary")?.unwrap_or_default(),
            coverage: cells.opt_text("coverage")?.unwrap_or_default(),
            digest_id: cells.int("digest_id")?,
            digest_description: cells.opt_text("digest_description")?,
        })
    }
}

impl FromRawRow for TimelineRow {
    const KIND: &'static str = "timeline";
    const ARITY: usize = 6;

    fn from_cells(cells: &mut CellReader) -> Result<Self> {
        Ok(Self {
            id: cells.int("id")?,
            digest_id: cells.int("digest_id")?,
            ts: cells.timestamp("ts")?,
            subject: cells.text("subject")?,
            headline: cells.text("headline")?,
            summary: cells.opt_text("summary")?.unwrap_or_default(),
        })
    }
}

impl FromRawRow for TimelineEventRow {
    const KIND: &'static str = "timeline_event";
    const ARITY: usize = 5;

    fn from_cells(cells: &mut CellReader) -> Result<Self> {
        Ok(Self {
            timeline_id: cells.int("timeline_id")?,
            story_id: cells.int("story_id")?,
            description: cells.text("description")?,
            date: cells.date("date")?,
            date_type: cells.text("date_type")?,
        })
    }
}

impl FromRawRow for DigestRow {
    const KIND: &'static str = "digest";
    const ARITY: usize = 3;

    fn from_cells(cells: &mut CellReader) -> Result<Self> {
        Ok(Self {
            id: cells.int("id")?,
            ts: cells.timestamp("ts")?,
            status: cells.text("status")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn test_map_provider() {
        let row = vec![Cell::Int(3), text("Reuters"), text("https://reuters.com"), text("https://reuters.com/favicon.ico"), text("GB")];
        let provider: ProviderRow = map_row(row).unwrap();
        assert_eq!(provider.id, 3);
        assert_eq!(provider.country, "GB");
    }

    #[test]
    fn test_arity_mismatch_is_malformed() {
        let err = map_row::<DigestRow>(vec![Cell::Int(1), text("2024-01-01T00:00:00Z")]).unwrap_err();
        match err {
            AppError::MalformedRow { kind, reason } => {
                assert_eq!(kind, "digest");
                assert!(reason.contains("expected 3 columns, got 2"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_type_mismatch_is_malformed() {
        let err = map_row::<DigestRow>(vec![text("one"), text("2024-01-01T00:00:00Z"), text("READY")]).unwrap_err();
        assert!(matches!(err, AppError::MalformedRow { kind: "digest", .. }));
        assert!(err.to_string().contains("expected int, got text"));
    }

    #[test]
    fn test_timestamp_and_date_coercion() {
        let row = vec![
            Cell::Int(10),
            text("2024-03-05 08:30:00"),
            Cell::Int(2),
            text("Headline"),
            Cell::Null,
            text("https://example.com/a"),
            Cell::Null,
            Cell::Null,
            Cell::Null,
            Cell::Timestamp(Utc.with_ymd_and_hms(2024, 3, 4, 23, 0, 0).unwrap()),
        ];
        let article: ArticleRow = map_row(row).unwrap();
        assert_eq!(article.ts, Utc.with_ymd_and_hms(2024, 3, 5, 8, 30, 0).unwrap());
        assert_eq!(article.date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(article.subtitle, None);
    }

    #[test]
    fn test_unparseable_timestamp() {
        let err = map_row::<DigestRow>(vec![Cell::Int(1), text("yesterday"), text("READY")]).unwrap_err();
        assert!(err.to_string().contains("unparseable timestamp"));
    }

    #[test]
    fn test_map_keyed_splits_owner() {
        let row = vec![
            Cell::Int(77),
            Cell::Int(5),
            Cell::Int(77),
            text("https://img.example.com/1.jpg"),
            Cell::Null,
            Cell::Int(600),
            Cell::Int(800),
            text("jpeg"),
            Cell::Null,
        ];
        let (owner, image): (i64, ImageRow) = map_keyed(row).unwrap();
        assert_eq!(owner, 77);
        assert_eq!(image.id, 5);
        assert_eq!(image.height, Some(600));
        assert_eq!(image.title, None);
    }

    #[test]
    fn test_map_keyed_requires_extra_column() {
        let row = vec![Cell::Int(1), text("2024-01-01"), text("READY")];
        assert!(map_keyed::<DigestRow>(row).is_err());
    }

    #[test]
    fn test_null_summary_reads_as_empty() {
        let row = vec![Cell::Int(1), text("2024-01-01T00:00:00Z"), text("Title"), Cell::Null, Cell::Null, Cell::Int(9), Cell::Null];
        let story: StoryRow = map_row(row).unwrap();
        assert_eq!(story.summary, "");
        assert_eq!(story.coverage, "");
    }
}
