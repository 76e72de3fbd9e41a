//! Player page extraction
//!
//! [`extract`] drives one fetch-and-parse attempt and never fails: every
//! error becomes an [`ExtractionResult::Failure`] carrying the descriptor so
//! the coordinator can requeue it. Parsing itself lives behind the
//! [`Extractor`] trait.

use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::crawler::queue::Descriptor;
use crate::model::{PlayerImage, PlayerRecord, StatField};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

/// Why one extraction attempt failed
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Required field missing: {0}")]
    MandatoryFieldMissing(&'static str),
}

/// Outcome of one extraction attempt
#[derive(Debug)]
pub enum ExtractionResult<T> {
    Success(T),
    Failure { cause: ExtractError, item: Descriptor },
}

/// Turns page HTML into a record
pub trait Extractor: Send + Sync + 'static {
    type Output: Send + 'static;

    fn parse(&self, html: &str, url: &str) -> Result<Self::Output, ExtractError>;
}

/// Fetches `descriptor` with `fetcher` and parses it with `extractor`
///
/// The whole attempt is bounded by `timeout`.
pub async fn extract<F, E>(
    fetcher: &mut F,
    extractor: &E,
    descriptor: Descriptor,
    timeout: Duration,
) -> ExtractionResult<E::Output>
where
    F: PageFetcher,
    E: Extractor,
{
    let attempt = async {
        let html = fetcher.fetch(&descriptor.url).await?;
        extractor.parse(&html, &descriptor.url)
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(output)) => ExtractionResult::Success(output),
        Ok(Err(cause)) => ExtractionResult::Failure {
            cause,
            item: descriptor,
        },
        Err(_) => ExtractionResult::Failure {
            cause: ExtractError::Timeout(timeout),
            item: descriptor,
        },
    }
}

/// Collapsed, trimmed text content of an element
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// The player's display name
fn player_name(document: &Html) -> Option<String> {
    first_text(document, r#"h1[itemprop="name"]"#).or_else(|| first_text(document, "#meta h1"))
}

/// File name of the headshot, without the directory part
fn image_file_name(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"img[itemscope="image"]"#).ok()?;
    let src = document.select(&selector).next()?.value().attr("src")?;
    src.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Year of the first NBA game, read from the "NBA Debut:" paragraph
fn debut_season(document: &Html) -> Option<i32> {
    let selector = Selector::parse("p").ok()?;
    let text = document
        .select(&selector)
        .map(|p| p.text().collect::<String>())
        .find(|text| text.contains("NBA Debut:"))?;

    // The paragraph ends with the full date, e.g. "October 28, 2003"
    let text = text.trim_end();
    let year = text.get(text.len().checked_sub(4)?..)?;
    year.parse().ok()
}

/// Every distinct position listed in the per-game table, sorted
fn positions(document: &Html) -> String {
    let Ok(selector) = Selector::parse(r#"table#per_game tbody [data-stat="pos"]"#) else {
        return String::new();
    };
    let distinct: BTreeSet<String> = document
        .select(&selector)
        .map(element_text)
        .filter(|pos| !pos.is_empty())
        .collect();
    distinct.into_iter().collect::<Vec<_>>().join(", ")
}

/// Career value of one stat, from the footer of its table
fn career_stat(document: &Html, field: StatField) -> Option<f64> {
    let css = format!(
        r#"table#{} tfoot [data-stat="{}"]"#,
        field.table().table_id(),
        field.data_stat()
    );
    let selector = Selector::parse(&css).ok()?;
    let cell = document.select(&selector).next()?;
    element_text(cell).parse().ok()
}

/// Extracts a full [`PlayerRecord`] from a player page
///
/// Only the name is mandatory; every other field is `None` (or empty, for
/// positions) when the page lacks it or it does not parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerExtractor;

impl Extractor for PlayerExtractor {
    type Output = PlayerRecord;

    fn parse(&self, html: &str, url: &str) -> Result<PlayerRecord, ExtractError> {
        let document = Html::parse_document(html);

        let name = player_name(&document).ok_or(ExtractError::MandatoryFieldMissing("player name"))?;
        let mut record = PlayerRecord::named(name);
        record.player_image = image_file_name(&document);
        record.position = positions(&document);
        record.first_nba_season = debut_season(&document);

        for field in StatField::ALL {
            record.stats.set(field, career_stat(&document, field));
        }

        tracing::trace!(
            url,
            player = %record.player_name,
            known_stats = record.stats.known(),
            "Parsed player page"
        );
        Ok(record)
    }
}

/// Extracts the headshot file name for the image back-fill
///
/// Pages without a headshot yield `None` rather than a failure, so they are
/// not retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageExtractor;

impl Extractor for ImageExtractor {
    type Output = Option<PlayerImage>;

    fn parse(&self, html: &str, _url: &str) -> Result<Option<PlayerImage>, ExtractError> {
        let document = Html::parse_document(html);
        let player_name =
            player_name(&document).ok_or(ExtractError::MandatoryFieldMissing("player name"))?;

        Ok(image_file_name(&document).map(|file_name| PlayerImage {
            player_name,
            file_name,
        }))
    }
}
