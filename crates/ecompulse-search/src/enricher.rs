//! Throttled image enrichment for a batch of records.
//!
//! Every record gets one search. A failed search only blanks that record's
//! image fields; the batch always comes back complete and in input order.

use std::time::Duration;

use ecompulse_core::{Enriched, ImageMatch};
use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::client::ImageSearch;

/// Throttle settings for [`enrich_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichOptions {
    /// Gap between searches.
    pub delay: Duration,
    /// Searches allowed in flight at once. `1` runs strictly one after
    /// another.
    pub concurrency: usize,
}

impl EnrichOptions {
    #[must_use]
    pub fn new(delay_ms: u64, concurrency: usize) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            concurrency: concurrency.max(1),
        }
    }
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self::new(1000, 1)
    }
}

/// Result of one search task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    Found(ImageMatch),
    NotFound,
    Failed { reason: String },
}

impl EnrichmentOutcome {
    #[must_use]
    pub fn into_image(self) -> Option<ImageMatch> {
        match self {
            EnrichmentOutcome::Found(image) => Some(image),
            EnrichmentOutcome::NotFound | EnrichmentOutcome::Failed { .. } => None,
        }
    }
}

/// Search for one title, folding any error into the outcome.
pub async fn enrich_one<S: ImageSearch + ?Sized>(search: &S, title: &str) -> EnrichmentOutcome {
    match search.search_image(title).await {
        Ok(Some(image)) => {
            tracing::info!(title, image_url = %image.image_url, "image found");
            EnrichmentOutcome::Found(image)
        }
        Ok(None) => {
            tracing::info!(title, "no image found");
            EnrichmentOutcome::NotFound
        }
        Err(e) => {
            tracing::warn!(title, error = %e, "image search failed");
            EnrichmentOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Run one search per item and pair each item with its image.
///
/// With `concurrency == 1` each search waits for the previous one and then
/// for `delay`; there is no wait after the last. With higher concurrency,
/// search `i` starts no earlier than `i * delay` after the first.
pub async fn enrich_all<T, S, F>(
    search: &S,
    items: Vec<T>,
    title: F,
    options: &EnrichOptions,
) -> Vec<Enriched<T>>
where
    S: ImageSearch + ?Sized,
    F: Fn(&T) -> &str,
{
    let titles: Vec<String> = items.iter().map(|item| title(item).to_string()).collect();
    tracing::info!(
        items = titles.len(),
        concurrency = options.concurrency,
        delay_ms = u64::try_from(options.delay.as_millis()).unwrap_or(u64::MAX),
        "starting image enrichment"
    );

    let outcomes = if options.concurrency <= 1 {
        sequential(search, &titles, options.delay).await
    } else {
        spaced(search, &titles, options).await
    };

    let found = outcomes
        .iter()
        .filter(|o| matches!(o, EnrichmentOutcome::Found(_)))
        .count();
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, EnrichmentOutcome::Failed { .. }))
        .count();
    tracing::info!(
        items = outcomes.len(),
        found,
        not_found = outcomes.len() - found - failed,
        failed,
        "image enrichment finished"
    );

    items
        .into_iter()
        .zip(outcomes)
        .map(|(item, outcome)| Enriched::new(item, outcome.into_image()))
        .collect()
}

async fn sequential<S: ImageSearch + ?Sized>(
    search: &S,
    titles: &[String],
    delay: Duration,
) -> Vec<EnrichmentOutcome> {
    let mut outcomes = Vec::with_capacity(titles.len());
    for (index, title) in titles.iter().enumerate() {
        tracing::debug!(index, total = titles.len(), title = %title, "searching");
        outcomes.push(enrich_one(search, title).await);
        if index + 1 < titles.len() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    outcomes
}

async fn spaced<S: ImageSearch + ?Sized>(
    search: &S,
    titles: &[String],
    options: &EnrichOptions,
) -> Vec<EnrichmentOutcome> {
    let start = Instant::now();
    stream::iter(titles.iter().enumerate())
        .map(|(index, title)| async move {
            let slot = options
                .delay
                .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
            tokio::time::sleep_until(start + slot).await;
            tracing::debug!(index, total = titles.len(), title = %title, "searching");
            enrich_one(search, title).await
        })
        .buffered(options.concurrency)
        .collect()
        .await
}
