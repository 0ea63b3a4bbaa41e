//! Shared drivers for the three scraping patterns.
//!
//! All three are strictly sequential and sleep `tuning.delay` between
//! requests. Page and cursor walks stop at the first failed fetch and keep
//! what they have; keyspace enumeration skips failed keys and moves on.

use crate::config::SourceTuning;
use crate::errors::ScrapeError;
use crate::fetch::{DEFAULT_MAX_RETRIES, Fetcher, HttpResponse, RequestSpec};
use crate::models::RawRecord;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// One parsed page: how many items the API returned and the records that
/// survived parsing.
#[derive(Debug, Default, PartialEq)]
pub struct Page {
    pub seen: usize,
    pub records: Vec<RawRecord>,
}

impl Page {
    /// Parse every item, counting the ones `parse` drops.
    pub fn of<F>(items: &[Value], parse: F) -> Self
    where
        F: Fn(&Value) -> Option<RawRecord>,
    {
        Self {
            seen: items.len(),
            records: items.iter().filter_map(parse).collect(),
        }
    }
}

/// Page or offset pagination.
///
/// `request_for(page)` builds the request for the zero-based page index.
/// Stops when the API returns no items, once `limit` records are held,
/// after `tuning.max_pages` pages, or on a fetch failure. A page whose items
/// all fail to parse does not end the walk.
///
/// # Arguments
///
/// * `request_for` - builds the request for a zero-based page index
/// * `parse` - maps a decoded body to a [`Page`]
///
/// # Returns
///
/// At most `limit` records. `Err` only when `request_for` fails.
pub async fn collect_pages<R, P>(
    fetcher: &Fetcher,
    source: &str,
    tuning: &SourceTuning,
    limit: usize,
    mut request_for: R,
    mut parse: P,
) -> Result<Vec<RawRecord>, ScrapeError>
where
    R: FnMut(usize) -> Result<RequestSpec, ScrapeError>,
    P: FnMut(&Value) -> Page,
{
    let mut out = Vec::new();

    for page in 0..tuning.max_pages {
        if out.len() >= limit {
            break;
        }
        if page > 0 {
            sleep(tuning.delay).await;
        }

        let request = request_for(page)?;
        let body = match fetcher.fetch_json::<Value>(&request).await {
            Ok(body) => body,
            Err(e) => {
                warn!(source, page, kept = out.len(), error = %e, "Page fetch failed; keeping partial results");
                break;
            }
        };

        let batch = parse(&body);
        debug!(source, page, seen = batch.seen, count = batch.records.len(), "Fetched page");
        if batch.seen == 0 {
            break;
        }
        out.extend(batch.records);
    }

    out.truncate(limit);
    info!(source, count = out.len(), "Pagination finished");
    Ok(out)
}

/// Cursor pagination: `parse` returns the page and the next-page URL, if
/// any. Follow-up requests reuse the first request's headers.
pub async fn collect_cursor<P>(
    fetcher: &Fetcher,
    source: &str,
    tuning: &SourceTuning,
    limit: usize,
    first: RequestSpec,
    mut parse: P,
) -> Vec<RawRecord>
where
    P: FnMut(&Value) -> (Page, Option<String>),
{
    let headers = first.headers.clone();
    let mut next = Some(first);
    let mut out = Vec::new();
    let mut pages = 0usize;

    while let Some(request) = next.take() {
        if out.len() >= limit || pages >= tuning.max_pages {
            break;
        }
        if pages > 0 {
            sleep(tuning.delay).await;
        }

        let body = match fetcher.fetch_json::<Value>(&request).await {
            Ok(body) => body,
            Err(e) => {
                warn!(source, page = pages, kept = out.len(), error = %e, "Cursor fetch failed; keeping partial results");
                break;
            }
        };
        pages += 1;

        let (batch, cursor) = parse(&body);
        debug!(source, page = pages, seen = batch.seen, count = batch.records.len(), has_more = cursor.is_some(), "Fetched cursor page");
        if batch.seen == 0 {
            break;
        }
        out.extend(batch.records);

        next = cursor.map(|url| RequestSpec {
            headers: headers.clone(),
            ..RequestSpec::get(url)
        });
    }

    out.truncate(limit);
    info!(source, count = out.len(), pages, "Cursor walk finished");
    out
}

/// Keyspace enumeration: one request per key, in order.
///
/// A 404 means "no such record" and costs a single request. `parse` may
/// also return `None` for a key; such keys and keys whose fetch fails are
/// skipped silently. Stops once `limit` records are held.
pub async fn enumerate_keys<K, R, P>(
    fetcher: &Fetcher,
    source: &str,
    tuning: &SourceTuning,
    limit: usize,
    keys: K,
    request_for: R,
    parse: P,
) -> Vec<RawRecord>
where
    K: IntoIterator<Item = String>,
    R: Fn(&str) -> RequestSpec,
    P: Fn(&str, &HttpResponse) -> Option<RawRecord>,
{
    let request_for = &request_for;
    let parse = &parse;

    let out: Vec<RawRecord> = stream::iter(keys.into_iter().enumerate())
        .then(|(i, key)| async move {
            if i > 0 {
                sleep(tuning.delay).await;
            }
            match fetcher
                .fetch_lookup(&request_for(&key), DEFAULT_MAX_RETRIES)
                .await
            {
                Ok(resp) if resp.status == 404 => None,
                Ok(resp) => parse(&key, &resp),
                Err(e) => {
                    debug!(source, %key, error = %e, "Key fetch failed; skipping");
                    None
                }
            }
        })
        .filter_map(|opt| std::future::ready(opt))
        .take(limit)
        .collect()
        .await;

    info!(source, count = out.len(), "Keyspace enumeration finished");
    out
}
