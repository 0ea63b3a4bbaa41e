//! Batched bulk upload of canonical records to the datastore.
//!
//! Records go out in consecutive batches as PostgREST bulk inserts with an
//! ignore-duplicates conflict policy on `(source, source_id)`, so uploading
//! the same scrape twice neither fails nor duplicates rows. The datastore
//! echoes back only the rows it actually inserted, and only those count as
//! uploaded.

use crate::config::{DatastoreConfig, UploadSettings};
use crate::errors::UploadError;
use crate::fetch::{HttpResponse, RequestSpec, Transport};
use crate::models::{CanonicalRecord, UploadOutcome};
use crate::utils::truncate_for_log;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

const CONFLICT_COLUMNS: &str = "source,source_id";
const PREFER: &str = "resolution=ignore-duplicates,return=representation";

/// Status of the datastore connection as shown by the status surface.
pub const CONNECTED: &str = "connected";
pub const CONNECTION_ERROR: &str = "error";
pub const NOT_CONFIGURED: &str = "not_configured";

/// Rows the datastore reports as newly inserted.
///
/// Duplicates skipped by the conflict policy are absent from the echoed
/// array. A body that is not a JSON array counts the whole batch.
fn inserted_rows(resp: &HttpResponse, batch_len: usize) -> usize {
    match resp.json::<Vec<Value>>() {
        Ok(rows) => rows.len().min(batch_len),
        Err(_) => batch_len,
    }
}

pub struct Uploader {
    transport: Arc<dyn Transport>,
    datastore: Option<DatastoreConfig>,
    settings: UploadSettings,
}

impl Uploader {
    pub fn new(
        transport: Arc<dyn Transport>,
        datastore: Option<DatastoreConfig>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            transport,
            datastore,
            settings,
        }
    }

    fn authorized(&self, ds: &DatastoreConfig, request: RequestSpec) -> RequestSpec {
        request
            .header("apikey", ds.service_key.as_str())
            .header("Authorization", format!("Bearer {}", ds.service_key))
    }

    /// Upload `records` into `table`.
    ///
    /// A failed batch counts all of its records as errors and the next batch
    /// still goes out.
    ///
    /// # Returns
    ///
    /// Rows actually inserted and records in failed batches. Only a missing
    /// datastore configuration is an `Err`.
    #[instrument(level = "info", skip_all, fields(table = %table, records = records.len()))]
    pub async fn upload(
        &self,
        records: &[CanonicalRecord],
        table: &str,
    ) -> Result<UploadOutcome, UploadError> {
        let ds = self
            .datastore
            .as_ref()
            .ok_or(UploadError::MissingCredentials)?;

        let url = format!("{}/rest/v1/{table}?on_conflict={CONFLICT_COLUMNS}", ds.url);
        let batch_size = self.settings.batch_size.max(1);
        let mut outcome = UploadOutcome::default();

        for (i, batch) in records.chunks(batch_size).enumerate() {
            if i > 0 {
                sleep(self.settings.batch_delay).await;
            }

            let body = match serde_json::to_value(batch) {
                Ok(v) => v,
                Err(e) => {
                    warn!(batch = i, error = %e, "Could not serialize batch");
                    outcome.errors += batch.len();
                    continue;
                }
            };
            let request = self
                .authorized(ds, RequestSpec::post(url.as_str(), body))
                .header("Prefer", PREFER);

            match self.transport.send(&request).await {
                Ok(resp) if resp.is_success() => {
                    let inserted = inserted_rows(&resp, batch.len());
                    debug!(batch = i, size = batch.len(), inserted, "Batch stored");
                    outcome.uploaded += inserted;
                }
                Ok(resp) => {
                    warn!(
                        batch = i,
                        size = batch.len(),
                        status = resp.status,
                        body = %truncate_for_log(&resp.body, 200),
                        "Batch rejected by datastore"
                    );
                    outcome.errors += batch.len();
                }
                Err(e) => {
                    warn!(batch = i, size = batch.len(), error = %e, "Batch upload failed");
                    outcome.errors += batch.len();
                }
            }
        }

        info!(
            uploaded = outcome.uploaded,
            errors = outcome.errors,
            "Upload finished"
        );
        Ok(outcome)
    }

    /// Check that the datastore REST root answers.
    #[instrument(level = "debug", skip_all)]
    pub async fn ping(&self) -> &'static str {
        let Some(ds) = &self.datastore else {
            return NOT_CONFIGURED;
        };
        let request = self.authorized(ds, RequestSpec::get(format!("{}/rest/v1/", ds.url)));
        match self.transport.send(&request).await {
            Ok(resp) if resp.is_success() => CONNECTED,
            Ok(resp) => {
                warn!(status = resp.status, "Datastore ping rejected");
                CONNECTION_ERROR
            }
            Err(e) => {
                warn!(error = %e, "Datastore unreachable");
                CONNECTION_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchError;
    use crate::fetch::testing::*;
    use crate::fetch::Method;
    use crate::models::{BookRecord, CanonicalRecord};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    fn book(id: usize) -> CanonicalRecord {
        CanonicalRecord::Book(BookRecord {
            title: format!("Book {id}"),
            authors: String::new(),
            isbn: String::new(),
            publisher: String::new(),
            published_year: None,
            page_count: None,
            language: String::new(),
            description: String::new(),
            cover_url: String::new(),
            source: "openlibrary".into(),
            source_id: id.to_string(),
            external_ids: "{}".into(),
            scraped_at: "2025-01-01T00:00:00Z".into(),
        })
    }

    fn datastore() -> Option<DatastoreConfig> {
        Some(DatastoreConfig {
            url: "http://db.local".into(),
            service_key: "svc".into(),
        })
    }

    /// Accepts a fixed number of batches, then answers every later one with
    /// the next reply in line.
    struct SequencedStore {
        replies: Mutex<Vec<Result<HttpResponse, FetchError>>>,
        sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Transport for SequencedStore {
        async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, FetchError> {
            let size = request
                .body
                .as_ref()
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            self.sizes.lock().unwrap().push(size);
            self.replies.lock().unwrap().remove(0)
        }
    }

    /// Minimal table with a unique `(source, source_id)` key that silently
    /// ignores duplicate inserts and echoes back only the new rows.
    #[derive(Default)]
    struct IgnoreDuplicatesStore {
        rows: Mutex<HashSet<(String, String)>>,
    }

    #[async_trait]
    impl Transport for IgnoreDuplicatesStore {
        async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, FetchError> {
            let prefer = request
                .headers
                .iter()
                .find(|(k, _)| k == "Prefer")
                .map(|(_, v)| v.as_str());
            let rows = request.body.as_ref().and_then(Value::as_array).cloned().unwrap_or_default();
            let mut table = self.rows.lock().unwrap();
            let mut inserted = Vec::new();
            for row in rows {
                let key = (
                    row["source"].as_str().unwrap_or_default().to_string(),
                    row["source_id"].as_str().unwrap_or_default().to_string(),
                );
                if table.insert(key) {
                    inserted.push(row);
                } else if prefer != Some(PREFER) {
                    return status(409);
                }
            }
            Ok(HttpResponse {
                status: 201,
                body: json!(inserted).to_string(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_credentials_fails_fast() {
        let t = Arc::new(ScriptedTransport::new());
        let uploader = Uploader::new(t.clone(), None, UploadSettings::default());
        let err = uploader.upload(&[book(1)], "books").await.unwrap_err();
        assert_eq!(err, UploadError::MissingCredentials);
        assert!(t.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_shape() {
        let t = Arc::new(ScriptedTransport::new().route("/rest/v1/books", vec![status(201)]));
        let uploader = Uploader::new(t.clone(), datastore(), UploadSettings::default());
        let outcome = uploader.upload(&[book(1), book(2)], "books").await.unwrap();
        assert_eq!(outcome, UploadOutcome { uploaded: 2, errors: 0 });

        let req = &t.requests()[0];
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.url, "http://db.local/rest/v1/books?on_conflict=source,source_id");
        assert!(req.headers.contains(&("apikey".into(), "svc".into())));
        assert!(req.headers.contains(&("Authorization".into(), "Bearer svc".into())));
        assert!(req.headers.contains(&("Prefer".into(), PREFER.into())));
        assert_eq!(req.body.as_ref().unwrap()[1]["source_id"], "2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_does_not_stop_later_batches() {
        let store = Arc::new(SequencedStore {
            replies: Mutex::new(vec![status(201), status(500), down(), status(201)]),
            sizes: Mutex::default(),
        });
        let uploader = Uploader::new(store.clone(), datastore(), UploadSettings::default());
        let records: Vec<_> = (0..160).map(book).collect();

        let t0 = Instant::now();
        let outcome = uploader.upload(&records, "books").await.unwrap();

        assert_eq!(*store.sizes.lock().unwrap(), vec![50, 50, 50, 10]);
        assert_eq!(outcome, UploadOutcome { uploaded: 60, errors: 100 });
        // three gaps between four batches
        assert!(t0.elapsed() >= Duration::from_millis(300));
        assert!(t0.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reupload_is_idempotent() {
        let store = Arc::new(IgnoreDuplicatesStore::default());
        let uploader = Uploader::new(store.clone(), datastore(), UploadSettings::default());
        let records: Vec<_> = (0..75).map(book).collect();

        let first = uploader.upload(&records, "books").await.unwrap();
        let second = uploader.upload(&records, "books").await.unwrap();

        assert_eq!(first, UploadOutcome { uploaded: 75, errors: 0 });
        assert_eq!(second, UploadOutcome { uploaded: 0, errors: 0 });
        assert_eq!(store.rows.lock().unwrap().len(), 75);

        // only genuinely new rows count on a partial re-run
        let grown: Vec<_> = (70..80).map(book).collect();
        let third = uploader.upload(&grown, "books").await.unwrap();
        assert_eq!(third, UploadOutcome { uploaded: 5, errors: 0 });
    }

    #[test]
    fn test_inserted_rows_falls_back_to_batch_size() {
        let echoed = HttpResponse { status: 201, body: r#"[{"a":1},{"a":2}]"#.into() };
        assert_eq!(inserted_rows(&echoed, 5), 2);
        let empty = HttpResponse { status: 201, body: String::new() };
        assert_eq!(inserted_rows(&empty, 5), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_upload_sends_nothing() {
        let t = Arc::new(ScriptedTransport::new());
        let uploader = Uploader::new(t.clone(), datastore(), UploadSettings::default());
        let outcome = uploader.upload(&[], "books").await.unwrap();
        assert_eq!(outcome, UploadOutcome::default());
        assert!(t.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping() {
        let up = Arc::new(ScriptedTransport::new().route("/rest/v1/", vec![ok("{}")]));
        assert_eq!(
            Uploader::new(up, datastore(), UploadSettings::default()).ping().await,
            CONNECTED
        );

        let broken = Arc::new(ScriptedTransport::new().route("/rest/v1/", vec![status(401)]));
        assert_eq!(
            Uploader::new(broken, datastore(), UploadSettings::default()).ping().await,
            CONNECTION_ERROR
        );

        let t = Arc::new(ScriptedTransport::new());
        assert_eq!(
            Uploader::new(t, None, UploadSettings::default()).ping().await,
            NOT_CONFIGURED
        );
    }
}
