//! Runs a scrape request end to end.
//!
//! For each resolved source, strictly one after another:
//!
//! 1. scrape raw records (honoring the run's `limit`)
//! 2. stamp each record with its source key and transform it
//! 3. upload the canonical rows unless `skip_upload` is set
//!
//! A source that fails, or is skipped for missing credentials, gets its own
//! entry in the report and the run moves on to the next source.

use crate::config::Credentials;
use crate::errors::ResolveError;
use crate::models::{CanonicalRecord, ScrapeReport, SourceOutcome};
use crate::registry::{DomainDescriptor, Planned, Registry, SourceDescriptor};
use crate::upload::Uploader;
use crate::utils::seconds;
use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// One invocation of the scrape surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeRequest {
    pub domain: String,
    pub source: String,
    pub skip_upload: bool,
    pub limit: Option<usize>,
}

pub struct Orchestrator {
    registry: Registry,
    credentials: Credentials,
    uploader: Uploader,
}

impl Orchestrator {
    pub fn new(registry: Registry, credentials: Credentials, uploader: Uploader) -> Self {
        Self {
            registry,
            credentials,
            uploader,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    /// Resolve, scrape, transform and upload.
    ///
    /// Only an unknown domain or source is an `Err`; every per-source
    /// failure is folded into the report.
    #[instrument(level = "info", skip_all, fields(domain = %request.domain, source = %request.source))]
    pub async fn run(&self, request: &ScrapeRequest) -> Result<ScrapeReport, ResolveError> {
        let t0 = Instant::now();
        let domain = self.registry.domain(&request.domain)?;
        let plan = self
            .registry
            .plan(&request.domain, &request.source, &self.credentials)?;
        info!(
            sources = plan.len(),
            skip_upload = request.skip_upload,
            limit = ?request.limit,
            "Starting scrape run"
        );

        let mut results = IndexMap::new();
        for planned in plan {
            let key = planned.key();
            let outcome = match planned {
                Planned::Skip { reason, .. } => {
                    warn!(source = key, %reason, "Skipping source");
                    SourceOutcome::skipped(reason)
                }
                Planned::Run(source) => self.run_source(domain, source, request).await,
            };
            results.insert(key.to_string(), outcome);
        }

        let report = ScrapeReport {
            domain: request.domain.clone(),
            source: request.source.clone(),
            total_scraped: results.values().map(SourceOutcome::scraped).sum(),
            uploaded: results.values().map(SourceOutcome::uploaded).sum(),
            errors: results.values().map(SourceOutcome::errors).sum(),
            results,
            duration_seconds: seconds(t0.elapsed()),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        info!(
            total_scraped = report.total_scraped,
            uploaded = report.uploaded,
            errors = report.errors,
            duration_seconds = report.duration_seconds,
            "Scrape run finished"
        );
        Ok(report)
    }

    #[instrument(level = "info", skip_all, fields(source = source.key))]
    async fn run_source(
        &self,
        domain: &DomainDescriptor,
        source: &SourceDescriptor,
        request: &ScrapeRequest,
    ) -> SourceOutcome {
        let raw = match source.scraper.fetch(request.limit).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "Source failed");
                return SourceOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let records: Vec<CanonicalRecord> = raw
            .into_iter()
            .map(|mut r| {
                r.insert("source".to_string(), Value::from(source.key));
                domain.transformer.apply(&r)
            })
            .collect();
        let scraped = records.len();
        info!(scraped, "Scraped and transformed");

        if request.skip_upload {
            return SourceOutcome::Completed {
                scraped,
                uploaded: 0,
                errors: 0,
            };
        }

        match self.uploader.upload(&records, domain.table).await {
            Ok(o) => SourceOutcome::Completed {
                scraped,
                uploaded: o.uploaded,
                errors: o.errors,
            },
            Err(e) => {
                error!(error = %e, "Upload could not start");
                SourceOutcome::UploadFailed {
                    scraped,
                    error: e.to_string(),
                }
            }
        }
    }
}
