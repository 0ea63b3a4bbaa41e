//! Request surface: `/scrape` and `/status`.
//!
//! [`handle`] takes a raw request target (`/scrape?type=cards&source=all`)
//! and produces the status code and JSON body an HTTP front end would send.
//! The CLI `request` subcommand drives it directly.

use crate::config::Credential;
use crate::errors::ResolveError;
use crate::orchestrator::{Orchestrator, ScrapeRequest};
use crate::registry::ALL_SOURCES;
use crate::utils::truthy;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn bad_request(body: Value) -> Self {
        Self { status: 400, body }
    }
}

impl From<ResolveError> for ApiResponse {
    fn from(e: ResolveError) -> Self {
        let error = e.to_string();
        match e {
            ResolveError::UnknownDomain { available, .. } => {
                ApiResponse::bad_request(json!({ "error": error, "available": available }))
            }
            ResolveError::UnknownSource { valid_sources, .. } => {
                ApiResponse::bad_request(json!({ "error": error, "validSources": valid_sources }))
            }
        }
    }
}

/// Build a [`ScrapeRequest`] from the query string of a `/scrape` call.
pub fn scrape_request(url: &Url) -> Result<ScrapeRequest, ApiResponse> {
    let mut request = ScrapeRequest {
        domain: String::new(),
        source: ALL_SOURCES.to_string(),
        skip_upload: false,
        limit: None,
    };
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "type" => request.domain = v.trim().to_string(),
            "source" if !v.trim().is_empty() => request.source = v.trim().to_string(),
            "skip_upload" => request.skip_upload = truthy(&v),
            "limit" => {
                let n = v.trim().parse::<usize>().map_err(|_| {
                    ApiResponse::bad_request(json!({ "error": format!("invalid limit '{v}'") }))
                })?;
                request.limit = Some(n);
            }
            _ => {}
        }
    }
    Ok(request)
}

/// Registered scrapers and connection state.
#[instrument(level = "info", skip_all)]
pub async fn status(orch: &Orchestrator) -> Value {
    let scrapers: Map<String, Value> = orch
        .registry()
        .domains()
        .iter()
        .map(|d| {
            (
                d.key.to_string(),
                json!({
                    "table": d.table,
                    "sources": d.source_keys(),
                    "description": d.description,
                    "details": d.sources.iter().map(|s| (s.key.to_string(), json!({
                        "name": s.name,
                        "schedule": s.schedule,
                        "estimated_records": s.estimated_records,
                        "requires": s.requires.map(Credential::key),
                    }))).collect::<Map<String, Value>>(),
                }),
            )
        })
        .collect();

    let mut connections = Map::new();
    connections.insert("datastore".into(), json!(orch.uploader().ping().await));
    for c in Credential::ALL {
        let state = match orch.credentials().get(c) {
            Some(_) => "configured",
            None => "not_configured",
        };
        connections.insert(c.key().into(), json!(state));
    }

    json!({
        "status": "ok",
        "scrapers": scrapers,
        "connections": connections,
    })
}

/// Route one request target.
#[instrument(level = "info", skip(orch))]
pub async fn handle(orch: &Orchestrator, target: &str) -> ApiResponse {
    let url = match Url::parse("http://localhost/").and_then(|base| base.join(target)) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "Unparseable request target");
            return ApiResponse::bad_request(json!({ "error": format!("invalid request target: {e}") }));
        }
    };

    match url.path() {
        "/status" => ApiResponse::ok(status(orch).await),
        "/scrape" => {
            let request = match scrape_request(&url) {
                Ok(r) => r,
                Err(resp) => return resp,
            };
            match orch.run(&request).await {
                Ok(report) => match serde_json::to_value(&report) {
                    Ok(body) => ApiResponse::ok(body),
                    Err(e) => ApiResponse {
                        status: 500,
                        body: json!({ "error": e.to_string() }),
                    },
                },
                Err(e) => {
                    info!(error = %e, "Rejected scrape request");
                    e.into()
                }
            }
        }
        other => ApiResponse {
            status: 404,
            body: json!({ "error": format!("no route for {other}") }),
        },
    }
}
