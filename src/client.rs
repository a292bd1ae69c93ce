//! Async retrieval of version records from a lineage-aware store.
//!
//! A document's full ancestry and its later descendants live behind two
//! sibling endpoints derived from the document URI. Both are queried
//! concurrently; the ancestry endpoint is authoritative and its failures
//! surface as errors, while the descendant endpoint degrades to an empty
//! contribution when it answers with a non-success status.

use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{HistoryError, Result};
use crate::graph::{dedup_records, HistoryGraph};

/// Tunables for [`HistoryClient`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Per-request timeout, applied to each endpoint call separately.
    pub timeout: Duration,
    /// Value sent as the `user-agent` header.
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            timeout: Duration::from_secs(30),
            user_agent: concat!("stemma/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

/// HTTP client for the history and since endpoints of a record store.
#[derive(Debug, Clone)]
pub struct HistoryClient {
    http: reqwest::Client,
}

impl HistoryClient {
    /// Build a client with the given options.
    pub fn new(options: FetchOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent)
            .default_headers(headers)
            .build()?;
        Ok(HistoryClient { http })
    }

    /// Fetch every version record reachable from `document_uri` and
    /// deduplicate the merged batch.
    ///
    /// Ancestry records come first in the returned batch, so on identifier
    /// collisions the ancestry copy is the one kept. Bare-string items are
    /// promoted to minimal `{"@id": ...}` records on the way in.
    pub async fn fetch_records(&self, document_uri: &str) -> Result<Vec<Value>> {
        let uri = document_uri.trim();
        if uri.is_empty() {
            return Err(HistoryError::MissingDocumentUri);
        }
        let history_url = endpoint_url(uri, "/history/");
        let since_url = endpoint_url(uri, "/since/");
        let (history, since) = tokio::join!(
            self.fetch_history(&history_url),
            self.fetch_since(&since_url)
        );
        let mut records: Vec<Value> = Vec::new();
        records.extend(history?.into_iter().map(normalize_record));
        records.extend(since?.into_iter().map(normalize_record));
        Ok(dedup_records(records))
    }

    /// Fetch the records for `document_uri` and build their forest.
    pub async fn fetch_graph(&self, document_uri: &str) -> Result<HistoryGraph> {
        let records = self.fetch_records(document_uri).await?;
        Ok(HistoryGraph::build(&records))
    }

    async fn fetch_history(&self, url: &str) -> Result<Vec<Value>> {
        debug!(%url, "requesting ancestry");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HistoryError::Endpoint(status));
        }
        let payload: Value = response.json().await?;
        records_from_payload(payload, "history")
            .ok_or(HistoryError::UnexpectedFormat("history collection is not an array"))
    }

    async fn fetch_since(&self, url: &str) -> Result<Vec<Value>> {
        debug!(%url, "requesting descendants");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%status, %url, "descendant endpoint unavailable, continuing with ancestry only");
            return Ok(Vec::new());
        }
        let payload: Value = response.json().await?;
        Ok(records_from_payload(payload, "since").unwrap_or_default())
    }
}

/// Swap the document's `/id/` path segment for an endpoint segment.
///
/// Only the first occurrence is rewritten; a URI without the segment is
/// passed through untouched and left for the server to reject.
fn endpoint_url(document_uri: &str, segment: &str) -> String {
    document_uri.replacen("/id/", segment, 1)
}

/// Pull the record array out of a store payload.
///
/// A bare array is the records themselves. An object is unwrapped via its
/// `items` field, then via `collection_key`; an object carrying neither
/// holds no records. `None` means the payload named a collection that is
/// not an array, which is a malformed payload rather than an empty one.
pub fn records_from_payload(payload: Value, collection_key: &str) -> Option<Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(mut fields) => {
            let nested = fields
                .remove("items")
                .filter(|v| !v.is_null())
                .or_else(|| fields.remove(collection_key).filter(|v| !v.is_null()));
            match nested {
                None => Some(Vec::new()),
                Some(Value::Array(items)) => Some(items),
                Some(_) => None,
            }
        }
        _ => Some(Vec::new()),
    }
}

fn normalize_record(item: Value) -> Value {
    match item {
        Value::String(id) => json!({ "@id": id }),
        other => other,
    }
}

/// Serializes refreshes so only the most recent request can publish a
/// graph.
///
/// Each [`refresh`](HistorySession::refresh) cancels the one before it;
/// a superseded call resolves to `Ok(None)` instead of returning stale
/// data. [`abort`](HistorySession::abort) cancels whatever is in flight.
#[derive(Debug)]
pub struct HistorySession {
    client: HistoryClient,
    active: Mutex<Option<CancellationToken>>,
}

impl HistorySession {
    /// Wrap a client in a session.
    pub fn new(client: HistoryClient) -> Self {
        HistorySession {
            client,
            active: Mutex::new(None),
        }
    }

    /// The underlying client, for one-off calls outside the session.
    pub fn client(&self) -> &HistoryClient {
        &self.client
    }

    /// Fetch and build the graph for `document_uri`, displacing any
    /// refresh still in flight.
    ///
    /// Returns `Ok(None)` when this call was itself displaced before it
    /// could finish.
    pub async fn refresh(&self, document_uri: &str) -> Result<Option<HistoryGraph>> {
        let token = CancellationToken::new();
        if let Some(previous) = self.active.lock().replace(token.clone()) {
            previous.cancel();
        }
        tokio::select! {
            _ = token.cancelled() => {
                debug!(uri = document_uri, "refresh superseded");
                Ok(None)
            }
            outcome = self.client.fetch_graph(document_uri) => outcome.map(Some),
        }
    }

    /// Cancel the in-flight refresh, if any.
    pub fn abort(&self) {
        if let Some(token) = self.active.lock().take() {
            token.cancel();
        }
    }
}
