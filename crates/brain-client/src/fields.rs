//! Data-field catalog retrieval.
//!
//! Drains the paginated `/data-fields` listing into a flat field list, in
//! ascending offset order. Two modes:
//! - Listing (dataset filter): the first page carries an authoritative
//!   `count`, which bounds the drain.
//! - Search (free-text term): `count` is not authoritative; the drain is
//!   bounded by a configured result cap and stops early on a short page.
//!   This is a known-incomplete strategy, not a completeness guarantee.

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::executor::{RequestError, RequestExecutor};
use crate::session::{Session, SessionProvider};

/// Page size for `/data-fields`.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Result cap for search mode, where the server count is not authoritative.
pub const DEFAULT_SEARCH_RESULT_CAP: usize = 100;

/// One data field from the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct DataField {
    pub id: String,
    /// Data type of the field (`MATRIX`, `VECTOR`, ...). `None` when the
    /// server response omits the column.
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    pub dataset: Option<DatasetRef>,
    pub description: Option<String>,
}

/// Dataset reference attached to a field.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetRef {
    pub id: Option<String>,
}

/// Response envelope for `/data-fields`.
#[derive(Debug, Deserialize)]
struct FieldsPage {
    /// Total result count. Authoritative in listing mode only.
    #[serde(default)]
    count: usize,
    #[serde(default)]
    results: Vec<DataField>,
}

/// Query parameters for the field listing.
#[derive(Debug, Clone)]
pub struct DataFieldQuery {
    pub instrument_type: String,
    pub region: String,
    pub delay: u32,
    pub universe: String,
    /// Dataset filter, used in listing mode.
    pub dataset_id: Option<String>,
    /// Free-text search term; a non-empty value switches to search mode.
    pub search: Option<String>,
}

impl DataFieldQuery {
    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether this query runs in search mode.
    pub fn is_search(&self) -> bool {
        self.search_term().is_some()
    }

    fn page_url(&self, base_url: &str, limit: usize, offset: usize) -> String {
        let mut url = format!(
            "{}/data-fields?instrumentType={}&region={}&delay={}&universe={}",
            base_url, self.instrument_type, self.region, self.delay, self.universe
        );
        if let Some(term) = self.search_term() {
            // Free text; spaces and separators must not leak into the query.
            url.push_str(&format!(
                "&search={}",
                utf8_percent_encode(term, NON_ALPHANUMERIC)
            ));
        } else if let Some(dataset) = self.dataset_id.as_deref() {
            url.push_str(&format!("&dataset.id={}", dataset));
        }
        url.push_str(&format!("&limit={}&offset={}", limit, offset));
        url
    }
}

/// Page start offsets for a drain bounded by `count`: `0, page_size, ...`
/// while below `count`.
fn page_starts(count: usize, page_size: usize) -> Vec<usize> {
    (0..count).step_by(page_size.max(1)).collect()
}

/// Drains the `/data-fields` catalog through the retrying executor.
pub struct FieldFetcher<'a, P: SessionProvider> {
    executor: &'a RequestExecutor<'a, P>,
    base_url: String,
    page_size: usize,
    search_result_cap: usize,
}

impl<'a, P: SessionProvider> FieldFetcher<'a, P> {
    pub fn new(executor: &'a RequestExecutor<'a, P>, base_url: String) -> Self {
        Self {
            executor,
            base_url,
            page_size: DEFAULT_PAGE_SIZE,
            search_result_cap: DEFAULT_SEARCH_RESULT_CAP,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_search_result_cap(mut self, cap: usize) -> Self {
        self.search_result_cap = cap;
        self
    }

    /// Fetch every page of the query, flattened in page order.
    ///
    /// A page whose retry budget is exhausted is logged and skipped rather
    /// than aborting the drain, so the output can legitimately be shorter
    /// than the server count; the skip count is logged at the end. The one
    /// exception is the first page in listing mode: the authoritative
    /// `count` comes from it, so without it the drain cannot be sized and
    /// the error propagates.
    pub async fn fetch_all(
        &self,
        session: &mut Session,
        query: &DataFieldQuery,
    ) -> Result<Vec<DataField>, RequestError> {
        let search = query.is_search();
        let mut fields = Vec::new();
        let mut skipped = 0u32;
        // Pages are assumed full until one comes up short.
        let mut last_len = self.page_size;

        let count = if search {
            info!(
                cap = self.search_result_cap,
                "search mode: count not authoritative, paging to cap"
            );
            self.search_result_cap
        } else {
            let first = self.fetch_page(session, query, 0).await?;
            debug!(count = first.count, "listing mode: server reported count");
            last_len = first.results.len();
            fields = first.results;
            first.count
        };

        // Listing mode already holds page zero from the count probe.
        let already_fetched = if search { 0 } else { 1 };
        for offset in page_starts(count, self.page_size)
            .into_iter()
            .skip(already_fetched)
        {
            if search && last_len < self.page_size {
                debug!(offset, "short search page, assuming result set drained");
                break;
            }
            match self.fetch_page(session, query, offset).await {
                Ok(page) => {
                    last_len = page.results.len();
                    fields.extend(page.results);
                }
                Err(e @ RequestError::RetryBudgetExhausted { .. }) => {
                    warn!(offset, error = %e, "skipping page after exhausted retry budget");
                    skipped += 1;
                    // A skipped page must not end a search drain early.
                    last_len = self.page_size;
                }
                Err(e) => return Err(e),
            }
        }

        if skipped > 0 {
            warn!(skipped, total = fields.len(), "field drain finished with skipped pages");
        }
        info!(total = fields.len(), search, "fetched data fields");
        Ok(fields)
    }

    async fn fetch_page(
        &self,
        session: &mut Session,
        query: &DataFieldQuery,
        offset: usize,
    ) -> Result<FieldsPage, RequestError> {
        let url = query.page_url(&self.base_url, self.page_size, offset);
        let desc = format!("data-fields offset={}", offset);

        self.executor
            .execute(session, &desc, |sess| {
                let url = url.clone();
                async move {
                    let response = sess
                        .http()
                        .get(&url)
                        .send()
                        .await
                        .map_err(|e| e.to_string())?
                        .error_for_status()
                        .map_err(|e| e.to_string())?;
                    response
                        .json::<FieldsPage>()
                        .await
                        .map_err(|e| e.to_string())
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::executor::RetryPolicy;
    use crate::session::{Credentials, SessionManager};

    fn listing_query() -> DataFieldQuery {
        DataFieldQuery {
            instrument_type: "EQUITY".to_string(),
            region: "USA".to_string(),
            delay: 1,
            universe: "TOP3000".to_string(),
            dataset_id: Some("fundamental6".to_string()),
            search: None,
        }
    }

    #[test]
    fn test_page_starts_exact_multiple() {
        assert_eq!(page_starts(100, 50), vec![0, 50]);
    }

    #[test]
    fn test_page_starts_partial_last_page() {
        // count=120, page_size=50: pages at 0, 50, 100 (three requests).
        assert_eq!(page_starts(120, 50), vec![0, 50, 100]);
    }

    #[test]
    fn test_page_starts_empty_catalog() {
        assert!(page_starts(0, 50).is_empty());
    }

    #[test]
    fn test_page_starts_single_short_page() {
        assert_eq!(page_starts(7, 50), vec![0]);
    }

    #[test]
    fn test_listing_url_carries_dataset_filter() {
        let url = listing_query().page_url("https://api.example.com", 50, 100);
        assert_eq!(
            url,
            "https://api.example.com/data-fields?instrumentType=EQUITY&region=USA&delay=1\
             &universe=TOP3000&dataset.id=fundamental6&limit=50&offset=100"
        );
    }

    #[test]
    fn test_search_url_drops_dataset_filter() {
        let mut query = listing_query();
        query.search = Some("assets".to_string());
        let url = query.page_url("https://api.example.com", 50, 0);
        assert!(url.contains("&search=assets"));
        assert!(!url.contains("dataset.id"));
        assert!(query.is_search());
    }

    #[test]
    fn test_search_term_is_percent_encoded() {
        let mut query = listing_query();
        query.search = Some("total assets & debt".to_string());
        let url = query.page_url("https://api.example.com", 50, 0);
        assert!(url.contains("&search=total%20assets%20%26%20debt"));
        assert!(!url.contains("assets & debt"));
    }

    #[test]
    fn test_empty_search_term_is_listing_mode() {
        let mut query = listing_query();
        query.search = Some(String::new());
        assert!(!query.is_search());
        let url = query.page_url("https://api.example.com", 50, 0);
        assert!(url.contains("dataset.id=fundamental6"));
    }

    #[test]
    fn test_fields_page_envelope_parses() {
        let body = r#"{
            "count": 2,
            "results": [
                {"id": "f1_totalassets", "type": "MATRIX", "dataset": {"id": "fundamental6"}},
                {"id": "f1_netincome", "type": "MATRIX", "description": "Net income"}
            ]
        }"#;
        let page: FieldsPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.count, 2);
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].id, "f1_totalassets");
        assert_eq!(page.results[0].field_type.as_deref(), Some("MATRIX"));
        assert_eq!(
            page.results[0].dataset.as_ref().and_then(|d| d.id.as_deref()),
            Some("fundamental6")
        );
    }

    #[test]
    fn test_fields_page_without_type_column() {
        let body = r#"{"count": 1, "results": [{"id": "f1_totalassets"}]}"#;
        let page: FieldsPage = serde_json::from_str(body).unwrap();
        assert!(page.results[0].field_type.is_none());
    }

    // ------------------------------------------------------------------
    // Drain tests against a canned-response loopback server
    // ------------------------------------------------------------------

    /// Minimal catalog server: serves `total` fields in `limit`-sized
    /// slices, answers 500 for offsets in `fail_offsets`, and records every
    /// requested offset.
    async fn spawn_catalog_server(
        total: usize,
        fail_offsets: &'static [usize],
    ) -> (String, Arc<Mutex<Vec<usize>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let offsets = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&offsets);

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let offset = query_param(&request, "offset");
                let limit = query_param(&request, "limit");
                seen.lock().unwrap().push(offset);

                let response = if fail_offsets.contains(&offset) {
                    "HTTP/1.1 500 Internal Server Error\r\n\
                     content-length: 0\r\nconnection: close\r\n\r\n"
                        .to_string()
                } else {
                    let results: Vec<String> = (offset..total.min(offset + limit))
                        .map(|i| format!(r#"{{"id":"f{:04}","type":"MATRIX"}}"#, i))
                        .collect();
                    let body = format!(
                        r#"{{"count":{},"results":[{}]}}"#,
                        total,
                        results.join(",")
                    );
                    format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    )
                };
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (base_url, offsets)
    }

    fn query_param(request: &str, name: &str) -> usize {
        let line = request.lines().next().unwrap_or("");
        let key = format!("{}=", name);
        line.split(|c| c == '?' || c == '&')
            .find_map(|pair| pair.strip_prefix(key.as_str()))
            .and_then(|value| value.split_whitespace().next())
            .and_then(|value| value.parse().ok())
            .unwrap_or(0)
    }

    fn test_manager(base_url: &str) -> SessionManager {
        let credentials = Credentials {
            username: "user@example.com".to_string(),
            password: "secret".to_string(),
        };
        SessionManager::with_base_url(credentials, base_url.to_string())
    }

    /// No re-logins, millisecond windows: a failing page exhausts its
    /// budget quickly and the provider is never invoked.
    fn tight_policy() -> RetryPolicy {
        RetryPolicy {
            max_relogins: 0,
            window_timeout: Duration::from_millis(30),
            retry_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_fetch_all_listing_drains_exact_pages() {
        let (base_url, offsets) = spawn_catalog_server(120, &[]).await;
        let manager = test_manager(&base_url);
        let executor = RequestExecutor::new(&manager, tight_policy());
        let fetcher = FieldFetcher::new(&executor, base_url);
        let mut session = Session::fake("user-0");

        let fields = fetcher
            .fetch_all(&mut session, &listing_query())
            .await
            .unwrap();

        // count=120 at page_size=50: exactly three requests, page 0 reused.
        assert_eq!(*offsets.lock().unwrap(), vec![0, 50, 100]);
        assert_eq!(fields.len(), 120);
        assert_eq!(fields[0].id, "f0000");
        assert_eq!(fields[119].id, "f0119");
        let ids: Vec<&String> = fields.iter().map(|f| &f.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted, "fields must stay in ascending offset order");
    }

    #[tokio::test]
    async fn test_fetch_all_search_stops_on_short_page() {
        let (base_url, offsets) = spawn_catalog_server(60, &[]).await;
        let manager = test_manager(&base_url);
        let executor = RequestExecutor::new(&manager, tight_policy());
        let fetcher = FieldFetcher::new(&executor, base_url).with_search_result_cap(200);
        let mut session = Session::fake("user-0");

        let mut query = listing_query();
        query.search = Some("assets".to_string());
        let fields = fetcher.fetch_all(&mut session, &query).await.unwrap();

        assert_eq!(fields.len(), 60);
        // The cap allows offsets up to 150; the 10-field page at offset 50
        // ends the drain instead.
        assert_eq!(*offsets.lock().unwrap(), vec![0, 50]);
    }

    #[tokio::test]
    async fn test_fetch_all_skips_exhausted_page_and_continues() {
        let (base_url, offsets) = spawn_catalog_server(120, &[50]).await;
        let manager = test_manager(&base_url);
        let executor = RequestExecutor::new(&manager, tight_policy());
        let fetcher = FieldFetcher::new(&executor, base_url);
        let mut session = Session::fake("user-0");

        let fields = fetcher
            .fetch_all(&mut session, &listing_query())
            .await
            .unwrap();

        // The page at offset 50 is dropped; the drain still reaches 100.
        assert_eq!(fields.len(), 70);
        assert!(fields.iter().any(|f| f.id == "f0100"));
        assert!(!fields.iter().any(|f| f.id == "f0050"));

        let seen = offsets.lock().unwrap();
        assert_eq!(seen[0], 0);
        assert!(seen.contains(&100));
        // The failing offset was retried inside its window before the skip.
        assert!(seen.iter().filter(|&&o| o == 50).count() > 1);
    }

    #[tokio::test]
    async fn test_fetch_all_search_survives_first_page_failure() {
        let (base_url, offsets) = spawn_catalog_server(60, &[0]).await;
        let manager = test_manager(&base_url);
        let executor = RequestExecutor::new(&manager, tight_policy());
        let fetcher = FieldFetcher::new(&executor, base_url);
        let mut session = Session::fake("user-0");

        let mut query = listing_query();
        query.search = Some("assets".to_string());
        let fields = fetcher.fetch_all(&mut session, &query).await.unwrap();

        // Search mode needs no count probe, so a dead first page is skipped
        // like any other and the drain continues.
        assert_eq!(fields.len(), 10);
        assert_eq!(fields[0].id, "f0050");
        assert!(offsets.lock().unwrap().contains(&50));
    }

    #[tokio::test]
    async fn test_fetch_all_listing_propagates_first_page_failure() {
        let (base_url, _offsets) = spawn_catalog_server(120, &[0]).await;
        let manager = test_manager(&base_url);
        let executor = RequestExecutor::new(&manager, tight_policy());
        let fetcher = FieldFetcher::new(&executor, base_url);
        let mut session = Session::fake("user-0");

        // Listing mode cannot size the drain without the count probe.
        let result = fetcher.fetch_all(&mut session, &listing_query()).await;
        assert!(matches!(
            result,
            Err(RequestError::RetryBudgetExhausted { .. })
        ));
    }
}
