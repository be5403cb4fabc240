use crate::decode::Row;
use crate::error::{Operation, Result, SfTapError};
use crate::http::{ApiRequest, HttpTransport};
use crate::stream::{QuerySpec, RowSource};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    total_size: u64,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    next_records_url: Option<String>,
    #[serde(default)]
    records: Vec<Map<String, Value>>,
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

struct Page {
    rows: std::vec::IntoIter<Row>,
    cursor: Cursor,
}

/// Synchronous query endpoint, paged by `nextRecordsUrl`.
pub struct RestQueryClient {
    transport: Arc<dyn HttpTransport>,
    instance_url: String,
    api_base: String,
}

impl RestQueryClient {
    pub fn new(transport: Arc<dyn HttpTransport>, instance_url: &str, api_base: &str) -> Self {
        Self {
            transport,
            instance_url: instance_url.trim_end_matches('/').to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn request_for(&self, query: &QuerySpec, cursor: &Cursor) -> Option<ApiRequest> {
        match cursor {
            Cursor::Start => {
                Some(ApiRequest::get(format!("{}/query", self.api_base)).param("q", query.to_soql()))
            }
            Cursor::Next(path) => Some(ApiRequest::get(format!("{}{}", self.instance_url, path))),
            Cursor::Done => None,
        }
    }

    async fn fetch(&self, entity: &str, request: ApiRequest) -> Result<QueryResponse> {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| e.during(entity, Operation::Query))?;
        if !response.is_success() {
            return Err(SfTapError::Request {
                entity: entity.to_string(),
                operation: Operation::Query,
                status: response.status,
                body: response.body,
            });
        }
        serde_json::from_str(&response.body).map_err(|e| SfTapError::UnexpectedResponse {
            entity: entity.to_string(),
            operation: Operation::Query,
            message: e.to_string(),
        })
    }

    pub fn execute<'a>(&'a self, query: &'a QuerySpec) -> BoxStream<'a, Result<Row>> {
        let start = Page {
            rows: Vec::new().into_iter(),
            cursor: Cursor::Start,
        };
        stream::try_unfold(start, move |page| self.next_row(query, page)).boxed()
    }

    async fn next_row(&self, query: &QuerySpec, mut page: Page) -> Result<Option<(Row, Page)>> {
        loop {
            if let Some(mut row) = page.rows.next() {
                row.remove("attributes");
                return Ok(Some((row, page)));
            }

            let Some(request) = self.request_for(query, &page.cursor) else {
                return Ok(None);
            };
            let response = self.fetch(&query.entity, request).await?;
            debug!(
                entity = %query.entity,
                rows = response.records.len(),
                total = response.total_size,
                done = response.done,
                "Fetched query page"
            );

            let cursor = match response.next_records_url {
                Some(next) if !response.done => Cursor::Next(next),
                _ => Cursor::Done,
            };
            page = Page {
                rows: response.records.into_iter(),
                cursor,
            };
        }
    }
}

impl RowSource for RestQueryClient {
    fn rows<'a>(&'a self, query: &'a QuerySpec) -> BoxStream<'a, Result<Row>> {
        self.execute(query)
    }

    fn mode(&self) -> &'static str {
        "rest"
    }
}
