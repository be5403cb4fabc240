use super::fetcher::ResultPageFetcher;
use super::job::{JobHandle, JobPhase, JobStatus};
use super::locator::Locator;
use crate::config::BulkSettings;
use crate::decode::{decode_rows, Row};
use crate::error::{Operation, Result, SfTapError};
use crate::http::{ApiRequest, HttpTransport};
use crate::stream::{QuerySpec, RowSource};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Serialize)]
struct CreateJobRequest<'a> {
    operation: &'static str,
    query: &'a str,
}

enum Drain {
    Pending,
    Draining {
        job: JobHandle,
        next: Locator,
        rows: std::vec::IntoIter<Row>,
    },
}

/// Runs a query as a bulk job: submit, poll until terminal, then page
/// through the results one locator at a time.
pub struct BulkJobController {
    transport: Arc<dyn HttpTransport>,
    jobs_url: String,
    settings: BulkSettings,
}

impl BulkJobController {
    pub fn new(transport: Arc<dyn HttpTransport>, api_base: &str, settings: BulkSettings) -> Self {
        Self {
            transport,
            jobs_url: format!("{}/jobs/query", api_base.trim_end_matches('/')),
            settings,
        }
    }

    pub fn jobs_url(&self) -> &str {
        &self.jobs_url
    }

    pub async fn submit(&self, query: &QuerySpec) -> Result<JobHandle> {
        let soql = query.to_soql();
        let body = serde_json::to_value(CreateJobRequest {
            operation: "query",
            query: &soql,
        })?;

        let response = self
            .transport
            .send(ApiRequest::post_json(self.jobs_url.clone(), body))
            .await
            .map_err(|e| e.during(&query.entity, Operation::Submit))?;
        if !response.is_success() {
            return Err(SfTapError::Request {
                entity: query.entity.clone(),
                operation: Operation::Submit,
                status: response.status,
                body: response.body,
            });
        }

        let id = response
            .json()
            .map_err(|e| SfTapError::UnexpectedResponse {
                entity: query.entity.clone(),
                operation: Operation::Submit,
                message: e.to_string(),
            })?
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| SfTapError::UnexpectedResponse {
                entity: query.entity.clone(),
                operation: Operation::Submit,
                message: format!("no job id in {}", response.body),
            })?;

        let job = JobHandle::new(id, query.entity.clone(), soql);
        info!(
            entity = %job.entity(),
            job_id = %job.id(),
            soql = %job.query(),
            "Bulk query job submitted"
        );
        Ok(job)
    }

    pub async fn poll_status(&self, job: &JobHandle) -> Result<JobStatus> {
        let url = format!("{}/{}", self.jobs_url, job.id());
        let response = self
            .transport
            .send(ApiRequest::get(url))
            .await
            .map_err(|e| e.during(job.entity(), Operation::Poll))?;
        if !response.is_success() {
            return Err(SfTapError::Request {
                entity: job.entity().to_string(),
                operation: Operation::Poll,
                status: response.status,
                body: response.body,
            });
        }

        let value = response
            .json()
            .map_err(|e| SfTapError::UnexpectedResponse {
                entity: job.entity().to_string(),
                operation: Operation::Poll,
                message: e.to_string(),
            })?;
        JobStatus::from_json(&value, response.body.as_str()).ok_or_else(|| {
            SfTapError::UnexpectedResponse {
                entity: job.entity().to_string(),
                operation: Operation::Poll,
                message: format!("no job state in {}", response.body),
            }
        })
    }

    /// Polls at a fixed interval until the job completes, fails, or the
    /// configured wait ceiling passes.
    pub async fn wait_for_completion(&self, job: &mut JobHandle) -> Result<JobStatus> {
        job.set_phase(JobPhase::Polling);
        let started = Instant::now();

        loop {
            let status = self.poll_status(job).await?;
            debug!(
                entity = %job.entity(),
                job_id = %job.id(),
                state = %status.state,
                "Polled bulk job"
            );

            if status.state.is_success() {
                job.set_phase(JobPhase::Complete);
                info!(
                    entity = %job.entity(),
                    job_id = %job.id(),
                    records = status.records_processed.unwrap_or(0),
                    elapsed_secs = started.elapsed().as_secs(),
                    "Bulk query job complete"
                );
                return Ok(status);
            }

            if status.state.is_failure() {
                job.set_phase(JobPhase::Failed);
                return Err(SfTapError::JobFailed {
                    entity: job.entity().to_string(),
                    job_id: job.id().to_string(),
                    payload: status.raw,
                });
            }

            if let Some(max_wait) = self.settings.max_wait() {
                if started.elapsed() >= max_wait {
                    return Err(SfTapError::JobTimeout {
                        entity: job.entity().to_string(),
                        job_id: job.id().to_string(),
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
            }

            tokio::time::sleep(self.settings.poll_interval()).await;
        }
    }

    pub fn fetcher(&self) -> ResultPageFetcher<'_> {
        ResultPageFetcher::new(
            self.transport.as_ref(),
            &self.jobs_url,
            self.settings.page_size,
        )
    }

    /// Lazily yields every result row of `query`. Nothing is sent until the
    /// stream is first polled; a failure ends the stream after the error.
    pub fn execute<'a>(&'a self, query: &'a QuerySpec) -> BoxStream<'a, Result<Row>> {
        stream::try_unfold(Drain::Pending, move |state| self.next_row(query, state)).boxed()
    }

    async fn next_row(&self, query: &QuerySpec, mut state: Drain) -> Result<Option<(Row, Drain)>> {
        loop {
            state = match state {
                Drain::Pending => {
                    let mut job = self.submit(query).await?;
                    self.wait_for_completion(&mut job).await?;
                    Drain::Draining {
                        job,
                        next: Locator::Start,
                        rows: Vec::new().into_iter(),
                    }
                }
                Drain::Draining {
                    job,
                    next,
                    mut rows,
                } => {
                    if let Some(row) = rows.next() {
                        return Ok(Some((row, Drain::Draining { job, next, rows })));
                    }
                    if next.is_exhausted() {
                        debug!(entity = %job.entity(), job_id = %job.id(), "Bulk results drained");
                        return Ok(None);
                    }

                    let page = self.fetcher().fetch(&job, &next).await?;
                    let decoded = decode_rows(&page.payload)
                        .and_then(|rows| rows.collect::<Result<Vec<_>>>())
                        .map_err(|e| SfTapError::Decode {
                            entity: job.entity().to_string(),
                            message: e.to_string(),
                        })?;
                    info!(
                        entity = %job.entity(),
                        job_id = %job.id(),
                        rows = decoded.len(),
                        last_page = page.next.is_exhausted(),
                        "Fetched result page"
                    );

                    Drain::Draining {
                        job,
                        next: page.next,
                        rows: decoded.into_iter(),
                    }
                }
            };
        }
    }
}

impl RowSource for BulkJobController {
    fn rows<'a>(&'a self, query: &'a QuerySpec) -> BoxStream<'a, Result<Row>> {
        self.execute(query)
    }

    fn mode(&self) -> &'static str {
        "bulk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::LOCATOR_HEADER;
    use crate::http::{ApiResponse, Method, MockTransport};
    use futures::TryStreamExt;
    use serde_json::json;

    const API_BASE: &str = "https://acme.salesforce.com/services/data/v60.0";

    fn settings() -> BulkSettings {
        BulkSettings {
            poll_interval_secs: 0,
            page_size: 50_000,
            max_wait_secs: None,
        }
    }

    fn query() -> QuerySpec {
        QuerySpec::new("Account", vec!["Id".to_string(), "Name".to_string()])
    }

    fn controller(mock: &Arc<MockTransport>) -> BulkJobController {
        BulkJobController::new(mock.clone(), API_BASE, settings())
    }

    fn created() -> ApiResponse {
        ApiResponse::new(200, json!({"id": "750xx", "state": "UploadComplete"}).to_string())
    }

    fn state(s: &str) -> ApiResponse {
        ApiResponse::new(200, json!({"id": "750xx", "state": s}).to_string())
    }

    fn page(body: &str, locator: &str) -> ApiResponse {
        ApiResponse::new(200, body).with_header(LOCATOR_HEADER, locator)
    }

    #[tokio::test]
    async fn test_submit_posts_query_body() {
        let mock = Arc::new(MockTransport::with_responses([created()]));
        let job = controller(&mock).submit(&query()).await.unwrap();

        assert_eq!(job.id(), "750xx");
        assert_eq!(job.phase(), JobPhase::Submitted);
        let req = &mock.requests()[0];
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.url, format!("{}/jobs/query", API_BASE));
        assert_eq!(
            req.body,
            Some(json!({"operation": "query", "query": "SELECT Id,Name FROM Account"}))
        );
    }

    #[tokio::test]
    async fn test_submit_without_id_is_unexpected() {
        let mock = Arc::new(MockTransport::with_responses([ApiResponse::new(200, "{}")]));
        let err = controller(&mock).submit(&query()).await.unwrap_err();
        assert!(matches!(
            err,
            SfTapError::UnexpectedResponse {
                operation: Operation::Submit,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_wait_polls_until_complete() {
        let mock = Arc::new(MockTransport::with_responses([
            state("UploadComplete"),
            state("InProgress"),
            state("JobComplete"),
        ]));
        let mut job = JobHandle::new("750xx", "Account", "SELECT Id FROM Account");

        let status = controller(&mock)
            .wait_for_completion(&mut job)
            .await
            .unwrap();

        assert!(status.state.is_success());
        assert_eq!(job.phase(), JobPhase::Complete);
        assert_eq!(mock.requests_ending_with("/jobs/query/750xx").len(), 3);
    }

    #[tokio::test]
    async fn test_aborted_job_fails() {
        let mock = Arc::new(MockTransport::with_responses([state("Aborted")]));
        let mut job = JobHandle::new("750xx", "Account", "SELECT Id FROM Account");

        let err = controller(&mock)
            .wait_for_completion(&mut job)
            .await
            .unwrap_err();

        assert!(matches!(err, SfTapError::JobFailed { .. }));
        assert_eq!(job.phase(), JobPhase::Failed);
    }

    #[tokio::test]
    async fn test_wait_ceiling_times_out() {
        let mock = Arc::new(MockTransport::with_responses([state("InProgress")]));
        let ctl = BulkJobController::new(
            mock.clone(),
            API_BASE,
            BulkSettings {
                poll_interval_secs: 0,
                page_size: 10,
                max_wait_secs: Some(0),
            },
        );
        let mut job = JobHandle::new("750xx", "Account", "SELECT Id FROM Account");

        let err = ctl.wait_for_completion(&mut job).await.unwrap_err();

        assert!(matches!(err, SfTapError::JobTimeout { .. }));
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_poll_http_error_is_fatal() {
        let mock = Arc::new(MockTransport::with_responses([ApiResponse::new(
            404,
            "[{\"errorCode\":\"NOT_FOUND\"}]",
        )]));
        let mut job = JobHandle::new("750xx", "Account", "SELECT Id FROM Account");

        let err = controller(&mock)
            .wait_for_completion(&mut job)
            .await
            .unwrap_err();

        assert_eq!(err.operation(), Some(Operation::Poll));
        assert!(err.to_string().contains("NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_execute_is_lazy() {
        let mock = Arc::new(MockTransport::new());
        let ctl = controller(&mock);
        let q = query();
        let _stream = ctl.execute(&q);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_execute_skips_empty_pages() {
        let mock = Arc::new(MockTransport::with_responses([
            created(),
            state("JobComplete"),
            page("", "p2"),
            page("\"Id\",\"Name\"\n", "p3"),
            page("\"Id\",\"Name\"\n\"001\",\"Acme\"\n", "null"),
        ]));
        let ctl = controller(&mock);
        let q = query();

        let rows: Vec<Row> = ctl.execute(&q).try_collect().await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Name"], "Acme");
        assert_eq!(mock.requests_ending_with("/results").len(), 3);
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    async fn test_malformed_page_is_a_decode_error() {
        let mock = Arc::new(MockTransport::with_responses([
            created(),
            state("JobComplete"),
            page("Id,Name\n001\n", "null"),
        ]));
        let ctl = controller(&mock);
        let q = query();

        let result: Result<Vec<Row>> = ctl.execute(&q).try_collect().await;

        assert!(matches!(result, Err(SfTapError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_stream_ends_after_error() {
        let mock = Arc::new(MockTransport::with_responses([ApiResponse::new(
            400,
            "bad",
        )]));
        let ctl = controller(&mock);
        let q = query();
        let mut stream = ctl.execute(&q);

        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
        assert_eq!(mock.requests().len(), 1);
    }
}
