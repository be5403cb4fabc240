use super::job::{JobHandle, JobPhase};
use super::locator::{Locator, LOCATOR_HEADER};
use crate::error::{Operation, Result, SfTapError};
use crate::http::{ApiRequest, HttpTransport};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ResultPage {
    /// CSV text; may be empty.
    pub payload: String,
    pub next: Locator,
}

/// Fetches one page of a completed job's results.
pub struct ResultPageFetcher<'a> {
    transport: &'a dyn HttpTransport,
    jobs_url: &'a str,
    page_size: usize,
}

impl<'a> ResultPageFetcher<'a> {
    pub fn new(transport: &'a dyn HttpTransport, jobs_url: &'a str, page_size: usize) -> Self {
        Self {
            transport,
            jobs_url,
            page_size,
        }
    }

    pub async fn fetch(&self, job: &JobHandle, locator: &Locator) -> Result<ResultPage> {
        if job.phase() != JobPhase::Complete {
            return Err(SfTapError::JobNotComplete {
                entity: job.entity().to_string(),
                job_id: job.id().to_string(),
            });
        }
        if locator.is_exhausted() {
            debug!(job_id = %job.id(), "Locator exhausted, no page requested");
            return Ok(ResultPage {
                payload: String::new(),
                next: Locator::Exhausted,
            });
        }

        let url = format!("{}/{}/results", self.jobs_url, job.id());
        let mut request = ApiRequest::get(url).param("maxRecords", self.page_size.to_string());
        if let Some(token) = locator.as_param() {
            request = request.param("locator", token);
        }

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| e.during(job.entity(), Operation::Fetch))?;
        if !response.is_success() {
            return Err(SfTapError::Request {
                entity: job.entity().to_string(),
                operation: Operation::Fetch,
                status: response.status,
                body: response.body,
            });
        }

        let header = response.header(LOCATOR_HEADER);
        if header.map(str::trim).unwrap_or("").is_empty() {
            warn!(
                entity = %job.entity(),
                job_id = %job.id(),
                "Result page carried no locator header, treating as last page"
            );
        }
        let next = Locator::from_header(header);

        Ok(ResultPage {
            payload: response.body,
            next,
        })
    }
}
