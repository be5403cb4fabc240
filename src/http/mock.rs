use super::transport::{ApiRequest, ApiResponse, HttpTransport};
use crate::error::{Result, SfTapError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays scripted responses (or failures) in order and records every
/// request it receives.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<ApiResponse>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: impl IntoIterator<Item = ApiResponse>) -> Self {
        let mock = Self::new();
        for response in responses {
            mock.push(response);
        }
        mock
    }

    pub fn push(&self, response: ApiResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(response));
        }
    }

    /// Scripts a request that fails before any response arrives.
    pub fn push_failure(&self, error: SfTapError) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(error));
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Requests whose URL ends with `suffix`.
    pub fn requests_ending_with(&self, suffix: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.ends_with(suffix))
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let description = format!("{:?} {}", request.method, request.url);
        if let Ok(mut log) = self.requests.lock() {
            log.push(request);
        }

        self.responses
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| {
                Err(SfTapError::Config(format!(
                    "MockTransport has no response for {}",
                    description
                )))
            })
    }
}
