use super::transport::{ApiRequest, ApiResponse, HttpTransport, Method};
use crate::config::{CredentialProvider, TapConfig};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// reqwest-backed transport that stamps every request with the current bearer token.
pub struct ReqwestTransport {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    max_retries: u32,
    retry_delay: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &TapConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout());
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }

        Ok(Self::with_client(
            builder.build()?,
            credentials,
            config.max_retries,
        ))
    }

    pub fn with_client(
        client: reqwest::Client,
        credentials: Arc<dyn CredentialProvider>,
        max_retries: u32,
    ) -> Self {
        Self {
            client,
            credentials,
            max_retries,
            retry_delay: RETRY_BASE_DELAY,
        }
    }

    /// Base of the linear backoff; attempt `n` waits `n * delay`.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn send_once(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, Attempt> {
        let token = self
            .credentials
            .access_token()
            .await
            .map_err(Attempt::Fatal)?;

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        builder = builder.bearer_auth(token);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(Attempt::Network)?;
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(Attempt::Network)?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

enum Attempt {
    Network(reqwest::Error),
    Fatal(crate::error::SfTapError),
}

/// A POST that timed out may already have created a job, so only
/// connection failures are replayed for it.
fn is_retryable(method: Method, err: &reqwest::Error) -> bool {
    match method {
        Method::Get => err.is_connect() || err.is_timeout(),
        Method::Post => err.is_connect(),
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(&request).await {
                Ok(response) => return Ok(response),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Network(e)) => {
                    if attempt >= self.max_retries || !is_retryable(request.method, &e) {
                        return Err(e.into());
                    }
                    attempt += 1;
                    warn!(
                        url = %request.url,
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Transient network error, retrying"
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
            }
        }
    }
}
