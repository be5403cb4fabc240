use std::fmt;
use thiserror::Error;

/// Remote step that was running when a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Submit,
    Poll,
    Fetch,
    Query,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Submit => "submit",
            Operation::Poll => "poll",
            Operation::Fetch => "fetch",
            Operation::Query => "query",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum SfTapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Entity not found in catalog: {0}")]
    EntityNotFound(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("[{entity}] {operation} request failed with HTTP {status}: {body}")]
    Request {
        entity: String,
        operation: Operation,
        status: u16,
        body: String,
    },

    #[error("[{entity}] poll: bulk job {job_id} failed: {payload}")]
    JobFailed {
        entity: String,
        job_id: String,
        payload: String,
    },

    #[error("[{entity}] poll: bulk job {job_id} did not complete within {waited_secs}s")]
    JobTimeout {
        entity: String,
        job_id: String,
        waited_secs: u64,
    },

    #[error("[{entity}] fetch: results requested for bulk job {job_id} before it completed")]
    JobNotComplete { entity: String, job_id: String },

    #[error("[{entity}] unexpected {operation} response: {message}")]
    UnexpectedResponse {
        entity: String,
        operation: Operation,
        message: String,
    },

    #[error("[{entity}] fetch: failed to decode result page: {message}")]
    Decode { entity: String, message: String },

    /// A remote step whose request never got a response back.
    #[error("[{entity}] {operation} request did not complete: {source}")]
    Transport {
        entity: String,
        operation: Operation,
        #[source]
        source: Box<SfTapError>,
    },
}

impl SfTapError {
    /// Entity the failure belongs to, when the error came from a remote step.
    pub fn entity(&self) -> Option<&str> {
        match self {
            SfTapError::Request { entity, .. }
            | SfTapError::JobFailed { entity, .. }
            | SfTapError::JobTimeout { entity, .. }
            | SfTapError::JobNotComplete { entity, .. }
            | SfTapError::UnexpectedResponse { entity, .. }
            | SfTapError::Decode { entity, .. }
            | SfTapError::Transport { entity, .. } => Some(entity),
            _ => None,
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            SfTapError::Request { operation, .. }
            | SfTapError::UnexpectedResponse { operation, .. }
            | SfTapError::Transport { operation, .. } => Some(*operation),
            SfTapError::JobFailed { .. } | SfTapError::JobTimeout { .. } => Some(Operation::Poll),
            SfTapError::JobNotComplete { .. } | SfTapError::Decode { .. } => {
                Some(Operation::Fetch)
            }
            _ => None,
        }
    }

    /// Tags a failure raised beneath a remote step with the entity and step.
    /// Errors that already name their step pass through unchanged.
    pub fn during(self, entity: &str, operation: Operation) -> Self {
        if self.operation().is_some() {
            return self;
        }
        SfTapError::Transport {
            entity: entity.to_string(),
            operation,
            source: Box::new(self),
        }
    }

    /// True when the failure happened below HTTP, before any status came back.
    pub fn is_transport(&self) -> bool {
        match self {
            SfTapError::Http(_) => true,
            SfTapError::Transport { source, .. } => source.is_transport(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SfTapError>;
