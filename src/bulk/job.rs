use serde_json::Value;
use std::fmt;

/// Where a job is in its lifecycle, as tracked on our side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Submitted,
    Polling,
    Complete,
    Failed,
}

/// Job state as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    UploadComplete,
    InProgress,
    JobComplete,
    Failed,
    Aborted,
    Other(String),
}

impl JobState {
    pub fn parse(s: &str) -> Self {
        match s {
            "UploadComplete" => JobState::UploadComplete,
            "InProgress" => JobState::InProgress,
            "JobComplete" => JobState::JobComplete,
            "Failed" => JobState::Failed,
            "Aborted" => JobState::Aborted,
            other => JobState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobState::UploadComplete => "UploadComplete",
            JobState::InProgress => "InProgress",
            JobState::JobComplete => "JobComplete",
            JobState::Failed => "Failed",
            JobState::Aborted => "Aborted",
            JobState::Other(s) => s,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobState::JobComplete)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobState::Failed | JobState::Aborted)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct JobStatus {
    pub state: JobState,
    pub records_processed: Option<u64>,
    /// Status response body exactly as the server sent it.
    pub raw: String,
}

impl JobStatus {
    pub fn from_json(value: &Value, raw: impl Into<String>) -> Option<Self> {
        let state = value.get("state")?.as_str()?;
        Some(Self {
            state: JobState::parse(state),
            records_processed: value.get("numberRecordsProcessed").and_then(Value::as_u64),
            raw: raw.into(),
        })
    }
}

/// One submitted query job. Drives exactly one result retrieval.
#[derive(Debug)]
pub struct JobHandle {
    id: String,
    entity: String,
    query: String,
    phase: JobPhase,
}

impl JobHandle {
    pub fn new(id: impl Into<String>, entity: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity: entity.into(),
            query: query.into(),
            phase: JobPhase::Submitted,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: JobPhase) {
        self.phase = phase;
    }
}
