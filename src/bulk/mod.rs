mod controller;
mod fetcher;
mod job;
mod locator;

pub use controller::BulkJobController;
pub use fetcher::{ResultPage, ResultPageFetcher};
pub use job::{JobHandle, JobPhase, JobState, JobStatus};
pub use locator::{Locator, LOCATOR_HEADER};
