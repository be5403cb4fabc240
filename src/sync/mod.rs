mod runner;
mod scope;

pub use runner::{SyncFailure, SyncReport, SyncRunner};
pub use scope::SyncScope;
