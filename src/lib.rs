pub mod bulk;
pub mod catalog;
pub mod config;
pub mod decode;
pub mod error;
pub mod http;
pub mod output;
pub mod rest;
pub mod state;
pub mod stream;
pub mod sync;

pub use bulk::{
    BulkJobController, JobHandle, JobPhase, JobState, JobStatus, Locator, ResultPage,
    ResultPageFetcher, LOCATOR_HEADER,
};
pub use catalog::{Catalog, CatalogLoader, EntitySchema, FieldDef, FieldType, RawCatalog};
pub use config::{AuthConfig, BulkSettings, CredentialProvider, StaticCredentials, TapConfig};
pub use decode::{coerce_numeric, coerce_value, decode_rows, shape_record, Record, Row};
pub use error::{Operation, Result, SfTapError};
pub use http::{ApiRequest, ApiResponse, HttpTransport, Method, MockTransport, ReqwestTransport};
pub use output::{CollectingSink, JsonLinesWriter, Message, MessageSink};
pub use rest::RestQueryClient;
pub use state::{Bookmark, CheckpointStore, TapState};
pub use stream::{
    advance_checkpoint, compare_watermarks, EntityStream, QuerySpec, RowSource, StreamSyncStats,
    WatermarkPredicate, WatermarkTracker,
};
pub use sync::{SyncFailure, SyncReport, SyncRunner, SyncScope};
