mod credentials;
mod settings;

pub use credentials::{CredentialProvider, StaticCredentials};
pub use settings::{AuthConfig, BulkSettings, TapConfig};
