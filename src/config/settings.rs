use crate::error::{Result, SfTapError};
use crate::stream::parse_instant;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_API_VERSION: &str = "v60.0";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 20;
const DEFAULT_PAGE_SIZE: usize = 50_000;
const DEFAULT_MAX_WAIT_SECS: u64 = 2 * 60 * 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_RETRIES: u32 = 2;

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Tuning for bulk query jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkSettings {
    pub poll_interval_secs: u64,
    pub page_size: usize,
    /// Ceiling on how long a job may stay unfinished. `None` polls forever.
    pub max_wait_secs: Option<u64>,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            max_wait_secs: Some(DEFAULT_MAX_WAIT_SECS),
        }
    }
}

impl BulkSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub instance_url: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub bulk_load: bool,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub bulk: BulkSettings,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub catalog: Option<PathBuf>,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            domain: None,
            instance_url: None,
            api_version: default_api_version(),
            auth: AuthConfig::default(),
            start_date: None,
            end_date: None,
            bulk_load: false,
            user_agent: None,
            bulk: BulkSettings::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            entities: Vec::new(),
            catalog: None,
        }
    }
}

impl TapConfig {
    /// Reads YAML, or JSON when the file ends in `.json`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: TapConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.domain.is_none() && self.instance_url.is_none() {
            return Err(SfTapError::Config(
                "Either 'domain' or 'instance_url' must be set".to_string(),
            ));
        }

        let start = match &self.start_date {
            Some(s) => Some(parse_instant(s).ok_or_else(|| {
                SfTapError::Config(format!("Invalid start_date '{}'", s))
            })?),
            None => None,
        };
        let end = match &self.end_date {
            Some(s) => Some(
                parse_instant(s)
                    .ok_or_else(|| SfTapError::Config(format!("Invalid end_date '{}'", s)))?,
            ),
            None => None,
        };
        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                return Err(SfTapError::Config(
                    "end_date must be after start_date".to_string(),
                ));
            }
        }

        if self.bulk.page_size == 0 {
            return Err(SfTapError::Config(
                "bulk.page_size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Origin of the org, e.g. `https://acme.my.salesforce.com`.
    pub fn instance_url(&self) -> Result<String> {
        if let Some(url) = &self.instance_url {
            return Ok(url.trim_end_matches('/').to_string());
        }
        self.domain
            .as_ref()
            .map(|d| format!("https://{}.salesforce.com", d))
            .ok_or_else(|| SfTapError::Config("No domain or instance_url configured".to_string()))
    }

    pub fn api_base(&self) -> Result<String> {
        Ok(format!(
            "{}/services/data/{}",
            self.instance_url()?,
            self.api_version
        ))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config() -> TapConfig {
        TapConfig {
            domain: Some("acme".to_string()),
            ..TapConfig::default()
        }
    }

    #[test]
    fn test_api_base_from_domain() {
        assert_eq!(
            config().api_base().unwrap(),
            "https://acme.salesforce.com/services/data/v60.0"
        );
    }

    #[test]
    fn test_instance_url_takes_precedence() {
        let mut c = config();
        c.instance_url = Some("https://acme.my.salesforce.com/".to_string());
        assert_eq!(c.instance_url().unwrap(), "https://acme.my.salesforce.com");
    }

    #[test]
    fn test_validate_requires_domain() {
        let err = TapConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("domain"));
    }

    #[test]
    fn test_validate_rejects_reversed_dates() {
        let mut c = config();
        c.start_date = Some("2023-06-01T00:00:00Z".to_string());
        c.end_date = Some("2023-01-01T00:00:00Z".to_string());
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_garbage_start_date() {
        let mut c = config();
        c.start_date = Some("last tuesday".to_string());
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_load_yaml_applies_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "domain: acme\nstart_date: \"2023-01-01T00:00:00Z\"\nbulk_load: true\nbulk:\n  page_size: 1000"
        )
        .unwrap();

        let c = TapConfig::load(file.path()).unwrap();
        assert!(c.bulk_load);
        assert_eq!(c.bulk.page_size, 1000);
        assert_eq!(c.bulk.poll_interval_secs, 20);
        assert_eq!(c.bulk.max_wait_secs, Some(7200));
        assert_eq!(c.api_version, "v60.0");
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"domain": "acme", "auth": {{"access_token": "tok"}}, "entities": ["Account"]}}"#
        )
        .unwrap();

        let c = TapConfig::load(file.path()).unwrap();
        assert_eq!(c.auth.access_token.as_deref(), Some("tok"));
        assert_eq!(c.entities, vec!["Account".to_string()]);
        assert!(!c.bulk_load);
    }
}
