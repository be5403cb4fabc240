use crate::error::{Result, SfTapError};
use async_trait::async_trait;

/// Source of the bearer token. Implementations may refresh in the background;
/// callers ask for the token again before every request.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(SfTapError::Auth("Access token is empty".to_string()));
        }
        Ok(Self { token })
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
