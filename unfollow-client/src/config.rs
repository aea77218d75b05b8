//! Client configuration

use std::time::Duration;

/// Default per-request deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default REST base URL
pub const DEFAULT_API_URL: &str = "https://api.twitter.com/1.1";

/// Client configuration for the remote graph API
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL (e.g., "https://api.twitter.com/1.1")
    pub api_url: String,

    /// OAuth 1.0a consumer key
    pub consumer_key: String,

    /// OAuth 1.0a consumer secret
    pub consumer_secret: String,

    /// OAuth 1.0a access token
    pub access_token: String,

    /// OAuth 1.0a access token secret
    pub access_token_secret: String,

    /// Deadline for a single request, including reading the body
    pub timeout: Duration,
}

impl ClientConfig {
    /// Create a new client configuration against the given base URL
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            access_token: String::new(),
            access_token_secret: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the consumer (application) credentials
    pub fn with_consumer(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.consumer_key = key.into();
        self.consumer_secret = secret.into();
        self
    }

    /// Set the access (user) credentials
    pub fn with_access_token(
        mut self,
        token: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.access_token = token.into();
        self.access_token_secret = secret.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a client from this configuration
    pub fn build(&self) -> crate::ClientResult<crate::TwitterClient> {
        crate::TwitterClient::new(self)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}
