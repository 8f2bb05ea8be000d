use std::env;

use tabletx_core::store::MAX_BATCH_GET_KEYS;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Client and store configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// AWS region (default: "us-east-1")
    pub region: String,
    /// Custom store endpoint, e.g. DynamoDB Local (default: none)
    pub endpoint_url: Option<String>,
    /// Keys per batch read, at most 100 (default: 100)
    pub batch_get_chunk_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AWS_REGION` - AWS region (default: "us-east-1")
    /// - `AWS_ENDPOINT_URL` - Custom endpoint URL (default: none)
    /// - `TABLETX_BATCH_GET_CHUNK_SIZE` - Keys per batch read (default: 100)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            region: lookup("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint_url: lookup("AWS_ENDPOINT_URL").filter(|url| !url.is_empty()),
            batch_get_chunk_size: lookup("TABLETX_BATCH_GET_CHUNK_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_BATCH_GET_KEYS)
                .clamp(1, MAX_BATCH_GET_KEYS),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
