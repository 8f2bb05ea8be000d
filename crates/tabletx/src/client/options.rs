use tabletx_core::store::MAX_BATCH_GET_KEYS;

use crate::config::Config;

/// Tuning knobs for a [`Client`](super::Client).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Keys sent per batch read (1 to 100).
    pub batch_get_chunk_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            batch_get_chunk_size: MAX_BATCH_GET_KEYS,
        }
    }
}

impl From<&Config> for ClientOptions {
    fn from(config: &Config) -> Self {
        Self {
            batch_get_chunk_size: config.batch_get_chunk_size.clamp(1, MAX_BATCH_GET_KEYS),
        }
    }
}
