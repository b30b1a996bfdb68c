use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to serialize cache payload for `{key}`: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    pub fn serialize(key: &str, source: serde_json::Error) -> Self {
        Self::Serialize {
            key: key.to_string(),
            source,
        }
    }
}
