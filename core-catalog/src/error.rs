use thiserror::Error;

/// Errors from the local persistence layer.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Persistence error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Corrupt persisted value under key '{key}': {source}")]
    CorruptValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
