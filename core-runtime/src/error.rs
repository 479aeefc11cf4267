use thiserror::Error;

/// Errors produced while bootstrapping or running the core runtime.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A required bridge capability was not provided by the host.
    #[error("Required capability missing: {capability}. {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
