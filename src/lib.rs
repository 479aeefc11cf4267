//! Umbrella crate for the Sadaa client core.
//!
//! Host apps depend on this crate, implement the traits in
//! [`bridge_traits`], and hold one [`AppSession`] for the life of the
//! process.

pub use bridge_traits;
pub use core_catalog as catalog;
pub use core_runtime as runtime;
pub use core_service::{AppConfig, AppDependencies, AppSession, ServiceError};
