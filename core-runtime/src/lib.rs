//! Runtime infrastructure shared by all core crates: the typed event bus and
//! the logging bootstrap.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{CoreError, Result};
pub use events::{CoreEvent, EventBus};
