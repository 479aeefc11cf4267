//! Playback core: entitlement gating, the play queue, and the controller
//! that drives the host audio engine.

pub mod controller;
pub mod entitlement;
pub mod error;
pub mod queue;

pub use controller::{PlaybackSession, PlayerController, PreviewWindow, SessionState};
pub use entitlement::{DenyReason, EntitlementContext, EntitlementGate, PlayDecision};
pub use error::{PlaybackError, Result};
pub use queue::{Direction, PlaybackQueue};
