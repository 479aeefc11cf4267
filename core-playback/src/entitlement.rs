//! Entitlement gate: may this user play this track, and how?
//!
//! A pure decision function over four inputs — download presence,
//! connectivity, subscription, and the track's premium flag. It performs no
//! I/O and mutates nothing; callers gather the inputs and act on the
//! decision.

use core_catalog::{PreviewRange, Track};
use std::fmt;

/// Inputs the gate decides over. Callers snapshot these before asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementContext {
    /// A durable download record exists for the track.
    pub downloaded: bool,
    /// Device is currently online.
    pub online: bool,
    /// User holds an active subscription.
    pub subscribed: bool,
}

/// Why full playback was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Track is neither downloaded nor reachable.
    ConnectivityRequired,
    /// Premium track and the user is not subscribed.
    SubscriptionRequired,
}

impl DenyReason {
    /// User-facing reason string.
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::ConnectivityRequired => "connectivity required",
            DenyReason::SubscriptionRequired => "subscription required",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of an entitlement check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayDecision {
    /// Full playback permitted.
    Allowed,
    /// Full playback denied, but the preview window may be played.
    PreviewOnly(PreviewRange),
    /// Neither full playback nor preview is possible.
    Denied(DenyReason),
}

impl PlayDecision {
    /// Whether full (non-preview) playback is permitted.
    pub fn allows_full_play(&self) -> bool {
        matches!(self, PlayDecision::Allowed)
    }

    /// Whether preview playback is permitted.
    pub fn allows_preview(&self) -> bool {
        matches!(self, PlayDecision::Allowed | PlayDecision::PreviewOnly(_))
    }
}

/// The entitlement decision table, evaluated in order:
///
/// 1. Downloaded media is always playable — download only happens for tracks
///    the user could legitimately access at download time.
/// 2. Otherwise, offline means no playback at all.
/// 3. Otherwise, premium without subscription limits the user to the preview
///    window.
/// 4. Otherwise full playback is allowed.
pub struct EntitlementGate;

impl EntitlementGate {
    pub fn can_play(track: &Track, ctx: EntitlementContext) -> PlayDecision {
        if ctx.downloaded {
            return PlayDecision::Allowed;
        }
        if !ctx.online {
            return PlayDecision::Denied(DenyReason::ConnectivityRequired);
        }
        if track.is_premium && !ctx.subscribed {
            return PlayDecision::PreviewOnly(track.preview_window());
        }
        PlayDecision::Allowed
    }
}
