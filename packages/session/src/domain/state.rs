//! Connection state machine states.
//!
//! ```text
//! Idle ─▶ Provisioning ─▶ CredentialAcquired ─▶ Joining(WithToken) ─▶ Connected ─▶ Leaving ─▶ Ended
//!              │                                   │      │
//!              │                                   │      └─▶ Joining(WithoutToken) ─▶ Connected
//!              ▼                                   ▼                   │
//!            Failed ◀──────────────────────────────┴───────────────────┘
//! ```
//!
//! `Leaving` can also be entered from `Provisioning`, `CredentialAcquired` and
//! `Joining` when the caller leaves mid-join; the in-flight attempt then tears
//! down as soon as its current call resolves.

use std::fmt;

use super::error::ProviderError;

/// Which credential a provider join is attempted with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAttempt {
    WithToken,
    WithoutToken,
}

impl JoinAttempt {
    /// The attempt to make after `error`, if any.
    ///
    /// Only a token-authenticated attempt rejected for a token reason gets a
    /// follow-up, so at most one retry can ever happen.
    pub fn next_after(self, error: &ProviderError) -> Option<JoinAttempt> {
        match self {
            Self::WithToken if error.qualifies_for_anonymous_retry() => Some(Self::WithoutToken),
            Self::WithToken | Self::WithoutToken => None,
        }
    }
}

impl fmt::Display for JoinAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WithToken => f.write_str("with token"),
            Self::WithoutToken => f.write_str("without token"),
        }
    }
}

/// State of one connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Provisioning,
    CredentialAcquired,
    Joining(JoinAttempt),
    Connected,
    Leaving,
    Ended,
    Failed,
}

impl ConnectionState {
    /// Whether a new `join()` may start from this state
    pub fn accepts_join(&self) -> bool {
        matches!(self, Self::Idle | Self::Ended | Self::Failed)
    }

    /// Whether a join attempt is in flight
    pub fn is_joining(&self) -> bool {
        matches!(
            self,
            Self::Provisioning | Self::CredentialAcquired | Self::Joining(_)
        )
    }

    /// Whether the state is final for the current attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Provisioning => f.write_str("provisioning"),
            Self::CredentialAcquired => f.write_str("credential acquired"),
            Self::Joining(attempt) => write!(f, "joining ({})", attempt),
            Self::Connected => f.write_str("connected"),
            Self::Leaving => f.write_str("leaving"),
            Self::Ended => f.write_str("ended"),
            Self::Failed => f.write_str("failed"),
        }
    }
}
