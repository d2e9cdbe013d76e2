//! Error types of the session domain.

use thiserror::Error;

use super::{
    state::{ConnectionState, JoinAttempt},
    value_object::MediaKind,
};

/// Value object validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("channel name must not be empty")]
    ChannelNameEmpty,

    #[error("channel name is {0} bytes long (max 64)")]
    ChannelNameTooLong(usize),

    #[error("channel name contains invalid character {0:?}")]
    ChannelNameInvalidChar(char),

    #[error("booking session id must not be empty")]
    BookingSessionIdEmpty,
}

/// Coarse classification of a failure, used to pick a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Bad app id, bad credentials, invalid session link: retrying will not help
    Configuration,
    /// Network or backend hiccup: worth trying again
    Transient,
    /// The user denied camera or microphone access
    Permission,
    /// No capture device, or the device failed
    Device,
    /// Another connection attempt is already running
    Conflict,
    /// The attempt was abandoned by the caller
    Cancelled,
}

/// Errors from the trusted backend (`createRoom` / `createToken`)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend could not be reached (connect failure, timeout)
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with a non-success status
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be understood
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    /// The response was well-formed but missing a required field
    #[error("incomplete backend response: missing {0}")]
    Incomplete(&'static str),
}

impl BackendError {
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Unreachable(_) => FailureCategory::Transient,
            Self::Status { status, .. } if *status >= 500 || matches!(status, 408 | 429) => {
                FailureCategory::Transient
            }
            Self::Status { .. } | Self::InvalidResponse(_) | Self::Incomplete(_) => {
                FailureCategory::Configuration
            }
        }
    }
}

/// Errors reported by the realtime provider.
///
/// The set is enumerated so that the anonymous join retry can be decided by
/// matching on variants rather than on error text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider rejected the token")]
    InvalidToken,

    #[error("provider token expired")]
    TokenExpired,

    #[error("provider does not know the app id")]
    InvalidAppId,

    #[error("provider rejected the channel name")]
    InvalidChannelName,

    #[error("participant id already in use in this channel")]
    UidConflict,

    #[error("channel is full")]
    CapacityExceeded,

    #[error("provider network error: {0}")]
    Network(String),

    #[error("provider connection is closed")]
    Closed,

    #[error("provider error {code}: {message}")]
    Other { code: u16, message: String },
}

impl ProviderError {
    /// Whether a join rejected with this error may be retried once without a token
    pub fn qualifies_for_anonymous_retry(&self) -> bool {
        matches!(self, Self::InvalidToken | Self::TokenExpired)
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Network(_) | Self::Closed | Self::CapacityExceeded => FailureCategory::Transient,
            Self::Other { code, .. } if *code >= 500 => FailureCategory::Transient,
            Self::InvalidToken
            | Self::TokenExpired
            | Self::InvalidAppId
            | Self::InvalidChannelName
            | Self::UidConflict
            | Self::Other { .. } => FailureCategory::Configuration,
        }
    }
}

/// Local capture device errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("permission to use the {0} was denied")]
    PermissionDenied(MediaKind),

    #[error("no {0} capture device is available")]
    DeviceUnavailable(MediaKind),

    #[error("{kind} capture device failed: {message}")]
    DeviceFailure { kind: MediaKind, message: String },
}

impl MediaError {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::PermissionDenied(kind) | Self::DeviceUnavailable(kind) => *kind,
            Self::DeviceFailure { kind, .. } => *kind,
        }
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            Self::PermissionDenied(_) => FailureCategory::Permission,
            Self::DeviceUnavailable(_) | Self::DeviceFailure { .. } => FailureCategory::Device,
        }
    }
}

/// One step of connection teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    Unpublish,
    ReleaseMedia,
    LeaveChannel,
    ClearParticipants,
}

/// A teardown step that failed; later steps still ran
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{step:?} failed: {message}")]
pub struct TeardownFailure {
    pub step: TeardownStep,
    pub message: String,
}

/// Errors surfaced by the connection manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("channel provisioning failed: {0}")]
    ProvisioningFailed(#[source] BackendError),

    #[error("token issuance failed: {0}")]
    TokenIssuanceFailed(#[source] BackendError),

    #[error("join rejected ({attempt}): {source}")]
    JoinRejected {
        attempt: JoinAttempt,
        #[source]
        source: ProviderError,
    },

    #[error("local media unavailable: {0}")]
    MediaAcquisitionFailed(#[from] MediaError),

    #[error("teardown completed with {} failed step(s)", .0.len())]
    TeardownPartialFailure(Vec<TeardownFailure>),

    #[error("a connection is already {0}")]
    AlreadyActive(ConnectionState),

    #[error("join was cancelled before it completed")]
    Cancelled,
}

impl SessionError {
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::ProvisioningFailed(e) | Self::TokenIssuanceFailed(e) => e.category(),
            Self::JoinRejected { source, .. } => source.category(),
            Self::MediaAcquisitionFailed(e) => e.category(),
            Self::TeardownPartialFailure(_) => FailureCategory::Device,
            Self::AlreadyActive(_) => FailureCategory::Conflict,
            Self::Cancelled => FailureCategory::Cancelled,
        }
    }

    /// Whether retrying the same request automatically makes sense
    pub fn is_retryable(&self) -> bool {
        self.category() == FailureCategory::Transient
    }
}
