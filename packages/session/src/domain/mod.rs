//! Domain layer of the session core.
//!
//! Value objects, entities, the participant registry and the traits of the
//! external capabilities the connection manager depends on. Implementations
//! of those traits live in the infrastructure layer.

pub mod backend;
pub mod entity;
pub mod error;
pub mod media;
pub mod provider;
pub mod registry;
pub mod state;
pub mod value_object;

pub use backend::SessionBackend;
pub use entity::{
    AccessCredential, ChannelDescriptor, CompletionDirective, LocalMediaStatus, RemoteParticipant,
    SessionLinkage,
};
pub use error::{
    BackendError, FailureCategory, MediaError, ProviderError, SessionError, TeardownFailure,
    TeardownStep, ValueObjectError,
};
pub use media::{CaptureTrack, MediaDevices, VideoSurface};
pub use provider::{MediaProvider, ProviderConnection, ProviderSession};
pub use registry::{ProviderEvent, RegistryChange, RemoteParticipantRegistry};
pub use state::{ConnectionState, JoinAttempt};
pub use value_object::{
    BookingSessionId, ChannelName, MediaKind, ParticipantId, Role, Timestamp, VideoSinkHandle,
};
