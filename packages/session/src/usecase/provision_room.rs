//! UseCase: channel provisioning

use std::sync::Arc;

use kizuna_shared::api::CreateRoomRequest;

use crate::domain::{
    BackendError, BookingSessionId, ChannelDescriptor, ChannelName, SessionBackend, SessionError,
};

/// Asks the backend to create or register a named channel.
///
/// Holds no state; a failure is final for the current join attempt and the
/// caller decides whether to try again.
pub struct RoomProvisioner {
    backend: Arc<dyn SessionBackend>,
}

impl RoomProvisioner {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    /// Provision `channel_name`.
    ///
    /// # Returns
    ///
    /// * `Ok(ChannelDescriptor)` - channel name and provider app id
    /// * `Err(SessionError::ProvisioningFailed)` - backend unreachable, refused
    ///   the request, or returned a descriptor without an app id
    pub async fn provision(
        &self,
        channel_name: &ChannelName,
        is_group: bool,
        booking_session_id: Option<&BookingSessionId>,
    ) -> Result<ChannelDescriptor, SessionError> {
        let request = CreateRoomRequest {
            channel_name: channel_name.as_str().to_string(),
            is_group,
            booking_session_id: booking_session_id.map(|id| id.as_str().to_string()),
        };

        let response = self
            .backend
            .create_room(request)
            .await
            .map_err(SessionError::ProvisioningFailed)?;

        let provider_app_id = response
            .app_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::ProvisioningFailed(BackendError::Incomplete(
                "app_id",
            )))?;

        let channel_name = match response.channel_name {
            Some(name) => ChannelName::new(name).map_err(|e| {
                SessionError::ProvisioningFailed(BackendError::InvalidResponse(e.to_string()))
            })?,
            None => channel_name.clone(),
        };

        tracing::debug!(
            channel = %channel_name,
            is_group,
            "Channel provisioned"
        );

        Ok(ChannelDescriptor {
            channel_name,
            provider_app_id,
        })
    }
}
