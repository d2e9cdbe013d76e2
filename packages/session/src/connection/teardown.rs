//! Best-effort teardown.
//!
//! Each step releases one resource and records its own failure; a failed step
//! never keeps the later ones from running. The steps are the variants of
//! [`TeardownStep`], in order. Stopping the event pump belongs to
//! `LeaveChannel`: it happens right before the provider is left and cannot
//! fail on its own.

use std::{fmt, sync::Mutex};

use tokio::task::JoinHandle;

use crate::{
    domain::{
        CompletionDirective, ProviderConnection, RemoteParticipantRegistry, SessionError,
        TeardownFailure, TeardownStep,
    },
    usecase::LocalMediaController,
};

/// Failures recorded while tearing a connection down
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    fn record<E: fmt::Display>(&mut self, step: TeardownStep, result: Result<(), E>) {
        if let Err(e) = result {
            tracing::warn!("Teardown step {:?} failed: {}", step, e);
            self.failures.push(TeardownFailure {
                step,
                message: e.to_string(),
            });
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }

    pub fn into_result(self) -> Result<(), SessionError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(SessionError::TeardownPartialFailure(self.failures))
        }
    }
}

/// Result of `ConnectionManager::leave`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub directive: CompletionDirective,
    pub teardown: TeardownReport,
}

impl Default for LeaveOutcome {
    fn default() -> Self {
        Self {
            directive: CompletionDirective::None,
            teardown: TeardownReport::default(),
        }
    }
}

/// Everything one connection attempt holds.
///
/// Released in order by [`HeldResources::release`]; if dropped instead, the
/// event pump is aborted and the media controller releases its devices.
#[derive(Default)]
pub(crate) struct HeldResources {
    pub connection: Option<Box<dyn ProviderConnection>>,
    pub published: bool,
    pub pump: Option<JoinHandle<()>>,
    pub media: Option<LocalMediaController>,
}

impl HeldResources {
    /// Unpublish, release local media, leave the provider, clear the registry
    pub async fn release(mut self, registry: &Mutex<RemoteParticipantRegistry>) -> TeardownReport {
        let mut report = TeardownReport::default();

        if self.published
            && let Some(connection) = self.connection.as_mut()
        {
            report.record(TeardownStep::Unpublish, connection.unpublish().await);
        }

        if let Some(mut media) = self.media.take()
            && let Err(errors) = media.release()
        {
            for e in errors {
                report.record(TeardownStep::ReleaseMedia, Err(e));
            }
        }

        // LeaveChannel: stop applying events before the stream is closed under us.
        if let Some(pump) = self.pump.take() {
            pump.abort();
            let _ = pump.await;
        }
        if let Some(mut connection) = self.connection.take() {
            report.record(TeardownStep::LeaveChannel, connection.leave().await);
        }

        match registry.lock() {
            Ok(mut registry) => registry.clear(),
            Err(poisoned) => {
                report.record(
                    TeardownStep::ClearParticipants,
                    Err("participant registry lock was poisoned"),
                );
                poisoned.into_inner().clear();
            }
        }

        report
    }
}

impl Drop for HeldResources {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
