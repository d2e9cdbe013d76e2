//! UseCase: local microphone/camera ownership

use std::sync::Arc;

use crate::domain::{CaptureTrack, LocalMediaStatus, MediaDevices, MediaError, MediaKind};

/// Result of a media toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The track's enabled flag now has the requested value
    Applied,
    /// Nothing to toggle (no track, or not connected)
    NoEffect,
}

/// The local capture tracks of one connection
pub struct LocalMediaState {
    audio_track: Option<Box<dyn CaptureTrack>>,
    video_track: Option<Box<dyn CaptureTrack>>,
    audio_enabled: bool,
    video_enabled: bool,
}

impl LocalMediaState {
    fn status(&self) -> LocalMediaStatus {
        LocalMediaStatus {
            audio_available: self.audio_track.is_some(),
            video_available: self.video_track.is_some(),
            audio_enabled: self.audio_enabled,
            video_enabled: self.video_enabled,
        }
    }
}

/// Exclusive owner of the local capture devices for one connection.
///
/// Dropping the controller releases whatever it still holds, so every exit
/// path (including a dropped join future) closes the devices.
pub struct LocalMediaController {
    devices: Arc<dyn MediaDevices>,
    state: Option<LocalMediaState>,
}

impl LocalMediaController {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            state: None,
        }
    }

    /// Open microphone and camera.
    ///
    /// Both devices are opened or neither is: if the camera fails after the
    /// microphone opened, the microphone is closed again before the error is
    /// returned. Calling `acquire` while already holding tracks returns the
    /// current status without reopening anything.
    pub async fn acquire(&mut self) -> Result<LocalMediaStatus, MediaError> {
        if let Some(state) = &self.state {
            return Ok(state.status());
        }

        let mut audio_track = self.devices.open_microphone().await?;
        let video_track = match self.devices.open_camera().await {
            Ok(track) => track,
            Err(e) => {
                if let Err(stop_err) = audio_track.stop() {
                    tracing::warn!("Failed to close microphone after camera error: {}", stop_err);
                }
                return Err(e);
            }
        };

        let state = LocalMediaState {
            audio_enabled: audio_track.is_enabled(),
            video_enabled: video_track.is_enabled(),
            audio_track: Some(audio_track),
            video_track: Some(video_track),
        };
        let status = state.status();
        self.state = Some(state);
        tracing::info!("Local microphone and camera acquired");
        Ok(status)
    }

    pub fn set_audio_enabled(&mut self, enabled: bool) -> ToggleOutcome {
        self.set_enabled(MediaKind::Audio, enabled)
    }

    pub fn set_video_enabled(&mut self, enabled: bool) -> ToggleOutcome {
        self.set_enabled(MediaKind::Video, enabled)
    }

    // Only the requested track is touched; the device stays open.
    fn set_enabled(&mut self, kind: MediaKind, enabled: bool) -> ToggleOutcome {
        let Some(state) = self.state.as_mut() else {
            return ToggleOutcome::NoEffect;
        };
        let (track, flag) = match kind {
            MediaKind::Audio => (state.audio_track.as_mut(), &mut state.audio_enabled),
            MediaKind::Video => (state.video_track.as_mut(), &mut state.video_enabled),
        };
        match track {
            Some(track) => {
                track.set_enabled(enabled);
                *flag = enabled;
                tracing::debug!("Local {} {}", kind, if enabled { "enabled" } else { "disabled" });
                ToggleOutcome::Applied
            }
            None => ToggleOutcome::NoEffect,
        }
    }

    /// Stop and release both tracks.
    ///
    /// Safe to call any number of times. Both tracks are always attempted;
    /// the errors of the ones that failed to stop are returned together.
    pub fn release(&mut self) -> Result<(), Vec<MediaError>> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };

        let mut errors = Vec::new();
        for mut track in [state.audio_track.take(), state.video_track.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = track.stop() {
                errors.push(e);
            }
        }

        tracing::info!("Local media released");
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub fn status(&self) -> LocalMediaStatus {
        self.state
            .as_ref()
            .map(LocalMediaState::status)
            .unwrap_or_default()
    }

    pub fn is_acquired(&self) -> bool {
        self.state.is_some()
    }

    /// Kinds of the tracks currently held, in publish order
    pub fn track_kinds(&self) -> Vec<MediaKind> {
        let Some(state) = &self.state else {
            return Vec::new();
        };
        let mut kinds = Vec::with_capacity(2);
        if state.audio_track.is_some() {
            kinds.push(MediaKind::Audio);
        }
        if state.video_track.is_some() {
            kinds.push(MediaKind::Video);
        }
        kinds
    }
}

impl Drop for LocalMediaController {
    fn drop(&mut self) {
        if let Err(errors) = self.release() {
            for e in errors {
                tracing::warn!("Failed to release local media on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::media::{DeviceAvailability, VirtualMediaDevices};

    fn controller(devices: &VirtualMediaDevices) -> LocalMediaController {
        LocalMediaController::new(Arc::new(devices.clone()))
    }

    #[tokio::test]
    async fn test_acquire_opens_both_devices() {
        // テスト項目: acquire でマイクとカメラの両方が開かれる
        // given (前提条件):
        let devices = VirtualMediaDevices::new();
        let mut media = controller(&devices);

        // when (操作):
        let status = media.acquire().await.unwrap();

        // then (期待する結果):
        assert!(status.audio_available && status.video_available);
        assert!(status.audio_enabled && status.video_enabled);
        assert!(devices.is_open(MediaKind::Audio));
        assert!(devices.is_open(MediaKind::Video));
        assert_eq!(media.track_kinds(), vec![MediaKind::Audio, MediaKind::Video]);
    }

    #[tokio::test]
    async fn test_toggles_are_independent() {
        // テスト項目: 映像を止めてから音声を止めると、それぞれが独立して一時停止する
        // given (前提条件):
        let devices = VirtualMediaDevices::new();
        let mut media = controller(&devices);
        media.acquire().await.unwrap();

        // when (操作):
        let video = media.set_video_enabled(false);

        // then (期待する結果): 音声は影響を受けない
        assert_eq!(video, ToggleOutcome::Applied);
        assert!(!devices.is_capturing(MediaKind::Video));
        assert!(devices.is_capturing(MediaKind::Audio));

        // when (操作):
        let audio = media.set_audio_enabled(false);

        // then (期待する結果): 両方とも一時停止し、デバイスは開いたまま
        assert_eq!(audio, ToggleOutcome::Applied);
        assert!(!devices.is_capturing(MediaKind::Audio));
        assert!(!devices.is_capturing(MediaKind::Video));
        assert!(devices.is_open(MediaKind::Audio));
        assert!(devices.is_open(MediaKind::Video));
        let status = media.status();
        assert!(!status.audio_enabled && !status.video_enabled);

        // when (操作): 音声だけ再開する
        media.set_audio_enabled(true);

        // then (期待する結果):
        assert!(devices.is_capturing(MediaKind::Audio));
        assert!(!devices.is_capturing(MediaKind::Video));
        assert_eq!(devices.open_count(MediaKind::Audio), 1);
    }

    #[tokio::test]
    async fn test_toggle_without_tracks_has_no_effect() {
        // テスト項目: トラックが無い状態での切り替えは NoEffect になる
        // given (前提条件):
        let devices = VirtualMediaDevices::new();
        let mut media = controller(&devices);

        // when (操作):
        let outcome = media.set_audio_enabled(false);

        // then (期待する結果):
        assert_eq!(outcome, ToggleOutcome::NoEffect);
    }

    #[tokio::test]
    async fn test_permission_denied_is_reported() {
        // テスト項目: 権限が拒否された場合は PermissionDenied が返る
        // given (前提条件):
        let devices = VirtualMediaDevices::new().with_camera(DeviceAvailability::PermissionDenied);
        let mut media = controller(&devices);

        // when (操作):
        let result = media.acquire().await;

        // then (期待する結果): 先に開いたマイクも閉じられている
        assert_eq!(result, Err(MediaError::PermissionDenied(MediaKind::Video)));
        assert!(!devices.is_open(MediaKind::Audio));
        assert!(!media.is_acquired());
    }

    #[tokio::test]
    async fn test_missing_camera_is_distinguished_from_permission() {
        // テスト項目: カメラが無い場合は DeviceUnavailable として区別される
        // given (前提条件):
        let devices = VirtualMediaDevices::new().with_camera(DeviceAvailability::Missing);
        let mut media = controller(&devices);

        // when (操作):
        let result = media.acquire().await;

        // then (期待する結果):
        assert_eq!(result, Err(MediaError::DeviceUnavailable(MediaKind::Video)));
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_allows_reacquire() {
        // テスト項目: release は何度呼んでも安全で、その後 acquire し直せる
        // given (前提条件):
        let devices = VirtualMediaDevices::new();
        let mut media = controller(&devices);
        media.acquire().await.unwrap();

        // when (操作):
        let first = media.release();
        let second = media.release();

        // then (期待する結果):
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert!(!devices.is_open(MediaKind::Audio));
        assert!(!devices.is_open(MediaKind::Video));

        // when (操作):
        let status = media.acquire().await.unwrap();

        // then (期待する結果):
        assert!(status.audio_available);
        assert!(devices.is_open(MediaKind::Video));
    }

    #[tokio::test]
    async fn test_release_attempts_both_tracks_when_one_fails() {
        // テスト項目: 片方の停止に失敗しても、もう片方は必ず解放される
        // given (前提条件):
        let devices = VirtualMediaDevices::new().with_failing_stop(MediaKind::Audio);
        let mut media = controller(&devices);
        media.acquire().await.unwrap();

        // when (操作):
        let result = media.release();

        // then (期待する結果):
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), MediaKind::Audio);
        assert!(!devices.is_open(MediaKind::Video));
        assert!(!media.is_acquired());
    }

    #[tokio::test]
    async fn test_drop_releases_devices() {
        // テスト項目: コントローラを破棄するとデバイスが解放される
        // given (前提条件):
        let devices = VirtualMediaDevices::new();
        let mut media = controller(&devices);
        media.acquire().await.unwrap();

        // when (操作):
        drop(media);

        // then (期待する結果):
        assert!(!devices.is_open(MediaKind::Audio));
        assert!(!devices.is_open(MediaKind::Video));
    }
}
