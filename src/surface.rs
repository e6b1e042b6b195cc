//! Playback element seam.
//!
//! A [`Surface`] owns the media handles it displays: binding a new video
//! drops the previous one, resetting the video drops it outright.

use crate::media::MediaHandle;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("video could not be decoded: {0}")]
    Bind(String),

    #[error("play() was rejected: {0}")]
    Play(String),

    #[cfg_attr(not(feature = "window"), allow(dead_code))]
    #[error("display is gone")]
    Closed,
}

#[async_trait]
pub trait Surface: Send {
    /// Bind a video and resolve once its first frame is decoded.
    async fn bind_video(&mut self, media: MediaHandle) -> Result<(), PlaybackError>;

    async fn play_video(&mut self) -> Result<(), PlaybackError>;

    fn pause_video(&mut self);

    /// Stop the video and clear its source entirely.
    fn reset_video(&mut self);

    fn show_placeholder(&mut self, media: MediaHandle);

    fn hide_placeholder(&mut self);
}

/// Surface for kiosks without a display server: keeps the handles alive for
/// as long as a real element would and logs what would be shown.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    video: Option<MediaHandle>,
    placeholder: Option<MediaHandle>,
    playing: bool,
}

#[async_trait]
impl Surface for HeadlessSurface {
    async fn bind_video(&mut self, media: MediaHandle) -> Result<(), PlaybackError> {
        self.playing = false;
        if media.size() == 0 {
            return Err(PlaybackError::Bind("empty payload".into()));
        }
        tracing::info!("Video bound: {:?} ({} bytes)", media.path(), media.size());
        self.video = Some(media);
        Ok(())
    }

    async fn play_video(&mut self) -> Result<(), PlaybackError> {
        if self.video.is_none() {
            return Err(PlaybackError::Play("no source".into()));
        }
        self.playing = true;
        tracing::info!("Video playing");
        Ok(())
    }

    fn pause_video(&mut self) {
        if self.playing {
            tracing::debug!("Video paused");
        }
        self.playing = false;
    }

    fn reset_video(&mut self) {
        self.playing = false;
        if self.video.take().is_some() {
            tracing::info!("Video source cleared");
        }
    }

    fn show_placeholder(&mut self, media: MediaHandle) {
        tracing::info!("Placeholder shown: {:?}", media.path());
        self.placeholder = Some(media);
    }

    fn hide_placeholder(&mut self) {
        if self.placeholder.take().is_some() {
            tracing::debug!("Placeholder hidden");
        }
    }
}
