//! Scripted backend and recording surface for controller tests.
//!
//! An endpoint with nothing scripted never answers, so flows that a test
//! doesn't care about stay quiet instead of failing.

use crate::api::{
    ApiError, Backend, CampaignStatus, DeviceSetup, MediaPayload, ReloadResult, StreamRoute,
    VideoInfo, VideoType,
};
use crate::media::MediaHandle;
use crate::schedule::ScheduleStatus;
use crate::surface::{PlaybackError, Surface};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn video_payload(body: &'static [u8]) -> MediaPayload {
    MediaPayload {
        content_type: "video/mp4".into(),
        bytes: Bytes::from_static(body),
    }
}

pub fn image_payload(body: &'static [u8]) -> MediaPayload {
    MediaPayload {
        content_type: "image/png".into(),
        bytes: Bytes::from_static(body),
    }
}

pub fn video_info(video_type: VideoType, campaign_name: Option<&str>) -> VideoInfo {
    VideoInfo {
        id: Some("vid-1".into()),
        filename: Some("clip.mp4".into()),
        video_type,
        campaign_name: campaign_name.map(String::from),
        status: None,
    }
}

pub fn campaign_status(current_time: &str, total_campaigns: u32) -> CampaignStatus {
    CampaignStatus {
        current_time: current_time.into(),
        total_campaigns,
        campaigns: Vec::new(),
    }
}

type Script<T> = Mutex<VecDeque<(Duration, Result<T, ApiError>)>>;

async fn play_script<T>(script: &Script<T>, calls: &AtomicUsize) -> Result<T, ApiError> {
    calls.fetch_add(1, Ordering::SeqCst);
    let step = script.lock().unwrap().pop_front();
    match step {
        Some((delay, result)) => {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        }
        None => std::future::pending().await,
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    media: Script<MediaPayload>,
    video_info: Script<Option<VideoInfo>>,
    campaign: Script<CampaignStatus>,
    schedule: Script<ScheduleStatus>,
    media_calls: AtomicUsize,
    video_info_calls: AtomicUsize,
    campaign_calls: AtomicUsize,
    schedule_calls: AtomicUsize,
    skip_flags: Mutex<Vec<bool>>,
}

impl ScriptedBackend {
    pub fn push_media(&self, result: Result<MediaPayload, ApiError>) {
        self.push_media_after(Duration::ZERO, result);
    }

    pub fn push_media_after(&self, delay: Duration, result: Result<MediaPayload, ApiError>) {
        self.media.lock().unwrap().push_back((delay, result));
    }

    pub fn push_video_info(&self, result: Result<Option<VideoInfo>, ApiError>) {
        self.video_info.lock().unwrap().push_back((Duration::ZERO, result));
    }

    pub fn push_campaign_status(&self, result: Result<CampaignStatus, ApiError>) {
        self.campaign.lock().unwrap().push_back((Duration::ZERO, result));
    }

    pub fn push_schedule(&self, result: Result<ScheduleStatus, ApiError>) {
        self.push_schedule_after(Duration::ZERO, result);
    }

    pub fn push_schedule_after(&self, delay: Duration, result: Result<ScheduleStatus, ApiError>) {
        self.schedule.lock().unwrap().push_back((delay, result));
    }

    pub fn media_calls(&self) -> usize {
        self.media_calls.load(Ordering::SeqCst)
    }

    pub fn video_info_calls(&self) -> usize {
        self.video_info_calls.load(Ordering::SeqCst)
    }

    pub fn campaign_calls(&self) -> usize {
        self.campaign_calls.load(Ordering::SeqCst)
    }

    pub fn schedule_calls(&self) -> usize {
        self.schedule_calls.load(Ordering::SeqCst)
    }

    pub fn skip_flags(&self) -> Vec<bool> {
        self.skip_flags.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn next_media(&self, force_skip: bool) -> Result<MediaPayload, ApiError> {
        self.skip_flags.lock().unwrap().push(force_skip);
        play_script(&self.media, &self.media_calls).await
    }

    async fn current_video(&self) -> Result<Option<VideoInfo>, ApiError> {
        play_script(&self.video_info, &self.video_info_calls).await
    }

    async fn campaign_status(&self) -> Result<CampaignStatus, ApiError> {
        play_script(&self.campaign, &self.campaign_calls).await
    }

    async fn schedule_status(&self) -> Result<ScheduleStatus, ApiError> {
        play_script(&self.schedule, &self.schedule_calls).await
    }

    async fn setup_device(&self, setup: &DeviceSetup) -> Result<StreamRoute, ApiError> {
        Ok(StreamRoute::for_stream_type(&setup.stream_type))
    }

    async fn reload_schedule(&self) -> Result<ReloadResult, ApiError> {
        Ok(ReloadResult { message: None })
    }

    async fn reload_campaigns(&self) -> Result<ReloadResult, ApiError> {
        Ok(ReloadResult { message: None })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Carries the bound payload's bytes.
    BindVideo(Vec<u8>),
    Play,
    Pause,
    ResetVideo,
    ShowPlaceholder(Vec<u8>),
    HidePlaceholder,
}

#[derive(Default)]
struct Recorded {
    events: Vec<SurfaceEvent>,
    video: Option<MediaHandle>,
    placeholder: Option<MediaHandle>,
}

/// Surface that records calls. Clones share the same record.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    state: Arc<Mutex<Recorded>>,
    reject_play: bool,
}

impl RecordingSurface {
    pub fn rejecting_play() -> Self {
        Self {
            reject_play: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn bound_videos(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SurfaceEvent::BindVideo(body) => Some(body),
                _ => None,
            })
            .collect()
    }

    pub fn has_video(&self) -> bool {
        self.state.lock().unwrap().video.is_some()
    }

    pub fn has_placeholder(&self) -> bool {
        self.state.lock().unwrap().placeholder.is_some()
    }

    fn record(&self, event: SurfaceEvent) {
        self.state.lock().unwrap().events.push(event);
    }
}

fn contents(media: &MediaHandle) -> Vec<u8> {
    std::fs::read(media.path()).unwrap_or_default()
}

#[async_trait]
impl Surface for RecordingSurface {
    async fn bind_video(&mut self, media: MediaHandle) -> Result<(), PlaybackError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(SurfaceEvent::BindVideo(contents(&media)));
        state.video = Some(media);
        Ok(())
    }

    async fn play_video(&mut self) -> Result<(), PlaybackError> {
        self.record(SurfaceEvent::Play);
        if self.reject_play {
            return Err(PlaybackError::Play("autoplay not allowed".into()));
        }
        Ok(())
    }

    fn pause_video(&mut self) {
        self.record(SurfaceEvent::Pause);
    }

    fn reset_video(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.events.push(SurfaceEvent::ResetVideo);
        state.video = None;
    }

    fn show_placeholder(&mut self, media: MediaHandle) {
        let mut state = self.state.lock().unwrap();
        state.events.push(SurfaceEvent::ShowPlaceholder(contents(&media)));
        state.placeholder = Some(media);
    }

    fn hide_placeholder(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.events.push(SurfaceEvent::HidePlaceholder);
        state.placeholder = None;
    }
}
