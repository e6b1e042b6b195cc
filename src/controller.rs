//! Kiosk controller.
//!
//! One actor owns all playback and status state and drains a single command
//! queue. Fetches and delays run as spawned tasks that post their outcome
//! back to the queue tagged with the generation of the flow that started
//! them; a result whose generation is no longer current is dropped before it
//! can touch the display.

use crate::api::{ApiError, Backend, CampaignStatus, VideoInfo};
use crate::config::{PlaybackSettings, StatusSettings};
use crate::media::{LoadError, MediaHandle, MediaKind, Spool};
use crate::notify::{NotificationSlot, Severity};
use crate::schedule::{render_schedule, ScheduleStatus, ScheduleView};
use crate::surface::Surface;
use crate::view::{CampaignView, Stage, VideoInfoView, View, SCHEDULE_ERROR};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};

/// Requests from outside the controller: operator input, playback element
/// events and lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Load the next item without skipping.
    LoadNext,
    /// Operator skip.
    Skip,
    /// Playback element events; the headless surface never raises them.
    #[cfg_attr(not(feature = "window"), allow(dead_code))]
    VideoEnded,
    #[cfg_attr(not(feature = "window"), allow(dead_code))]
    PlaybackFailed(String),
    RefreshVideoInfo,
    RefreshCampaignStatus,
    /// Video info, campaign status and a confirmation.
    RefreshStatus,
    ToggleDashboard,
    Shutdown,
}

#[derive(Debug)]
enum Command {
    Request(Request),
    Fetch {
        generation: u64,
        force_skip: bool,
    },
    MediaLoaded {
        generation: u64,
        force_skip: bool,
        result: Result<MediaHandle, LoadError>,
    },
    VideoInfoLoaded {
        generation: u64,
        result: Result<Option<VideoInfo>, ApiError>,
    },
    CampaignStatusLoaded {
        generation: u64,
        result: Result<CampaignStatus, ApiError>,
    },
    ScheduleLoaded {
        generation: u64,
        result: Result<ScheduleStatus, ApiError>,
    },
    PollTick,
    ExpireNotification(u64),
}

/// Cloneable handle for feeding requests and watching the view.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<View>,
}

impl ControllerHandle {
    pub async fn send(&self, request: Request) {
        if self.commands.send(Command::Request(request)).await.is_err() {
            tracing::debug!("Controller is gone, request dropped");
        }
    }

    /// Non-async variant for frontends running outside the runtime.
    pub fn try_send(&self, request: Request) -> bool {
        match self.commands.try_send(Command::Request(request)) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Request dropped: {}", e);
                false
            }
        }
    }

    pub fn view(&self) -> View {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<View> {
        self.view.clone()
    }
}

pub struct Controller {
    backend: Arc<dyn Backend>,
    surface: Box<dyn Surface>,
    spool: Spool,
    playback: PlaybackSettings,
    status: StatusSettings,
    commands: mpsc::Sender<Command>,
    view: View,
    view_tx: watch::Sender<View>,
    notifications: NotificationSlot,
    retry_count: u32,
    playback_gen: u64,
    info_gen: u64,
    campaign_gen: u64,
    schedule_gen: u64,
    dashboard_visible: bool,
    current_video: Option<VideoInfo>,
    poll: Option<JoinHandle<()>>,
}

impl Controller {
    /// Mount the controller on the current runtime.
    pub fn spawn(
        backend: Arc<dyn Backend>,
        surface: Box<dyn Surface>,
        spool: Spool,
        playback: PlaybackSettings,
        status: StatusSettings,
    ) -> (ControllerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(100);
        let (view_tx, view_rx) = watch::channel(View::default());

        let controller = Self {
            backend,
            surface,
            spool,
            playback,
            status,
            commands: tx.clone(),
            view: View::default(),
            view_tx,
            notifications: NotificationSlot::default(),
            retry_count: 0,
            playback_gen: 0,
            info_gen: 0,
            campaign_gen: 0,
            schedule_gen: 0,
            dashboard_visible: false,
            current_video: None,
            poll: None,
        };

        let task = tokio::spawn(controller.run(rx));
        let handle = ControllerHandle {
            commands: tx,
            view: view_rx,
        };
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.mount();
        self.publish();

        while let Some(command) = commands.recv().await {
            if matches!(command, Command::Request(Request::Shutdown)) {
                break;
            }
            self.handle(command).await;
            self.publish();
        }

        self.unmount();
    }

    fn mount(&mut self) {
        tracing::info!("Controller mounted");
        self.load_next(false);
        self.refresh_campaign_status();

        let period = self.status.poll_interval();
        let tx = self.commands.clone();
        self.poll = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            loop {
                ticks.tick().await;
                if tx.send(Command::PollTick).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn unmount(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.abort();
        }
        self.surface.reset_video();
        self.surface.hide_placeholder();
        tracing::info!("Controller unmounted");
    }

    fn publish(&mut self) {
        self.view.notification = self.notifications.current().cloned();
        self.view.retry_attempt = self.retry_count;
        self.view_tx.send_replace(self.view.clone());
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Request(request) => self.handle_request(request),
            Command::Fetch {
                generation,
                force_skip,
            } => {
                if generation == self.playback_gen {
                    self.fetch_media(generation, force_skip);
                } else {
                    tracing::debug!("Dropping superseded fetch (generation {})", generation);
                }
            }
            Command::MediaLoaded {
                generation,
                force_skip,
                result,
            } => self.on_media_loaded(generation, force_skip, result).await,
            Command::VideoInfoLoaded { generation, result } => {
                if generation == self.info_gen {
                    self.on_video_info(result);
                }
            }
            Command::CampaignStatusLoaded { generation, result } => {
                if generation == self.campaign_gen {
                    self.on_campaign_status(result);
                }
            }
            Command::ScheduleLoaded { generation, result } => {
                if generation == self.schedule_gen && self.dashboard_visible {
                    self.on_schedule(result);
                }
            }
            Command::PollTick => {
                self.refresh_campaign_status();
                self.refresh_video_info();
            }
            Command::ExpireNotification(generation) => {
                self.notifications.expire(generation);
            }
        }
    }

    fn handle_request(&mut self, request: Request) {
        tracing::debug!("Request: {:?}", request);
        match request {
            Request::LoadNext => self.load_next(false),
            Request::Skip => {
                tracing::info!("Skip requested");
                self.retry_count = 0;
                self.surface.pause_video();
                self.load_next(true);
            }
            Request::VideoEnded => {
                tracing::info!("Video ended, loading next");
                self.playback_gen += 1;
                let generation = self.playback_gen;
                self.after(
                    self.playback.ended_delay(),
                    Command::Fetch {
                        generation,
                        force_skip: false,
                    },
                );
            }
            Request::PlaybackFailed(reason) => {
                let video = self.current_video.as_ref().and_then(|v| v.id.as_deref());
                tracing::error!(?video, "Player error: {}", reason);
                self.notify("Video playback error", Severity::Error);
            }
            Request::RefreshVideoInfo => self.refresh_video_info(),
            Request::RefreshCampaignStatus => self.refresh_campaign_status(),
            Request::RefreshStatus => {
                self.refresh_video_info();
                self.refresh_campaign_status();
                self.notify("Status refreshed", Severity::Success);
            }
            Request::ToggleDashboard => self.toggle_dashboard(),
            Request::Shutdown => {}
        }
    }

    /// Post `command` back to the queue after `delay`.
    fn after(&self, delay: Duration, command: Command) {
        let tx = self.commands.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            let _ = tx.send(command).await;
        });
    }

    fn notify(&mut self, message: impl Into<String>, severity: Severity) {
        let generation = self.notifications.post(message, severity);
        self.after(
            self.status.notification_ttl(),
            Command::ExpireNotification(generation),
        );
    }

    // Playback refresh loop

    /// Start a new playback generation; anything older is superseded.
    fn load_next(&mut self, force_skip: bool) {
        self.playback_gen += 1;
        tracing::info!(
            "Loading next video{}",
            if force_skip { " (forced next)" } else { "" }
        );
        self.fetch_media(self.playback_gen, force_skip);
    }

    fn fetch_media(&mut self, generation: u64, force_skip: bool) {
        self.view.skip_enabled = false;

        let backend = self.backend.clone();
        let spool = self.spool.clone();
        let tx = self.commands.clone();
        tokio::spawn(async move {
            let result = match backend.next_media(force_skip).await {
                Ok(payload) => spool.store(payload).await,
                Err(e) => Err(e.into()),
            };
            let _ = tx
                .send(Command::MediaLoaded {
                    generation,
                    force_skip,
                    result,
                })
                .await;
        });
    }

    async fn on_media_loaded(
        &mut self,
        generation: u64,
        force_skip: bool,
        result: Result<MediaHandle, LoadError>,
    ) {
        if generation != self.playback_gen {
            // Dropping the result releases its spool file.
            tracing::debug!("Discarding stale media (generation {})", generation);
            return;
        }

        match result {
            Ok(media) => {
                self.retry_count = 0;
                match media.kind() {
                    MediaKind::Video => self.present_video(media, force_skip).await,
                    MediaKind::Image => self.present_placeholder(media),
                }
            }
            Err(e) => self.on_load_failed(generation, force_skip, e),
        }

        self.view.skip_enabled = true;
    }

    async fn present_video(&mut self, media: MediaHandle, force_skip: bool) {
        tracing::info!("Received video, binding player");
        if let Err(e) = self.surface.bind_video(media).await {
            tracing::error!("Error playing video: {}", e);
            self.notify(format!("Error playing video: {}", e), Severity::Error);
            return;
        }

        // First frame is decoded; the placeholder can go.
        self.surface.hide_placeholder();
        self.view.stage = Stage::Video;

        match self.surface.play_video().await {
            Ok(()) => {
                tracing::info!("Video playing successfully");
                self.after(
                    self.playback.info_refresh_delay(),
                    Command::Request(Request::RefreshVideoInfo),
                );
                let message = if force_skip {
                    "Skipped to next video"
                } else {
                    "Video loaded successfully"
                };
                self.notify(message, Severity::Success);
            }
            Err(e) => {
                tracing::error!("Error playing video: {}", e);
                self.notify(format!("Error playing video: {}", e), Severity::Error);
            }
        }
    }

    fn present_placeholder(&mut self, media: MediaHandle) {
        tracing::info!("Received placeholder image");
        self.surface.pause_video();
        self.surface.reset_video();
        self.surface.show_placeholder(media);
        self.view.stage = Stage::Placeholder;
        self.notify(
            "Showing placeholder (no scheduled content)",
            Severity::Warning,
        );
    }

    fn on_load_failed(&mut self, generation: u64, force_skip: bool, error: LoadError) {
        tracing::error!("Error loading content: {}", error);
        self.notify(format!("Error loading content: {}", error), Severity::Error);

        let max_retries = self.playback.max_retries;
        if self.retry_count < max_retries {
            self.retry_count += 1;
            self.notify(
                format!("Retrying... ({}/{})", self.retry_count, max_retries),
                Severity::Warning,
            );
            self.after(
                self.playback.retry_backoff(),
                Command::Fetch {
                    generation,
                    force_skip,
                },
            );
        } else {
            tracing::warn!(
                "Giving up after {} retries, waiting for the next trigger",
                max_retries
            );
        }
    }

    // Status and schedule

    fn refresh_video_info(&mut self) {
        self.info_gen += 1;
        let generation = self.info_gen;
        let backend = self.backend.clone();
        let tx = self.commands.clone();
        tokio::spawn(async move {
            let result = backend.current_video().await;
            let _ = tx
                .send(Command::VideoInfoLoaded { generation, result })
                .await;
        });
    }

    fn on_video_info(&mut self, result: Result<Option<VideoInfo>, ApiError>) {
        match result {
            Ok(None) => {
                tracing::debug!("No video loaded yet");
                self.view.video = VideoInfoView::not_loaded();
            }
            Ok(Some(info)) => {
                tracing::debug!("Video info received: {:?}", info);
                self.view.video = VideoInfoView::from_info(&info);
                if let Some(status) = info.status.as_deref().filter(|s| !s.is_empty()) {
                    self.notify(status.to_string(), Severity::Warning);
                }
                self.current_video = Some(info);
            }
            Err(e) => {
                tracing::error!("Failed to fetch video info: {}", e);
                self.view.video = VideoInfoView::error(&self.view.video);
                self.notify(format!("Failed to get video info: {}", e), Severity::Error);
            }
        }
    }

    fn refresh_campaign_status(&mut self) {
        self.campaign_gen += 1;
        let generation = self.campaign_gen;
        let backend = self.backend.clone();
        let tx = self.commands.clone();
        tokio::spawn(async move {
            let result = backend.campaign_status().await;
            let _ = tx
                .send(Command::CampaignStatusLoaded { generation, result })
                .await;
        });
    }

    fn on_campaign_status(&mut self, result: Result<CampaignStatus, ApiError>) {
        match result {
            Ok(status) => self.view.campaign = CampaignView::from_status(&status),
            Err(e) => {
                tracing::error!("Failed to fetch campaign status: {}", e);
                self.view.campaign.active_campaigns = "error".into();
                self.notify(
                    format!("Failed to get campaign status: {}", e),
                    Severity::Error,
                );
            }
        }
    }

    fn toggle_dashboard(&mut self) {
        self.dashboard_visible = !self.dashboard_visible;
        self.view.dashboard.visible = self.dashboard_visible;
        self.schedule_gen += 1;

        if !self.dashboard_visible {
            return;
        }

        self.view.dashboard.schedule = None;
        let generation = self.schedule_gen;
        let backend = self.backend.clone();
        let tx = self.commands.clone();
        tokio::spawn(async move {
            let result = backend.schedule_status().await;
            let _ = tx
                .send(Command::ScheduleLoaded { generation, result })
                .await;
        });
    }

    fn on_schedule(&mut self, result: Result<ScheduleStatus, ApiError>) {
        let schedule = match result {
            Ok(status) => render_schedule(&status, Local::now().naive_local()),
            Err(e) => {
                tracing::error!("Error loading schedule dashboard: {}", e);
                ScheduleView::Error(SCHEDULE_ERROR.into())
            }
        };
        self.view.dashboard.schedule = Some(schedule);
    }
}
