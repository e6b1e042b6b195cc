//! Fullscreen kiosk frontend.
//!
//! SDL must stay on the main thread, so the controller talks to it through a
//! request channel drained once per frame. Requests that need an answer carry
//! a oneshot reply.

use crate::api::Backend;
use crate::config::Settings;
use crate::controller::{Controller, Request};
use crate::media::{MediaHandle, Spool};
use crate::renderer::{Renderer, SizedTexture};
use crate::surface::{PlaybackError, Surface};
use crate::video::{PlayerEvent, VideoPlayer};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use gstreamer as gst;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};

const PREROLL_TIMEOUT_SECS: u64 = 10;

type Reply = oneshot::Sender<Result<(), PlaybackError>>;

enum SurfaceRequest {
    BindVideo(MediaHandle, Reply),
    Play(Reply),
    Pause,
    ResetVideo,
    ShowPlaceholder(MediaHandle),
    HidePlaceholder,
}

/// [`Surface`] backed by the SDL render loop.
pub struct WindowSurface {
    requests: mpsc::UnboundedSender<SurfaceRequest>,
}

impl WindowSurface {
    fn post(&self, request: SurfaceRequest) {
        if self.requests.send(request).is_err() {
            tracing::debug!("Window is closed, surface request dropped");
        }
    }

    async fn ask(&self, make: impl FnOnce(Reply) -> SurfaceRequest) -> Result<(), PlaybackError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(make(tx))
            .map_err(|_| PlaybackError::Closed)?;
        rx.await.map_err(|_| PlaybackError::Closed)?
    }
}

#[async_trait]
impl Surface for WindowSurface {
    async fn bind_video(&mut self, media: MediaHandle) -> Result<(), PlaybackError> {
        self.ask(|reply| SurfaceRequest::BindVideo(media, reply)).await
    }

    async fn play_video(&mut self) -> Result<(), PlaybackError> {
        self.ask(SurfaceRequest::Play).await
    }

    fn pause_video(&mut self) {
        self.post(SurfaceRequest::Pause);
    }

    fn reset_video(&mut self) {
        self.post(SurfaceRequest::ResetVideo);
    }

    fn show_placeholder(&mut self, media: MediaHandle) {
        self.post(SurfaceRequest::ShowPlaceholder(media));
    }

    fn hide_placeholder(&mut self) {
        self.post(SurfaceRequest::HidePlaceholder);
    }
}

/// Placeholder texture and the spool file behind it.
struct Placeholder<'a> {
    image: SizedTexture<'a>,
    _media: MediaHandle,
}

/// Open the window, mount the controller and run until the operator quits.
pub fn run(
    runtime: &Runtime,
    settings: Settings,
    backend: Arc<dyn Backend>,
    spool: Spool,
) -> Result<()> {
    VideoPlayer::init()?;
    let mut renderer = Renderer::new()?;
    let texture_creator = renderer.texture_creator();
    let ttf = sdl2::ttf::init().map_err(|e| anyhow!("SDL_ttf init failed: {}", e))?;
    let font = ttf
        .load_font(&settings.display.font_path, settings.display.font_size)
        .map_err(|e| anyhow!("Failed to load font {:?}: {}", settings.display.font_path, e))?;

    let (request_tx, mut request_rx) = mpsc::unbounded_channel();
    let surface = WindowSurface {
        requests: request_tx,
    };

    let (handle, task) = {
        let _guard = runtime.enter();
        Controller::spawn(
            backend,
            Box::new(surface),
            spool,
            settings.playback,
            settings.status,
        )
    };
    let mut view = handle.subscribe();

    let mut player: Option<VideoPlayer> = None;
    let mut frame: Option<SizedTexture> = None;
    let mut placeholder: Option<Placeholder> = None;
    let mut ended_reported = false;

    'frames: loop {
        for input in renderer.poll_inputs() {
            match input.request() {
                Some(request) => {
                    handle.try_send(request);
                }
                None => break 'frames,
            }
        }

        while let Ok(request) = request_rx.try_recv() {
            match request {
                SurfaceRequest::BindVideo(media, reply) => {
                    // Release the previous pipeline and its spool file first.
                    player = None;
                    frame = None;
                    let result = VideoPlayer::open(media).and_then(|p| {
                        p.preroll(gst::ClockTime::from_seconds(PREROLL_TIMEOUT_SECS))?;
                        Ok(p)
                    });
                    let outcome = match result {
                        Ok(p) => {
                            player = Some(p);
                            ended_reported = false;
                            Ok(())
                        }
                        Err(e) => {
                            tracing::error!("Failed to bind video: {:#}", e);
                            Err(PlaybackError::Bind(e.to_string()))
                        }
                    };
                    let _ = reply.send(outcome);
                }
                SurfaceRequest::Play(reply) => {
                    let outcome = match &player {
                        Some(p) => p.play().map_err(|e| PlaybackError::Play(e.to_string())),
                        None => Err(PlaybackError::Play("no video bound".into())),
                    };
                    let _ = reply.send(outcome);
                }
                SurfaceRequest::Pause => {
                    if let Some(p) = &player {
                        if let Err(e) = p.pause() {
                            tracing::warn!("Failed to pause video: {}", e);
                        }
                    }
                }
                SurfaceRequest::ResetVideo => {
                    player = None;
                    frame = None;
                }
                SurfaceRequest::ShowPlaceholder(media) => {
                    placeholder = match renderer.load_texture_from_file(&texture_creator, media.path()) {
                        Ok(image) => Some(Placeholder {
                            image,
                            _media: media,
                        }),
                        Err(e) => {
                            tracing::error!("Failed to load placeholder: {:#}", e);
                            handle.try_send(Request::PlaybackFailed(e.to_string()));
                            None
                        }
                    };
                }
                SurfaceRequest::HidePlaceholder => placeholder = None,
            }
        }

        if let Some(p) = &player {
            match p.poll_event() {
                Some(PlayerEvent::Ended) if !ended_reported => {
                    ended_reported = true;
                    handle.try_send(Request::VideoEnded);
                }
                Some(PlayerEvent::Error(message)) => {
                    handle.try_send(Request::PlaybackFailed(message));
                }
                _ => {}
            }

            if let Some(decoded) = p.take_frame() {
                match renderer.create_texture_from_pixels(
                    &texture_creator,
                    &decoded.pixels,
                    decoded.width,
                    decoded.height,
                ) {
                    Ok(texture) => {
                        frame = Some(SizedTexture {
                            texture,
                            width: decoded.width,
                            height: decoded.height,
                        })
                    }
                    Err(e) => tracing::warn!("Dropping video frame: {}", e),
                }
            }
        }

        let media = match (&frame, &placeholder) {
            (Some(frame), _) => Some(frame),
            (None, Some(placeholder)) => Some(&placeholder.image),
            (None, None) => None,
        };
        let current = view.borrow_and_update().clone();
        renderer.render(media, &current, &font, &texture_creator)?;
        renderer.frame_delay();
    }

    tracing::info!("Window closed, shutting down");
    // Pending replies resolve as closed once the receiver is gone.
    drop(request_rx);
    handle.try_send(Request::Shutdown);
    runtime
        .block_on(task)
        .context("Controller task failed")?;
    Ok(())
}
