//! GStreamer-based video playback module.
//!
//! Plays a spooled media file, hands decoded frames to the renderer and
//! reports end-of-stream and pipeline errors.

use crate::media::MediaHandle;
use anyhow::{anyhow, Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use std::sync::{Arc, Mutex};

/// Video frame extracted from the pipeline.
pub struct VideoFrame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Something the pipeline reported since the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Ended,
    Error(String),
}

fn sample_to_frame(sample: &gst::Sample) -> Result<VideoFrame, gst::FlowError> {
    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
    let caps = sample.caps().ok_or(gst::FlowError::Error)?;

    let video_info = gst_video::VideoInfo::from_caps(caps).map_err(|_| gst::FlowError::Error)?;
    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;

    Ok(VideoFrame {
        pixels: map.as_slice().to_vec(),
        width: video_info.width(),
        height: video_info.height(),
    })
}

/// Video player for one spooled file.
pub struct VideoPlayer {
    pipeline: gst::Pipeline,
    latest_frame: Arc<Mutex<Option<VideoFrame>>>,
    // Dropped after the pipeline is stopped.
    media: MediaHandle,
}

impl VideoPlayer {
    /// Initialize GStreamer (call once at startup).
    pub fn init() -> Result<()> {
        gst::init().context("Failed to initialize GStreamer")?;
        tracing::info!("GStreamer initialized: {}", gst::version_string());
        Ok(())
    }

    /// Build a paused pipeline for `media`.
    pub fn open(media: MediaHandle) -> Result<Self> {
        let path = std::fs::canonicalize(media.path()).context("Spool file is missing")?;
        let uri = format!("file://{}", path.display());
        tracing::debug!("Creating video player for: {}", uri);

        let pipeline = gst::Pipeline::new();

        let src = gst::ElementFactory::make("uridecodebin")
            .name("source")
            .property("uri", &uri)
            .build()
            .context("Failed to create uridecodebin")?;

        let convert = gst::ElementFactory::make("videoconvert")
            .name("convert")
            .build()
            .context("Failed to create videoconvert")?;

        let scale = gst::ElementFactory::make("videoscale")
            .name("scale")
            .build()
            .context("Failed to create videoscale")?;

        let appsink = gst_app::AppSink::builder()
            .name("sink")
            .caps(
                &gst_video::VideoCapsBuilder::new()
                    .format(gst_video::VideoFormat::Rgba)
                    .build(),
            )
            .build();

        pipeline
            .add_many([&src, &convert, &scale, appsink.upcast_ref()])
            .context("Failed to add elements to pipeline")?;
        gst::Element::link_many([&convert, &scale, appsink.upcast_ref()])
            .context("Failed to link elements")?;

        // uridecodebin pads appear once the container is parsed.
        let convert_weak = convert.downgrade();
        src.connect_pad_added(move |_src, src_pad| {
            let Some(convert) = convert_weak.upgrade() else {
                return;
            };
            let Some(sink_pad) = convert.static_pad("sink") else {
                return;
            };
            if sink_pad.is_linked() {
                return;
            }

            let caps = src_pad
                .current_caps()
                .unwrap_or_else(|| src_pad.query_caps(None));
            let is_video = caps
                .structure(0)
                .is_some_and(|s| s.name().starts_with("video/"));

            if is_video {
                if let Err(e) = src_pad.link(&sink_pad) {
                    tracing::error!("Failed to link pads: {:?}", e);
                }
            }
        });

        let latest_frame = Arc::new(Mutex::new(None::<VideoFrame>));
        let sample_slot = latest_frame.clone();
        let preroll_slot = latest_frame.clone();

        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_preroll(move |appsink| {
                    let sample = appsink.pull_preroll().map_err(|_| gst::FlowError::Eos)?;
                    let frame = sample_to_frame(&sample)?;
                    if let Ok(mut guard) = preroll_slot.lock() {
                        *guard = Some(frame);
                    }
                    Ok(gst::FlowSuccess::Ok)
                })
                .new_sample(move |appsink| {
                    let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let frame = sample_to_frame(&sample)?;
                    if let Ok(mut guard) = sample_slot.lock() {
                        *guard = Some(frame);
                    }
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        Ok(Self {
            pipeline,
            latest_frame,
            media,
        })
    }

    /// Pause the pipeline and block until the first frame is decoded.
    pub fn preroll(&self, timeout: gst::ClockTime) -> Result<()> {
        self.pipeline
            .set_state(gst::State::Paused)
            .context("Failed to set pipeline to paused")?;

        let (result, _current, _pending) = self.pipeline.state(timeout);
        result.map_err(|_| anyhow!("{:?} could not be decoded", self.media.path()))?;

        if let Some(PlayerEvent::Error(message)) = self.poll_event() {
            return Err(anyhow!(message));
        }
        Ok(())
    }

    /// Start playing the video.
    pub fn play(&self) -> Result<()> {
        self.pipeline
            .set_state(gst::State::Playing)
            .context("Failed to set pipeline to playing")?;
        Ok(())
    }

    /// Pause the video.
    pub fn pause(&self) -> Result<()> {
        self.pipeline
            .set_state(gst::State::Paused)
            .context("Failed to set pipeline to paused")?;
        Ok(())
    }

    /// Stop the video and release resources.
    pub fn stop(&self) -> Result<()> {
        self.pipeline
            .set_state(gst::State::Null)
            .context("Failed to set pipeline to null")?;
        Ok(())
    }

    /// Take the newest decoded frame, if one arrived since the last call.
    pub fn take_frame(&self) -> Option<VideoFrame> {
        self.latest_frame.lock().ok()?.take()
    }

    /// Drain the bus and return the most significant pending event.
    pub fn poll_event(&self) -> Option<PlayerEvent> {
        let bus = self.pipeline.bus()?;
        let mut event = None;
        while let Some(msg) = bus.pop() {
            match msg.view() {
                gst::MessageView::Eos(_) => {
                    if event.is_none() {
                        event = Some(PlayerEvent::Ended);
                    }
                }
                gst::MessageView::Error(err) => {
                    tracing::error!("GStreamer error: {} ({:?})", err.error(), err.debug());
                    event = Some(PlayerEvent::Error(err.error().to_string()));
                }
                _ => {}
            }
        }
        event
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
