//! SDL2-based rendering module for the kiosk window.
//!
//! Draws the video frame or placeholder image full screen and the status
//! overlay on top of it.

use crate::input::Input;
use crate::notify::Severity;
use crate::schedule::{visible_window, EntryStatus, ScheduleView};
use crate::view::View;
use anyhow::{anyhow, Context, Result};
use sdl2::event::Event;
use sdl2::pixels::{Color, PixelFormatEnum};
use sdl2::rect::Rect;
use sdl2::render::{BlendMode, Canvas, Texture, TextureCreator};
use sdl2::ttf::Font;
use sdl2::video::{Window, WindowContext};
use std::path::Path;
use std::time::Duration;

const MARGIN: i32 = 24;
const DASHBOARD_WIDTH: u32 = 520;

const TEXT: Color = Color::RGB(240, 240, 240);
const DIM: Color = Color::RGB(150, 150, 150);
const PANEL: Color = Color::RGBA(0, 0, 0, 170);

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Success => Color::RGB(76, 175, 80),
        Severity::Warning => Color::RGB(255, 193, 7),
        Severity::Error => Color::RGB(244, 67, 54),
    }
}

fn status_color(status: EntryStatus) -> Color {
    match status {
        EntryStatus::Past => DIM,
        EntryStatus::Current => Color::RGB(76, 175, 80),
        EntryStatus::Future => TEXT,
    }
}

/// A texture with the pixel size it was created from.
pub struct SizedTexture<'a> {
    pub texture: Texture<'a>,
    pub width: u32,
    pub height: u32,
}

/// The main renderer struct.
pub struct Renderer {
    canvas: Canvas<Window>,
    event_pump: sdl2::EventPump,
    screen_width: u32,
    screen_height: u32,
}

impl Renderer {
    /// Initialize SDL2 and create a fullscreen window.
    pub fn new() -> Result<Self> {
        let sdl_context = sdl2::init().map_err(|e| anyhow!("SDL init failed: {}", e))?;

        let video_subsystem = sdl_context
            .video()
            .map_err(|e| anyhow!("SDL video init failed: {}", e))?;

        let display_mode = video_subsystem
            .desktop_display_mode(0)
            .map_err(|e| anyhow!("Failed to get display mode: {}", e))?;

        let screen_width = display_mode.w as u32;
        let screen_height = display_mode.h as u32;

        tracing::info!(
            "Creating fullscreen window: {}x{}",
            screen_width,
            screen_height
        );

        let window = video_subsystem
            .window("Campaign Player", screen_width, screen_height)
            .fullscreen_desktop()
            .build()
            .context("Failed to create window")?;

        let mut canvas = window
            .into_canvas()
            .accelerated()
            .present_vsync()
            .build()
            .context("Failed to create canvas")?;
        canvas.set_blend_mode(BlendMode::Blend);

        // Hide cursor for kiosk mode
        sdl_context.mouse().show_cursor(false);

        canvas.set_draw_color(Color::RGB(0, 0, 0));
        canvas.clear();
        canvas.present();

        let event_pump = sdl_context
            .event_pump()
            .map_err(|e| anyhow!("Failed to get event pump: {}", e))?;

        Ok(Self {
            canvas,
            event_pump,
            screen_width,
            screen_height,
        })
    }

    pub fn texture_creator(&self) -> TextureCreator<WindowContext> {
        self.canvas.texture_creator()
    }

    /// Load an image file into a texture.
    pub fn load_texture_from_file<'a>(
        &self,
        texture_creator: &'a TextureCreator<WindowContext>,
        path: &Path,
    ) -> Result<SizedTexture<'a>> {
        let img = image::open(path).context("Failed to open image")?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let texture = self.create_texture_from_pixels(texture_creator, rgba.as_raw(), width, height)?;
        Ok(SizedTexture {
            texture,
            width,
            height,
        })
    }

    /// Create a texture from raw RGBA pixels.
    pub fn create_texture_from_pixels<'a>(
        &self,
        texture_creator: &'a TextureCreator<WindowContext>,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Texture<'a>> {
        let mut texture = texture_creator
            .create_texture_streaming(PixelFormatEnum::ABGR8888, width, height)
            .context("Failed to create texture")?;

        let row_bytes = (width as usize) * 4;
        if pixels.len() < row_bytes * height as usize {
            return Err(anyhow!("Frame is smaller than {}x{}", width, height));
        }

        texture
            .with_lock(None, |buffer: &mut [u8], pitch: usize| {
                for y in 0..height as usize {
                    let src_offset = y * row_bytes;
                    let dst_offset = y * pitch;
                    buffer[dst_offset..dst_offset + row_bytes]
                        .copy_from_slice(&pixels[src_offset..src_offset + row_bytes]);
                }
            })
            .map_err(|e| anyhow!("Failed to update texture: {}", e))?;

        Ok(texture)
    }

    /// Calculate aspect-fit rectangle for displaying an image.
    fn calculate_aspect_fit(&self, img_width: u32, img_height: u32) -> Rect {
        let screen_ratio = self.screen_width as f32 / self.screen_height as f32;
        let img_ratio = img_width as f32 / img_height.max(1) as f32;

        let (fit_width, fit_height) = if img_ratio > screen_ratio {
            (self.screen_width, (self.screen_width as f32 / img_ratio) as u32)
        } else {
            ((self.screen_height as f32 * img_ratio) as u32, self.screen_height)
        };

        let x = ((self.screen_width - fit_width.min(self.screen_width)) / 2) as i32;
        let y = ((self.screen_height - fit_height.min(self.screen_height)) / 2) as i32;

        Rect::new(x, y, fit_width, fit_height)
    }

    /// Render one frame: media underneath, overlay on top.
    pub fn render(
        &mut self,
        media: Option<&SizedTexture>,
        view: &View,
        font: &Font,
        texture_creator: &TextureCreator<WindowContext>,
    ) -> Result<()> {
        self.canvas.set_draw_color(Color::RGB(0, 0, 0));
        self.canvas.clear();

        if let Some(media) = media {
            let dest = self.calculate_aspect_fit(media.width, media.height);
            self.canvas
                .copy(&media.texture, None, dest)
                .map_err(|e| anyhow!("Failed to render media: {}", e))?;
        }

        self.render_status(view, font, texture_creator)?;
        if view.dashboard.visible {
            self.render_dashboard(view, font, texture_creator)?;
        }
        if let Some(notification) = &view.notification {
            let line = font.height();
            let y = self.screen_height as i32 - MARGIN - line;
            self.draw_text(
                &notification.message,
                MARGIN,
                y,
                severity_color(notification.severity),
                font,
                texture_creator,
            )?;
        }

        self.canvas.present();
        Ok(())
    }

    fn render_status(
        &mut self,
        view: &View,
        font: &Font,
        texture_creator: &TextureCreator<WindowContext>,
    ) -> Result<()> {
        let mut lines = vec![
            format!("Video: {}", view.video.id),
            format!("File: {}", view.video.filename),
            format!("Type: {}", view.video.badge.label()),
        ];
        if let Some(name) = &view.video.campaign_name {
            lines.push(format!("Campaign: {}", name));
        }
        lines.push(format!("Time: {}", view.campaign.current_time));
        lines.push(format!("Active campaigns: {}", view.campaign.active_campaigns));
        if !view.skip_enabled {
            lines.push("Loading...".into());
        }

        let line = font.height() + 4;
        self.fill_panel(Rect::new(
            MARGIN / 2,
            MARGIN / 2,
            420,
            (lines.len() as i32 * line + MARGIN) as u32,
        ))?;

        for (i, text) in lines.iter().enumerate() {
            self.draw_text(text, MARGIN, MARGIN + i as i32 * line, TEXT, font, texture_creator)?;
        }
        Ok(())
    }

    fn render_dashboard(
        &mut self,
        view: &View,
        font: &Font,
        texture_creator: &TextureCreator<WindowContext>,
    ) -> Result<()> {
        let x = self.screen_width as i32 - DASHBOARD_WIDTH as i32 - MARGIN / 2;
        let height = self.screen_height - MARGIN as u32;
        self.fill_panel(Rect::new(x, MARGIN / 2, DASHBOARD_WIDTH, height))?;

        let line = (font.height() + 4) * 2;
        let text_x = x + MARGIN / 2;

        match &view.dashboard.schedule {
            None => self.draw_text("Loading schedule...", text_x, MARGIN, DIM, font, texture_creator)?,
            Some(ScheduleView::Empty(message)) | Some(ScheduleView::Error(message)) => {
                self.draw_text(message, text_x, MARGIN, DIM, font, texture_creator)?
            }
            Some(ScheduleView::Rows { rows, focus }) => {
                let capacity = ((height as i32 - MARGIN) / line).max(1) as usize;
                // Keep the current entry in the middle of the panel.
                let first = visible_window(rows.len(), capacity, *focus);
                for (slot, row) in rows.iter().skip(first).take(capacity).enumerate() {
                    let y = MARGIN + slot as i32 * line;
                    let color = status_color(row.status);
                    let title = format!(
                        "{} ({}){}",
                        row.label,
                        row.entry_type,
                        if row.overlaps { " !" } else { "" }
                    );
                    self.draw_text(&title, text_x, y, color, font, texture_creator)?;
                    let detail = format!("{} - {}s", row.at, row.duration_secs);
                    self.draw_text(&detail, text_x, y + line / 2, DIM, font, texture_creator)?;
                }
            }
        }
        Ok(())
    }

    fn fill_panel(&mut self, rect: Rect) -> Result<()> {
        self.canvas.set_draw_color(PANEL);
        self.canvas
            .fill_rect(rect)
            .map_err(|e| anyhow!("Failed to draw panel: {}", e))
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: i32,
        y: i32,
        color: Color,
        font: &Font,
        texture_creator: &TextureCreator<WindowContext>,
    ) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let surface = font
            .render(text)
            .blended(color)
            .map_err(|e| anyhow!("Failed to render text: {}", e))?;
        let texture = texture_creator
            .create_texture_from_surface(&surface)
            .context("Failed to create text texture")?;
        self.canvas
            .copy(&texture, None, Rect::new(x, y, surface.width(), surface.height()))
            .map_err(|e| anyhow!("Failed to draw text: {}", e))
    }

    /// Drain SDL events into operator inputs.
    pub fn poll_inputs(&mut self) -> Vec<Input> {
        let mut inputs = Vec::new();
        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => inputs.push(Input::Quit),
                Event::KeyDown {
                    keycode: Some(keycode),
                    repeat: false,
                    ..
                } => {
                    if let Some(input) = Input::from_key_name(&keycode.name()) {
                        inputs.push(input);
                    }
                }
                _ => {}
            }
        }
        inputs
    }

    /// Sleep for a short duration to limit frame rate.
    pub fn frame_delay(&self) {
        std::thread::sleep(Duration::from_millis(16)); // ~60 FPS
    }
}
