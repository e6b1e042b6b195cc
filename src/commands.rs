//! Subcommand implementations.

use crate::api::{Backend, DeviceSetup, HttpBackend};
use crate::config::Settings;
use crate::controller::{Controller, Request};
use crate::input::Input;
use crate::media::Spool;
use crate::schedule::{render_schedule, ScheduleRow, ScheduleView};
use crate::surface::HeadlessSurface;
use crate::view::{CampaignView, VideoInfoView};
use anyhow::{Context, Result};
use chrono::Local;
use reqwest::Client;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;

fn http_backend(settings: &Settings) -> Result<HttpBackend> {
    HttpBackend::new(Client::new(), &settings.server_url).context("Invalid server_url")
}

/// Run the player until the window closes or ctrl-c.
pub fn run(runtime: &Runtime, settings: Settings, headless: bool) -> Result<()> {
    let backend: Arc<dyn Backend> = Arc::new(http_backend(&settings)?);
    let spool = Spool::open(settings.playback.spool_dir.clone())?;
    tracing::info!("Campaign player starting against {}", settings.server_url);
    tracing::debug!("Spooling media under {:?}", spool.dir());

    #[cfg(feature = "window")]
    {
        if !headless {
            return crate::window::run(runtime, settings, backend, spool);
        }
    }
    #[cfg(not(feature = "window"))]
    {
        if !headless {
            tracing::info!("Built without the window frontend, running headless");
        }
    }

    runtime.block_on(async move {
        let (handle, task) = Controller::spawn(
            backend,
            Box::new(HeadlessSurface::default()),
            spool,
            settings.playback,
            settings.status,
        );

        // Without a display the notifications go to the log and the
        // shortcuts are read from the console, one per line.
        let mut view = handle.subscribe();
        let mut shown = handle.view().notification;
        let mut console = BufReader::new(tokio::io::stdin()).lines();
        let mut console_open = true;
        tracing::info!("Console shortcuts: Enter skip, n next, d dashboard, r refresh, q quit");

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    signal.context("Failed to listen for ctrl-c")?;
                    break;
                }
                line = console.next_line(), if console_open => match line {
                    Ok(Some(line)) => match Input::from_console_line(&line) {
                        Some(input) => match input.request() {
                            Some(request) => {
                                handle.try_send(request);
                            }
                            None => break,
                        },
                        None => tracing::warn!("Unknown shortcut {:?}", line.trim()),
                    },
                    Ok(None) => {
                        tracing::debug!("Console closed, shortcuts disabled");
                        console_open = false;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to read console: {}", e);
                        console_open = false;
                    }
                },
                changed = view.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let notification = view.borrow_and_update().notification.clone();
                    if notification != shown {
                        if let Some(n) = &notification {
                            tracing::info!(class = n.severity.css_class(), "{}", n.message);
                        }
                        shown = notification;
                    }
                }
            }
        }
        tracing::info!("Shutting down");

        handle.send(Request::Shutdown).await;
        task.await.context("Controller task failed")?;
        Ok(())
    })
}

pub async fn status(settings: &Settings) -> Result<()> {
    let backend = http_backend(settings)?;

    let campaigns = backend
        .campaign_status()
        .await
        .context("Failed to get campaign status")?;
    let campaign_view = CampaignView::from_status(&campaigns);
    println!("Backend time:     {}", campaign_view.current_time);
    println!("Active campaigns: {}", campaign_view.active_campaigns);
    for campaign in &campaigns.campaigns {
        println!(
            "  {:<28} today {:>4}  hour {:>3}  {}",
            campaign.name,
            campaign.plays_today,
            campaign.plays_this_hour,
            if campaign.video_exists {
                "ok"
            } else {
                "missing video"
            }
        );
    }

    let video = match backend.current_video().await {
        Ok(Some(info)) => VideoInfoView::from_info(&info),
        Ok(None) => VideoInfoView::not_loaded(),
        Err(e) => {
            tracing::warn!("Failed to get video info: {}", e);
            VideoInfoView::error(&VideoInfoView::default())
        }
    };
    println!(
        "Current video:    {} ({}) [{}]",
        video.id,
        video.filename,
        video.badge.label()
    );
    if let Some(name) = &video.campaign_name {
        println!("Campaign:         {}", name);
    }

    let schedule = backend
        .schedule_status()
        .await
        .context("Failed to get schedule status")?;
    println!();
    println!(
        "Schedule for {}{}",
        schedule.schedule_date,
        match schedule.is_valid_for_today {
            Some(false) => " (not today)",
            _ => "",
        }
    );

    match render_schedule(&schedule, Local::now().naive_local()) {
        ScheduleView::Empty(message) | ScheduleView::Error(message) => println!("  {}", message),
        ScheduleView::Rows { rows, focus } => {
            for (i, row) in rows.iter().enumerate() {
                println!("{}", format_row(row, focus == Some(i)));
            }
        }
    }
    Ok(())
}

fn format_row(row: &ScheduleRow, focused: bool) -> String {
    format!(
        "{} {:<13} {} {:>5}s  {} ({}){}",
        if focused { ">" } else { " " },
        row.status.css_class(),
        row.at,
        row.duration_secs,
        row.label,
        row.entry_type,
        if row.overlaps { "  [overlaps]" } else { "" }
    )
}

pub async fn setup(
    settings: &Settings,
    name: Option<String>,
    location_id: Option<i64>,
    stream_type: Option<String>,
) -> Result<()> {
    let device_name = name
        .or_else(|| settings.device.name.clone())
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .context("A device name is required (--name or device.name)")?;
    let location_id = location_id
        .or(settings.device.location_id)
        .context("A location id is required (--location-id or device.location_id)")?;
    let stream_type = stream_type.unwrap_or_else(|| settings.device.stream_type.clone());

    let backend = http_backend(settings)?;
    let route = backend
        .setup_device(&DeviceSetup {
            device_name,
            location_id,
            stream_type,
        })
        .await
        .context("Device setup failed")?;

    println!(
        "Config saved! Stream at {}{}",
        settings.server_url.trim_end_matches('/'),
        route.path()
    );
    Ok(())
}

pub async fn reload(settings: &Settings) -> Result<()> {
    let backend = http_backend(settings)?;

    let schedule = backend
        .reload_schedule()
        .await
        .context("Failed to reload schedule")?;
    println!(
        "{}",
        schedule.message.as_deref().unwrap_or("Schedule reloaded")
    );

    let campaigns = backend
        .reload_campaigns()
        .await
        .context("Failed to reload campaigns")?;
    println!(
        "{}",
        campaigns.message.as_deref().unwrap_or("Campaigns reloaded")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::EntryStatus;

    #[test]
    fn focused_overlapping_row() {
        let row = ScheduleRow {
            label: "Spring".into(),
            entry_type: "campaign".into(),
            at: "14:00:00".into(),
            duration_secs: 60,
            status: EntryStatus::Current,
            overlaps: true,
        };
        assert_eq!(
            format_row(&row, true),
            "> item-current  14:00:00    60s  Spring (campaign)  [overlaps]"
        );
    }
}
