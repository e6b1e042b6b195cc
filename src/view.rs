//! Display state of the kiosk overlay.
//!
//! The controller owns one [`View`] and publishes a copy after every change;
//! frontends only read it.

use crate::api::{CampaignStatus, VideoInfo, VideoType};
use crate::notify::Notification;
use crate::schedule::ScheduleView;
use chrono::{DateTime, Local, NaiveDateTime};

pub const SCHEDULE_ERROR: &str = "Error loading schedule";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeBadge {
    Campaign,
    Filler,
    NotLoaded,
    Error,
}

impl TypeBadge {
    pub fn label(&self) -> &'static str {
        match self {
            TypeBadge::Campaign => "Campaign",
            TypeBadge::Filler => "Filler",
            TypeBadge::NotLoaded => "Not loaded",
            TypeBadge::Error => "Error",
        }
    }
}

/// Current-video panel.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfoView {
    pub id: String,
    pub filename: String,
    pub badge: TypeBadge,
    /// Shown only for named campaigns.
    pub campaign_name: Option<String>,
}

impl VideoInfoView {
    pub fn not_loaded() -> Self {
        Self {
            id: "No video loaded".into(),
            filename: "-".into(),
            badge: TypeBadge::NotLoaded,
            campaign_name: None,
        }
    }

    /// Generic failure. The filename keeps whatever was shown before.
    pub fn error(previous: &VideoInfoView) -> Self {
        Self {
            id: "error".into(),
            filename: previous.filename.clone(),
            badge: TypeBadge::Error,
            campaign_name: None,
        }
    }

    pub fn from_info(info: &VideoInfo) -> Self {
        // Everything that isn't a campaign is shown as filler.
        let (badge, campaign_name) = match info.video_type {
            VideoType::Campaign => (
                TypeBadge::Campaign,
                info.campaign_name.clone().filter(|n| !n.is_empty()),
            ),
            VideoType::Filler | VideoType::Placeholder | VideoType::Other => {
                (TypeBadge::Filler, None)
            }
        };
        Self {
            id: info.id.clone().filter(|s| !s.is_empty()).unwrap_or_else(|| "unknown".into()),
            filename: info.filename.clone().filter(|s| !s.is_empty()).unwrap_or_else(|| "-".into()),
            badge,
            campaign_name,
        }
    }
}

impl Default for VideoInfoView {
    fn default() -> Self {
        Self {
            id: "-".into(),
            filename: "-".into(),
            badge: TypeBadge::NotLoaded,
            campaign_name: None,
        }
    }
}

/// Time and active campaign count.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignView {
    pub current_time: String,
    pub active_campaigns: String,
}

impl Default for CampaignView {
    fn default() -> Self {
        Self {
            current_time: "--:--:--".into(),
            active_campaigns: "-".into(),
        }
    }
}

impl CampaignView {
    pub fn from_status(status: &CampaignStatus) -> Self {
        Self {
            current_time: local_time_of_day(&status.current_time)
                .unwrap_or_else(|| status.current_time.clone()),
            active_campaigns: status.total_campaigns.to_string(),
        }
    }
}

/// Format a backend timestamp as local time of day.
///
/// Timestamps with an offset are converted to local time; naive ones are
/// already local to the backend and are shown as-is.
pub fn local_time_of_day(timestamp: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt.with_timezone(&Local).format("%H:%M:%S").to_string());
    }
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.format("%H:%M:%S").to_string())
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashboardView {
    pub visible: bool,
    /// `None` while the schedule is being fetched.
    pub schedule: Option<ScheduleView>,
}

/// Which element currently fills the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Blank,
    Video,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub stage: Stage,
    pub skip_enabled: bool,
    /// Retries used by the current load.
    pub retry_attempt: u32,
    pub video: VideoInfoView,
    pub campaign: CampaignView,
    pub notification: Option<Notification>,
    pub dashboard: DashboardView,
}

impl Default for View {
    fn default() -> Self {
        Self {
            stage: Stage::Blank,
            skip_enabled: true,
            retry_attempt: 0,
            video: VideoInfoView::default(),
            campaign: CampaignView::default(),
            notification: None,
            dashboard: DashboardView::default(),
        }
    }
}
