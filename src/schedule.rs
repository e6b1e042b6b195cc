//! Schedule timeline rendering.
//!
//! Turns a `/api/schedule-status` snapshot into dashboard rows classified as
//! past, current or future against a wall-clock instant. Rendering is pure:
//! nothing is carried between renders.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Duration assumed for entries that don't carry one.
pub const DEFAULT_ENTRY_SECS: u32 = 30;

pub const EMPTY_PLACEHOLDER: &str = "No schedule entries available";

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("unrecognised schedule date: {0}")]
    BadDate(String),

    #[error("invalid entry time: {0}")]
    BadTime(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScheduleEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub entry_type: String,
    /// Time of day, `HH:MM:SS`.
    pub at: String,
    #[serde(default)]
    pub duration: Option<u32>,
}

impl ScheduleEntry {
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("unnamed")
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration.unwrap_or(DEFAULT_ENTRY_SECS)
    }

    /// Run window on `date` as `[start, end]`.
    pub fn window(&self, date: NaiveDate) -> Result<(NaiveDateTime, NaiveDateTime), ScheduleError> {
        let time = NaiveTime::parse_from_str(&self.at, "%H:%M:%S")
            .map_err(|_| ScheduleError::BadTime(self.at.clone()))?;
        let start = date.and_time(time);
        Ok((start, start + Duration::seconds(i64::from(self.duration_secs()))))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScheduleStatus {
    pub schedule_date: String,
    #[serde(default)]
    pub playlist: Vec<ScheduleEntry>,
    #[serde(default)]
    pub is_valid_for_today: Option<bool>,
    #[serde(default)]
    pub current_time: Option<String>,
    #[serde(default)]
    pub total_playlist_items: Option<usize>,
    #[serde(default)]
    pub next_scheduled_time: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Past,
    Current,
    Future,
}

impl EntryStatus {
    /// Style class of a dashboard row.
    pub fn css_class(&self) -> &'static str {
        match self {
            EntryStatus::Past => "item-past",
            EntryStatus::Current => "item-current",
            EntryStatus::Future => "item-future",
        }
    }
}

/// Classify `now` against an inclusive `[start, end]` window.
pub fn classify(now: NaiveDateTime, start: NaiveDateTime, end: NaiveDateTime) -> EntryStatus {
    if now < start {
        EntryStatus::Future
    } else if now <= end {
        EntryStatus::Current
    } else {
        EntryStatus::Past
    }
}

/// Parse a schedule date. Day-month-year first, then ISO.
pub fn parse_schedule_date(s: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(s, "%d-%m-%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| ScheduleError::BadDate(s.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRow {
    pub label: String,
    pub entry_type: String,
    pub at: String,
    pub duration_secs: u32,
    pub status: EntryStatus,
    /// Window intersects another entry's window.
    pub overlaps: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleView {
    /// Explicit placeholder for an empty playlist.
    Empty(String),
    Rows {
        rows: Vec<ScheduleRow>,
        /// First current row; the frontend centres it.
        focus: Option<usize>,
    },
    Error(String),
}

#[cfg(test)]
impl ScheduleView {
    pub fn rows(&self) -> &[ScheduleRow] {
        match self {
            ScheduleView::Rows { rows, .. } => rows,
            _ => &[],
        }
    }

    pub fn focus(&self) -> Option<usize> {
        match self {
            ScheduleView::Rows { focus, .. } => *focus,
            _ => None,
        }
    }
}

/// Render `status` as seen at `now`.
pub fn render_schedule(status: &ScheduleStatus, now: NaiveDateTime) -> ScheduleView {
    if status.playlist.is_empty() {
        return ScheduleView::Empty(EMPTY_PLACEHOLDER.to_string());
    }

    let date = match parse_schedule_date(&status.schedule_date) {
        Ok(date) => date,
        Err(e) => {
            tracing::warn!("Cannot render schedule: {}", e);
            return ScheduleView::Error(e.to_string());
        }
    };

    let windows: Vec<_> = status
        .playlist
        .iter()
        .map(|entry| match entry.window(date) {
            Ok(window) => Some(window),
            Err(e) => {
                tracing::warn!("Schedule entry {}: {}", entry.label(), e);
                None
            }
        })
        .collect();

    let overlapping = find_overlaps(&windows);
    if overlapping.iter().any(|o| *o) {
        tracing::warn!(
            "Schedule for {} has {} overlapping entries",
            status.schedule_date,
            overlapping.iter().filter(|o| **o).count()
        );
    }

    let rows: Vec<ScheduleRow> = status
        .playlist
        .iter()
        .zip(&windows)
        .zip(overlapping)
        .map(|((entry, window), overlaps)| ScheduleRow {
            label: entry.label().to_string(),
            entry_type: entry.entry_type.clone(),
            at: entry.at.clone(),
            duration_secs: entry.duration_secs(),
            // Unparseable times never become current.
            status: window
                .map(|(start, end)| classify(now, start, end))
                .unwrap_or(EntryStatus::Future),
            overlaps,
        })
        .collect();

    let focus = rows.iter().position(|r| r.status == EntryStatus::Current);
    ScheduleView::Rows { rows, focus }
}

/// First row to show when `capacity` rows fit, keeping `focus` centred.
#[cfg_attr(not(feature = "window"), allow(dead_code))]
pub fn visible_window(total: usize, capacity: usize, focus: Option<usize>) -> usize {
    let Some(focus) = focus else { return 0 };
    if total <= capacity {
        return 0;
    }
    focus
        .saturating_sub(capacity / 2)
        .min(total - capacity)
}

fn find_overlaps(windows: &[Option<(NaiveDateTime, NaiveDateTime)>]) -> Vec<bool> {
    let mut flags = vec![false; windows.len()];
    for (i, a) in windows.iter().enumerate() {
        let Some((a_start, a_end)) = a else { continue };
        for (j, b) in windows.iter().enumerate().skip(i + 1) {
            let Some((b_start, b_end)) = b else { continue };
            if a_start < b_end && b_start < a_end {
                flags[i] = true;
                flags[j] = true;
            }
        }
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn entry(name: &str, at: &str, duration: Option<u32>) -> ScheduleEntry {
        ScheduleEntry {
            id: Some(format!("{}-id", name)),
            name: Some(name.to_string()),
            entry_type: "campaign".into(),
            at: at.into(),
            duration,
        }
    }

    fn status(playlist: Vec<ScheduleEntry>) -> ScheduleStatus {
        ScheduleStatus {
            schedule_date: "26-06-2025".into(),
            playlist,
            is_valid_for_today: None,
            current_time: None,
            total_playlist_items: None,
            next_scheduled_time: None,
        }
    }

    #[test]
    fn classification_boundaries() {
        let start = at("2025-06-26", "14:00:00");
        let end = at("2025-06-26", "14:01:00");
        assert_eq!(classify(at("2025-06-26", "13:59:59"), start, end), EntryStatus::Future);
        assert_eq!(classify(start, start, end), EntryStatus::Current);
        assert_eq!(classify(at("2025-06-26", "14:00:30"), start, end), EntryStatus::Current);
        assert_eq!(classify(end, start, end), EntryStatus::Current);
        assert_eq!(classify(at("2025-06-26", "14:01:01"), start, end), EntryStatus::Past);
    }

    #[test]
    fn single_entry_over_the_minute() {
        let s = status(vec![entry("Spring", "14:00:00", Some(60))]);

        let current = render_schedule(&s, at("2025-06-26", "14:00:30"));
        assert_eq!(current.rows()[0].status, EntryStatus::Current);
        assert_eq!(current.focus(), Some(0));

        let future = render_schedule(&s, at("2025-06-26", "13:59:59"));
        assert_eq!(future.rows()[0].status, EntryStatus::Future);
        assert_eq!(future.focus(), None);

        let past = render_schedule(&s, at("2025-06-26", "14:01:01"));
        assert_eq!(past.rows()[0].status, EntryStatus::Past);
        assert_eq!(past.rows()[0].status.css_class(), "item-past");
    }

    #[test]
    fn date_is_day_month_year() {
        assert_eq!(
            parse_schedule_date("03-04-2025").unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 3).unwrap()
        );
        assert_eq!(
            parse_schedule_date("2025-04-03").unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 3).unwrap()
        );
        assert!(matches!(parse_schedule_date("04/03/2025"), Err(ScheduleError::BadDate(_))));
    }

    #[test]
    fn empty_playlist_renders_placeholder() {
        let view = render_schedule(&status(vec![]), at("2025-06-26", "12:00:00"));
        assert_eq!(view, ScheduleView::Empty(EMPTY_PLACEHOLDER.to_string()));
    }

    #[test]
    fn missing_duration_defaults_to_thirty_seconds() {
        let s = status(vec![entry("Filler", "10:00:00", None)]);
        let view = render_schedule(&s, at("2025-06-26", "10:00:31"));
        assert_eq!(view.rows()[0].duration_secs, 30);
        assert_eq!(view.rows()[0].status, EntryStatus::Past);
    }

    #[test]
    fn label_falls_back_to_id() {
        let mut e = entry("x", "09:00:00", None);
        e.name = None;
        assert_eq!(e.label(), "x-id");
    }

    #[test]
    fn focus_is_first_current_and_overlaps_are_flagged() {
        let s = status(vec![
            entry("Morning", "09:00:00", Some(60)),
            entry("Overlap A", "10:00:00", Some(120)),
            entry("Overlap B", "10:01:00", Some(60)),
            entry("Evening", "18:00:00", Some(60)),
        ]);
        let view = render_schedule(&s, at("2025-06-26", "10:01:30"));
        let statuses: Vec<_> = view.rows().iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                EntryStatus::Past,
                EntryStatus::Current,
                EntryStatus::Current,
                EntryStatus::Future
            ]
        );
        assert_eq!(view.focus(), Some(1));
        let overlaps: Vec<_> = view.rows().iter().map(|r| r.overlaps).collect();
        assert_eq!(overlaps, vec![false, true, true, false]);
    }

    #[test]
    fn back_to_back_entries_do_not_overlap() {
        let s = status(vec![
            entry("A", "10:00:00", Some(60)),
            entry("B", "10:01:00", Some(60)),
        ]);
        let view = render_schedule(&s, at("2025-06-26", "08:00:00"));
        assert!(view.rows().iter().all(|r| !r.overlaps));
    }

    #[test]
    fn visible_window_centres_focus() {
        assert_eq!(visible_window(5, 10, Some(4)), 0);
        assert_eq!(visible_window(50, 10, None), 0);
        assert_eq!(visible_window(50, 10, Some(20)), 15);
        assert_eq!(visible_window(50, 10, Some(2)), 0);
        assert_eq!(visible_window(50, 10, Some(48)), 40);
    }

    #[test]
    fn bad_entry_time_renders_as_future() {
        let s = status(vec![entry("Broken", "25:99", Some(60))]);
        let view = render_schedule(&s, at("2025-06-26", "23:00:00"));
        assert_eq!(view.rows()[0].status, EntryStatus::Future);
        assert_eq!(view.focus(), None);
    }

    #[test]
    fn bad_date_renders_inline_error() {
        let mut s = status(vec![entry("A", "10:00:00", None)]);
        s.schedule_date = "N/A".into();
        assert!(matches!(
            render_schedule(&s, at("2025-06-26", "10:00:00")),
            ScheduleView::Error(_)
        ));
    }

    #[test]
    fn parses_backend_snapshot() {
        let s: ScheduleStatus = serde_json::from_str(
            r#"{
                "schedule_date": "26-06-2025",
                "is_valid_for_today": true,
                "current_time": "14:00:30",
                "playlist": [
                    {"id": "c1", "type": "campaign", "at": "14:00:00", "duration": 60},
                    {"name": "Loop", "type": "filler", "at": "14:01:00"}
                ],
                "total_playlist_items": 2
            }"#,
        )
        .unwrap();
        assert_eq!(s.playlist.len(), 2);
        assert_eq!(s.playlist[0].label(), "c1");
        assert_eq!(s.playlist[1].duration_secs(), 30);
    }
}
