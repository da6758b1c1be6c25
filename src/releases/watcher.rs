// Poll the sites of today's expected releases and raise an alert when one of them
// shows the new release date.

use std::{collections::VecDeque, error::Error, fs, path::Path};

use futures::future::join_all;
use jiff::{tz::TimeZone, ToSpan, Zoned};
use log::{error, info, warn};
use serde::Serialize;

use crate::{
    config::Settings,
    utils::send_email::{email_alert, email_release_schedule, release_message},
};

use super::{
    calendar::{next_releases, parse_event_body, CalendarEvent, EventDetails, ReleaseCalendar},
    site_check::{fetch_and_check, CheckOutcome, SiteCheck},
};

/// Minutes between looks for releases whose time has come.
pub const MAIN_TICK_MINUTES: i64 = 15;
/// Minutes between two checks of the same site.
pub const CHECK_EVERY_MINUTES: i64 = 5;
pub const RELEASE_DETECTED: &str = "Data Release Detected";

#[derive(Debug, Clone, PartialEq)]
pub struct WatchedRelease {
    pub event: CalendarEvent,
    pub details: EventDetails,
    pub check: SiteCheck,
    pub date_str: String,
}

impl WatchedRelease {
    /// None when the event body doesn't say how to check the site.
    pub fn from_event(event: CalendarEvent) -> Option<WatchedRelease> {
        let details = parse_event_body(&event.body);
        let (check, date_str) = details.site_check()?;
        Some(WatchedRelease {
            event,
            details,
            check,
            date_str,
        })
    }
}

#[derive(Debug, Clone)]
struct ActiveCheck {
    release: WatchedRelease,
    next_check: Zoned,
    until: Zoned,
}

/// Schedule of a day of release checks.  Releases wait in `pending` until their
/// time has elapsed, then get checked every few minutes until resolved or until
/// the end of their release day.
#[derive(Debug)]
pub struct ReleaseWatcher {
    pending: VecDeque<WatchedRelease>,
    active: Vec<ActiveCheck>,
    next_tick: Option<Zoned>,
}

impl ReleaseWatcher {
    pub fn new(events: Vec<CalendarEvent>) -> ReleaseWatcher {
        let mut releases: Vec<WatchedRelease> = Vec::new();
        for event in events {
            let title = event.title.clone();
            match WatchedRelease::from_event(event) {
                Some(release) => releases.push(release),
                None => warn!("Event '{}' has no site check details, skipping", title),
            }
        }
        releases.sort_by(|a, b| a.event.start.timestamp().cmp(&b.event.start.timestamp()));
        ReleaseWatcher {
            pending: releases.into(),
            active: Vec::new(),
            next_tick: None,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn active(&self) -> usize {
        self.active.len()
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }

    /// Releases to check at `now`.
    pub fn due(&mut self, now: &Zoned) -> Result<Vec<WatchedRelease>, Box<dyn Error>> {
        let tick = match &self.next_tick {
            Some(t) => now >= t,
            None => true,
        };
        if tick {
            while let Some(next) = self.pending.front() {
                if next.event.start > *now {
                    break;
                }
                if let Some(release) = self.pending.pop_front() {
                    let start = &release.event.start;
                    let until = start.date().tomorrow()?.to_zoned(start.time_zone().clone())?;
                    info!("'{}' is now active, checking until {}", release.event.title, until);
                    self.active.push(ActiveCheck {
                        release,
                        next_check: now.clone(),
                        until,
                    });
                }
            }
            self.next_tick = Some(now.checked_add(MAIN_TICK_MINUTES.minutes())?);
        }

        self.active.retain(|a| {
            let alive = *now < a.until;
            if !alive {
                warn!("'{}' was not detected on its release day", a.release.event.title);
            }
            alive
        });

        let mut due = Vec::new();
        for a in self.active.iter_mut() {
            if a.next_check <= *now {
                due.push(a.release.clone());
                a.next_check = now.checked_add(CHECK_EVERY_MINUTES.minutes())?;
            }
        }
        Ok(due)
    }

    /// Stop checking the release with this uid.
    pub fn resolve(&mut self, ical_uid: &str) {
        self.active.retain(|a| a.release.event.ical_uid != ical_uid);
    }

    /// When `due` next has something to do.
    pub fn next_wakeup(&self) -> Option<Zoned> {
        let tick = if self.pending.is_empty() {
            None
        } else {
            self.next_tick.clone()
        };
        self.active
            .iter()
            .map(|a| a.next_check.clone())
            .chain(tick)
            .min()
    }
}

/// Written at the start of the day so the day's schedule can be inspected.
#[derive(Debug, Serialize)]
pub struct NextDaySummary {
    pub next_dt: Option<Zoned>,
    pub calendar_path: String,
    pub meta: String,
    pub full_info: Vec<CalendarEvent>,
}

impl NextDaySummary {
    pub fn new(calendar_path: String, tz: &TimeZone, events: Vec<CalendarEvent>) -> NextDaySummary {
        NextDaySummary {
            next_dt: events.first().map(|e| e.start.clone()),
            calendar_path,
            meta: format!(
                "Gives datetimes in the {} timezone.",
                tz.iana_name().unwrap_or("system")
            ),
            full_info: events,
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Wrote next day summary to {}", path.display());
        Ok(())
    }
}

/// Settle a detected release once its alert has been attempted.
///
/// A failed alert is logged and the release stays active, so the next check
/// tries again.  Once the alert is out the release is resolved even if the
/// calendar cannot be updated, otherwise it would be reported every few minutes.
/// Returns whether the release was resolved.
pub fn settle_release<C: ReleaseCalendar>(
    calendar: &mut C,
    watcher: &mut ReleaseWatcher,
    release: &WatchedRelease,
    now: &Zoned,
    alert: Result<(), Box<dyn Error>>,
) -> bool {
    let uid = &release.event.ical_uid;
    if let Err(e) = alert {
        error!("Failed to send the alert for '{}': {}", release.event.title, e);
        return false;
    }
    if let Err(e) = calendar.cancel_event(uid, now) {
        error!("Failed to cancel '{}' in {}: {}", uid, calendar.label(), e);
    }
    watcher.resolve(uid);
    true
}

/// Run the checks of the releases due today, sleeping in between.  Returns once
/// every release is detected or its day is over.  With `email_schedule` the
/// day's expected releases are emailed first.
pub async fn run<C: ReleaseCalendar>(
    calendar: &mut C,
    settings: &Settings,
    tz: &TimeZone,
    email_schedule: bool,
) -> Result<(), Box<dyn Error>> {
    let today = Zoned::now().with_time_zone(tz.clone()).date();
    let next_day = next_releases(&*calendar, 1, tz, today)?;
    let summary = NextDaySummary::new(calendar.label(), tz, next_day);
    summary.write(&settings.next_day_summary_path())?;

    let todays: Vec<CalendarEvent> = summary
        .full_info
        .iter()
        .filter(|e| e.start.date() == today)
        .cloned()
        .collect();
    info!("{} releases expected today", todays.len());
    if email_schedule && !todays.is_empty() {
        if let Err(e) = email_release_schedule(settings, &todays).await {
            error!("Failed to email today's release schedule: {}", e);
        }
    }
    let mut watcher = ReleaseWatcher::new(todays);

    let client = reqwest::Client::new();
    while !watcher.is_finished() {
        let now = Zoned::now().with_time_zone(tz.clone());
        let due = watcher.due(&now)?;
        let outcomes = join_all(
            due.iter()
                .map(|r| fetch_and_check(&client, &r.check, &r.date_str)),
        )
        .await;

        for (release, outcome) in due.iter().zip(outcomes) {
            match outcome {
                CheckOutcome::Updated(text) => {
                    info!("Release detected for '{}': {}", release.event.title, text);
                    let message = release_message(&release.event, &release.details, &text);
                    let alert = email_alert(settings, &message, RELEASE_DETECTED).await;
                    settle_release(calendar, &mut watcher, release, &now, alert);
                }
                CheckOutcome::NotUpdated(text) => {
                    info!("'{}' not released yet, page shows: {}", release.event.title, text)
                }
                CheckOutcome::Failed(reason) => {
                    warn!("Check of '{}' failed: {}", release.event.title, reason)
                }
            }
        }

        if let Some(wakeup) = watcher.next_wakeup() {
            let now = Zoned::now();
            if wakeup > now {
                let wait = now.duration_until(&wakeup).unsigned_abs();
                tokio::time::sleep(wait).await;
            }
        }
    }
    info!("No releases left to check today");
    Ok(())
}
