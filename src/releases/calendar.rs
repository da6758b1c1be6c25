use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use jiff::{civil::Date, tz::TimeZone, ToSpan, Zoned};
use log::info;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::site_check::SiteCheck;

#[derive(Error, Debug, PartialEq)]
pub enum CalendarError {
    #[error("{0} should be a positive integer")]
    InvalidDays(i64),
    #[error("there are multiple events with ical_uid {0} today, only one can be cancelled at a time")]
    AmbiguousEvent(String),
    #[error("no event with ical_uid {0}")]
    EventNotFound(String),
}

/// An expected data release.
///
/// The body carries `key: value` lines describing what to check, e.g.
/// ```text
/// files: rentalbond-data-regional.csv
/// url: https://www.tenancy.govt.nz/about-tenancy-services/data-and-statistics/rental-bond-data/
/// text_template: By region, January 1993 - <date_str>
/// date_str: July 2021
/// selector: a[href$="rentalbond-data-regional.csv"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub ical_uid: String,
    pub title: String,
    pub start: Zoned,
    pub end: Zoned,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EventDetails {
    pub files: Vec<String>,
    pub url: Option<String>,
    pub script: Option<String>,
    pub text_template: Option<String>,
    pub date_str: Option<String>,
    pub selector: Option<String>,
}

impl EventDetails {
    /// The site check and the date string to look for, when the event has all of
    /// url, text_template, date_str and selector.
    pub fn site_check(&self) -> Option<(SiteCheck, String)> {
        Some((
            SiteCheck {
                url: self.url.clone()?,
                text_template: self.text_template.clone()?,
                selector: self.selector.clone()?,
            },
            self.date_str.clone()?,
        ))
    }
}

fn key_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(files|url|script|text_template|date_str|selector)\s*:(.*)$").unwrap()
    })
}

fn html_text(fragment: &str) -> String {
    Html::parse_fragment(fragment)
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}

/// Pull the href out of an `<a>` anchor if there is one, else take the text.
fn link_target(value: &str) -> String {
    if value.contains("<a") {
        let fragment = Html::parse_fragment(value);
        if let Ok(anchor) = Selector::parse("a[href]") {
            if let Some(href) = fragment
                .select(&anchor)
                .next()
                .and_then(|a| a.value().attr("href"))
            {
                return href.trim().to_string();
            }
        }
    }
    html_text(value)
}

pub fn parse_event_body(body: &str) -> EventDetails {
    let mut details = EventDetails::default();
    for line in body.lines() {
        let Some(caps) = key_value_re().captures(line) else {
            continue;
        };
        let value = caps[2].trim();
        match caps[1].to_ascii_lowercase().as_str() {
            "files" => details.files.push(value.to_string()),
            "url" => details.url = Some(link_target(value)),
            "script" => details.script = Some(html_text(value)),
            "text_template" => details.text_template = Some(value.to_string()),
            "date_str" => details.date_str = Some(value.to_string()),
            "selector" => details.selector = Some(value.to_string()),
            _ => {}
        }
    }
    details
}

pub trait ReleaseCalendar {
    fn events(&self) -> Result<Vec<CalendarEvent>, Box<dyn Error>>;

    /// Cancel the occurrence of `ical_uid` that starts on the date of `today`, in the
    /// time zone of `today`.  Recurring events share their uid, so only that single
    /// occurrence goes.  No-op if there is none.
    fn cancel_event(&mut self, ical_uid: &str, today: &Zoned) -> Result<(), Box<dyn Error>>;

    /// Shift an event by the given days, hours and minutes.  Each part may be
    /// negative independently, e.g. one day later but an hour earlier.
    fn move_event(
        &mut self,
        ical_uid: &str,
        days: i64,
        hours: i64,
        minutes: i64,
    ) -> Result<(), Box<dyn Error>>;

    fn label(&self) -> String;
}

/// Calendar events persisted as a JSON array.
#[derive(Debug, Clone)]
pub struct FileCalendar {
    pub path: PathBuf,
}

impl FileCalendar {
    pub fn new(path: &Path) -> FileCalendar {
        FileCalendar {
            path: path.to_path_buf(),
        }
    }

    fn save(&self, events: &[CalendarEvent]) -> Result<(), Box<dyn Error>> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(events)?)?;
        Ok(())
    }
}

impl ReleaseCalendar for FileCalendar {
    fn events(&self) -> Result<Vec<CalendarEvent>, Box<dyn Error>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn cancel_event(&mut self, ical_uid: &str, today: &Zoned) -> Result<(), Box<dyn Error>> {
        let mut events = self.events()?;
        let tz = today.time_zone();
        let matches: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                e.ical_uid == ical_uid
                    && !e.cancelled
                    && e.start.with_time_zone(tz.clone()).date() == today.date()
            })
            .map(|(i, _)| i)
            .collect();
        match matches.as_slice() {
            [] => Ok(()),
            [i] => {
                events[*i].cancelled = true;
                self.save(&events)?;
                info!("cancelled event {} on {}", ical_uid, today.date());
                Ok(())
            }
            _ => Err(Box::new(CalendarError::AmbiguousEvent(ical_uid.to_string()))),
        }
    }

    fn move_event(
        &mut self,
        ical_uid: &str,
        days: i64,
        hours: i64,
        minutes: i64,
    ) -> Result<(), Box<dyn Error>> {
        let mut events = self.events()?;
        let event = events
            .iter_mut()
            .find(|e| e.ical_uid == ical_uid && !e.cancelled)
            .ok_or_else(|| CalendarError::EventNotFound(ical_uid.to_string()))?;
        let shift = |dt: &Zoned| -> Result<Zoned, jiff::Error> {
            dt.checked_add(days.days())?
                .checked_add(hours.hours())?
                .checked_add(minutes.minutes())
        };
        event.start = shift(&event.start)?;
        event.end = shift(&event.end)?;
        self.save(&events)
    }

    fn label(&self) -> String {
        self.path.display().to_string()
    }
}

/// Events of the next `days` days (today included), expressed in `tz` and ordered
/// by expected release time.
pub fn next_releases<C: ReleaseCalendar>(
    calendar: &C,
    days: i64,
    tz: &TimeZone,
    today: Date,
) -> Result<Vec<CalendarEvent>, Box<dyn Error>> {
    if days < 1 {
        return Err(Box::new(CalendarError::InvalidDays(days)));
    }
    let last = today.checked_add(days.days())?;
    let mut events: Vec<CalendarEvent> = calendar
        .events()?
        .into_iter()
        .filter(|e| !e.cancelled)
        .map(|mut e| {
            e.start = e.start.with_time_zone(tz.clone());
            e.end = e.end.with_time_zone(tz.clone());
            e
        })
        .filter(|e| e.start.date() >= today && e.end.date() <= last)
        .collect();
    events.sort_by(|a, b| a.start.timestamp().cmp(&b.start.timestamp()));
    Ok(events)
}
