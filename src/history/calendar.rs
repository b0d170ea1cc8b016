use super::store::read_csv_table;
use super::table::parse_date;
use crate::gamma::config;
use crate::gamma::rules::UnknownLabel;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCalendarEntry {
    pub date: NaiveDate,
    pub event_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPhase {
    Event,
    PreEvent,
    PostEvent,
    None,
}

impl EventPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventPhase::Event => "EVENT",
            EventPhase::PreEvent => "PRE_EVENT",
            EventPhase::PostEvent => "POST_EVENT",
            EventPhase::None => "NONE",
        }
    }
}

impl fmt::Display for EventPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventPhase {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "EVENT" => Ok(EventPhase::Event),
            "PRE_EVENT" => Ok(EventPhase::PreEvent),
            "POST_EVENT" => Ok(EventPhase::PostEvent),
            "NONE" => Ok(EventPhase::None),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

/// Union of the static calendar files, keyed by date. Later files win on a shared date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventCalendar {
    events: BTreeMap<NaiveDate, String>,
}

impl EventCalendar {
    pub fn from_entries(entries: impl IntoIterator<Item = EventCalendarEntry>) -> Self {
        let mut events = BTreeMap::new();
        for entry in entries {
            events.insert(entry.date, entry.event_name);
        }
        Self { events }
    }

    /// Load `fomc.csv`, `cpi.csv`, `opex.csv` (columns `date,event`) from `dir`; missing files are skipped
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut entries = Vec::new();
        for file in config::CALENDAR_FILES {
            let path = dir.join(file);
            if !path.exists() {
                debug!(file = %path.display(), "calendar file not found, skipping");
                continue;
            }
            let table = read_csv_table(file, &path)
                .with_context(|| format!("reading calendar {}", path.display()))?;
            for row in 0..table.rows.len() {
                match parse_date(table.get(row, "date")) {
                    Some(date) => entries.push(EventCalendarEntry {
                        date,
                        event_name: table.get(row, "event").trim().to_string(),
                    }),
                    None => warn!(file = %path.display(), row, "unparsable calendar date"),
                }
            }
        }
        Ok(Self::from_entries(entries))
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// (is_event_day, event_type)
    pub fn resolve_event(&self, date: NaiveDate) -> (bool, String) {
        match self.events.get(&date) {
            Some(name) => (true, name.clone()),
            None => (false, "NONE".to_string()),
        }
    }

    pub fn resolve_phase(&self, date: NaiveDate) -> EventPhase {
        if self.events.is_empty() {
            EventPhase::None
        } else if self.events.contains_key(&date) {
            EventPhase::Event
        } else if self.events.range(date..).next().is_some() {
            EventPhase::PreEvent
        } else {
            EventPhase::PostEvent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn calendar() -> EventCalendar {
        EventCalendar::from_entries(vec![
            EventCalendarEntry { date: d("2025-01-29"), event_name: "FOMC".into() },
            EventCalendarEntry { date: d("2025-02-12"), event_name: "CPI".into() },
        ])
    }

    #[test]
    fn test_phases() {
        let cal = calendar();
        assert_eq!(cal.resolve_phase(d("2025-01-29")), EventPhase::Event);
        assert_eq!(cal.resolve_phase(d("2025-01-02")), EventPhase::PreEvent);
        assert_eq!(cal.resolve_phase(d("2025-02-01")), EventPhase::PreEvent);
        assert_eq!(cal.resolve_phase(d("2025-03-01")), EventPhase::PostEvent);
        assert_eq!(EventCalendar::default().resolve_phase(d("2025-03-01")), EventPhase::None);
        assert_eq!("PRE_EVENT".parse::<EventPhase>().unwrap(), EventPhase::PreEvent);
        assert!("pre_event".parse::<EventPhase>().is_err());
    }

    #[test]
    fn test_resolve_event() {
        let cal = calendar();
        assert_eq!(cal.resolve_event(d("2025-02-12")), (true, "CPI".to_string()));
        assert_eq!(cal.resolve_event(d("2025-02-13")), (false, "NONE".to_string()));
    }

    #[test]
    fn test_load_dir_unions_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fomc.csv"), "date,event\n2025-01-29,FOMC\nbad,FOMC\n").unwrap();
        std::fs::write(dir.path().join("opex.csv"), "date,event\n2025-01-17,OPEX\n").unwrap();

        let cal = EventCalendar::load_dir(dir.path()).unwrap();
        assert_eq!(cal.len(), 2);
        assert_eq!(cal.resolve_event(d("2025-01-17")).1, "OPEX");
    }
}
