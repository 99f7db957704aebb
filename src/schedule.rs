//! Week → title schedule backed by a YAML mapping.
//!
//! Schedules are written by more than one tool, so a seed key may be stored as an integer
//! (`202501:`) or as a string (`"202501":`). [`Schedule::lookup`] is the only place that knows
//! about both forms.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

use crate::content::scalar_text;
use crate::error::{DispatchError, Result};
use crate::week::{WeekSeed, WeekStatus};

/// One scheduled week: a bare title (legacy files) or a record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ScheduleEntry {
    Title(String),
    Record {
        #[serde(default, deserialize_with = "crate::content::scalar")]
        title: Option<String>,
        #[serde(default, alias = "identifier", deserialize_with = "crate::content::scalar")]
        game_id: Option<String>,
    },
}

impl ScheduleEntry {
    pub fn title(&self) -> Option<&str> {
        let title = match self {
            ScheduleEntry::Title(t) => Some(t.as_str()),
            ScheduleEntry::Record { title, .. } => title.as_deref(),
        };
        title.map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn game_id(&self) -> Option<&str> {
        match self {
            ScheduleEntry::Title(_) => None,
            ScheduleEntry::Record { game_id, .. } => {
                game_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    source: PathBuf,
    entries: Mapping,
}

impl Schedule {
    /// Load a schedule file. A missing, blank or empty file is `EmptySchedule`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DispatchError::EmptySchedule {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| DispatchError::Store {
            what: "schedule",
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&text, path)
    }

    pub fn from_yaml_str(text: &str, source: &Path) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text).map_err(|e| DispatchError::Store {
            what: "schedule",
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        let entries = match value {
            Value::Mapping(m) if !m.is_empty() => m,
            Value::Null | Value::Mapping(_) => {
                return Err(DispatchError::EmptySchedule {
                    path: source.to_path_buf(),
                })
            }
            other => {
                return Err(DispatchError::Store {
                    what: "schedule",
                    path: source.to_path_buf(),
                    reason: format!("expected a mapping of week seeds, found {}", kind_of(&other)),
                })
            }
        };
        Ok(Self {
            source: source.to_path_buf(),
            entries,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, seed: WeekSeed) -> Option<&Value> {
        let as_int = Value::Number(seed.as_number().into());
        let as_str = Value::String(seed.to_string());
        self.entries
            .get(&as_int)
            .or_else(|| self.entries.get(&as_str))
    }

    pub fn entry(&self, seed: WeekSeed) -> Result<ScheduleEntry> {
        let raw = self
            .lookup(seed)
            .ok_or(DispatchError::NotScheduled { seed })?;
        parse_entry(raw).map_err(|e| {
            warn!(%seed, error = %e, "schedule entry has an unexpected shape");
            DispatchError::NotScheduled { seed }
        })
    }

    /// Title scheduled for `seed`.
    pub fn resolve(&self, seed: WeekSeed) -> Result<String> {
        let entry = self.entry(seed)?;
        let Some(title) = entry.title() else {
            warn!(%seed, "schedule entry has no title");
            return Err(DispatchError::NotScheduled { seed });
        };
        info!(%seed, title, "resolved scheduled game");
        Ok(title.to_string())
    }

    /// First week whose record names `game_id`. Bare-title entries carry no id and are skipped.
    pub fn find_by_game_id(&self, game_id: &str) -> Option<(WeekSeed, ScheduleEntry)> {
        self.entries.iter().find_map(|(key, raw)| {
            let seed = seed_from_key(key)?;
            let entry = parse_entry(raw).ok()?;
            (entry.game_id() == Some(game_id)).then_some((seed, entry))
        })
    }

    /// Whether the site should list `game_id` as a past game of the week.
    pub fn prediction_status(&self, game_id: &str, today: NaiveDate) -> PredictionStatus {
        let Some((seed, _)) = self.find_by_game_id(game_id) else {
            return PredictionStatus::NotScheduled;
        };
        debug!(%seed, game_id, "found game in schedule");
        match seed.status_at(today) {
            WeekStatus::Past => PredictionStatus::Show(seed.to_date()),
            WeekStatus::Current | WeekStatus::Future => PredictionStatus::Hide,
        }
    }
}

// bare titles may come back from YAML as numbers (`202501: 1942`)
fn parse_entry(raw: &Value) -> std::result::Result<ScheduleEntry, serde_yaml::Error> {
    match scalar_text(raw.clone()) {
        Some(title) => Ok(ScheduleEntry::Title(title)),
        None => serde_yaml::from_value(raw.clone()),
    }
}

fn seed_from_key(key: &Value) -> Option<WeekSeed> {
    match key {
        Value::Number(n) => n.as_u64().and_then(|n| WeekSeed::from_number(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "nothing",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Output of the `status` command, consumed by the site build script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictionStatus {
    NotScheduled,
    Show(NaiveDate),
    Hide,
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionStatus::NotScheduled => f.write_str("NOT_IN_PREDICTIONS"),
            PredictionStatus::Show(date) => write!(f, "SHOW_GAME|{}", date.format("%Y-%m-%d")),
            PredictionStatus::Hide => f.write_str("HIDE_GAME"),
        }
    }
}
