//! Per-game metadata records and the publication checks run on them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

use crate::error::{DispatchError, Result};

/// `metadata.yaml` for one game, as written by hand. Every field is optional on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentRecord {
    #[serde(skip)]
    pub game_id: String,
    #[serde(skip)]
    pub source: PathBuf,
    #[serde(default, deserialize_with = "scalar")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub developer: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "lines")]
    pub controls: Option<Vec<String>>,
    #[serde(default, deserialize_with = "scalar")]
    pub to_start: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub announcement_message: Option<String>,
}

/// A record that passed [`ContentRecord::validate`]; `controls` and `to_start` are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRecord {
    pub game_id: String,
    pub source: PathBuf,
    pub title: String,
    pub developer: String,
    pub year: String,
    pub genre: String,
    pub controls: Vec<String>,
    pub to_start: String,
    pub announcement_message: Option<String>,
}

pub fn record_path(games_dir: &Path, game_id: &str) -> PathBuf {
    games_dir.join(game_id).join("metadata.yaml")
}

impl ContentRecord {
    pub fn load(games_dir: &Path, game_id: &str) -> Result<Self> {
        let path = record_path(games_dir, game_id);
        let unavailable = |reason: String| DispatchError::RecordUnavailable {
            game_id: game_id.to_string(),
            path: path.clone(),
            reason,
        };
        let text = std::fs::read_to_string(&path).map_err(|e| unavailable(e.to_string()))?;
        let mut record = Self::from_yaml_str(&text).map_err(|e| unavailable(e.to_string()))?;
        record.game_id = game_id.to_string();
        record.source = path;
        Ok(record)
    }

    pub fn from_yaml_str(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        match serde_yaml::from_str::<Value>(text)? {
            Value::Null => Ok(Self::default()),
            value => serde_yaml::from_value(value),
        }
    }

    /// Names of required fields that are absent or blank, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.controls.as_ref().map_or(true, Vec::is_empty) {
            missing.push("controls");
        }
        if self.to_start.as_deref().map_or(true, |s| s.trim().is_empty()) {
            missing.push("to_start");
        }
        missing
    }

    /// Check publication requirements, reporting every missing field at once.
    pub fn validate(self) -> Result<ValidatedRecord> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(DispatchError::MissingFields {
                game_id: self.game_id,
                path: self.source,
                fields: missing,
            });
        }
        let title = non_blank(self.title).unwrap_or_else(|| self.game_id.clone());
        Ok(ValidatedRecord {
            title,
            developer: non_blank(self.developer).unwrap_or_else(|| "Inconnu".to_string()),
            year: non_blank(self.year).unwrap_or_else(|| "Inconnue".to_string()),
            genre: non_blank(self.genre).unwrap_or_else(|| "Non spécifié".to_string()),
            controls: self.controls.unwrap_or_default(),
            to_start: self.to_start.unwrap_or_default(),
            announcement_message: non_blank(self.announcement_message),
            game_id: self.game_id,
            source: self.source,
        })
    }
}

impl ValidatedRecord {
    /// The announcement to publish: a non-blank override wins over the record's own text.
    pub fn effective_announcement(&self, message_override: Option<&str>) -> Option<String> {
        message_override
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .or_else(|| self.announcement_message.clone())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub(crate) fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

// YAML happily types `year: 1981` or `title: 1942` as numbers
pub(crate) fn scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

fn lines<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Sequence(items) => Some(items.into_iter().filter_map(scalar_text).collect()),
        _ => None,
    })
}
