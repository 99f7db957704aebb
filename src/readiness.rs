//! Pre-flight checks: is a week's announcement ready, and where does a game sit in the schedule.

use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::warn;

use crate::catalog::Catalog;
use crate::config::Settings;
use crate::content::{record_path, ContentRecord};
use crate::error::{DispatchError, Result};
use crate::schedule::{PredictionStatus, Schedule};
use crate::week::WeekSeed;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub seed: WeekSeed,
    pub title: String,
    pub game_id: String,
    pub record_path: PathBuf,
    pub missing_fields: Vec<&'static str>,
    pub has_announcement: bool,
}

impl Readiness {
    pub fn ready(&self) -> bool {
        self.missing_fields.is_empty() && self.has_announcement
    }

    /// Literal YAML to add to the record, one block per gap.
    pub fn fixes(&self) -> Vec<String> {
        let mut fixes = Vec::new();
        if !self.missing_fields.is_empty() {
            fixes.push(
                DispatchError::MissingFields {
                    game_id: self.game_id.clone(),
                    path: self.record_path.clone(),
                    fields: self.missing_fields.clone(),
                }
                .fix_hint(),
            );
        }
        if !self.has_announcement {
            fixes.push(
                DispatchError::EmptyAnnouncement {
                    game_id: self.game_id.clone(),
                    path: self.record_path.clone(),
                }
                .fix_hint(),
            );
        }
        fixes
    }
}

/// Resolve `seed` through schedule, catalog and record, and report what is still missing.
/// Resolution failures are returned as errors; content gaps are part of the report.
pub fn check_week(settings: &Settings, seed: WeekSeed) -> Result<Readiness> {
    let schedule = Schedule::load(&settings.paths.schedule)?;
    let title = schedule.resolve(seed)?;
    let matched = Catalog::load(&settings.paths.catalog)?.find_identifier(&title)?;
    let record = ContentRecord::load(&settings.paths.games_dir, &matched.id)?;
    Ok(Readiness {
        seed,
        title,
        record_path: record_path(&settings.paths.games_dir, &matched.id),
        missing_fields: record.missing_fields(),
        has_announcement: record
            .announcement_message
            .as_deref()
            .is_some_and(|m| !m.trim().is_empty()),
        game_id: matched.id,
    })
}

/// Where `game_id` sits in the schedule relative to `today`. An absent or unreadable schedule
/// counts as "not scheduled".
pub fn schedule_status(settings: &Settings, game_id: &str, today: NaiveDate) -> PredictionStatus {
    match Schedule::load(&settings.paths.schedule) {
        Ok(schedule) => schedule.prediction_status(game_id, today),
        Err(DispatchError::EmptySchedule { .. }) => PredictionStatus::NotScheduled,
        Err(e) => {
            warn!(error = %e, "schedule unreadable");
            PredictionStatus::NotScheduled
        }
    }
}
