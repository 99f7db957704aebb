//! Error taxonomy for the week-resolution and dispatch core.
//!
//! Resolution-chain errors (`NotScheduled`, `EmptySchedule`, `NoMatch`, `MissingFields`,
//! `EmptyAnnouncement`) abort a run before any network call. `ChannelSendFailure` is
//! channel-local and is collected into the run report instead of propagating.

use std::path::PathBuf;
use thiserror::Error;

use crate::week::WeekSeed;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid week seed `{0}` (expected YYYYWW, week 1-53)")]
    InvalidSeed(String),

    #[error("no game scheduled for week {seed}")]
    NotScheduled { seed: WeekSeed },

    #[error("schedule store is missing or empty: {}", path.display())]
    EmptySchedule { path: PathBuf },

    #[error("no catalog entry matches title `{title}`")]
    NoMatch { title: String },

    #[error("could not read content record for `{game_id}` ({}): {reason}", path.display())]
    RecordUnavailable {
        game_id: String,
        path: PathBuf,
        reason: String,
    },

    #[error("content record for `{game_id}` is missing required fields: {}", fields.join(", "))]
    MissingFields {
        game_id: String,
        path: PathBuf,
        fields: Vec<&'static str>,
    },

    #[error("announcement message for `{game_id}` is empty")]
    EmptyAnnouncement { game_id: String, path: PathBuf },

    #[error("could not read {what} ({}): {reason}", path.display())]
    Store {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("secret `{env_var}` is not set")]
    MissingCredential { env_var: String },

    #[error("secret `{env_var}` looks malformed: {reason}")]
    MalformedCredential { env_var: String, reason: String },

    #[error("send to `{label}` ({kind}) failed: {reason}")]
    ChannelSendFailure {
        label: String,
        kind: String,
        reason: String,
    },
}

impl DispatchError {
    /// True for failures that stop a run before anything is sent.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DispatchError::ChannelSendFailure { .. })
    }

    /// Concrete remedy for the operator, printed under the error line.
    pub fn fix_hint(&self) -> String {
        match self {
            DispatchError::InvalidSeed(_) => {
                "pass the week as YYYYWW, for example: --week-seed 202501".to_string()
            }
            DispatchError::NotScheduled { seed } => format!(
                "add an entry for this week to the schedule, for example:\n   {seed}:\n     title: \"Galaxian\"\n     game_id: \"galaxian\""
            ),
            DispatchError::EmptySchedule { path } => format!(
                "create {} with one entry per week, for example:\n   202501: \"Galaxian\"",
                path.display()
            ),
            DispatchError::NoMatch { title } => format!(
                "make sure the catalog lists a game titled \"{title}\" (gameOfTheWeek, previousGames or games)"
            ),
            DispatchError::RecordUnavailable { path, .. } => {
                format!("create or repair {}", path.display())
            }
            DispatchError::MissingFields { path, fields, .. } => {
                let mut hint = format!("add the missing fields to {}:", path.display());
                for field in fields {
                    match *field {
                        "controls" => hint.push_str(
                            "\n   controls:\n     - '🕹️ Use arrow keys to move'\n     - '🔴 Press SPACE to jump'",
                        ),
                        "to_start" => hint.push_str(
                            "\n   to_start: 'Press START or click the play button to begin'",
                        ),
                        other => hint.push_str(&format!("\n   {other}: ...")),
                    }
                }
                hint
            }
            DispatchError::EmptyAnnouncement { path, .. } => format!(
                "add an announcement to {}:\n   announcement_message: \"Ce jeu classique de plateforme vous emmène dans une aventure...\"\nor run with: --custom-message \"Your announcement text here\"",
                path.display()
            ),
            DispatchError::Store { path, .. } => format!("check that {} exists and parses", path.display()),
            DispatchError::MissingCredential { env_var } => {
                format!("export {env_var}=<your API secret> before running")
            }
            DispatchError::MalformedCredential { env_var, .. } => format!(
                "re-set {env_var} without quotes, spaces or unexpanded `$VARIABLE` references"
            ),
            DispatchError::ChannelSendFailure { label, .. } => {
                format!("re-run with --webhook-label {label} --dry-run to inspect the payload")
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
