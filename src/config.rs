use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "gotw.toml";

/// Runtime settings, read from an optional `gotw.toml`. Every field has a default.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub mail: MailSettings,
    pub links: LinkSettings,
    pub http: HttpSettings,
    pub highlight: HighlightSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathSettings {
    pub schedule: PathBuf,
    pub catalog: PathBuf,
    pub games_dir: PathBuf,
    pub webhook_map: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            schedule: PathBuf::from("public/plinko/predict/predictions.yaml"),
            catalog: PathBuf::from("public/gamelist.json"),
            games_dir: PathBuf::from("public/games"),
            webhook_map: PathBuf::from("webhook_map.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MailSettings {
    pub api_url: String,
    /// Environment variable holding the ConvertKit API secret.
    pub secret_env: String,
    pub send_delay_minutes: i64,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.convertkit.com/v3".to_string(),
            secret_env: "CONVERTKIT_API_SECRET".to_string(),
            send_delay_minutes: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LinkSettings {
    pub site_base: String,
    pub play_base: String,
    pub leaderboard_base: String,
    pub leaderboard_api: String,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            site_base: "https://bonjourarcade-f11f7f.gitlab.io".to_string(),
            play_base: "https://felx.cc/b".to_string(),
            leaderboard_base: "https://alloarcade.web.app/leaderboards".to_string(),
            leaderboard_api: "https://us-central1-alloarcade.cloudfunctions.net/listGameScores"
                .to_string(),
        }
    }
}

impl LinkSettings {
    pub fn cover_url(&self, game_id: &str) -> String {
        format!("{}/games/{}/cover.png", self.site_base.trim_end_matches('/'), game_id)
    }

    pub fn play_url(&self, game_id: &str) -> String {
        format!("{}/{}", self.play_base.trim_end_matches('/'), game_id)
    }

    pub fn leaderboard_url(&self, game_id: &str) -> String {
        format!("{}/{}", self.leaderboard_base.trim_end_matches('/'), game_id)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HighlightSettings {
    pub top_count: usize,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self { top_count: 3 }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing settings")
    }

    /// Load settings from `explicit`, else `./gotw.toml`, else the platform config dir.
    /// No file at all means defaults; an explicit path that is missing is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            return Self::from_toml_str(&text)
                .with_context(|| format!("invalid config: {}", path.display()));
        }
        match default_config_path() {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config: {}", path.display()))?;
                Self::from_toml_str(&text)
                    .with_context(|| format!("invalid config: {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    let dirs = ProjectDirs::from("cc", "bonjourarcade", "gotw")?;
    let path = dirs.config_dir().join(CONFIG_FILE);
    path.exists().then_some(path)
}

/// Environment variables captured once at startup and passed down explicitly.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
