//! Chat webhook destinations: the label map, per-kind envelopes and delivery.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};
use url::Url;

use crate::compose::ChatTemplate;
use crate::config::EnvSnapshot;
use crate::error::{DispatchError, Result};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    Discord,
    GoogleChat,
}

impl WebhookKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "discord" => Some(WebhookKind::Discord),
            "googlechat" => Some(WebhookKind::GoogleChat),
            _ => None,
        }
    }

    /// JSON key that carries the message text.
    pub fn envelope_key(&self) -> &'static str {
        match self {
            WebhookKind::Discord => "content",
            WebhookKind::GoogleChat => "text",
        }
    }

    pub fn bold_marker(&self) -> &'static str {
        match self {
            WebhookKind::Discord => "**",
            WebhookKind::GoogleChat => "*",
        }
    }

    pub fn payload(&self, template: &ChatTemplate) -> Value {
        let mut envelope = Map::new();
        envelope.insert(
            self.envelope_key().to_string(),
            Value::String(template.render(self.bold_marker())),
        );
        Value::Object(envelope)
    }
}

impl fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WebhookKind::Discord => "discord",
            WebhookKind::GoogleChat => "googlechat",
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawWebhook {
    #[serde(default)]
    env: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// One label as declared in the map file, before its environment variable is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEntry {
    pub label: String,
    pub env: Option<String>,
    pub kind: Option<String>,
}

/// Label -> `{env, type}` map, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct WebhookMap {
    entries: Vec<WebhookEntry>,
}

impl WebhookMap {
    /// A missing or unparsable map is not fatal: webhooks are skipped with a warning.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "webhook map not readable, skipping webhooks");
                return Self::default();
            }
        };
        match Self::from_json_str(&text, path) {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "skipping webhooks");
                Self::default()
            }
        }
    }

    pub fn from_json_str(text: &str, source: &Path) -> Result<Self> {
        let raw: Map<String, Value> =
            serde_json::from_str(text).map_err(|e| DispatchError::Store {
                what: "webhook map",
                path: source.to_path_buf(),
                reason: e.to_string(),
            })?;
        let entries = raw
            .into_iter()
            .map(|(label, value)| {
                let hook: RawWebhook = serde_json::from_value(value).unwrap_or_default();
                WebhookEntry {
                    label,
                    env: hook.env,
                    kind: hook.kind,
                }
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[WebhookEntry] {
        &self.entries
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn get(&self, label: &str) -> Option<&WebhookEntry> {
        self.entries.iter().find(|e| e.label == label)
    }
}

/// A webhook ready to receive a payload.
#[derive(Debug, Clone)]
pub struct Webhook {
    pub label: String,
    pub env_var: String,
    pub kind: WebhookKind,
    pub url: Url,
}

#[derive(Debug)]
pub enum Unresolved {
    /// Not configured for this environment; warn and move on.
    Skip(String),
    /// Configured but unusable; counts as a failed send.
    Fail(DispatchError),
}

impl WebhookEntry {
    pub fn resolve(&self, env: &EnvSnapshot) -> std::result::Result<Webhook, Unresolved> {
        let kind_name = self.kind.as_deref().unwrap_or("<none>");
        let Some(kind) = WebhookKind::parse(kind_name) else {
            return Err(Unresolved::Skip(format!("unknown webhook type `{kind_name}`")));
        };
        let Some(env_var) = self.env.as_deref().filter(|v| !v.is_empty()) else {
            return Err(Unresolved::Skip("no `env` entry in the webhook map".to_string()));
        };
        let Some(raw_url) = env.get(env_var).map(str::trim).filter(|v| !v.is_empty()) else {
            return Err(Unresolved::Skip(format!("env var `{env_var}` is not set")));
        };
        let url = Url::parse(raw_url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| {
                Unresolved::Fail(DispatchError::ChannelSendFailure {
                    label: self.label.clone(),
                    kind: kind.to_string(),
                    reason: format!("`{env_var}` does not hold an http(s) URL"),
                })
            })?;
        Ok(Webhook {
            label: self.label.clone(),
            env_var: env_var.to_string(),
            kind,
            url,
        })
    }
}

impl Webhook {
    pub fn payload(&self, template: &ChatTemplate) -> Value {
        self.kind.payload(template)
    }

    pub async fn send(&self, transport: &dyn Transport, payload: &Value) -> Result<()> {
        let failure = |reason: String| DispatchError::ChannelSendFailure {
            label: self.label.clone(),
            kind: self.kind.to_string(),
            reason,
        };
        let reply = transport
            .post_json(self.url.as_str(), payload)
            .await
            .map_err(|e| failure(e.to_string()))?;
        if !reply.is_success() {
            let body: String = reply.body.chars().take(200).collect();
            return Err(failure(format!("HTTP {}: {}", reply.status, body.trim())));
        }
        info!(label = %self.label, kind = %self.kind, env = %self.env_var, "webhook message sent");
        Ok(())
    }
}
