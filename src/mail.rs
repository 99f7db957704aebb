//! ConvertKit broadcast channel and the credential probe behind `test-api`.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::compose::EmailContent;
use crate::error::{DispatchError, Result};
use crate::secret::Secret;
use crate::transport::Transport;

/// Selection label for the mailing list.
pub const EMAIL_LABEL: &str = "email";
const EMAIL_LABEL_ALIAS: &str = "ConvertKit Email";

pub fn is_email_label(label: &str) -> bool {
    label.eq_ignore_ascii_case(EMAIL_LABEL) || label.eq_ignore_ascii_case(EMAIL_LABEL_ALIAS)
}

/// Scheduled delivery time, `now + delay`, as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn send_at(now: DateTime<Utc>, delay_minutes: i64) -> String {
    (now + Duration::minutes(delay_minutes))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

pub fn broadcast_payload(secret: &Secret, email: &EmailContent, send_at: &str) -> Value {
    json!({
        "api_secret": secret.expose(),
        "description": email.description,
        "subject": email.subject,
        "send_at": send_at,
        "content": email.html,
    })
}

pub fn broadcasts_url(api_url: &str) -> String {
    format!("{}/broadcasts", api_url.trim_end_matches('/'))
}

/// Schedule the broadcast. Any non-2xx reply is a channel failure; a 401 also logs the
/// secret's shape.
pub async fn send_broadcast(
    transport: &dyn Transport,
    api_url: &str,
    secret: &Secret,
    email: &EmailContent,
    send_at: &str,
) -> Result<()> {
    let failure = |reason: String| DispatchError::ChannelSendFailure {
        label: EMAIL_LABEL.to_string(),
        kind: "convertkit".to_string(),
        reason,
    };
    let url = broadcasts_url(api_url);
    let payload = broadcast_payload(secret, email, send_at);
    let reply = transport
        .post_json(&url, &payload)
        .await
        .map_err(|e| failure(e.to_string()))?;
    if reply.status == 401 {
        error!(
            shape = %secret.shape(),
            "ConvertKit rejected the API secret; check CI variable masking, stray whitespace, \
             unsubstituted variables, or a test/production mix-up"
        );
    }
    if !reply.is_success() {
        return Err(failure(format!("HTTP {}: {}", reply.status, reply.body.trim())));
    }
    info!(status = reply.status, send_at, "broadcast scheduled");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub primary_email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountReply {
    account: Option<AccountInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub status: u16,
    pub body: String,
    pub account: Option<AccountInfo>,
}

impl ProbeReport {
    pub fn valid(&self) -> bool {
        self.status == 200
    }
}

/// One authenticated `GET /account`. An `Err` means the API could not be reached.
pub async fn probe_credentials(
    transport: &dyn Transport,
    api_url: &str,
    secret: &Secret,
) -> anyhow::Result<ProbeReport> {
    let url = format!("{}/account", api_url.trim_end_matches('/'));
    let reply = transport
        .get(&url, &[("api_secret", secret.expose())])
        .await?;
    let account = if reply.status == 200 {
        serde_json::from_str::<AccountReply>(&reply.body)
            .ok()
            .and_then(|r| r.account)
    } else {
        None
    };
    Ok(ProbeReport {
        status: reply.status,
        body: reply.body,
        account,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::check_secret;
    use crate::transport::testing::RecordingTransport;
    use chrono::TimeZone;

    fn secret() -> Secret {
        check_secret("CK", Some("sk_live_0123456789abcdefghij")).unwrap().0
    }

    fn email() -> EmailContent {
        EmailContent {
            subject: "🕹️ Jeu de la semaine - Galaxian".into(),
            description: "Galaxian".into(),
            html: "<html></html>".into(),
        }
    }

    #[test]
    fn send_at_is_an_hour_out_in_utc() {
        let now = Utc.with_ymd_and_hms(2025, 1, 6, 23, 30, 5).unwrap();
        assert_eq!(send_at(now, 60), "2025-01-07T00:30:05Z");
    }

    #[test]
    fn email_label_aliases() {
        assert!(is_email_label("email"));
        assert!(is_email_label("ConvertKit Email"));
        assert!(!is_email_label("discord"));
    }

    #[tokio::test]
    async fn broadcast_posts_the_expected_body() {
        let transport = RecordingTransport::default();
        send_broadcast(&transport, "https://ck.test/v3/", &secret(), &email(), "2025-01-07T00:30:05Z")
            .await
            .unwrap();
        let calls = transport.calls();
        assert_eq!(calls[0].url, "https://ck.test/v3/broadcasts");
        let body = calls[0].body.as_ref().unwrap();
        assert_eq!(body["subject"], "🕹️ Jeu de la semaine - Galaxian");
        assert_eq!(body["send_at"], "2025-01-07T00:30:05Z");
        assert_eq!(body["content"], "<html></html>");
    }

    #[tokio::test]
    async fn unauthorized_is_a_channel_failure() {
        let transport = RecordingTransport::default().reply(
            "https://ck.test/v3/broadcasts",
            401,
            r#"{"error":"Authorization Failed"}"#,
        );
        let err = send_broadcast(&transport, "https://ck.test/v3", &secret(), &email(), "x")
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("HTTP 401"));
    }

    #[tokio::test]
    async fn probe_reads_account_details() {
        let transport = RecordingTransport::default().reply(
            "https://ck.test/v3/account",
            200,
            r#"{"account":{"name":"BonjourArcade","id":42,"primary_email_address":"hi@arcade.test"}}"#,
        );
        let report = probe_credentials(&transport, "https://ck.test/v3", &secret())
            .await
            .unwrap();
        assert!(report.valid());
        let account = report.account.unwrap();
        assert_eq!(account.name.as_deref(), Some("BonjourArcade"));
        assert_eq!(account.id, Some(json!(42)));
        assert_eq!(transport.calls()[0].method, "GET");

        let rejected = RecordingTransport::default().reply("https://ck.test/v3/account", 401, "no");
        let report = probe_credentials(&rejected, "https://ck.test/v3", &secret())
            .await
            .unwrap();
        assert!(!report.valid());
        assert!(report.account.is_none());
    }

    #[tokio::test]
    async fn unreachable_api_error_hides_the_secret() {
        let transport = crate::transport::HttpTransport::new(std::time::Duration::from_secs(2)).unwrap();
        let err = probe_credentials(&transport, "http://127.0.0.1:9", &secret())
            .await
            .unwrap_err();
        let text = format!("{err:#}");
        assert!(!text.contains("sk_live_0123456789abcdefghij"), "{text}");
        assert!(!text.contains("api_secret"), "{text}");
    }
}
