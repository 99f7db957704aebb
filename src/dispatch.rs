//! End-to-end run: resolve the week's game, compose the announcement, fan out to channels.
//!
//! A run walks [`Stage`]s in order. Every stage up to `Compose` is fatal on error and happens
//! before any outbound request; `FetchHighlight` is the exception and only ever degrades to
//! "no highlight". During `Dispatch` each channel is attempted on its own and its outcome is
//! recorded in the [`SubRunReport`], so one broken webhook never stops the others.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogMatch};
use crate::channels::{Unresolved, WebhookEntry, WebhookMap};
use crate::compose::{compose, Composition};
use crate::config::{EnvSnapshot, Settings};
use crate::content::{ContentRecord, ValidatedRecord};
use crate::error::{DispatchError, Result};
use crate::highlight::{fetch_top_scores, sample_scores, HighlightRecord};
use crate::mail::{self, is_email_label, EMAIL_LABEL};
use crate::schedule::Schedule;
use crate::secret::Secret;
use crate::transport::Transport;
use crate::week::WeekSeed;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookSelection {
    None,
    All,
    Only(String),
}

/// What one sub-run sends. Built from the command line and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
    pub email: bool,
    pub webhooks: WebhookSelection,
    pub dry_run: bool,
    pub week: Option<WeekSeed>,
    pub message_override: Option<String>,
    pub webhook_map: PathBuf,
}

/// Channel-selection flags as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    pub dry_run: bool,
    pub mail_only: bool,
    pub webhook_only: bool,
    pub all_channels: bool,
    pub webhook_label: Option<String>,
    pub select: Vec<String>,
    pub week: Option<WeekSeed>,
    pub message_override: Option<String>,
    pub webhook_map: PathBuf,
}

/// Turn flags into independent sub-runs.
///
/// An explicit selection gives one mail-only sub-run if the email label is selected, then one
/// webhook-only sub-run per selected webhook label. Without a selection: `--all-channels`
/// sends everything in one pass, a webhook label or `--webhook-only` sends webhooks only, and
/// anything else sends the email only.
pub fn plan_sub_runs(flags: &RunFlags) -> Vec<DispatchPlan> {
    let plan = |email: bool, webhooks: WebhookSelection| DispatchPlan {
        email,
        webhooks,
        dry_run: flags.dry_run,
        week: flags.week,
        message_override: flags.message_override.clone(),
        webhook_map: flags.webhook_map.clone(),
    };

    if !flags.select.is_empty() {
        let mut plans = Vec::new();
        if flags.select.iter().any(|l| is_email_label(l)) {
            plans.push(plan(true, WebhookSelection::None));
        }
        let mut seen: Vec<&str> = Vec::new();
        for label in flags.select.iter().filter(|l| !is_email_label(l)) {
            if !seen.contains(&label.as_str()) {
                seen.push(label);
                plans.push(plan(false, WebhookSelection::Only(label.clone())));
            }
        }
        return plans;
    }
    if flags.mail_only {
        return vec![plan(true, WebhookSelection::None)];
    }
    if flags.all_channels {
        return vec![plan(true, WebhookSelection::All)];
    }
    if let Some(label) = &flags.webhook_label {
        return vec![plan(false, WebhookSelection::Only(label.clone()))];
    }
    if flags.webhook_only {
        return vec![plan(false, WebhookSelection::All)];
    }
    vec![plan(true, WebhookSelection::None)]
}

pub fn needs_secret(plans: &[DispatchPlan]) -> bool {
    plans.iter().any(|p| p.email)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveWeek,
    ResolveTitle,
    ResolveIdentifier,
    LoadRecord,
    Validate,
    FetchHighlight,
    Compose,
    Dispatch,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ResolveWeek => "resolve-week",
            Stage::ResolveTitle => "resolve-title",
            Stage::ResolveIdentifier => "resolve-identifier",
            Stage::LoadRecord => "load-record",
            Stage::Validate => "validate",
            Stage::FetchHighlight => "fetch-highlight",
            Stage::Compose => "compose",
            Stage::Dispatch => "dispatch",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum ChannelOutcome {
    Sent,
    /// Dry run: what would have been sent.
    Previewed(String),
    Skipped(String),
    Failed(DispatchError),
}

impl ChannelOutcome {
    pub fn delivered(&self) -> bool {
        matches!(self, ChannelOutcome::Sent | ChannelOutcome::Previewed(_))
    }
}

#[derive(Debug)]
pub struct ChannelReport {
    pub label: String,
    pub kind: String,
    pub outcome: ChannelOutcome,
}

/// Everything the resolution stages produced, ready to dispatch.
#[derive(Debug)]
pub struct Prepared {
    pub seed: WeekSeed,
    pub title: String,
    pub matched: CatalogMatch,
    pub record: ValidatedRecord,
    pub highlight: Option<HighlightRecord>,
    pub composition: Composition,
}

#[derive(Debug)]
pub struct SubRunReport {
    pub plan: DispatchPlan,
    pub seed: WeekSeed,
    pub game_id: String,
    pub channels: Vec<ChannelReport>,
}

impl SubRunReport {
    /// The email, when planned, is the primary channel and must go through; webhooks riding
    /// along with it never fail the pass. A webhook-only pass over every label needs at least
    /// one delivery, and a single requested label must itself be delivered.
    pub fn succeeded(&self) -> bool {
        let (email, hooks): (Vec<_>, Vec<_>) =
            self.channels.iter().partition(|c| c.kind == "convertkit");
        if self.plan.email {
            return !email.is_empty() && email.iter().all(|c| c.outcome.delivered());
        }
        match &self.plan.webhooks {
            WebhookSelection::None => true,
            WebhookSelection::All => hooks.iter().any(|c| c.outcome.delivered()),
            WebhookSelection::Only(_) => {
                !hooks.is_empty() && hooks.iter().all(|c| c.outcome.delivered())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub sub_runs: Vec<SubRunReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.sub_runs.iter().all(SubRunReport::succeeded)
    }
}

pub struct Dispatcher<'a> {
    settings: &'a Settings,
    env: &'a EnvSnapshot,
    transport: &'a dyn Transport,
    secret: Option<&'a Secret>,
    now: DateTime<Utc>,
    today: NaiveDate,
}

impl<'a> Dispatcher<'a> {
    pub fn new(settings: &'a Settings, env: &'a EnvSnapshot, transport: &'a dyn Transport) -> Self {
        Self {
            settings,
            env,
            transport,
            secret: None,
            now: Utc::now(),
            today: Local::now().date_naive(),
        }
    }

    pub fn with_secret(mut self, secret: &'a Secret) -> Self {
        self.secret = Some(secret);
        self
    }

    /// Pin the clock, for reproducible runs.
    pub fn at(mut self, now: DateTime<Utc>, today: NaiveDate) -> Self {
        self.now = now;
        self.today = today;
        self
    }

    /// Run every stage up to and including `Compose`. Nothing is sent, and the only possible
    /// outbound request is the leaderboard lookup outside dry runs.
    pub async fn prepare(&self, plan: &DispatchPlan) -> Result<Prepared> {
        let paths = &self.settings.paths;

        enter(Stage::ResolveWeek);
        let seed = plan.week.unwrap_or_else(|| WeekSeed::current_at(self.today));

        enter(Stage::ResolveTitle);
        let schedule = Schedule::load(&paths.schedule)?;
        let title = schedule.resolve(seed)?;

        enter(Stage::ResolveIdentifier);
        let catalog = Catalog::load(&paths.catalog)?;
        let matched = catalog.find_identifier(&title)?;

        enter(Stage::LoadRecord);
        let record = ContentRecord::load(&paths.games_dir, &matched.id)?;

        enter(Stage::Validate);
        let record = record.validate()?;
        if record
            .effective_announcement(plan.message_override.as_deref())
            .is_none()
        {
            return Err(DispatchError::EmptyAnnouncement {
                game_id: record.game_id,
                path: record.source,
            });
        }

        enter(Stage::FetchHighlight);
        let highlight = self
            .last_week_highlight(&schedule, &catalog, seed, plan.dry_run)
            .await;

        enter(Stage::Compose);
        let composition = compose(
            &record,
            highlight.as_ref(),
            plan.message_override.as_deref(),
            &self.settings.links,
        )?;

        info!(%seed, %title, game_id = %matched.id, tier = %matched.tier, "game of the week resolved");
        Ok(Prepared {
            seed,
            title,
            matched,
            record,
            highlight,
            composition,
        })
    }

    async fn last_week_highlight(
        &self,
        schedule: &Schedule,
        catalog: &Catalog,
        seed: WeekSeed,
        dry_run: bool,
    ) -> Option<HighlightRecord> {
        let previous = seed.previous();
        let title = match schedule.resolve(previous) {
            Ok(title) => title,
            Err(e) => {
                info!(%previous, reason = %e, "no highlight for last week");
                return None;
            }
        };
        let matched = match catalog.find_identifier(&title) {
            Ok(m) => m,
            Err(e) => {
                info!(%previous, reason = %e, "no highlight for last week");
                return None;
            }
        };
        let top_count = self.settings.highlight.top_count;
        let top_scores = if dry_run {
            sample_scores(top_count)
        } else {
            fetch_top_scores(
                self.transport,
                &self.settings.links.leaderboard_api,
                &matched.id,
                top_count,
            )
            .await?
        };
        if top_scores.is_empty() {
            return None;
        }
        Some(HighlightRecord {
            game_id: matched.id,
            game_title: title,
            top_scores,
        })
    }

    /// Prepare, then attempt every planned channel.
    pub async fn run(&self, plan: &DispatchPlan) -> Result<SubRunReport> {
        let prepared = self.prepare(plan).await?;

        enter(Stage::Dispatch);
        let mut channels = Vec::new();
        if plan.email {
            channels.push(self.dispatch_email(plan, &prepared).await?);
        }
        for selected in self.selected_webhooks(plan) {
            channels.push(self.dispatch_webhook(plan, &prepared, selected).await);
        }

        for c in &channels {
            match &c.outcome {
                ChannelOutcome::Sent => info!(label = %c.label, kind = %c.kind, "sent"),
                ChannelOutcome::Previewed(_) => debug!(label = %c.label, "previewed"),
                ChannelOutcome::Skipped(why) => warn!(label = %c.label, reason = %why, "skipped"),
                ChannelOutcome::Failed(e) => warn!(label = %c.label, error = %e, "failed"),
            }
        }
        enter(Stage::Done);
        Ok(SubRunReport {
            plan: plan.clone(),
            seed: prepared.seed,
            game_id: prepared.matched.id,
            channels,
        })
    }

    /// Run each sub-run in order. A fatal error stops the remaining sub-runs.
    pub async fn run_all(&self, plans: &[DispatchPlan]) -> Result<RunReport> {
        let mut report = RunReport::default();
        for plan in plans {
            report.sub_runs.push(self.run(plan).await?);
        }
        Ok(report)
    }

    async fn dispatch_email(&self, plan: &DispatchPlan, prepared: &Prepared) -> Result<ChannelReport> {
        let email = &prepared.composition.email;
        let outcome = if plan.dry_run {
            let preview = format!(
                "Subject: {}\nDescription: {}\n{}",
                email.subject, email.description, email.html
            );
            println!("=== DRY RUN: email ===\n{preview}\n");
            ChannelOutcome::Previewed(preview)
        } else {
            let secret = self.secret.ok_or_else(|| DispatchError::MissingCredential {
                env_var: self.settings.mail.secret_env.clone(),
            })?;
            let send_at = mail::send_at(self.now, self.settings.mail.send_delay_minutes);
            match mail::send_broadcast(
                self.transport,
                &self.settings.mail.api_url,
                secret,
                email,
                &send_at,
            )
            .await
            {
                Ok(()) => ChannelOutcome::Sent,
                Err(e) => ChannelOutcome::Failed(e),
            }
        };
        Ok(ChannelReport {
            label: EMAIL_LABEL.to_string(),
            kind: "convertkit".to_string(),
            outcome,
        })
    }

    fn selected_webhooks(&self, plan: &DispatchPlan) -> Vec<Selected> {
        let map = match &plan.webhooks {
            WebhookSelection::None => return Vec::new(),
            _ => WebhookMap::load(&plan.webhook_map),
        };
        match &plan.webhooks {
            WebhookSelection::Only(label) => match map.get(label) {
                Some(entry) => vec![Selected::Declared(entry.clone())],
                None => {
                    warn!(%label, path = %plan.webhook_map.display(), "webhook label not found in map");
                    vec![Selected::Undeclared(label.clone())]
                }
            },
            _ => map.entries().iter().cloned().map(Selected::Declared).collect(),
        }
    }

    async fn dispatch_webhook(
        &self,
        plan: &DispatchPlan,
        prepared: &Prepared,
        selected: Selected,
    ) -> ChannelReport {
        let entry = match selected {
            Selected::Declared(entry) => entry,
            Selected::Undeclared(label) => {
                let reason = format!(
                    "label not found in webhook map {}",
                    plan.webhook_map.display()
                );
                return ChannelReport {
                    label,
                    kind: "unknown".to_string(),
                    outcome: ChannelOutcome::Skipped(reason),
                };
            }
        };
        let kind = entry.kind.clone().unwrap_or_else(|| "unknown".to_string());
        let hook = match entry.resolve(self.env) {
            Ok(hook) => hook,
            Err(Unresolved::Skip(why)) => {
                return ChannelReport {
                    label: entry.label,
                    kind,
                    outcome: ChannelOutcome::Skipped(why),
                }
            }
            Err(Unresolved::Fail(e)) => {
                return ChannelReport {
                    label: entry.label,
                    kind,
                    outcome: ChannelOutcome::Failed(e),
                }
            }
        };
        let payload = hook.payload(&prepared.composition.chat);
        let outcome = if plan.dry_run {
            let body = serde_json::to_string_pretty(&payload).unwrap_or_default();
            let preview = format!(
                "{} ({}, env {}) -> {}\n{}",
                hook.label, hook.kind, hook.env_var, hook.url, body
            );
            println!("=== DRY RUN: webhook ===\n{preview}\n");
            ChannelOutcome::Previewed(preview)
        } else {
            match hook.send(self.transport, &payload).await {
                Ok(()) => ChannelOutcome::Sent,
                Err(e) => ChannelOutcome::Failed(e),
            }
        };
        ChannelReport {
            label: hook.label,
            kind: hook.kind.to_string(),
            outcome,
        }
    }
}

/// A webhook label picked for a pass. A requested label missing from the map is kept so the
/// report still names it.
enum Selected {
    Declared(WebhookEntry),
    Undeclared(String),
}

fn enter(stage: Stage) {
    debug!(%stage, "entering stage");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::check_secret;
    use crate::transport::testing::RecordingTransport;
    use chrono::TimeZone;

    const SCHEDULE: &str = "\
202452:
  title: Frogger
  game_id: frogger
'202501': Galaxian
";

    const CATALOG: &str = r#"{
        "gameOfTheWeek": {"id": "galaxian", "title": "Galaxian"},
        "previousGames": [{"id": "frogger", "title": "Frogger"}],
        "games": [{"id": "pacman", "title": "Pac-Man"}]
    }"#;

    const RECORD: &str = "\
title: Galaxian
developer: Namco
year: 1979
controls:
  - '🕹️ move'
to_start: Press Start
announcement_message: Jouez à Galaxian!
";

    const MAP: &str = r#"{
        "broken": {"env": "BROKEN_HOOK", "type": "discord"},
        "chat": {"env": "CHAT_HOOK", "type": "googlechat"}
    }"#;

    const BROKEN: &str = "https://discord.test/api/webhooks/broken";
    const CHAT: &str = "https://chat.test/v1/spaces/x/messages";

    struct Fixture {
        _dir: tempfile::TempDir,
        settings: Settings,
        webhook_map: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let write = |rel: &str, text: &str| {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, text).unwrap();
            path
        };
        let mut settings = Settings::default();
        settings.paths.schedule = write("predictions.yaml", SCHEDULE);
        settings.paths.catalog = write("gamelist.json", CATALOG);
        write("games/galaxian/metadata.yaml", RECORD);
        settings.paths.games_dir = root.join("games");
        settings.mail.api_url = "https://ck.test/v3".into();
        settings.links.leaderboard_api = "https://scores.test/list".into();
        let webhook_map = write("webhook_map.json", MAP);
        Fixture {
            _dir: dir,
            settings,
            webhook_map,
        }
    }

    fn env() -> EnvSnapshot {
        [("BROKEN_HOOK", BROKEN), ("CHAT_HOOK", CHAT)].into_iter().collect()
    }

    fn flags(fx: &Fixture) -> RunFlags {
        RunFlags {
            week: Some("202501".parse().unwrap()),
            webhook_map: fx.webhook_map.clone(),
            ..RunFlags::default()
        }
    }

    fn dispatcher<'a>(
        fx: &'a Fixture,
        env: &'a EnvSnapshot,
        transport: &'a RecordingTransport,
    ) -> Dispatcher<'a> {
        Dispatcher::new(&fx.settings, env, transport).at(
            Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        )
    }

    #[test]
    fn default_flags_mean_mail_only() {
        let plans = plan_sub_runs(&RunFlags::default());
        assert_eq!(plans.len(), 1);
        assert!(plans[0].email);
        assert_eq!(plans[0].webhooks, WebhookSelection::None);
        assert!(needs_secret(&plans));
    }

    #[test]
    fn selection_splits_into_isolated_sub_runs() {
        let plans = plan_sub_runs(&RunFlags {
            select: vec!["discord".into(), "ConvertKit Email".into(), "chat".into(), "discord".into()],
            ..RunFlags::default()
        });
        let shape: Vec<_> = plans.iter().map(|p| (p.email, p.webhooks.clone())).collect();
        assert_eq!(
            shape,
            vec![
                (true, WebhookSelection::None),
                (false, WebhookSelection::Only("discord".into())),
                (false, WebhookSelection::Only("chat".into())),
            ]
        );
    }

    #[test]
    fn label_and_webhook_only_flags() {
        let label = plan_sub_runs(&RunFlags {
            webhook_label: Some("chat".into()),
            ..RunFlags::default()
        });
        assert_eq!(label[0].webhooks, WebhookSelection::Only("chat".into()));
        assert!(!label[0].email);
        assert!(!needs_secret(&label));

        let all = plan_sub_runs(&RunFlags {
            webhook_only: true,
            ..RunFlags::default()
        });
        assert_eq!(all[0].webhooks, WebhookSelection::All);

        let combined = plan_sub_runs(&RunFlags {
            all_channels: true,
            ..RunFlags::default()
        });
        assert!(combined[0].email);
        assert_eq!(combined[0].webhooks, WebhookSelection::All);
    }

    #[tokio::test]
    async fn dry_run_previews_without_network() {
        let fx = fixture();
        let env = env();
        let transport = RecordingTransport::default();
        let plans = plan_sub_runs(&RunFlags {
            dry_run: true,
            all_channels: true,
            ..flags(&fx)
        });
        let report = dispatcher(&fx, &env, &transport).run_all(&plans).await.unwrap();

        assert!(transport.calls().is_empty());
        assert!(report.succeeded());
        let sub = &report.sub_runs[0];
        assert_eq!(sub.game_id, "galaxian");
        assert_eq!(sub.channels.len(), 3);
        for c in &sub.channels {
            match &c.outcome {
                ChannelOutcome::Previewed(text) => assert!(text.contains("Jouez à Galaxian!"), "{}", c.label),
                other => panic!("{} was not previewed: {other:?}", c.label),
            }
        }
    }

    #[tokio::test]
    async fn dry_run_uses_sample_scores_for_last_week() {
        let fx = fixture();
        let env = env();
        let transport = RecordingTransport::default();
        let plan = &plan_sub_runs(&RunFlags {
            dry_run: true,
            ..flags(&fx)
        })[0];
        let prepared = dispatcher(&fx, &env, &transport).prepare(plan).await.unwrap();
        let highlight = prepared.highlight.unwrap();
        assert_eq!(highlight.game_title, "Frogger");
        assert_eq!(highlight.top_scores.len(), 3);
        assert!(prepared.composition.email.html.contains("Joueur Test 1"));
    }

    #[tokio::test]
    async fn one_failing_webhook_does_not_stop_the_next() {
        let fx = fixture();
        let env = env();
        let transport = RecordingTransport::default().reply(BROKEN, 500, "boom");
        let plans = plan_sub_runs(&RunFlags {
            webhook_only: true,
            ..flags(&fx)
        });
        let report = dispatcher(&fx, &env, &transport).run_all(&plans).await.unwrap();

        let sub = &report.sub_runs[0];
        assert!(matches!(sub.channels[0].outcome, ChannelOutcome::Failed(_)));
        assert!(matches!(sub.channels[1].outcome, ChannelOutcome::Sent));
        assert!(report.succeeded());
        let urls: Vec<_> = transport.calls().into_iter().map(|c| c.url).collect();
        assert!(urls.contains(&BROKEN.to_string()));
        assert!(urls.contains(&CHAT.to_string()));
    }

    #[tokio::test]
    async fn email_still_attempted_when_webhooks_fail() {
        let fx = fixture();
        let env = env();
        let (secret, _) = check_secret("CK", Some("sk_live_0123456789abcdefghij")).unwrap();
        let transport = RecordingTransport::default()
            .reply(BROKEN, 500, "")
            .unreachable(CHAT)
            .unreachable("https://scores.test/list");
        let plans = plan_sub_runs(&RunFlags {
            all_channels: true,
            ..flags(&fx)
        });
        let report = dispatcher(&fx, &env, &transport)
            .with_secret(&secret)
            .run_all(&plans)
            .await
            .unwrap();

        let sub = &report.sub_runs[0];
        assert!(matches!(sub.channels[0].outcome, ChannelOutcome::Sent));
        assert_eq!(sub.channels[0].label, "email");
        assert!(sub.channels[1..].iter().all(|c| !c.outcome.delivered()));
        assert!(report.succeeded());
        let broadcast = transport
            .calls()
            .into_iter()
            .find(|c| c.url == "https://ck.test/v3/broadcasts")
            .unwrap();
        assert_eq!(broadcast.body.unwrap()["send_at"], "2025-01-01T10:00:00Z");
    }

    #[tokio::test]
    async fn requested_label_must_be_delivered() {
        let fx = fixture();
        let env = EnvSnapshot::default();
        let transport = RecordingTransport::default();
        let plans = plan_sub_runs(&RunFlags {
            webhook_label: Some("chat".into()),
            ..flags(&fx)
        });
        let report = dispatcher(&fx, &env, &transport).run_all(&plans).await.unwrap();
        assert!(matches!(report.sub_runs[0].channels[0].outcome, ChannelOutcome::Skipped(_)));
        assert!(!report.succeeded());

        let plans = plan_sub_runs(&RunFlags {
            webhook_label: Some("nope".into()),
            ..flags(&fx)
        });
        let report = dispatcher(&fx, &env, &transport).run_all(&plans).await.unwrap();
        let channel = &report.sub_runs[0].channels[0];
        assert_eq!(channel.label, "nope");
        match &channel.outcome {
            ChannelOutcome::Skipped(why) => assert!(why.starts_with("label not found in webhook map"), "{why}"),
            other => panic!("expected a skip, got {other:?}"),
        }
        assert!(!report.succeeded());
    }

    #[tokio::test]
    async fn combined_pass_without_webhooks_succeeds_on_email() {
        let fx = fixture();
        let env = EnvSnapshot::default();
        let (secret, _) = check_secret("CK", Some("sk_live_0123456789abcdefghij")).unwrap();
        let transport = RecordingTransport::default();
        let absent_map = fx.webhook_map.with_file_name("absent.json");
        let plans = plan_sub_runs(&RunFlags {
            all_channels: true,
            webhook_map: absent_map,
            ..flags(&fx)
        });
        let report = dispatcher(&fx, &env, &transport)
            .with_secret(&secret)
            .run_all(&plans)
            .await
            .unwrap();

        let labels: Vec<_> = report.sub_runs[0].channels.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["email"]);
        assert!(report.succeeded());

        // webhooks configured but none set in the environment: still carried by the email
        let plans = plan_sub_runs(&RunFlags {
            all_channels: true,
            ..flags(&fx)
        });
        let report = dispatcher(&fx, &env, &transport)
            .with_secret(&secret)
            .run_all(&plans)
            .await
            .unwrap();
        assert_eq!(report.sub_runs[0].channels.len(), 3);
        assert!(report.succeeded());
    }

    #[tokio::test]
    async fn failed_email_fails_a_combined_pass() {
        let fx = fixture();
        let env = env();
        let (secret, _) = check_secret("CK", Some("sk_live_0123456789abcdefghij")).unwrap();
        let transport =
            RecordingTransport::default().reply("https://ck.test/v3/broadcasts", 401, "denied");
        let plans = plan_sub_runs(&RunFlags {
            all_channels: true,
            ..flags(&fx)
        });
        let report = dispatcher(&fx, &env, &transport)
            .with_secret(&secret)
            .run_all(&plans)
            .await
            .unwrap();
        assert!(matches!(report.sub_runs[0].channels[0].outcome, ChannelOutcome::Failed(_)));
        assert!(matches!(report.sub_runs[0].channels[2].outcome, ChannelOutcome::Sent));
        assert!(!report.succeeded());
    }

    #[tokio::test]
    async fn resolution_errors_abort_before_any_send() {
        let fx = fixture();
        let env = env();
        let transport = RecordingTransport::default();
        let plans = plan_sub_runs(&RunFlags {
            week: Some("202503".parse().unwrap()),
            webhook_only: true,
            ..flags(&fx)
        });
        let err = dispatcher(&fx, &env, &transport).run_all(&plans).await.unwrap_err();
        assert!(matches!(err, DispatchError::NotScheduled { .. }));
        assert!(transport.calls().is_empty());

        let record = fx.settings.paths.games_dir.join("galaxian/metadata.yaml");
        std::fs::write(&record, RECORD.replace("announcement_message: Jouez à Galaxian!\n", "")).unwrap();
        let plans = plan_sub_runs(&RunFlags {
            webhook_only: true,
            ..flags(&fx)
        });
        let err = dispatcher(&fx, &env, &transport).run_all(&plans).await.unwrap_err();
        assert!(matches!(err, DispatchError::EmptyAnnouncement { .. }));
        assert!(transport.calls().is_empty());
    }
}
