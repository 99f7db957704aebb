mod cli;

use std::process::ExitCode;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use tracing::{debug, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cli::{Cli, Commands, SendArgs};
use gotw_dispatch::prelude::*;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let run_id = Uuid::new_v4();
    match run(cli).instrument(info_span!("gotw", %run_id)).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            if let Some(dispatch) = e.downcast_ref::<DispatchError>() {
                eprintln!("fix: {}", dispatch.fix_hint());
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GOTW_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    let env = EnvSnapshot::capture();

    match cli.command {
        Commands::Send(args) => send(&mut settings, &env, args).await,
        Commands::TestApi { mail_api_url } => {
            if let Some(url) = mail_api_url {
                settings.mail.api_url = url;
            }
            test_api(&settings, &env).await
        }
        Commands::Check {
            week_seed,
            next_week,
        } => {
            let seed = match week_seed {
                Some(seed) => seed,
                None if next_week => WeekSeed::current().next(),
                None => WeekSeed::current(),
            };
            check(&settings, seed)
        }
        Commands::Status { game_id } => {
            let status = schedule_status(&settings, &game_id, Local::now().date_naive());
            println!("{status}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_secret(settings: &Settings, env: &EnvSnapshot) -> Result<Secret> {
    let env_var = &settings.mail.secret_env;
    let (secret, warnings) = check_secret(env_var, env.get(env_var))?;
    for warning in &warnings {
        warn!(%env_var, "API secret: {warning}");
    }
    debug!(shape = %secret.shape(), "API secret loaded");
    Ok(secret)
}

async fn send(settings: &mut Settings, env: &EnvSnapshot, args: SendArgs) -> Result<ExitCode> {
    if let Some(url) = args.mail_api_url {
        settings.mail.api_url = url;
    }
    let flags = RunFlags {
        dry_run: args.dry_run,
        mail_only: args.mail_only,
        webhook_only: args.webhook_only,
        all_channels: args.all_channels,
        webhook_label: args.webhook_label,
        select: args.select,
        week: args.week_seed,
        message_override: args.custom_message,
        webhook_map: args
            .webhook_map
            .unwrap_or_else(|| settings.paths.webhook_map.clone()),
    };
    let plans = plan_sub_runs(&flags);
    // fail on a bad secret before touching any store
    let secret = if needs_secret(&plans) {
        Some(load_secret(settings, env)?)
    } else {
        None
    };

    let settings = &*settings;
    let transport = HttpTransport::new(settings.http.timeout())?;
    let mut dispatcher = Dispatcher::new(settings, env, &transport);
    if let Some(secret) = &secret {
        dispatcher = dispatcher.with_secret(secret);
    }
    let report = dispatcher.run_all(&plans).await?;
    print_report(&report);

    Ok(if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(report: &RunReport) {
    for sub in &report.sub_runs {
        let mode = if sub.plan.dry_run { " (dry run)" } else { "" };
        println!("Week {} -> {}{mode}", sub.seed, sub.game_id);
        if sub.channels.is_empty() {
            println!("  no channel configured");
        }
        for c in &sub.channels {
            match &c.outcome {
                ChannelOutcome::Sent => println!("  ok       {} ({})", c.label, c.kind),
                ChannelOutcome::Previewed(_) => println!("  preview  {} ({})", c.label, c.kind),
                ChannelOutcome::Skipped(why) => println!("  skipped  {} ({}): {why}", c.label, c.kind),
                ChannelOutcome::Failed(e) => {
                    println!("  FAILED   {} ({}): {e}", c.label, c.kind);
                    println!("           {}", e.fix_hint());
                }
            }
        }
    }
}

async fn test_api(settings: &Settings, env: &EnvSnapshot) -> Result<ExitCode> {
    let secret = load_secret(settings, env)?;
    let transport = HttpTransport::new(settings.http.timeout())?;
    let report = match probe_credentials(&transport, &settings.mail.api_url, &secret).await {
        Ok(report) => report,
        Err(e) => {
            println!("Could not reach {}: {e:#}", settings.mail.api_url);
            return Ok(ExitCode::FAILURE);
        }
    };
    println!("Status: {}", report.status);
    if !report.valid() {
        println!("API credentials rejected: {}", report.body.trim());
        println!("Secret shape: {}", secret.shape());
        return Ok(ExitCode::FAILURE);
    }
    println!("API credentials are valid");
    if let Some(account) = &report.account {
        let or_na = |v: Option<String>| v.unwrap_or_else(|| "N/A".to_string());
        println!("  Account name:  {}", or_na(account.name.clone()));
        println!("  Account id:    {}", or_na(account.id.as_ref().map(|id| id.to_string())));
        println!("  Primary email: {}", or_na(account.primary_email_address.clone()));
    }
    Ok(ExitCode::SUCCESS)
}

fn check(settings: &Settings, seed: WeekSeed) -> Result<ExitCode> {
    let readiness = check_week(settings, seed)?;
    println!(
        "Week {}: {} ({})",
        readiness.seed, readiness.title, readiness.game_id
    );
    println!("  record: {}", readiness.record_path.display());
    if readiness.ready() {
        println!("  ready to send");
        return Ok(ExitCode::SUCCESS);
    }
    if !readiness.missing_fields.is_empty() {
        println!("  missing fields: {}", readiness.missing_fields.join(", "));
    }
    if !readiness.has_announcement {
        println!("  announcement_message is empty");
    }
    for fix in readiness.fixes() {
        println!("\n{fix}");
    }
    Ok(ExitCode::FAILURE)
}
