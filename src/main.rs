mod config;
mod error;
mod handlers;
mod models;
mod services;
mod tasks;
#[cfg(test)]
mod testing;

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use dotenv::dotenv;
use tokio::sync::Mutex;

use config::Config;
use handlers::bot::CommandHandler;
use handlers::commands::COMMAND_MENU;
use models::availability::TransitionState;
use services::{
    maintenance::MaintenanceService,
    oscar::OscarFetcher,
    store,
    subscription::{SharedTransitions, SubscriptionService},
    telegram::TelegramService,
};
use tasks::{command_task::start_command_task, poll_task::{start_poll_task, PollingEngine}};

#[derive(Debug, PartialEq)]
enum Mode {
    Run,
    Broadcast(String),
    ClearCrns,
}

fn parse_cli<I: Iterator<Item = String>>(mut args: I) -> anyhow::Result<Mode> {
    let mut mode = Mode::Run;
    while let Some(a) = args.next() {
        match a.as_str() {
            "--broadcast" => {
                let message = args.next().ok_or_else(|| anyhow!("Missing broadcast message"))?;
                mode = Mode::Broadcast(message);
            }
            "--clear-crns" => mode = Mode::ClearCrns,
            "-h" | "--help" => {
                eprintln!("Usage: course-tracker [--broadcast <message> | --clear-crns]");
                std::process::exit(0);
            }
            _ => return Err(anyhow!("Unknown arg: {}", a)),
        }
    }
    Ok(mode)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let mode = parse_cli(env::args().skip(1))?;
    let config = Config::from_env()?;
    let request_timeout = config.tracker.request_timeout();

    let store = store::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open store at {}", config.database_url))?;
    let telegram = Arc::new(TelegramService::new(&config.telegram, request_timeout)?);

    match mode {
        Mode::Broadcast(message) => {
            let report = MaintenanceService::new(store).broadcast(&*telegram, &message).await?;
            println!("Broadcast sent to {} user(s), {} failed", report.sent, report.failed);
            return Ok(());
        }
        Mode::ClearCrns => {
            let cleared = MaintenanceService::new(store).clear_all_crns().await?;
            println!("Cleared tracked CRNs for {} user(s)", cleared);
            return Ok(());
        }
        Mode::Run => {}
    }

    let fetcher = Arc::new(OscarFetcher::new(
        config.registration.course_detail_url.clone(),
        request_timeout,
    )?);
    let transitions: SharedTransitions = Arc::new(Mutex::new(TransitionState::new()));

    if let Err(e) = telegram.set_commands(COMMAND_MENU).await {
        log::warn!("⚠️ Could not register bot commands: {}", e);
    }

    let engine = Arc::new(PollingEngine::new(
        config.registration.term.clone(),
        config.registration.registration_url.clone(),
        request_timeout,
        store.clone(),
        fetcher.clone(),
        telegram.clone(),
        transitions.clone(),
    ));
    let handler = Arc::new(CommandHandler::new(
        config.registration.term.clone(),
        request_timeout,
        SubscriptionService::new(store, transitions),
        fetcher,
    ));

    log::info!("🚀 Tracking courses for term {}", config.registration.term);

    let poller = tokio::spawn(start_poll_task(engine, config.tracker.poll_interval()));
    let commands = tokio::spawn(start_command_task(telegram, handler));

    tokio::select! {
        result = poller => log::error!("Poll task exited: {:?}", result),
        result = commands => log::error!("Command task exited: {:?}", result),
        _ = tokio::signal::ctrl_c() => log::info!("👋 Shutting down"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_cli_modes() {
        assert_eq!(parse_cli(args(&[])).unwrap(), Mode::Run);
        assert_eq!(
            parse_cli(args(&["--broadcast", "Phase II opens today"])).unwrap(),
            Mode::Broadcast("Phase II opens today".to_string())
        );
        assert_eq!(parse_cli(args(&["--clear-crns"])).unwrap(), Mode::ClearCrns);
    }

    #[test]
    fn test_parse_cli_rejects_bad_args() {
        assert!(parse_cli(args(&["--broadcast"])).is_err());
        assert!(parse_cli(args(&["--verbose"])).is_err());
    }
}
