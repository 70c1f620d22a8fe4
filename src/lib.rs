pub mod console;
pub mod cues;
pub mod db;
pub mod ritual;
pub mod settings;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use console::{describe, describe_activity, describe_streak, ConsoleCommand, HELP};
use cues::CueSink;
use db::Database;
use ritual::{RitualController, RitualEvent, RitualSnapshot};
use settings::SettingsStore;
use utils::logging;

pub(crate) struct AppState {
    pub(crate) db: Database,
    pub(crate) ritual: RitualController,
    pub(crate) settings: SettingsStore,
}

fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MOKUSO_DATA_DIR") {
        return PathBuf::from(dir);
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".mokuso"),
        Err(_) => PathBuf::from(".mokuso"),
    }
}

#[cfg(feature = "tone-audio")]
fn cue_sink() -> Arc<dyn CueSink> {
    Arc::new(cues::ToneCueSink::new())
}

#[cfg(not(feature = "tone-audio"))]
fn cue_sink() -> Arc<dyn CueSink> {
    Arc::new(cues::LogCueSink)
}

fn spawn_event_printer(ritual: &RitualController) {
    let mut events = ritual.events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("{}", describe_event(&event)),
                Err(RecvError::Lagged(missed)) => warn!("Event printer missed {missed} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn describe_event(event: &RitualEvent) -> String {
    match event {
        RitualEvent::PhaseEntered { phase, target, .. } => match target {
            Some(target) => format!("-> {phase:?} ({})", target.as_str()),
            None => format!("-> {phase:?}"),
        },
        RitualEvent::Skipped { phase } => format!("skipped {}", phase.as_str()),
        RitualEvent::ReadyToTrigger => "ready: ignite when set".to_string(),
        RitualEvent::SessionCompleted {
            duration_minutes,
            recorded,
            ..
        } => {
            if *recorded {
                format!("ritual complete, {duration_minutes} minutes logged")
            } else {
                "ritual complete (could not be saved)".to_string()
            }
        }
        RitualEvent::SessionAbandoned { phase, .. } => format!("abandoned during {phase:?}"),
    }
}

fn print_snapshot(snapshot: Option<RitualSnapshot>) {
    match snapshot {
        Some(snapshot) => println!("{}", describe(&snapshot)),
        None => println!("no ritual running"),
    }
}

/// Returns `false` when the console should exit.
async fn handle(state: &AppState, command: ConsoleCommand) -> Result<bool> {
    match command {
        ConsoleCommand::Start => {
            let config = state.settings.ritual_configuration();
            print_snapshot(Some(state.ritual.start(config).await?));
        }
        ConsoleCommand::Skip => print_snapshot(Some(state.ritual.skip().await?)),
        ConsoleCommand::Hold => print_snapshot(Some(state.ritual.hold_begin().await?)),
        ConsoleCommand::Release => print_snapshot(Some(state.ritual.hold_end().await?)),
        ConsoleCommand::Ignite => print_snapshot(Some(state.ritual.ignite().await?)),
        ConsoleCommand::Done => {
            state.ritual.confirm_done().await?;
        }
        ConsoleCommand::Abandon => state.ritual.abandon().await?,
        ConsoleCommand::Status => print_snapshot(state.ritual.snapshot().await),
        ConsoleCommand::Streak => {
            let streak = state.db.get_streak().await?;
            let today = chrono::Local::now().date_naive();
            println!("{}", describe_streak(&streak, today));
        }
        ConsoleCommand::History(limit) => {
            for record in state.db.list_activity(limit).await? {
                println!("{}", describe_activity(&record));
            }
        }
        ConsoleCommand::Order(order) => state.settings.set_phase_order(&order)?,
        ConsoleCommand::Game(game) => state.settings.set_mini_game(game)?,
        ConsoleCommand::Sound(enabled) => state.settings.set_sound_enabled(enabled)?,
        ConsoleCommand::Settings => {
            println!("{}", serde_json::to_string_pretty(&state.settings.user_settings())?)
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return Ok(false),
    }
    Ok(true)
}

pub async fn run() -> Result<()> {
    logging::init(logging::debug_from_env());
    info!("Mokuso starting up...");

    let data_dir = data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let database = Database::new(data_dir.join("mokuso.sqlite3"))?;
    let settings = SettingsStore::new(data_dir.join("settings.json"))?;
    let ritual = RitualController::new(cue_sink(), Arc::new(database.clone()));

    let state = AppState {
        db: database,
        ritual,
        settings,
    };

    if !state.settings.user_settings().onboarding_complete {
        println!("Welcome to Mokuso. Type start to begin a ritual.\n{HELP}");
        state.settings.complete_onboarding()?;
    }

    spawn_event_printer(&state.ritual);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        match handle(&state, command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => println!("error: {err:#}"),
        }
    }

    state.ritual.abandon().await?;
    info!("Mokuso shutting down");
    Ok(())
}
