//! CLI smoke entry point.
//!
//! # Responsibility
//! - Drive one friend detail session against the in-memory store.
//! - Print the navigation list before and after the save, deterministically.
//!
//! Usage: `roster_cli [config.json]`. Without a file, `ROSTER_LOG_LEVEL` and
//! `ROSTER_LOG_DIR` are read from the environment.

use roster_core::model::friend::{FIRST_NAME, LAST_NAME};
use roster_core::{
    init_logging, CoreConfig, DetailController, DialogResult, DialogService, EntityKind, Friend,
    LookupSync, MemoryStore, Meeting, NotificationChannel,
};
use std::process::ExitCode;

/// Answers every confirmation with OK and echoes messages to stdout.
struct AutoConfirm;

impl DialogService for AutoConfirm {
    async fn confirm(&self, message: &str, title: &str) -> DialogResult {
        println!("[{title}] {message} -> OK");
        DialogResult::Ok
    }

    async fn info(&self, message: &str) {
        println!("[Info] {message}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match load_config(std::env::args().nth(1)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("roster_cli: {err}");
            return ExitCode::FAILURE;
        }
    };
    if config.logging.log_dir.is_some() {
        if let Err(err) = init_logging(&config.logging) {
            eprintln!("roster_cli: logging disabled: {err}");
        }
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("roster_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<String>) -> Result<CoreConfig, String> {
    let Some(path) = path else {
        return Ok(CoreConfig::from_env());
    };
    let raw = std::fs::read_to_string(&path)
        .map_err(|err| format!("failed to read config `{path}`: {err}"))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid config `{path}`: {err}"))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("roster_core version={}", roster_core::core_version());

    let store = MemoryStore::new();
    store.insert_language("Rust");
    let ann = store.insert(Friend::new("Ann", Some("Smith")));
    let bo = store.insert(Friend::new("Bo", None));
    store.insert(Meeting::new("Standup", vec![bo]));

    let channel = NotificationChannel::new();
    let navigation = LookupSync::attach(&channel);
    navigation
        .load(&store, &[EntityKind::Friend, EntityKind::Meeting])
        .await?;
    print_navigation("before", &navigation);

    let mut detail = DetailController::<Friend, _, _, _>::new(
        store.repository(),
        store.clone(),
        AutoConfirm,
        channel.clone(),
    );
    detail.load(Some(ann)).await?;
    detail.set_field(FIRST_NAME, "Anna")?;
    detail.set_field(LAST_NAME, "Smith-Jones")?;
    let saved = detail.save().await?;
    println!("saved friend id={saved} title={}", detail.title());

    let mut blocked = DetailController::<Friend, _, _, _>::new(
        store.repository(),
        store.clone(),
        AutoConfirm,
        channel.clone(),
    );
    blocked.load(Some(bo)).await?;
    let blocked_title = blocked.title().to_string();
    println!("delete {} -> {:?}", blocked_title, blocked.delete().await?);

    print_navigation("after", &navigation);
    Ok(())
}

fn print_navigation(stage: &str, navigation: &LookupSync) {
    println!("navigation ({stage}):");
    for item in navigation.items() {
        println!("  {} #{} {}", item.kind, item.id, item.label);
    }
}
