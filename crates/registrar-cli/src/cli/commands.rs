use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, anyhow};
use chrono::{Local, NaiveDate};
use registrar::{CounterKind, FixedClock, MemoryStore, Registrar, Snapshot, TokioSleep};
use serde_json::{Value, json};

use super::config::{Command, RunConfig};

type CliRegistrar = Registrar<MemoryStore, FixedClock, TokioSleep>;

/// One CLI invocation: the loaded state, a registrar over it and the command
/// to run.
pub struct Session {
    store: Arc<MemoryStore>,
    registrar: CliRegistrar,
    config: RunConfig,
}

impl Session {
    /// Loads the state file (if any) and builds the registrar.
    ///
    /// # Errors
    ///
    /// Unreadable or malformed state, or a date without a local noon.
    pub fn open(config: RunConfig) -> anyhow::Result<Self> {
        let store = Arc::new(load_store(config.state.as_deref())?);
        let clock = clock_for(config.date)?;
        let registrar =
            CliRegistrar::with_clock(Arc::clone(&store), config.generator.clone(), clock)?;
        Ok(Self {
            store,
            registrar,
            config,
        })
    }

    /// Stops the registrar before its next attempt.
    pub fn cancel(&self) {
        self.registrar.cancel();
    }

    /// Runs the command and returns its JSON output. State is saved only
    /// after a mutating command succeeds.
    ///
    /// # Errors
    ///
    /// Generation failures, unreadable `--existing` files and state I/O.
    pub async fn run(&self) -> anyhow::Result<Value> {
        let fields = &self.config.generator;
        let output = match &self.config.command {
            Command::Preview { count } => {
                serde_json::to_value(self.registrar.preview_next_roll_numbers(*count).await?)?
            }
            Command::DryRun { count, existing } => {
                if let Some(path) = existing {
                    let loaded = load_existing(&self.store, &fields.roll.field, path)?;
                    tracing::info!(count = loaded, path = %path.display(), "existing records loaded");
                }
                serde_json::to_value(self.registrar.dry_run_with_collision_report(*count).await?)?
            }
            Command::Roll => {
                let id = self.registrar.generate_roll_number().await?;
                self.store.insert_record(&fields.roll.field, id.clone());
                json!({ "id": id })
            }
            Command::Reserve { count } => {
                let ids = self.registrar.reserve_roll_numbers(*count).await?;
                self.store.extend_records(&fields.roll.field, ids.iter().cloned());
                json!({ "ids": ids })
            }
            Command::Invoice { batch: None } => {
                let id = self.registrar.generate_invoice_id().await?;
                self.store.insert_record(&fields.invoice.field, id.clone());
                json!({ "id": id })
            }
            Command::Invoice { batch: Some(count) } => {
                let ids = self.registrar.generate_invoice_id_batch(*count).await?;
                self.store
                    .extend_records(&fields.invoice.field, ids.iter().cloned());
                json!({ "ids": ids })
            }
            Command::DailyInvoice => {
                let id = self.registrar.generate_daily_invoice_id().await?;
                self.store
                    .insert_record(&fields.daily_invoice.field, id.clone());
                json!({ "id": id })
            }
            Command::Reset { kind } => {
                let kind = CounterKind::from(*kind);
                let removed = self.registrar.reset_counter(kind).await?;
                json!({ "counter": kind.to_string(), "removed": removed })
            }
        };

        if self.config.command.mutates() {
            if let Some(path) = &self.config.state {
                save_store(&self.store, path)?;
            }
        }
        Ok(output)
    }
}

/// Runs `config` to completion in a fresh session.
///
/// # Errors
///
/// See [`Session::open`] and [`Session::run`].
pub async fn execute(config: RunConfig) -> anyhow::Result<Value> {
    Session::open(config)?.run().await
}

fn clock_for(date: Option<NaiveDate>) -> anyhow::Result<FixedClock> {
    let now = match date {
        None => Local::now().fixed_offset(),
        Some(date) => date
            .and_hms_opt(12, 0, 0)
            .and_then(|noon| noon.and_local_timezone(Local).earliest())
            .ok_or_else(|| anyhow!("{date} has no local noon"))?
            .fixed_offset(),
    };
    Ok(FixedClock::new(now))
}

fn load_store(path: Option<&Path>) -> anyhow::Result<MemoryStore> {
    let Some(path) = path else {
        return Ok(MemoryStore::new());
    };
    if !path.exists() {
        tracing::info!(path = %path.display(), "no state file yet, starting empty");
        return Ok(MemoryStore::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state `{}`", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse state `{}`", path.display()))?;
    Ok(MemoryStore::from_snapshot(snapshot))
}

fn save_store(store: &MemoryStore, path: &Path) -> anyhow::Result<()> {
    let raw = serde_json::to_string_pretty(&store.snapshot())?;
    // Write next to the target and rename so a crash never leaves half a file.
    let staging = staging_path(path);
    std::fs::write(&staging, raw)
        .with_context(|| format!("failed to write state `{}`", staging.display()))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("failed to replace state `{}`", path.display()))?;
    tracing::debug!(path = %path.display(), "state saved");
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn load_existing(store: &MemoryStore, field: &str, path: &Path) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read existing records `{}`", path.display()))?;
    let values: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let count = values.len();
    store.extend_records(field, values);
    Ok(count)
}
