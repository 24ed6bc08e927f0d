use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use registrar::{CounterKind, GeneratorConfig};

/// Largest number of identifiers a single invocation may preview or issue.
pub const MAX_COUNT: usize = 10_000;

/// Operator CLI for the `registrar` identifier allocator.
///
/// Counters and issued identifiers live in a JSON state file, so successive
/// invocations continue where the previous one stopped. Every option can also
/// be set through its `REGISTRAR_*` environment variable or a `.env` file.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "registrar",
    version,
    about = "Preview, audit and issue roll numbers and invoice IDs"
)]
pub struct CliArgs {
    /// JSON file holding counters and issued identifiers.
    ///
    /// Read before every command and rewritten after commands that issue or
    /// reset. Without it the command runs against an empty, throwaway store.
    ///
    /// Environment variable: `REGISTRAR_STATE`
    #[arg(long, env = "REGISTRAR_STATE")]
    pub state: Option<PathBuf>,

    /// JSON file with a generator configuration. Missing sections and fields
    /// keep their defaults.
    ///
    /// Environment variable: `REGISTRAR_CONFIG`
    #[arg(long, env = "REGISTRAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Act as if today were this date (`YYYY-MM-DD`, local noon).
    ///
    /// Environment variable: `REGISTRAR_DATE`
    #[arg(long, env = "REGISTRAR_DATE")]
    pub date: Option<NaiveDate>,

    /// Attempts per identifier before giving up. Overrides the config file.
    ///
    /// Environment variable: `REGISTRAR_MAX_ATTEMPTS`
    #[arg(long, env = "REGISTRAR_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Base backoff after a transient store error, in milliseconds.
    ///
    /// Environment variable: `REGISTRAR_BASE_DELAY_MS`
    #[arg(long, env = "REGISTRAR_BASE_DELAY_MS")]
    pub base_delay_ms: Option<u64>,

    /// Time budget of one attempt's store work, in milliseconds.
    ///
    /// Environment variable: `REGISTRAR_ATTEMPT_TIMEOUT_MS`
    #[arg(long, env = "REGISTRAR_ATTEMPT_TIMEOUT_MS")]
    pub attempt_timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the next roll numbers without consuming them
    Preview {
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
    /// Preview roll numbers and report the ones existing records already carry
    DryRun {
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
        /// Newline-separated registration numbers to treat as existing
        #[arg(long)]
        existing: Option<PathBuf>,
    },
    /// Issue the next roll number
    Roll,
    /// Issue several roll numbers at once, all or nothing
    Reserve {
        #[arg(short = 'n', long)]
        count: usize,
    },
    /// Issue the next monthly invoice ID
    Invoice {
        /// Issue this many IDs in one transaction
        #[arg(long)]
        batch: Option<usize>,
    },
    /// Issue the next daily checked invoice ID
    DailyInvoice,
    /// Delete the current counter so it starts over
    Reset {
        #[arg(value_enum)]
        kind: CounterArg,
    },
}

impl Command {
    /// Whether the command changes counters or records.
    pub fn mutates(&self) -> bool {
        !matches!(self, Self::Preview { .. } | Self::DryRun { .. })
    }

    fn count(&self) -> Option<usize> {
        match self {
            Self::Preview { count } | Self::DryRun { count, .. } | Self::Reserve { count } => {
                Some(*count)
            }
            Self::Invoice { batch } => *batch,
            Self::Roll | Self::DailyInvoice | Self::Reset { .. } => None,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterArg {
    RollNumber,
    Invoice,
    DailyInvoice,
}

impl From<CounterArg> for CounterKind {
    fn from(arg: CounterArg) -> Self {
        match arg {
            CounterArg::RollNumber => Self::RollNumber,
            CounterArg::Invoice => Self::Invoice,
            CounterArg::DailyInvoice => Self::DailyInvoice,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub generator: GeneratorConfig,
    pub state: Option<PathBuf>,
    pub date: Option<NaiveDate>,
    pub command: Command,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let mut generator = match &args.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config `{}`", path.display()))?;
                serde_json::from_str::<GeneratorConfig>(&raw)
                    .with_context(|| format!("failed to parse config `{}`", path.display()))?
            }
            None => GeneratorConfig::default(),
        };

        if let Some(max_attempts) = args.max_attempts {
            generator.retry.max_attempts = max_attempts;
        }
        if let Some(base_delay_ms) = args.base_delay_ms {
            generator.retry.base_delay_ms = base_delay_ms;
        }
        if let Some(attempt_timeout_ms) = args.attempt_timeout_ms {
            if attempt_timeout_ms == 0 {
                bail!("REGISTRAR_ATTEMPT_TIMEOUT_MS must be greater than 0");
            }
            generator.retry.attempt_timeout_ms = attempt_timeout_ms;
        }
        generator
            .validate()
            .context("invalid generator configuration")?;

        if let Some(count) = args.command.count() {
            if count > MAX_COUNT {
                bail!("count ({count}) exceeds the per-invocation limit of {MAX_COUNT}");
            }
        }

        Ok(Self {
            generator,
            state: args.state,
            date: args.date,
            command: args.command,
        })
    }
}
