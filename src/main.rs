// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use autotranslate::app_config::{self, Config, TranslationProvider};
use autotranslate::app_controller::Controller;
use autotranslate::database::models::{Frequency, NewWorkItem, Priority, TranslationMode};
use autotranslate::errors::RunnerError;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::time::Duration;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Deepl,
    Mock,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Deepl => TranslationProvider::DeepL,
            CliTranslationProvider::Mock => TranslationProvider::Mock,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for Priority to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliPriority {
    Low,
    Medium,
    High,
}

impl From<CliPriority> for Priority {
    fn from(cli_priority: CliPriority) -> Self {
        match cli_priority {
            CliPriority::Low => Priority::Low,
            CliPriority::Medium => Priority::Medium,
            CliPriority::High => Priority::High,
        }
    }
}

/// CLI Wrapper for TranslationMode to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliMode {
    AddNew,
    Overwrite,
}

impl From<CliMode> for TranslationMode {
    fn from(cli_mode: CliMode) -> Self {
        match cli_mode {
            CliMode::AddNew => TranslationMode::AddNew,
            CliMode::Overwrite => TranslationMode::OverwriteExisting,
        }
    }
}

/// CLI Wrapper for Frequency to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliFrequency {
    Once,
    Daily,
    Weekly,
}

impl From<CliFrequency> for Frequency {
    fn from(cli_frequency: CliFrequency) -> Self {
        match cli_frequency {
            CliFrequency::Once => Frequency::Once,
            CliFrequency::Daily => Frequency::Daily,
            CliFrequency::Weekly => Frequency::Weekly,
        }
    }
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Show entry count and size
    Stats,
    /// Remove every entry
    Flush,
    /// Remove expired entries
    Purge,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process pending work items
    Run {
        /// Maximum number of items per batch
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Keep running batches until interrupted
        #[arg(long = "loop")]
        run_loop: bool,

        /// Seconds between batches in loop mode
        #[arg(long, requires = "run_loop")]
        interval: Option<u64>,
    },

    /// Show queue progress and the last run
    Status,

    /// Queue a page for translation
    Enqueue {
        /// Page to translate
        #[arg(long)]
        page: i64,

        /// Target language id
        #[arg(long)]
        language: i64,

        #[arg(long, value_enum, default_value = "medium")]
        priority: CliPriority,

        #[arg(long, value_enum, default_value = "add-new")]
        mode: CliMode,

        #[arg(long, value_enum, default_value = "once")]
        frequency: CliFrequency,

        /// Minutes until the item becomes due
        #[arg(long, default_value_t = 0)]
        delay_minutes: i64,
    },

    /// Clear the error of a work item
    ResetError {
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// Disable a work item
    Disable {
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// Enable a disabled work item
    Enable {
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// List work items blocked by an error
    Errors {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Manage the translation cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Generate shell completions for autotranslate
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Autotranslate - queued batch translation of CMS pages
#[derive(Parser, Debug)]
#[command(name = "autotranslate")]
#[command(version)]
#[command(about = "Queued batch translation of CMS pages")]
#[command(long_about = "Autotranslate works through a queue of pages and translates their content into the languages configured for their site.

EXAMPLES:
    autotranslate enqueue --page 12 --language 1 --priority high
    autotranslate run                         # Process one batch
    autotranslate run --loop --interval 60    # Process a batch every minute
    autotranslate status                      # Show queue progress
    autotranslate reset-error 42              # Make a failed item eligible again
    autotranslate cache purge                 # Drop expired cache entries
    autotranslate completions bash > autotranslate.bash

CONFIGURATION:
    Configuration is stored in autotranslate.json by default. If the file
    doesn't exist, a default one is created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "autotranslate.json")]
    config_path: String,

    /// Translation provider to use
    #[arg(short, long, global = true, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The logger accepts everything; the max level filters until the config is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "autotranslate", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli)?;
    log::set_max_level(config.log_level.to_level_filter());

    let show_progress = matches!(cli.command, Commands::Run { run_loop: false, .. });
    let controller = Controller::with_config(config, show_progress)?;

    run_command(cli.command, &controller).await
}

fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let mut config = Config::load_or_create(&cli.config_path)?;

    if let Some(provider) = &cli.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }
    if let Commands::Run { limit: Some(limit), .. } = &cli.command {
        config.batch.limit = *limit;
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

async fn run_command(command: Commands, controller: &Controller) -> Result<()> {
    match command {
        Commands::Run { run_loop: false, .. } => match controller.run_once().await {
            Ok(stats) => {
                info!("Run finished: {}", stats);
                Ok(())
            }
            Err(RunnerError::AlreadyRunning(name)) => {
                warn!("Queue '{}' is being processed by another run", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        Commands::Run { run_loop: true, interval, .. } => {
            let interval = interval.unwrap_or(controller.config().batch.interval_secs).max(1);
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {}", e);
                    std::future::pending::<()>().await;
                }
            };
            controller.run_loop(Duration::from_secs(interval), shutdown).await;
            Ok(())
        }
        Commands::Status => {
            println!("{}", controller.status().await?);
            Ok(())
        }
        Commands::Enqueue {
            page,
            language,
            priority,
            mode,
            frequency,
            delay_minutes,
        } => {
            let item = NewWorkItem::new(page, language, Controller::schedule_time(delay_minutes))
                .with_priority(priority.into())
                .with_mode(mode.into())
                .with_frequency(frequency.into());
            let id = controller.enqueue(item).await?;
            println!("{}", id);
            Ok(())
        }
        Commands::ResetError { id } => {
            if !controller.reset_error(id).await? {
                return Err(anyhow!("Work item {} not found or disabled", id));
            }
            Ok(())
        }
        Commands::Disable { id } => toggle_item(controller, id, true).await,
        Commands::Enable { id } => toggle_item(controller, id, false).await,
        Commands::Errors { limit } => {
            let items = controller.errored_items(limit).await?;
            if items.is_empty() {
                println!("No errored work items");
            }
            for item in items {
                println!(
                    "#{} page {} language {}: {}",
                    item.id, item.page_id, item.target_language_id, item.last_error
                );
            }
            Ok(())
        }
        Commands::Cache { command } => {
            match command {
                CacheCommands::Stats => println!("{}", controller.cache_stats().await),
                CacheCommands::Flush => controller.flush_cache().await?,
                CacheCommands::Purge => {
                    controller.purge_cache().await?;
                }
            }
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

async fn toggle_item(controller: &Controller, id: i64, disable: bool) -> Result<()> {
    if !controller.set_disabled(id, disable).await? {
        return Err(anyhow!("Work item {} not found", id));
    }
    info!("Work item {} {}", id, if disable { "disabled" } else { "enabled" });
    Ok(())
}
