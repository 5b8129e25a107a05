//! # Typhoon: script pipelines and deferred URL invocation
//!
//! Usage:
//!   typhoon run script.json                      # Run a script document
//!   typhoon generate --action send_email --data '{"to":"a@b.co","subject":"Hi"}'
//!   typhoon run-stored 1                         # Run a generated script
//!   typhoon schedule --url https://x/y --at +5m  # Invoke a URL later
//!   typhoon executor                             # Poll and execute due tasks

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use typhoon_core::config::expand_path;
use typhoon_core::store::open_store;
use typhoon_core::{BlobStore, ResultStore, ScriptRepository, TyphoonConfig};
use typhoon_scheduler::{
    ExecutorSettings, ReqwestClient, RetryPolicy, RetryStats, TaskExecutor, TaskScheduler,
    TaskStore, resolve_at, run_with_retry, spawn_executor,
};
use typhoon_script::operation::Collaborators;
use typhoon_script::{
    FileTemplates, OperationFactory, PipelineEngine, ScriptGenerator, SmtpMailer, TemplateRenderer,
};

#[derive(Parser)]
#[command(
    name = "typhoon",
    version,
    about = "🌀 Typhoon: script pipelines and deferred URL invocation"
)]
struct Cli {
    /// Config file (default: ~/.typhoon/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script document from a file, or `-` for stdin
    Run { file: String },
    /// Generate and store a script from an action
    Generate {
        #[arg(long)]
        action: String,
        /// Action data as a JSON object
        #[arg(long, default_value = "{}")]
        data: String,
    },
    /// Print a stored script
    Show { id: String },
    /// Run a stored script
    RunStored { id: String },
    /// Schedule a URL to be invoked once
    Schedule {
        #[arg(long)]
        url: String,
        /// RFC 3339 time, `now`, or `+<n>{s,m,h,d}`
        #[arg(long, default_value = "now")]
        at: String,
    },
    /// Execute due tasks (polls until Ctrl-C unless --once)
    Executor {
        #[arg(long)]
        once: bool,
    },
    /// Print a stored execution result
    Result { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TyphoonConfig::load_from(path)?,
        None => TyphoonConfig::load()?,
    };
    if cli.config.is_some() {
        config.apply_overrides(|key| std::env::var(key).ok());
    }

    init_logging(&config, cli.verbose);

    match cli.command {
        Command::Run { file } => {
            let text = read_script(&file)?;
            let engine = pipeline(&config)?;
            println!("{}", engine.run(text).await?);
        }
        Command::Generate { action, data } => {
            let data: serde_json::Value =
                serde_json::from_str(&data).context("--data must be valid JSON")?;
            let generator = ScriptGenerator::new(ScriptRepository::new(blob_store(&config)?));
            let id = generator.build(&serde_json::json!({"action": action, "data": data}))?;
            println!("{id}");
        }
        Command::Show { id } => {
            let generator = ScriptGenerator::new(ScriptRepository::new(blob_store(&config)?));
            println!("{}", generator.get(&id)?);
        }
        Command::RunStored { id } => {
            let engine = pipeline(&config)?;
            println!("{}", engine.run_stored(&ScriptRepository::new(blob_store(&config)?), &id).await?);
        }
        Command::Schedule { url, at } => {
            let at = resolve_at(&at, chrono::Utc::now())?;
            let scheduler = TaskScheduler::new(task_store(&config)?);
            let task = scheduler.schedule(&url, at)?;
            println!("{}", serde_json::json!({"id": task.id, "at": task.due_at}));
        }
        Command::Executor { once } => {
            let executor = TaskExecutor::new(
                task_store(&config)?,
                ResultStore::new(blob_store(&config)?),
                Arc::new(ReqwestClient::new()),
                ExecutorSettings::from(&config.scheduler),
            );
            let policy = RetryPolicy::from(&config.scheduler);
            if once {
                let summary = run_with_retry(&executor, &policy, &RetryStats::default()).await?;
                println!(
                    "found={} claimed={} completed={} skipped={}",
                    summary.found, summary.claimed, summary.completed, summary.skipped
                );
            } else {
                let interval = Duration::from_secs(config.scheduler.poll_interval_secs.max(1));
                let (tx, rx) = tokio::sync::watch::channel(false);
                let (stats, handle) = spawn_executor(Arc::new(executor), policy, interval, rx);
                tokio::signal::ctrl_c().await?;
                tx.send(true).ok();
                handle.await?;
                tracing::info!(
                    runs = stats.runs(),
                    retries = stats.retries(),
                    dead_lettered = stats.dead_lettered(),
                    "👋 Shutting down"
                );
            }
        }
        Command::Result { id } => {
            let record = ResultStore::new(blob_store(&config)?).find(&id)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}

fn init_logging(config: &TyphoonConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn read_script(file: &str) -> Result<String> {
    if file == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("Failed to read script {file}"))
    }
}

fn pipeline(config: &TyphoonConfig) -> Result<PipelineEngine> {
    let services = Collaborators {
        templates: TemplateRenderer::new(Arc::new(FileTemplates::new(expand_path(
            &config.templates.dir,
        )))),
        mailer: Arc::new(SmtpMailer::from_config(&config.email)?),
    };
    Ok(PipelineEngine::new(OperationFactory::new(services)))
}

/// Opened per command so `run` and `schedule` never touch the blob store.
fn blob_store(config: &TyphoonConfig) -> Result<Arc<dyn BlobStore>> {
    Ok(Arc::from(open_store(&config.store)?))
}

fn task_store(config: &TyphoonConfig) -> Result<Arc<TaskStore>> {
    Ok(Arc::new(TaskStore::open(&expand_path(&config.database.path))?))
}
