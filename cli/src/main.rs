//! CLI entrypoint for adr-council
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use council_application::{
    AgentGateway, DeliberationEngine, InMemoryRunStore, RunStore, SessionManager,
};
use council_domain::{RunId, RunStatus, SystemContext};
use council_infrastructure::{
    CircuitBreakerGateway, ConfigLoader, FileConfig, FileRunStore, JsonlEventJournal,
    OpenAiCompatibleGateway, StorageBackend,
};
use council_presentation::{
    Cli, Command, OutputFormat, OutputFormatter, ProgressNotifier, ProgressReporter, QuietProgress,
    RunFollower, StdinClarification, formatter_for,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow!("Invalid configuration: {}", e))?
    };

    let _log_guard = init_logging(cli.verbose, config.logging.file_log_dir.as_deref());
    info!("Starting adr-council");

    if cli.command == Command::ShowConfig {
        for line in ConfigLoader::describe_sources(cli.config.as_ref()) {
            println!("{}", line);
        }
        println!();
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut has_errors = false;
    for issue in config.validate() {
        if issue.is_error() {
            eprintln!("config error: {}", issue);
            has_errors = true;
        } else {
            warn!("Config: {}", issue);
        }
    }
    if has_errors {
        bail!("Configuration is invalid; run `adr-council show-config` to see where it came from");
    }

    let session = build_session(&config).await?;
    let formatter = formatter_for(cli.format);

    match cli.command.clone() {
        Command::Ask {
            question,
            context,
            detach,
        } => {
            let context = context.as_deref().map(load_context).transpose()?;
            let run_id = session.start(&question, context).await?;
            if detach {
                eprintln!("Run {}", run_id);
                session.wait(run_id).await?;
                return finish(&session, formatter.as_ref(), run_id).await;
            }
            info!(%run_id, "Following run");
            follow(&session, &cli, &config, run_id, 0).await?;
            finish(&session, formatter.as_ref(), run_id).await
        }
        Command::Status { run_id } => {
            let run_id = parse_run_id(&run_id)?;
            let run = session.snapshot(run_id).await?;
            if run.status == RunStatus::Failed {
                let report = session.failure_report(run_id).await?;
                println!("{}", formatter.format_failure(&report));
            } else {
                println!("{}", formatter.format_run(&run));
            }
            Ok(())
        }
        Command::Answer {
            run_id,
            request_id,
            text,
        } => {
            let run_id = parse_run_id(&run_id)?;
            let from = session.history(run_id).await?.len() as u64;
            session
                .answer_clarification(run_id, &request_id, &text)
                .await?;
            follow(&session, &cli, &config, run_id, from).await?;
            finish(&session, formatter.as_ref(), run_id).await
        }
        Command::Cancel { run_id } => {
            let run_id = parse_run_id(&run_id)?;
            session.cancel(run_id).await?;
            let run = session.snapshot(run_id).await?;
            println!("{}", formatter.format_run(&run));
            Ok(())
        }
        Command::Resume { run_id } => {
            let run_id = parse_run_id(&run_id)?;
            let from = session.history(run_id).await?.len() as u64;
            let status = session.resume(run_id).await?;
            if status != RunStatus::Running {
                info!(%run_id, %status, "Run is not resumable");
            }
            follow(&session, &cli, &config, run_id, from).await?;
            finish(&session, formatter.as_ref(), run_id).await
        }
        Command::List => {
            let runs = session.list().await?;
            println!("{}", formatter.format_list(&runs));
            Ok(())
        }
        Command::Events { run_id, from } => {
            let run_id = parse_run_id(&run_id)?;
            for event in session
                .history(run_id)
                .await?
                .iter()
                .filter(|e| e.sequence >= from)
            {
                println!("{}", formatter.format_event(event));
            }
            Ok(())
        }
        Command::Delete { run_id } => {
            let run_id = parse_run_id(&run_id)?;
            if session.delete(run_id).await? {
                println!("Deleted {}", run_id);
                Ok(())
            } else {
                bail!("Run {} not found", run_id)
            }
        }
        Command::ShowConfig => Ok(()),
    }
}

/// Install the stderr subscriber and, if configured, a daily-rolling file log.
fn init_logging(verbose: u8, file_log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let (file, guard) = match file_log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "adr-council.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(stderr).with(file).init();
    guard
}

/// === Dependency Injection ===
async fn build_session(config: &FileConfig) -> Result<SessionManager> {
    let engine_config = config.to_engine_config();
    engine_config.validate()?;

    let store: Arc<dyn RunStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(InMemoryRunStore::new()),
        StorageBackend::File => {
            let dir = config
                .storage
                .dir
                .clone()
                .or_else(FileRunStore::default_dir)
                .context("No data directory available; set storage.dir")?;
            let store = FileRunStore::open(dir).await?;
            if let Some(ttl) = config.storage.ttl() {
                match store.cleanup(ttl).await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "Removed expired runs"),
                    Err(e) => warn!("Run cleanup failed: {}", e),
                }
            }
            Arc::new(store)
        }
    };

    let gateway = OpenAiCompatibleGateway::new(
        &config.provider.base_url,
        config.provider.api_key(),
        config.agent_models(),
        config.provider.request_timeout(),
    )?
    .with_temperature(config.provider.temperature);
    let gateway: Arc<dyn AgentGateway> = if config.provider.circuit_breaker_enabled() {
        Arc::new(CircuitBreakerGateway::new(
            Arc::new(gateway),
            config.provider.failure_threshold,
            config.provider.reset_timeout(),
        ))
    } else {
        Arc::new(gateway)
    };

    let mut engine = DeliberationEngine::new(gateway, store, engine_config);
    if let Some(journal) = config
        .logging
        .resolved_journal_dir()
        .and_then(JsonlEventJournal::new)
    {
        engine = engine.with_journal(Arc::new(journal));
    }

    Ok(SessionManager::new(Arc::new(engine)))
}

async fn follow(
    session: &SessionManager,
    cli: &Cli,
    config: &FileConfig,
    run_id: RunId,
    from: u64,
) -> Result<()> {
    let notifier: Box<dyn ProgressNotifier> = if cli.quiet || cli.format == OutputFormat::Json {
        Box::new(QuietProgress)
    } else {
        Box::new(ProgressReporter::new(config.council.agents.len()))
    };
    let responder = StdinClarification::new();
    RunFollower::new(session, notifier.as_ref(), &responder)
        .follow(run_id, from)
        .await?;
    Ok(())
}

/// Print where the run ended up; a failed run is an error exit.
async fn finish(
    session: &SessionManager,
    formatter: &(dyn OutputFormatter + Send + Sync),
    run_id: RunId,
) -> Result<()> {
    let run = session.snapshot(run_id).await?;
    match run.status {
        RunStatus::Converged => match session.outcome(run_id).await {
            Ok(adr) => println!("{}", formatter.format_adr(&adr)),
            Err(e) => return Err(e.into()),
        },
        RunStatus::Failed => {
            let report = session.failure_report(run_id).await?;
            println!("{}", formatter.format_failure(&report));
            bail!("Run {} failed: {}", run_id, report.reason);
        }
        RunStatus::AwaitingClarification => {
            println!("{}", formatter.format_run(&run));
            eprintln!("Run {} is paused; answer with `adr-council answer`", run_id);
        }
        RunStatus::Running => {
            println!("{}", formatter.format_run(&run));
            eprintln!(
                "Run {} stopped before finishing; continue with `adr-council resume {}`",
                run_id, run_id
            );
        }
        RunStatus::Cancelled => println!("{}", formatter.format_run(&run)),
    }
    Ok(())
}

fn parse_run_id(raw: &str) -> Result<RunId> {
    raw.trim()
        .parse()
        .with_context(|| format!("'{}' is not a run id", raw))
}

fn load_context(path: &Path) -> Result<SystemContext> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid system context in {}", path.display()))
}
