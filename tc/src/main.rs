//! tc - test coordinator CLI

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use testcoord::cli::{Cli, Command, get_log_path};
use testcoord::config::Config;
use testcoord::coordinator::{HistoryLogger, LoggingExecutor, TestCoordinator};
use testcoord::ipc::{self, CoordinatorClient};
use testcoord::mask::FieldMaskRegistry;
use testcoord::plan::TestPlan;

fn parse_level(level_str: Option<&str>) -> tracing::Level {
    match level_str.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>, to_stderr: bool) -> Result<()> {
    // Priority: CLI --log-level > config file > INFO
    let level = parse_level(cli_log_level.or(config_log_level));
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if to_stderr {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        let log_path = get_log_path();
        if let Some(log_dir) = log_path.parent() {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }
        let log_file = fs::File::create(&log_path).context("Failed to create log file")?;
        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref(), cli.stderr)
        .context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Serve { plan, socket, history } => cmd_serve(config, plan, socket, history).await,
        Command::Validate { path } => cmd_validate(&path),
        Command::Ping { socket } => cmd_ping(&config, socket).await,
        Command::Status { socket } => cmd_status(&config, socket).await,
    }
}

async fn cmd_serve(
    config: Config,
    plan: Option<PathBuf>,
    socket: Option<PathBuf>,
    history: Option<PathBuf>,
) -> Result<()> {
    debug!(?plan, ?socket, ?history, "cmd_serve: called");

    let plan = match plan.or_else(|| config.test_plan.clone()) {
        Some(path) => TestPlan::load(&path).context(format!("Failed to load test plan {}", path.display()))?,
        None => {
            warn!("No test plan given, every notification passes through");
            TestPlan::default()
        }
    };
    let masks = FieldMaskRegistry::from_config(&config.masks).context("Failed to load field masks")?;
    let socket_path = socket.unwrap_or_else(|| config.socket_path());

    let coordinator = TestCoordinator::new(
        config.coordinator.clone(),
        config.cluster.clone(),
        plan,
        masks,
        Arc::new(LoggingExecutor),
    );
    let history_task = match history {
        Some(path) => {
            let logger = HistoryLogger::create(&path).context(format!("Failed to open history {}", path.display()))?;
            Some(tokio::spawn(logger.run(coordinator.subscribe_history())))
        }
        None => None,
    };

    let (listener, socket_path) = ipc::create_listener_at(&socket_path)?;
    let (handle, machine) = coordinator.start();

    println!("Coordinator listening on {}", socket_path.display());
    ipc::serve(listener, handle, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
        }
    })
    .await;

    ipc::cleanup_socket(&socket_path);
    // Connections still parked keep the machine alive; do not wait on them
    machine.abort();
    if let Some(task) = history_task {
        task.abort();
    }
    info!("Coordinator stopped");
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    debug!(?path, "cmd_validate: called");
    let plan = TestPlan::load(path)?;

    println!("{} {} ({} steps)", "Valid test plan:".green().bold(), path.display(), plan.len());
    for (index, step) in plan.steps.iter().enumerate() {
        let trigger = &step.trigger;
        println!(
            "  {}. {} when {}{} on {}{} -> {}{}",
            index + 1,
            step.label(index).bold(),
            trigger.when,
            trigger.by.as_ref().map(|by| format!(" by {}", by)).unwrap_or_default(),
            trigger.condition,
            if trigger.occurrence > 1 {
                format!(" (occurrence {})", trigger.occurrence)
            } else {
                String::new()
            },
            step.action.kind,
            if step.action.is_async { " [async]" } else { "" },
        );
    }
    Ok(())
}

fn client_for(config: &Config, socket: Option<PathBuf>) -> CoordinatorClient {
    CoordinatorClient::with_socket_path(socket.unwrap_or_else(|| config.socket_path()))
}

async fn cmd_ping(config: &Config, socket: Option<PathBuf>) -> Result<()> {
    debug!(?socket, "cmd_ping: called");
    let client = client_for(config, socket);
    if !client.socket_exists() {
        println!("{}", "Coordinator is not running (no socket)".red());
        return Ok(());
    }

    let version = client.ping().await.context("Coordinator did not answer")?;
    println!("{}", "Coordinator is alive".green());
    println!("Version: {}", version);
    Ok(())
}

async fn cmd_status(config: &Config, socket: Option<PathBuf>) -> Result<()> {
    debug!(?socket, "cmd_status: called");
    let status = client_for(config, socket).status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    if status.timed_out_releases > 0 {
        eprintln!(
            "{}",
            format!(
                "Warning: {} call(s) were let through after their release timed out",
                status.timed_out_releases
            )
            .yellow()
        );
    }
    Ok(())
}
