use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::{fmt, EnvFilter};

use webcheck_core::{
    ConfigError, Dispatcher, EndpointRegistry, HttpProber, Monitor, Settings,
};

/// Periodic web endpoint checks with status-change notifications.
#[derive(Parser)]
#[command(name = "web-check", version, about)]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Check endpoints every polling period and notify on status changes.
    Run {
        /// Path to the configuration file (JSON, or TOML by extension).
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// Path to the endpoint list file.
        #[arg(short, long, default_value = "url_list.json")]
        list: PathBuf,
    },
    /// Run a single check cycle and print the result.
    Check {
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        #[arg(short, long, default_value = "url_list.json")]
        list: PathBuf,

        /// Also send the result to the configured channels if anything is down.
        #[arg(long, default_value_t = false)]
        notify: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Run { config, list } => run(&config, &list).await,
        Commands::Check {
            config,
            list,
            notify,
        } => check(&config, &list, notify).await,
    }
}

async fn run(config_path: &Path, list_path: &Path) {
    let monitor = build_monitor(config_path, list_path, true);
    monitor.announce_startup().await;
    monitor.run(shutdown_signal()).await;
    tracing::info!("Shutdown complete");
}

async fn check(config_path: &Path, list_path: &Path, notify: bool) {
    let mut monitor = build_monitor(config_path, list_path, notify);
    let report = monitor.poll_once().await;
    let evaluation = &report.evaluation;

    println!(
        "{} {}  {}",
        style("web-check").bold(),
        style(env!("CARGO_PKG_VERSION")).dim(),
        style(report.checked_at.format("%Y-%m-%d %H:%M:%S UTC")).dim()
    );
    for (i, endpoint) in monitor.registry().endpoints().iter().enumerate() {
        let status = if evaluation.bitmap.is_unhealthy(i) {
            let reason = evaluation
                .failures
                .iter()
                .find(|f| f.index == i)
                .map(|f| f.reason.as_str())
                .unwrap_or_default();
            format!("{} {}", style("DOWN").red().bold(), reason)
        } else {
            format!("{}", style("UP").green().bold())
        };
        println!(
            "  {:<24} {}  {}",
            endpoint.name,
            status,
            style(&endpoint.url).dim()
        );
    }
    println!(
        "\n  ALL - {}, OK - {}, BAD - {}",
        evaluation.total,
        evaluation.healthy,
        evaluation.bad()
    );

    if let Some(dispatch) = report.dispatch.filter(|d| d.attempted() > 0) {
        println!(
            "  {} delivered, {} failed",
            dispatch.delivered, dispatch.failed
        );
    }

    if evaluation.bad() > 0 {
        std::process::exit(2);
    }
}

/// Load both files and assemble the monitor. Exits with status 1 on any
/// startup configuration error.
fn build_monitor(config_path: &Path, list_path: &Path, notify: bool) -> Monitor {
    let settings = Settings::load(config_path).unwrap_or_else(|e| fatal(&e));
    tracing::info!(
        path = %config_path.display(),
        channels = settings.channels.iter().filter(|c| c.enabled).count(),
        "Loaded config file"
    );
    let registry = EndpointRegistry::load(list_path).unwrap_or_else(|e| fatal(&e));

    let prober = HttpProber::from_config(&settings.monitor).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build probe client");
        std::process::exit(1);
    });
    let client = Dispatcher::build_client(settings.monitor.request_timeout).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build notification client");
        std::process::exit(1);
    });

    let channels = if notify { settings.channels } else { Vec::new() };
    Monitor::new(
        settings.monitor,
        registry,
        Arc::new(prober),
        Dispatcher::new(channels, client),
    )
}

fn fatal(e: &ConfigError) -> ! {
    tracing::error!(path = %e.path().display(), "{}", e);
    std::process::exit(1);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

fn init_tracing(log_format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format {
        LogFormat::Json => {
            fmt().with_env_filter(filter).json().init();
        }
        LogFormat::Pretty => {
            fmt().with_env_filter(filter).init();
        }
    }
}
