//! CLI entry point for the lanwarden presence monitor.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use lanwarden_registry::{AuditLog, DeviceRegistry};

use lanwarden_monitor::config::MonitorConfig;
use lanwarden_monitor::notify::AlertNotifier;
use lanwarden_monitor::scanner::SweepScanner;
use lanwarden_monitor::scheduler::Monitor;

#[derive(Parser)]
#[command(name = "lanwarden-monitor")]
#[command(about = "Continuous LAN presence monitor with new-device alerts")]
struct Cli {
    /// Subnet to watch (CIDR notation, e.g. 192.168.1.0/24).
    #[arg(short, long)]
    target: Option<String>,

    /// Run a single scan cycle and exit.
    #[arg(long)]
    once: bool,

    /// Run the continuous monitoring loop.
    #[arg(long)]
    daemon: bool,

    /// Config file prefix (default: lanwarden).
    #[arg(short, long, default_value = "lanwarden")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(target) = &cli.target {
        config.target = target.clone();
    }
    validate_target(&config.target)?;

    // Startup failures here exit non-zero; nothing past this point
    // terminates the process except a shutdown signal.
    let scanner = SweepScanner::new(&config.sweep_path);
    let version = scanner.verify_installation().await?;
    tracing::info!(
        sweep_version = %version.lines().next().unwrap_or("").trim(),
        "Sweep tool verified"
    );

    let registry = DeviceRegistry::load(&config.registry_path)?;
    tracing::info!(
        path = %config.registry_path,
        known_devices = registry.len(),
        "Registry loaded"
    );

    let audit = AuditLog::open(&config.audit_log_path)?;
    let notifier = AlertNotifier::from_config(&config.smtp)?;

    let mut monitor = Monitor::new(config, scanner, registry, audit, notifier);

    if cli.once {
        monitor.run_once().await?;
    } else if cli.daemon {
        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                signal_token.cancel();
            }
        });

        monitor.run(shutdown).await?;
    } else {
        anyhow::bail!("Specify --once (single cycle) or --daemon (continuous monitoring)");
    }

    Ok(())
}

fn validate_target(target: &str) -> anyhow::Result<()> {
    if target.is_empty() {
        anyhow::bail!("Target subnet required: set --target or monitor.target in config");
    }
    target
        .parse::<ipnet::IpNet>()
        .map_err(|e| anyhow::anyhow!("Invalid target CIDR {target}: {e}"))?;
    Ok(())
}

fn load_config(file_prefix: &str) -> anyhow::Result<MonitorConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("LANWARDEN")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<MonitorConfig>("monitor") {
        Ok(c) => Ok(c),
        Err(_) => Ok(MonitorConfig::default()),
    }
}
