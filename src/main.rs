//! splitroute CLI
//!
//! Loads the config directory, reconciles `/etc/hosts` and the routing
//! table, and reports what changed.

use anyhow::Context;
use clap::Parser;
use splitroute::util::{REQUIRED_TOOLS, is_root, require_tools};
use splitroute::{
    Config, DigLookup, HostsFile, KeepAlive, Ports, Reconciler, RunFlags, StateStore,
    SystemInterfaces, SystemRoutingTable, SystemRunner,
};
use std::path::PathBuf;

/// Route selected domains and hosts over a specific network interface.
#[derive(Parser)]
#[command(name = "splitroute")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration directory
    #[arg(short, long, env = "SPLITROUTE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Show what would change without writing anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Bind routes to the active hardware port instead of gateway + MAC
    #[arg(short, long = "auto-interface")]
    auto_interface: bool,

    /// Discard recorded state and re-resolve every endpoint
    #[arg(short, long)]
    ignore_state: bool,

    /// Do not send a desktop notification
    #[arg(long)]
    no_notify: bool,

    /// Skip the check for required system tools
    #[arg(long)]
    skip_preflight: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    if !cli.skip_preflight {
        require_tools(REQUIRED_TOOLS)?;
    }

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => splitroute::config::default_config_dir()
            .context("HOME is not set; pass --config-dir")?,
    };
    let config = Config::load(&config_dir)
        .with_context(|| format!("loading config from {}", config_dir.display()))?;

    let flags = RunFlags {
        dry_run: cli.dry_run,
        auto_detect_interface: cli.auto_interface,
        ignore_state: cli.ignore_state,
    };

    let elevate = !flags.dry_run && !is_root();
    let _keepalive = if elevate {
        Some(KeepAlive::sudo(config.keepalive_interval()).context("acquiring sudo")?)
    } else {
        None
    };

    let runner = SystemRunner::new().with_sudo(elevate);
    let dns = DigLookup::new(runner);
    let routes = SystemRoutingTable::new(runner);
    let interfaces = SystemInterfaces::new(runner);
    let hosts = HostsFile::with_path(&config.settings.hosts_file).with_sudo(elevate);

    let reconciler = Reconciler::new(
        Ports {
            dns: &dns,
            routes: &routes,
            overrides: &hosts,
            interfaces: &interfaces,
        },
        StateStore::new(config.state_file()),
        config.run_options(flags),
    );

    let report = match reconciler.run(&config.endpoints) {
        Ok(report) => report,
        Err(e) if e.is_permission_denied() => {
            return Err(e).context("permission denied; rerun with sudo or as an administrator");
        }
        Err(e) => return Err(e.into()),
    };

    for (endpoint, reason) in &report.skipped {
        tracing::warn!(endpoint = %endpoint, reason = %reason, "Not provisioned this run");
    }
    let summary = report.summary();
    tracing::info!("{summary}");

    if config.settings.notify && !cli.no_notify {
        splitroute::notify::notify("splitroute", &summary);
    }

    Ok(())
}
