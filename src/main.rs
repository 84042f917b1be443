//! Head unit application host.
//!
//! # Architecture Overview
//!
//! ```text
//!   main thread                              tokio runtime
//!   ───────────                              ─────────────
//!   parse CLI, install panic hook
//!        │
//!        ▼
//!   Orchestrator::run ──block_on──▶ Configure        (config layers, logging, registry)
//!        │           ──block_on──▶ InitCoreServices (monitor, app state)
//!        │           ──block_on──▶ InitHardware     (CAN, GPIO, audio; degrade on failure)
//!        │           ──block_on──▶ LoadPlugins      (all or nothing)
//!        │
//!        ▼                                   background: health endpoint,
//!   UiShell::run (blocks)                     metrics exporter, heartbeat
//!        │                                   signal listener → cancel
//!        ▼
//!   ShutdownGuard teardown ──block_on──▶ stop services, stop background
//!        │
//!        ▼
//!   exit code 0 / -1
//! ```

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;

use headunit_host::config::ConfigSources;
use headunit_host::lifecycle::{signals, EXIT_FAILURE};
use headunit_host::ui::{ConsoleShell, HeadlessShell, UiShell};
use headunit_host::{FaultHandler, Launch, Orchestrator};

#[derive(Parser)]
#[command(name = "headunit")]
#[command(about = "Vehicle head unit application host", long_about = None)]
struct Cli {
    /// Directory holding headunit.toml and headunit.<env>.toml
    #[arg(short, long, default_value = "config")]
    config_dir: PathBuf,

    /// Environment overlay to apply (falls back to HEADUNIT_ENVIRONMENT)
    #[arg(short, long)]
    environment: Option<String>,

    /// Override a configuration key, e.g. --set hardware.use_mock=true
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Override logging.level
    #[arg(long)]
    log_level: Option<String>,

    /// Run without the interactive console
    #[arg(long)]
    headless: bool,
}

fn main() {
    let cli = Cli::parse();
    println!("headunit v{} starting", env!("CARGO_PKG_VERSION"));

    let faults = FaultHandler::new();
    faults.install_panic_hook();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("headunit-worker")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to start async runtime: {e}");
            process::exit(EXIT_FAILURE);
        }
    };

    let mut sources = ConfigSources::new(cli.config_dir);
    if let Some(environment) = cli.environment {
        sources = sources.with_environment(environment);
    }
    for assignment in cli.overrides {
        sources = sources.with_override(assignment);
    }
    if let Some(level) = cli.log_level {
        sources = sources.with_override(format!("logging.level={level}"));
    }

    let orchestrator = Orchestrator::new(runtime.handle().clone(), faults, Launch::new(sources));
    if let Err(e) = signals::spawn_signal_listener(orchestrator.context().clone()) {
        eprintln!("warning: signal handlers unavailable: {e}");
    }

    let shell: Box<dyn UiShell> = if cli.headless {
        Box::new(HeadlessShell::new())
    } else {
        Box::new(ConsoleShell::stdio())
    };

    let report = orchestrator.run(shell.as_ref());
    if let Some(diagnostic) = report.diagnostic() {
        eprintln!("{diagnostic}");
    }

    runtime.shutdown_timeout(Duration::from_secs(1));
    process::exit(report.exit_code);
}
