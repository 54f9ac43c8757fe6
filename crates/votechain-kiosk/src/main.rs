//! VoteChain Kiosk - Main entry point
//!
//! Runs the kiosk against the HTTP backend with the console front panel
//! standing in for the hardware. Logs go to a file while the panel owns the
//! terminal.

use std::fs::OpenOptions;
use std::io;
use std::panic;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, LeaveAlternateScreen};
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use votechain_kiosk::devices::console;
use votechain_kiosk::{HttpBackend, Kiosk, KioskConfig};

#[derive(Parser)]
#[command(name = "votechain-kiosk")]
#[command(about = "Biometric voting kiosk for the VoteChain backend", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: $VOTECHAIN_CONFIG or the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the config file
    #[arg(long)]
    backend_url: Option<String>,

    /// Log file, overriding the config file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Run the boot self-test and exit
    #[arg(long)]
    self_test_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(KioskConfig::default_path);
    let mut config = KioskConfig::load_or_create(&config_path)?;
    config.apply_env();
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
    }
    if let Some(path) = cli.log_file {
        config.log_file = Some(path);
    }
    let log_path = config
        .log_file
        .get_or_insert_with(KioskConfig::default_log_path)
        .clone();
    config.validate()?;
    config.ensure_directories()?;

    // Initialize logging
    let log = OpenOptions::new().create(true).append(true).open(&log_path)?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "votechain_kiosk=info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log)),
        )
        .init();

    info!("Starting VoteChain kiosk v{}", env!("CARGO_PKG_VERSION"));
    info!("Config {:?}; backend {}", config_path, config.backend_base());

    // Restore the terminal if anything panics while the panel owns it
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let backend = Arc::new(HttpBackend::from_config(&config)?);
    let (devices, front) = console::build(&config);
    let stop = Arc::new(AtomicBool::new(false));
    let (quit_tx, quit_rx) = oneshot::channel();
    let panel_thread = front.spawn(Arc::clone(&stop), quit_tx)?;

    let self_test_only = cli.self_test_only;
    let mut kiosk = Kiosk::new(devices, backend, config);
    let result = match kiosk.self_test().await {
        Ok(_) if self_test_only => {
            info!("Self-test passed");
            Ok(())
        }
        Ok(_) => {
            kiosk.run(shutdown(quit_rx)).await;
            Ok(())
        }
        Err(e) => {
            // The error screen stays up until the operator quits
            error!("{}", e);
            shutdown(quit_rx).await;
            Err(e.into())
        }
    };

    stop.store(true, Ordering::SeqCst);
    match panel_thread.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Front panel error: {}", e),
        Err(_) => error!("Front panel thread panicked"),
    }

    info!("Kiosk shutting down");
    result
}

async fn shutdown(quit: oneshot::Receiver<()>) {
    tokio::select! {
        _ = quit => info!("Front panel closed"),
        _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
    }
}
