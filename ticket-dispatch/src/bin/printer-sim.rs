//! Raw ESC/POS printer simulator
//!
//! Listens on `PORT` (default 9100) and appends every received job to
//! `PRINTER_LOG` (default `printer.log`). Point a `raw-escpos` registry entry
//! at it to watch tickets arrive without hardware.

use anyhow::Context;
use ticket_dispatch::logger;
use ticket_dispatch::{Config, PrinterEmulator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::from_env().context("Invalid configuration")?;
    logger::init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    let port: u16 = match std::env::var("PORT") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("Invalid PORT: {}", value))?,
        Err(_) => 9100,
    };
    let log_path = std::env::var("PRINTER_LOG").unwrap_or_else(|_| "printer.log".to_string());

    let emulator = PrinterEmulator::bind_with_log(&format!("0.0.0.0:{}", port), &log_path)
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;

    tracing::info!(
        addr = %emulator.local_addr(),
        log = %log_path,
        "Printer simulator ready, press Ctrl+C to stop"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!(jobs = emulator.job_count(), "Shutting down");
    emulator.shutdown().await;
    Ok(())
}
