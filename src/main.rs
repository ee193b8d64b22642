use anyhow::{Context, Result};
use clap::Parser;
use energymeter::config::Config;
use energymeter::decoder::Endian;
use energymeter::logging::{LogContext, get_logger_with_context, init_logging};
use energymeter::service::{MeterService, log_record};
use std::path::PathBuf;
use tracing::{error, info};

/// Energy meter Modbus reader
#[derive(Debug, Parser)]
#[command(name = "energymeter", version = env!("APP_VERSION"), about)]
struct Cli {
    /// YAML configuration file; default locations are searched when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// IP address or host name of the Modbus device
    #[arg(long)]
    host: Option<String>,

    /// Port number of the Modbus device
    #[arg(long)]
    port: Option<u16>,

    /// Modbus unit identifier
    #[arg(long)]
    unit_id: Option<u8>,

    /// Timeout for the Modbus connection in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Polling interval in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// Byte endianness (AUTO, BIG, LITTLE)
    #[arg(long, value_parser = parse_endian)]
    byteorder: Option<Endian>,

    /// Word endianness (AUTO, BIG, LITTLE)
    #[arg(long, value_parser = parse_endian)]
    wordorder: Option<Endian>,

    /// Maximum number of registers to read per request
    #[arg(long, alias = "message_size")]
    message_size: Option<u16>,

    /// Built-in device profile
    #[arg(long)]
    device: Option<String>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_endian(s: &str) -> std::result::Result<Endian, String> {
    s.parse::<Endian>().map_err(|e| e.to_string())
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.modbus.host = host;
        }
        if let Some(port) = self.port {
            config.modbus.port = port;
        }
        if let Some(unit_id) = self.unit_id {
            config.modbus.unit_id = unit_id;
        }
        if let Some(timeout) = self.timeout {
            config.modbus.timeout_ms = timeout.saturating_mul(1000);
        }
        if let Some(interval) = self.interval {
            config.poll_interval_ms = interval.saturating_mul(1000);
        }
        if let Some(byte_order) = self.byteorder {
            config.decoding.byte_order = byte_order;
        }
        if let Some(word_order) = self.wordorder {
            config.decoding.word_order = word_order;
        }
        if let Some(size) = self.message_size {
            config.decoding.max_chunk_words = size;
        }
        if let Some(device) = self.device {
            config.device.name = device;
            config.device.registers.clear();
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let mut config = match cli.config.take() {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_logging(&config.logging).context("Failed to initialize logging")?;
    info!(
        "energymeter {} polling {}:{}",
        env!("APP_VERSION"),
        config.modbus.host,
        config.modbus.port
    );

    let mut service = MeterService::from_config(&config).context("Failed to set up polling")?;
    let record_logger = get_logger_with_context(
        LogContext::new("record").with_device(service.acquisition().descriptor().name()),
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    match service
        .run(shutdown, |record| log_record(&record_logger, record))
        .await
    {
        Ok(stats) => {
            info!(
                "Polling stopped by user after {} cycles ({} failed)",
                stats.cycles, stats.failed
            );
            Ok(())
        }
        Err(e) => {
            error!("Polling failed: {}", e);
            Err(anyhow::anyhow!("Polling error: {}", e))
        }
    }
}
