//! Register transport for meter communication
//!
//! [`RegisterTransport`] is the capability the acquisition core reads
//! through. [`ModbusTcpTransport`] implements it over `tokio-modbus` with
//! connect and per-request timeouts. The transport never retries; a failed
//! read is reported to the caller as-is.

use crate::config::ModbusConfig;
use crate::error::{MeterError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::time::timeout;
use tokio_modbus::client::tcp;
use tokio_modbus::prelude::*;

/// Register table a device's fields are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegisterTable {
    /// Function code 0x03
    #[default]
    Holding,
    /// Function code 0x04
    Input,
}

/// Word-granular register reads over one connection
#[async_trait::async_trait]
pub trait RegisterTransport: Send {
    /// Establish the session
    async fn connect(&mut self) -> Result<()>;

    /// Close the session; a no-op when not connected
    async fn disconnect(&mut self) -> Result<()>;

    /// Whether the session is usable
    fn is_connected(&self) -> bool;

    /// Read `count` consecutive registers starting at `start`
    async fn read(&mut self, start: u16, count: u16) -> Result<Vec<u16>>;
}

/// Modbus TCP transport
pub struct ModbusTcpTransport {
    /// Modbus TCP client connection
    client: Option<tokio_modbus::client::Context>,

    /// Configuration
    config: ModbusConfig,

    /// Connection timeout
    connection_timeout: Duration,

    /// Operation timeout
    operation_timeout: Duration,

    /// Logger
    logger: StructuredLogger,
}

impl ModbusTcpTransport {
    /// Create a new, unconnected transport
    pub fn new(config: &ModbusConfig) -> Self {
        let logger = get_logger_with_context(
            LogContext::new("transport").with_field("unit_id", config.unit_id.to_string()),
        );
        Self {
            client: None,
            config: config.clone(),
            connection_timeout: config.timeout(),
            operation_timeout: config.timeout(),
            logger,
        }
    }

    /// Override the request timeout independently of the connect timeout
    pub fn with_operation_timeout(mut self, operation_timeout: Duration) -> Self {
        self.operation_timeout = operation_timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    async fn resolve(&mut self) -> Result<SocketAddr> {
        let address = self.address();
        if let Ok(addr) = address.parse::<SocketAddr>() {
            return Ok(addr);
        }
        let mut addrs = lookup_host(address.as_str())
            .await
            .map_err(|e| MeterError::connection(format!("Cannot resolve {}: {}", address, e)))?;
        addrs
            .next()
            .ok_or_else(|| MeterError::connection(format!("No address found for {}", address)))
    }

    /// Get client reference or error if not connected
    fn get_client(&mut self) -> Result<&mut tokio_modbus::client::Context> {
        self.client
            .as_mut()
            .ok_or_else(|| MeterError::transport("Not connected to Modbus server"))
    }
}

#[async_trait::async_trait]
impl RegisterTransport for ModbusTcpTransport {
    async fn connect(&mut self) -> Result<()> {
        let address = self.address();
        if self.config.host.trim().is_empty() {
            return Err(MeterError::connection("Host cannot be empty"));
        }

        self.logger
            .info(&format!("Connecting to Modbus server at {}", address));

        let socket_addr = self.resolve().await?;
        let slave = Slave(self.config.unit_id);

        match timeout(self.connection_timeout, tcp::connect_slave(socket_addr, slave)).await {
            Ok(Ok(client)) => {
                self.client = Some(client);
                self.logger
                    .info(&format!("Connected to Modbus device at {}", address));
                Ok(())
            }
            Ok(Err(e)) => {
                let error_msg = format!("Failed to connect to {}: {}", address, e);
                self.logger.error(&error_msg);
                Err(MeterError::connection(error_msg))
            }
            Err(_) => {
                let error_msg = format!("Connection to {} timed out", address);
                self.logger.error(&error_msg);
                Err(MeterError::connection(error_msg))
            }
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.client.take().is_some() {
            // Dropping the context closes the socket
            self.logger.info("Disconnected from Modbus device");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    async fn read(&mut self, start: u16, count: u16) -> Result<Vec<u16>> {
        let timeout_duration = self.operation_timeout;
        let table = self.config.register_table;

        // Log before borrowing client
        self.logger.debug(&format!(
            "Reading {} {:?} registers from address {}",
            count, table, start
        ));

        let client = self.get_client()?;
        let response = match table {
            RegisterTable::Holding => {
                timeout(timeout_duration, client.read_holding_registers(start, count)).await
            }
            RegisterTable::Input => {
                timeout(timeout_duration, client.read_input_registers(start, count)).await
            }
        };

        match response {
            Ok(Ok(Ok(words))) => {
                self.logger
                    .trace(&format!("Read {} registers: {:?}", words.len(), words));
                Ok(words)
            }
            Ok(Ok(Err(exception))) => {
                let error_msg = format!(
                    "Device rejected read of {} registers at {}: {}",
                    count, start, exception
                );
                self.logger.warn(&error_msg);
                Err(MeterError::transport(error_msg))
            }
            Ok(Err(e)) => {
                let error_msg = format!("Failed to read registers at {}: {}", start, e);
                self.logger.error(&error_msg);
                if matches!(e, tokio_modbus::Error::Transport(_)) {
                    // The socket is gone; force a reconnect
                    self.client = None;
                }
                Err(MeterError::transport(error_msg))
            }
            Err(_) => {
                let error_msg = format!("Read of {} registers at {} timed out", count, start);
                self.logger.error(&error_msg);
                Err(MeterError::transport(error_msg))
            }
        }
    }
}
