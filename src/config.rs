//! Configuration management for energymeter
//!
//! This module handles loading, validation, and management of the service
//! configuration from YAML files. Command line flags are applied on top by the
//! binary.

use crate::decoder::{Endian, Endianness};
use crate::devices;
use crate::error::{MeterError, Result};
use crate::planner::ChunkPlanner;
use crate::register_map::{DeviceDescriptor, RegisterField};
use crate::transport::RegisterTable;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod defaults;

/// Largest register count a single FC03/FC04 request may carry
pub const MODBUS_MAX_READ_REGISTERS: u16 = 125;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Modbus TCP connection configuration
    pub modbus: ModbusConfig,

    /// Wire endianness and request sizing
    pub decoding: DecodingConfig,

    /// Register map selection
    pub device: DeviceConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

/// Modbus TCP connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    /// Host name or IP address of the meter
    pub host: String,

    /// TCP port (typically 502)
    pub port: u16,

    /// Unit (slave) identifier
    pub unit_id: u8,

    /// Connect and per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Register table the fields are read from
    pub register_table: RegisterTable,
}

/// Decoding parameters shared by every field of the device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodingConfig {
    /// Byte order within a register word (AUTO, BIG, LITTLE)
    pub byte_order: Endian,

    /// Word order of multi-register values (AUTO, BIG, LITTLE)
    pub word_order: Endian,

    /// Maximum number of registers per read request
    pub max_chunk_words: u16,

    /// Largest run of unused registers bridged inside one request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_gap_words: Option<u16>,
}

/// Device register map selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Built-in profile name, or the device name for inline registers
    pub name: String,

    /// Inline register map; when empty the built-in profile is used
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub registers: Vec<RegisterField>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Log file path or directory; console only when unset
    pub file: Option<String>,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "energymeter.yaml",
            "/data/energymeter.yaml",
            "/etc/energymeter/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.modbus.host.trim().is_empty() {
            return Err(MeterError::validation(
                "modbus.host",
                "Host cannot be empty",
            ));
        }

        if self.modbus.port == 0 {
            return Err(MeterError::validation(
                "modbus.port",
                "Port must be greater than 0",
            ));
        }

        if self.modbus.timeout_ms == 0 {
            return Err(MeterError::validation(
                "modbus.timeout_ms",
                "Must be greater than 0",
            ));
        }

        if self.decoding.max_chunk_words == 0
            || self.decoding.max_chunk_words > MODBUS_MAX_READ_REGISTERS
        {
            return Err(MeterError::Validation {
                field: "decoding.max_chunk_words".to_string(),
                message: format!("Must be between 1 and {}", MODBUS_MAX_READ_REGISTERS),
            });
        }

        if self.poll_interval_ms == 0 {
            return Err(MeterError::validation(
                "poll_interval_ms",
                "Must be greater than 0",
            ));
        }

        if self.device.name.trim().is_empty() {
            return Err(MeterError::validation(
                "device.name",
                "Device name cannot be empty",
            ));
        }

        Ok(())
    }

    /// Resolved byte/word order; AUTO is rejected here
    pub fn endianness(&self) -> Result<Endianness> {
        Endianness::resolve(self.decoding.byte_order, self.decoding.word_order)
    }

    /// Planner configured with the request size limits
    pub fn planner(&self) -> ChunkPlanner {
        let planner = ChunkPlanner::new(self.decoding.max_chunk_words);
        match self.decoding.max_gap_words {
            Some(gap) => planner.with_max_gap(gap),
            None => planner,
        }
    }

    /// Build the device descriptor from inline registers or a built-in profile
    pub fn descriptor(&self) -> Result<DeviceDescriptor> {
        if self.device.registers.is_empty() {
            devices::builtin(&self.device.name)
        } else {
            DeviceDescriptor::new(self.device.name.clone(), self.device.registers.clone())
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ModbusConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
