//! # energymeter - Modbus energy meter reader
//!
//! Polls register-based metering devices and decodes raw register words into
//! typed engineering values on a fixed interval.
//!
//! ## Architecture
//!
//! The acquisition core is independent of any live connection:
//!
//! - `register_map`: validated, immutable description of a device's fields
//! - `planner`: groups fields into size-bounded read requests
//! - `decoder`: word/byte order handling and typed value decoding
//! - `transport`: the register read capability and its Modbus TCP implementation
//! - `acquisition`: one all-or-nothing polling cycle producing a `DecodedRecord`
//!
//! Around it:
//!
//! - `config`: YAML configuration and validation
//! - `devices`: built-in register maps
//! - `logging`: structured logging and tracing
//! - `service`: connection management and the polling loop

pub mod acquisition;
pub mod config;
pub mod decoder;
pub mod devices;
pub mod error;
pub mod logging;
pub mod planner;
pub mod register_map;
pub mod service;
pub mod transport;

// Re-export commonly used types
pub use acquisition::{Acquisition, DecodedRecord};
pub use config::Config;
pub use decoder::{Endian, Endianness, Order, Value};
pub use error::{MeterError, Result};
pub use planner::{ChunkPlan, ChunkPlanner, ReadChunk};
pub use register_map::{DeviceDescriptor, RegisterField, ValueKind};
pub use transport::{ModbusTcpTransport, RegisterTransport};
