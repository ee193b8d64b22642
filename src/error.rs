//! Error types and handling for energymeter
//!
//! This module defines the error taxonomy of the acquisition core and the
//! surrounding service, providing consistent error handling and reporting.

use crate::planner::ReadChunk;
use thiserror::Error;

/// Result type alias for energymeter operations
pub type Result<T> = std::result::Result<T, MeterError>;

/// Main error type for energymeter
#[derive(Debug, Error)]
pub enum MeterError {
    /// Invalid device descriptor, planner settings or endianness
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid configuration file value
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// A single field does not fit into one read request
    #[error("Chunk too large: field '{field}' spans {words} words, maximum per request is {max}")]
    ChunkTooLarge { field: String, words: u16, max: u16 },

    /// The transport could not establish a session
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// A register read failed
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Returned words do not match the read plan
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// A polling cycle was aborted; no record was produced
    #[error("Cycle aborted at chunk {chunk} (start {start}, {count} words): {source}")]
    Cycle {
        chunk: usize,
        start: u16,
        count: u16,
        #[source]
        source: Box<MeterError>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl MeterError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        MeterError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        MeterError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new chunk-size error for the named field
    pub fn chunk_too_large<S: Into<String>>(field: S, words: u16, max: u16) -> Self {
        MeterError::ChunkTooLarge {
            field: field.into(),
            words,
            max,
        }
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        MeterError::Connection {
            message: message.into(),
        }
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        MeterError::Transport {
            message: message.into(),
        }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(message: S) -> Self {
        MeterError::Decode {
            message: message.into(),
        }
    }

    /// Wrap a failure of the chunk at `index` into a cycle error
    pub fn cycle(index: usize, chunk: &ReadChunk, source: MeterError) -> Self {
        MeterError::Cycle {
            chunk: index,
            start: chunk.start,
            count: chunk.count,
            source: Box::new(source),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        MeterError::Io {
            message: message.into(),
        }
    }

    /// Index of the failing chunk when this is a cycle error
    pub fn failed_chunk(&self) -> Option<usize> {
        match self {
            MeterError::Cycle { chunk, .. } => Some(*chunk),
            _ => None,
        }
    }

    /// The innermost error, looking through cycle wrappers
    pub fn root_cause(&self) -> &MeterError {
        match self {
            MeterError::Cycle { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<std::io::Error> for MeterError {
    fn from(err: std::io::Error) -> Self {
        MeterError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for MeterError {
    fn from(err: serde_yaml::Error) -> Self {
        MeterError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for MeterError {
    fn from(err: serde_json::Error) -> Self {
        MeterError::Serialization {
            message: err.to_string(),
        }
    }
}
