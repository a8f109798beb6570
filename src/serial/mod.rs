//! # Serial Access
//!
//! The hardware-access API the serial bridge consumes, split into the three
//! steps a browser-style serial API exposes: ask for a port, open it with a
//! line configuration, then read chunks until end-of-stream.
//!
//! ```text
//! SerialProvider::request_access() → SerialPort::open(config) → ByteReader::read()*
//! ```
//!
//! | Provider | Module | Description |
//! |----------|--------|-------------|
//! | `DeviceProvider` | `device` | A character device or any path tokio can open |
//! | `ScriptedProvider` | `scripted` | Deterministic fake for tests and demos |

pub mod device;
pub mod scripted;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use device::{DevicePort, DeviceProvider, DeviceStream, StreamReader};
pub use scripted::{ScriptFeed, ScriptStep, ScriptedProvider};

// ============================================================================
// Line configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    Hardware,
}

/// Channel configuration handed to [`SerialPort::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    pub flow_control: FlowControl,
    /// Upper bound on the size of one read.
    pub buffer_size: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            flow_control: FlowControl::None,
            buffer_size: 255,
        }
    }
}

// ============================================================================
// Channel traits
// ============================================================================

/// One result of [`ByteReader::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadChunk {
    /// Bytes received. May be empty.
    Data(Bytes),
    /// The stream ended; no further reads will produce data.
    Done,
}

/// Grants access to a port. Failure maps to `Error::PermissionDenied`.
#[async_trait]
pub trait SerialProvider: Send + Sync + 'static {
    type Port: SerialPort;

    async fn request_access(&self) -> Result<Self::Port>;
}

/// A granted but unopened port. Failure maps to `Error::ChannelOpen`.
#[async_trait]
pub trait SerialPort: Send + 'static {
    type Reader: ByteReader;

    async fn open(self, config: &SerialConfig) -> Result<Self::Reader>;
}

/// An open byte stream. Failure maps to `Error::TransientRead`.
#[async_trait]
pub trait ByteReader: Send + 'static {
    async fn read(&mut self) -> Result<ReadChunk>;
}
