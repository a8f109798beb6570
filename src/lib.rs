//! # circuit-elements: Clocked and Externally Driven Circuit Elements
//!
//! Elements that plug into an event-driven digital logic simulator.
//! The simulator (netlist, scheduler, rendering) lives elsewhere; this crate
//! defines what an element must provide and implements two of them.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `Element` is the contract between an element and the simulator
//! 2. **Masked values**: a node never holds more bits than its width, even mid-resize
//! 3. **Synchronous resolve**: no element blocks or does I/O inside `resolve`
//! 4. **Explicit lifecycles**: the serial bridge connects on `start()`, not on construction
//!
//! ## Quick Start
//!
//! ```rust
//! use circuit_elements::{Element, ElementConfig, ShiftRegister, SimulationQueue};
//!
//! # fn example() -> circuit_elements::Result<()> {
//! let mut reg = ShiftRegister::new(ElementConfig::default(), 3)?;
//! let mut queue = SimulationQueue::new();
//!
//! reg.inputs()[0].set(1u32);
//! reg.clock().set(1u32);
//! reg.resolve(&mut queue);
//!
//! assert_eq!(reg.contents(), "1xx");
//! assert_eq!(queue.len(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Elements
//!
//! | Element | Feature | Description |
//! |---------|---------|-------------|
//! | `ShiftRegister` | (always) | Edge-triggered reset/load/shift register |
//! | `SerialInput` | `serial` (default) | Async serial byte stream → node value |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod scheduler;
pub mod element;
pub mod persist;
pub mod export;
#[cfg(feature = "serial")]
pub mod serial;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    BitWidth, Signal, SignalCell, SignalWriter, ValueNode,
    NodeId, ElementId, NodeRole, Direction, Position,
};

// ============================================================================
// Re-exports: Elements
// ============================================================================

pub use element::{
    Element, ElementConfig, ElementKind, NodeList,
    ShiftRegister, ClockLevel, EdgeAction,
};
#[cfg(feature = "serial")]
pub use element::{SerialInput, BridgeState, BridgeStats};

// ============================================================================
// Re-exports: Scheduling and persistence
// ============================================================================

pub use scheduler::{Scheduler, SimulationQueue, QueuedEvent};
pub use persist::{SaveRecord, NodeRef, load};
pub use export::{export_verilog, verilog_module};

#[cfg(feature = "serial")]
pub use serial::{SerialConfig, SerialProvider, SerialPort, ByteReader, ReadChunk};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serial access denied: {0}")]
    PermissionDenied(String),

    #[error("Serial channel open failed: {0}")]
    ChannelOpen(String),

    #[error("Serial read failed: {0}")]
    TransientRead(String),

    #[error("Invalid stage count {requested:?} (current {current}, allowed 1..=32)")]
    InvalidStageCount { requested: Option<usize>, current: usize },

    #[error("Invalid stage count {0} for a new shift register (allowed 1..=32)")]
    InvalidInitialStageCount(usize),

    #[error("Invalid bit width {0} (allowed 1..=32)")]
    InvalidBitWidth(u32),

    #[error("Invalid save record: {0}")]
    InvalidRecord(String),

    #[error("Already started: {0}")]
    AlreadyStarted(String),

    #[error("No async runtime: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Terminal errors end a bridge's lifecycle; the rest are retried or rejected in place.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::PermissionDenied(_) | Error::ChannelOpen(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
