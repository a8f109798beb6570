//! # Element Contract
//!
//! This is THE contract between a circuit element and the simulator that
//! drives it. Every element is resolved synchronously, one at a time, by
//! an external scheduler; nothing here blocks or performs I/O.
//!
//! ## Implementations
//!
//! | Element | Module | Description |
//! |---------|--------|-------------|
//! | `ShiftRegister` | `shift_register` | Edge-triggered load/shift register, 1..=32 stages |
//! | `SerialInput` | `serial_input` | Bridges an async byte stream onto one node (feature `serial`) |

pub mod shift_register;
#[cfg(feature = "serial")]
pub mod serial_input;

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::model::{BitWidth, Direction, ElementId, Position, ValueNode};
use crate::persist::SaveRecord;
use crate::scheduler::Scheduler;
use crate::Result;

pub use shift_register::{ClockLevel, EdgeAction, ShiftRegister};
#[cfg(feature = "serial")]
pub use serial_input::{BridgeState, BridgeStats, SerialInput};

/// Owned-node listing returned by [`Element::nodes`].
pub type NodeList<'a> = SmallVec<[&'a ValueNode; 8]>;

// ============================================================================
// Element kinds
// ============================================================================

/// Element type tag, persisted as the record's object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    #[serde(rename = "Shifter")]
    ShiftRegister,
    #[serde(rename = "SerialInput")]
    SerialInput,
}

impl ElementKind {
    /// Name used in save records and generated HDL.
    pub fn object_type(self) -> &'static str {
        match self {
            ElementKind::ShiftRegister => "Shifter",
            ElementKind::SerialInput => "SerialInput",
        }
    }

    /// Propagation delay an element of this kind gets unless configured otherwise.
    pub fn default_delay(self) -> u64 {
        match self {
            ElementKind::ShiftRegister => 10,
            ElementKind::SerialInput => 0,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.object_type())
    }
}

// ============================================================================
// Element configuration
// ============================================================================

/// Placement and sizing shared by every element.
///
/// `propagation_delay` of `None` means "use the kind's default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementConfig {
    pub position: Position,
    pub direction: Direction,
    pub bit_width: BitWidth,
    pub propagation_delay: Option<u64>,
}

impl ElementConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, x: i32, y: i32) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_bit_width(mut self, width: BitWidth) -> Self {
        self.bit_width = width;
        self
    }

    pub fn with_propagation_delay(mut self, delay: u64) -> Self {
        self.propagation_delay = Some(delay);
        self
    }
}

// ============================================================================
// Element trait
// ============================================================================

/// The capability set every element provides to the simulator.
///
/// The trait is object-safe so a circuit can hold `Box<dyn Element>`;
/// [`Element::restore`] is the one constructor and is excluded from the vtable.
pub trait Element: Send + fmt::Debug {
    fn id(&self) -> ElementId;

    fn kind(&self) -> ElementKind;

    fn config(&self) -> &ElementConfig;

    /// Every node this element owns.
    fn nodes(&self) -> NodeList<'_>;

    /// Whether the scheduler may call [`Element::resolve`] during a normal
    /// propagation pass.
    fn is_resolvable(&self) -> bool {
        true
    }

    /// Read inputs, write outputs, hand changed outputs to `queue`.
    fn resolve(&mut self, queue: &mut dyn Scheduler);

    /// Resize every data node to `width`, re-masking held values.
    ///
    /// `BitWidth` is already validated, so this cannot fail half-way: either
    /// the call happens and every data node is resized, or it does not.
    fn set_bit_width(&mut self, width: BitWidth);

    /// Structural record sufficient to rebuild an equivalent element.
    fn snapshot(&self) -> SaveRecord;

    /// Rebuild an element from a record produced by [`Element::snapshot`].
    fn restore(record: &SaveRecord) -> Result<Self>
    where
        Self: Sized;

    fn bit_width(&self) -> BitWidth {
        self.config().bit_width
    }

    fn propagation_delay(&self) -> u64 {
        self.config().propagation_delay.unwrap_or_else(|| self.kind().default_delay())
    }
}
