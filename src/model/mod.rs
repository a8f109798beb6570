//! # Signal Model
//!
//! Width-bounded signal values and the nodes that carry them.
//! These types cross every boundary: element ↔ scheduler ↔ persistence ↔ bridge.
//!
//! Design rule: no scheduling, no I/O, no async here. The only concurrency
//! primitive is the packed atomic inside [`SignalCell`], which is the single
//! hand-off point between the simulation and an out-of-band data source.

pub mod signal;
pub mod node;
pub mod placement;

pub use signal::{BitWidth, Signal, SignalCell};
pub use node::{ElementId, NodeId, NodeRole, SignalWriter, ValueNode};
pub use placement::{Direction, Position};
