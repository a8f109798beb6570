//! # Scheduler Contract
//!
//! The seam between elements and whatever drives the simulation. Elements
//! only ever call [`Scheduler::add`] from inside `resolve`; ordering of the
//! propagation pass belongs to the implementation.
//!
//! ## Implementations
//!
//! | Scheduler | Module | Description |
//! |-----------|--------|-------------|
//! | `SimulationQueue` | `queue` | In-memory delay-ordered queue for testing/embedding |

pub mod queue;

use crate::model::ValueNode;

pub use queue::{QueuedEvent, SimulationQueue};

/// Accepts nodes whose value changed.
///
/// `delay` is the owning element's propagation delay; an implementation
/// must not hand the node to its consumers before `now + delay`.
pub trait Scheduler {
    fn add(&mut self, node: &ValueNode, delay: u64);
}
