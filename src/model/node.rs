//! Value node: the wire-level signal carrier owned by one element.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::{BitWidth, Signal, SignalCell};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque node identifier. Preserved across snapshot/restore so external
/// wiring keeps pointing at the same node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque element identifier. Not persisted; a restored element gets a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl ElementId {
    pub fn next() -> Self {
        ElementId(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of its element a node sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    Input,
    Output,
}

/// A width-bounded signal carrier.
///
/// Owned exclusively by one element (not `Clone`); `owner` is a
/// back-reference only. Reads and writes go through the packed
/// [`SignalCell`], so they take `&self`.
#[derive(Debug)]
pub struct ValueNode {
    id: NodeId,
    label: String,
    role: NodeRole,
    owner: ElementId,
    cell: Arc<SignalCell>,
}

impl ValueNode {
    pub fn new(owner: ElementId, role: NodeRole, width: BitWidth, label: impl Into<String>) -> Self {
        Self {
            id: NodeId::next(),
            label: label.into(),
            role,
            owner,
            cell: Arc::new(SignalCell::new(width)),
        }
    }

    pub fn input(owner: ElementId, width: BitWidth, label: impl Into<String>) -> Self {
        Self::new(owner, NodeRole::Input, width, label)
    }

    pub fn output(owner: ElementId, width: BitWidth, label: impl Into<String>) -> Self {
        Self::new(owner, NodeRole::Output, width, label)
    }

    pub fn id(&self) -> NodeId { self.id }
    pub fn label(&self) -> &str { &self.label }
    pub fn role(&self) -> NodeRole { self.role }
    pub fn owner(&self) -> ElementId { self.owner }

    pub fn value(&self) -> Signal {
        self.cell.load()
    }

    pub fn bit_width(&self) -> BitWidth {
        self.cell.width()
    }

    /// Store a new value, masked to the node's width. Returns what was stored.
    pub fn set(&self, signal: impl Into<Signal>) -> Signal {
        self.cell.store(signal.into())
    }

    /// Resize and re-mask the current value.
    pub fn set_bit_width(&self, width: BitWidth) -> Signal {
        self.cell.set_width(width)
    }

    /// A handle that can write this node's value from another task.
    pub fn writer(&self) -> SignalWriter {
        SignalWriter { node: self.id, cell: Arc::clone(&self.cell) }
    }

    /// Take over a persisted identity when rebuilding from a save record.
    pub(crate) fn reassign_id(&mut self, id: NodeId) {
        self.id = id;
    }
}

/// Write-only view of a node's value, for out-of-band sources.
///
/// Every store is a single masked replacement of the whole value.
#[derive(Debug, Clone)]
pub struct SignalWriter {
    node: NodeId,
    cell: Arc<SignalCell>,
}

impl SignalWriter {
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Store a raw byte, masked to the node's width at the instant of the write.
    pub fn store_byte(&self, byte: u8) -> Signal {
        self.cell.store(Signal::Value(byte as u32))
    }

    pub fn store(&self, signal: Signal) -> Signal {
        self.cell.store(signal)
    }
}
