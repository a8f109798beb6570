//! # Save Records
//!
//! The structural form an element is saved as, and the loader that turns
//! one back into a live element.
//!
//! ```text
//! element.snapshot() → SaveRecord → JSON → SaveRecord → load() → Box<dyn Element>
//! ```
//!
//! A record holds named node references (so external wiring can be
//! re-attached by id), the ordered constructor parameters, and any
//! auxiliary state such as register contents.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::element::{Element, ElementKind, ShiftRegister};
use crate::model::{NodeId, Position};
use crate::{Error, Result};

/// Reference to one owned node, or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeRef {
    One(NodeId),
    Many(Vec<NodeId>),
}

/// Persisted form of one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    pub object_type: ElementKind,
    #[serde(default)]
    pub position: Position,
    pub nodes: BTreeMap<String, NodeRef>,
    pub constructor_parameters: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagation_delay: Option<u64>,
}

impl SaveRecord {
    pub fn new(object_type: ElementKind, position: Position) -> Self {
        Self {
            object_type,
            position,
            nodes: BTreeMap::new(),
            constructor_parameters: Vec::new(),
            values: BTreeMap::new(),
            propagation_delay: None,
        }
    }

    pub fn with_node(mut self, name: &str, id: NodeId) -> Self {
        self.nodes.insert(name.to_string(), NodeRef::One(id));
        self
    }

    pub fn with_nodes(mut self, name: &str, ids: impl IntoIterator<Item = NodeId>) -> Self {
        self.nodes.insert(name.to_string(), NodeRef::Many(ids.into_iter().collect()));
        self
    }

    pub fn with_parameter(mut self, param: impl Serialize) -> Self {
        self.constructor_parameters.push(to_json_value(param));
        self
    }

    pub fn with_value(mut self, name: &str, value: impl Serialize) -> Self {
        self.values.insert(name.to_string(), to_json_value(value));
        self
    }

    /// A single named node reference.
    pub fn node(&self, name: &str) -> Result<NodeId> {
        match self.nodes.get(name) {
            Some(NodeRef::One(id)) => Ok(*id),
            Some(NodeRef::Many(_)) => Err(invalid(self, format!("node '{name}' is a list"))),
            None => Err(invalid(self, format!("missing node '{name}'"))),
        }
    }

    /// A named, ordered list of node references.
    pub fn node_list(&self, name: &str) -> Result<&[NodeId]> {
        match self.nodes.get(name) {
            Some(NodeRef::Many(ids)) => Ok(ids),
            Some(NodeRef::One(_)) => Err(invalid(self, format!("node '{name}' is not a list"))),
            None => Err(invalid(self, format!("missing node list '{name}'"))),
        }
    }

    /// Constructor parameter at `index`, decoded as `T`.
    pub fn parameter<T: DeserializeOwned>(&self, index: usize, what: &str) -> Result<T> {
        let raw = self
            .constructor_parameters
            .get(index)
            .ok_or_else(|| invalid(self, format!("missing constructor parameter {index} ({what})")))?;
        serde_json::from_value(raw.clone())
            .map_err(|e| invalid(self, format!("bad constructor parameter {index} ({what}): {e}")))
    }

    /// Auxiliary value, if present.
    pub fn value<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|e| invalid(self, format!("bad value '{name}': {e}"))),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn to_json_value(value: impl Serialize) -> serde_json::Value {
    // Only crate-owned plain data is passed here; none of it can fail to serialize.
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn invalid(record: &SaveRecord, message: String) -> Error {
    Error::InvalidRecord(format!("{}: {message}", record.object_type))
}

/// Rebuild a live element from its record.
///
/// A restored serial input comes back configured but not started; the
/// caller decides whether and where to connect it.
pub fn load(record: &SaveRecord) -> Result<Box<dyn Element>> {
    tracing::debug!(object_type = %record.object_type, "loading element");
    match record.object_type {
        ElementKind::ShiftRegister => Ok(Box::new(ShiftRegister::restore(record)?)),
        #[cfg(feature = "serial")]
        ElementKind::SerialInput => Ok(Box::new(crate::element::SerialInput::restore(record)?)),
        #[cfg(not(feature = "serial"))]
        ElementKind::SerialInput => Err(Error::InvalidRecord(
            "SerialInput: crate built without the `serial` feature".into(),
        )),
    }
}
