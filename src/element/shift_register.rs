//! Edge-triggered shift register.
//!
//! On every rising clock edge exactly one action runs, by fixed priority:
//! reset, then parallel load, then a one-place shift fed from input 0.
//! After the action every output is written and enqueued, whether or not
//! its value changed, so downstream consumers re-evaluate every active cycle.

use crate::model::{BitWidth, ElementId, Signal, ValueNode};
use crate::persist::SaveRecord;
use crate::scheduler::Scheduler;
use crate::{Error, Result};
use super::{Element, ElementConfig, ElementKind, NodeList};

pub const MIN_STAGES: usize = 1;
pub const MAX_STAGES: usize = 32;
pub const DEFAULT_STAGES: usize = 4;

// ============================================================================
// Clock sampling
// ============================================================================

/// Two-valued clock sample. A clock that is unknown or floating samples Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ClockLevel {
    #[default]
    Low,
    High,
}

impl ClockLevel {
    pub fn sample(signal: Signal) -> Self {
        if signal.is_high() { ClockLevel::High } else { ClockLevel::Low }
    }
}

/// `previous == Low && current == High`
pub fn is_rising_edge(previous: ClockLevel, current: ClockLevel) -> bool {
    previous == ClockLevel::Low && current == ClockLevel::High
}

/// What a rising edge did to the register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeAction {
    Reset,
    Load,
    Shift,
}

fn check_stage_count(requested: Option<usize>, current: usize) -> Result<usize> {
    match requested {
        Some(n) if (MIN_STAGES..=MAX_STAGES).contains(&n) && n != current => Ok(n),
        _ => Err(Error::InvalidStageCount { requested, current }),
    }
}

// ============================================================================
// ShiftRegister
// ============================================================================

/// Shift register with `stage_count` data stages.
///
/// `cell`, `inp` and `out` always have exactly `stage_count` entries and are
/// index-aligned. Changing the stage count builds a new register.
#[derive(Debug)]
pub struct ShiftRegister {
    id: ElementId,
    config: ElementConfig,
    stages: usize,
    cell: Vec<Signal>,
    last_clk: ClockLevel,
    reset: ValueNode,
    shift_load: ValueNode,
    clk: ValueNode,
    inp: Vec<ValueNode>,
    out: Vec<ValueNode>,
}

impl ShiftRegister {
    pub fn new(config: ElementConfig, stages: usize) -> Result<Self> {
        if !(MIN_STAGES..=MAX_STAGES).contains(&stages) {
            return Err(Error::InvalidInitialStageCount(stages));
        }

        let id = ElementId::next();
        let width = config.bit_width;
        let inp = (0..stages).map(|i| ValueNode::input(id, width, format!("In{i}"))).collect();
        let out = (0..stages).map(|i| ValueNode::output(id, width, format!("Out{i}"))).collect();

        Ok(Self {
            id,
            config,
            stages,
            cell: vec![Signal::Unknown; stages],
            last_clk: ClockLevel::Low,
            reset: ValueNode::input(id, BitWidth::ONE, "Reset"),
            shift_load: ValueNode::input(id, BitWidth::ONE, "Shift/Load"),
            clk: ValueNode::input(id, BitWidth::ONE, "Clock"),
            inp,
            out,
        })
    }

    pub fn stage_count(&self) -> usize { self.stages }
    pub fn cells(&self) -> &[Signal] { &self.cell }
    pub fn inputs(&self) -> &[ValueNode] { &self.inp }
    pub fn outputs(&self) -> &[ValueNode] { &self.out }
    pub fn reset(&self) -> &ValueNode { &self.reset }
    pub fn shift_load(&self) -> &ValueNode { &self.shift_load }
    pub fn clock(&self) -> &ValueNode { &self.clk }
    pub fn last_clock(&self) -> ClockLevel { self.last_clk }

    /// Register contents, stage 0 first, `x` for unknown stages.
    pub fn contents(&self) -> String {
        self.cell.iter().map(ToString::to_string).collect()
    }

    /// Sample the clock and, on a rising edge, apply one action and publish
    /// every output. Returns the action taken, if any.
    pub fn tick(&mut self, queue: &mut dyn Scheduler) -> Option<EdgeAction> {
        let current = ClockLevel::sample(self.clk.value());
        let previous = std::mem::replace(&mut self.last_clk, current);
        if !is_rising_edge(previous, current) {
            return None;
        }

        let action = self.apply_edge();
        tracing::debug!(element = %self.id, ?action, contents = %self.contents(), "rising edge");

        let delay = self.propagation_delay();
        for (node, value) in self.out.iter().zip(&self.cell) {
            node.set(*value);
            queue.add(node, delay);
        }
        Some(action)
    }

    fn apply_edge(&mut self) -> EdgeAction {
        if self.reset.value().is_high() {
            self.cell.fill(Signal::Value(0));
            EdgeAction::Reset
        } else if self.shift_load.value().is_high() {
            for (cell, node) in self.cell.iter_mut().zip(&self.inp) {
                *cell = node.value();
            }
            EdgeAction::Load
        } else {
            // Oldest (tail) entry falls off, input 0 enters at the head.
            self.cell.rotate_right(1);
            self.cell[0] = self.inp[0].value();
            EdgeAction::Shift
        }
    }

    /// Build a replacement register with `requested` stages.
    ///
    /// Placement, direction, width and delay carry over; register contents
    /// do not. `self` is left untouched either way, and swapping the
    /// replacement in is up to the caller.
    pub fn change_stage_count(&self, requested: Option<usize>) -> Result<ShiftRegister> {
        let stages = check_stage_count(requested, self.stages).inspect_err(|e| {
            tracing::debug!(element = %self.id, error = %e, "stage count change rejected");
        })?;
        ShiftRegister::new(self.config, stages)
    }
}

impl Element for ShiftRegister {
    fn id(&self) -> ElementId {
        self.id
    }

    fn kind(&self) -> ElementKind {
        ElementKind::ShiftRegister
    }

    fn config(&self) -> &ElementConfig {
        &self.config
    }

    fn nodes(&self) -> NodeList<'_> {
        [&self.reset, &self.shift_load, &self.clk]
            .into_iter()
            .chain(self.inp.iter())
            .chain(self.out.iter())
            .collect()
    }

    fn resolve(&mut self, queue: &mut dyn Scheduler) {
        self.tick(queue);
    }

    fn set_bit_width(&mut self, width: BitWidth) {
        self.config.bit_width = width;
        for node in self.inp.iter().chain(self.out.iter()) {
            node.set_bit_width(width);
        }
        for cell in &mut self.cell {
            *cell = cell.mask_to(width);
        }
    }

    fn snapshot(&self) -> SaveRecord {
        let mut record = SaveRecord::new(ElementKind::ShiftRegister, self.config.position)
            .with_node("reset", self.reset.id())
            .with_node("shiftLoad", self.shift_load.id())
            .with_node("clk", self.clk.id())
            .with_nodes("inp", self.inp.iter().map(ValueNode::id))
            .with_nodes("out", self.out.iter().map(ValueNode::id))
            .with_parameter(self.config.direction)
            .with_parameter(self.config.bit_width)
            .with_parameter(self.stages)
            .with_value("cell", &self.cell)
            .with_value("lastClk", self.last_clk);
        record.propagation_delay = self.config.propagation_delay;
        record
    }

    fn restore(record: &SaveRecord) -> Result<Self> {
        if record.object_type != ElementKind::ShiftRegister {
            return Err(Error::InvalidRecord(format!("expected Shifter, got {}", record.object_type)));
        }

        let config = ElementConfig {
            position: record.position,
            direction: record.parameter(0, "direction")?,
            bit_width: record.parameter(1, "bit width")?,
            propagation_delay: record.propagation_delay,
        };
        let stages: usize = record.parameter(2, "stage count")?;
        let mut reg = ShiftRegister::new(config, stages)
            .map_err(|e| Error::InvalidRecord(format!("Shifter: {e}")))?;

        reg.reset.reassign_id(record.node("reset")?);
        reg.shift_load.reassign_id(record.node("shiftLoad")?);
        reg.clk.reassign_id(record.node("clk")?);
        for (name, nodes) in [("inp", &mut reg.inp), ("out", &mut reg.out)] {
            let ids = record.node_list(name)?;
            if ids.len() != stages {
                return Err(Error::InvalidRecord(format!(
                    "Shifter: {name} has {} nodes, expected {stages}",
                    ids.len()
                )));
            }
            for (node, id) in nodes.iter_mut().zip(ids) {
                node.reassign_id(*id);
            }
        }

        if let Some(cell) = record.value::<Vec<Signal>>("cell")? {
            if cell.len() != stages {
                return Err(Error::InvalidRecord(format!(
                    "Shifter: cell has {} entries, expected {stages}",
                    cell.len()
                )));
            }
            reg.cell = cell.into_iter().map(|s| s.mask_to(config.bit_width)).collect();
            for (node, value) in reg.out.iter().zip(&reg.cell) {
                node.set(*value);
            }
        }
        if let Some(last_clk) = record.value("lastClk")? {
            reg.last_clk = last_clk;
        }

        Ok(reg)
    }
}
