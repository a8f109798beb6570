//! End-to-end tests for the shift register driven through the element contract.
//!
//! Each test drives: set input nodes -> resolve -> inspect register and the
//! events handed to SimulationQueue.

use circuit_elements::{
    BitWidth, Direction, EdgeAction, Element, ElementConfig, Error, ShiftRegister, Signal,
    SimulationQueue,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Helpers
// ============================================================================

fn values(signals: &[u32]) -> Vec<Signal> {
    signals.iter().map(|v| Signal::Value(*v)).collect()
}

/// One clock cycle: low, then high. Returns the events enqueued by the edge.
fn clock_cycle(reg: &mut ShiftRegister, queue: &mut SimulationQueue) -> Vec<(u64, Signal)> {
    reg.clock().set(0u32);
    reg.resolve(queue);
    reg.clock().set(1u32);
    reg.resolve(queue);
    queue.drain().into_iter().map(|e| (e.node.0, e.value)).collect()
}

// ============================================================================
// 1. Worked three-stage scenario
// ============================================================================

#[test]
fn test_three_stage_shift_scenario() {
    let mut reg = ShiftRegister::new(ElementConfig::default(), 3).unwrap();
    let mut queue = SimulationQueue::new();
    reg.reset().set(1u32);
    clock_cycle(&mut reg, &mut queue);
    assert_eq!(reg.cells(), &values(&[0, 0, 0])[..]);

    reg.reset().set(0u32);
    reg.shift_load().set(0u32);

    // Edge 1: input 0 = 1
    reg.inputs()[0].set(1u32);
    let events = clock_cycle(&mut reg, &mut queue);
    assert_eq!(reg.cells(), &values(&[1, 0, 0])[..]);
    let out_ids: Vec<u64> = reg.outputs().iter().map(|n| n.id().0).collect();
    assert_eq!(
        events,
        out_ids.iter().copied().zip(values(&[1, 0, 0])).collect::<Vec<_>>()
    );

    // Edge 2: input 0 = 0; every output is enqueued again, changed or not.
    reg.inputs()[0].set(0u32);
    let events = clock_cycle(&mut reg, &mut queue);
    assert_eq!(reg.cells(), &values(&[0, 1, 0])[..]);
    assert_eq!(
        events,
        out_ids.iter().copied().zip(values(&[0, 1, 0])).collect::<Vec<_>>()
    );
}

// ============================================================================
// 2. FIFO depth equals stage count
// ============================================================================

#[test]
fn test_fifo_keeps_last_stage_count_inputs() {
    let mut reg = ShiftRegister::new(ElementConfig::default().with_bit_width(BitWidth::new(4).unwrap()), 4).unwrap();
    let mut queue = SimulationQueue::new();

    for v in [1u32, 2, 3, 4, 5, 6] {
        reg.inputs()[0].set(v);
        clock_cycle(&mut reg, &mut queue);
    }
    // Newest first; 1 and 2 were evicted.
    assert_eq!(reg.cells(), &values(&[6, 5, 4, 3])[..]);
    assert_eq!(reg.contents(), "6543");
}

// ============================================================================
// 3. Priority: reset > load > shift
// ============================================================================

#[test]
fn test_control_priority() {
    let mut reg = ShiftRegister::new(ElementConfig::default(), 2).unwrap();
    let mut queue = SimulationQueue::new();
    for node in reg.inputs() {
        node.set(1u32);
    }

    reg.shift_load().set(1u32);
    reg.clock().set(0u32);
    reg.resolve(&mut queue);
    reg.clock().set(1u32);
    assert_eq!(reg.tick(&mut queue), Some(EdgeAction::Load));
    assert_eq!(reg.contents(), "11");

    reg.reset().set(1u32);
    reg.clock().set(0u32);
    reg.resolve(&mut queue);
    reg.clock().set(1u32);
    assert_eq!(reg.tick(&mut queue), Some(EdgeAction::Reset));
    assert_eq!(reg.contents(), "00");

    reg.reset().set(0u32);
    reg.shift_load().set(0u32);
    reg.clock().set(0u32);
    reg.resolve(&mut queue);
    reg.clock().set(1u32);
    assert_eq!(reg.tick(&mut queue), Some(EdgeAction::Shift));
    assert_eq!(reg.contents(), "10");
}

// ============================================================================
// 4. Held-high clock does not retrigger
// ============================================================================

#[test]
fn test_held_clock_is_a_single_edge() {
    let mut reg = ShiftRegister::new(ElementConfig::default(), 2).unwrap();
    let mut queue = SimulationQueue::new();
    reg.inputs()[0].set(1u32);
    reg.clock().set(1u32);

    for _ in 0..5 {
        reg.resolve(&mut queue);
    }
    assert_eq!(queue.len(), 2);
    assert_eq!(reg.contents(), "1x");
}

// ============================================================================
// 5. Over-width inputs are masked, never rejected
// ============================================================================

#[test]
fn test_over_width_input_is_masked() {
    let mut reg = ShiftRegister::new(ElementConfig::default().with_bit_width(BitWidth::new(4).unwrap()), 1).unwrap();
    let mut queue = SimulationQueue::new();
    reg.inputs()[0].set(0b1011_0111u32);
    clock_cycle(&mut reg, &mut queue);
    assert_eq!(reg.cells(), &values(&[0b0111])[..]);
    assert_eq!(reg.outputs()[0].value(), Signal::Value(7));
}

// ============================================================================
// 6. Stage count reconfiguration
// ============================================================================

#[test]
fn test_out_of_range_reconfiguration_is_a_no_op() {
    let mut reg = ShiftRegister::new(ElementConfig::default().with_direction(Direction::Down), 4).unwrap();
    let mut queue = SimulationQueue::new();
    reg.inputs()[0].set(1u32);
    clock_cycle(&mut reg, &mut queue);
    let id = reg.id();
    let before = reg.snapshot();

    for requested in [Some(0), Some(33), None, Some(4)] {
        let err = reg.change_stage_count(requested).unwrap_err();
        assert!(matches!(err, Error::InvalidStageCount { .. }));
    }
    assert_eq!(reg.id(), id);
    assert_eq!(reg.snapshot(), before);
    assert_eq!(reg.contents(), "1xxx");
}

#[test]
fn test_valid_reconfiguration_replaces_register() {
    let config = ElementConfig::default()
        .with_position(40, -20)
        .with_direction(Direction::Down)
        .with_bit_width(BitWidth::new(3).unwrap());
    let mut reg = ShiftRegister::new(config, 4).unwrap();
    let mut queue = SimulationQueue::new();
    reg.inputs()[0].set(5u32);
    clock_cycle(&mut reg, &mut queue);

    // The caller owns the "current" reference and swaps it.
    let old_id = reg.id();
    reg = reg.change_stage_count(Some(8)).unwrap();

    assert_ne!(reg.id(), old_id);
    assert_eq!(reg.stage_count(), 8);
    assert_eq!(reg.config(), &config);
    assert_eq!(reg.outputs().len(), 8);
    assert!(reg.cells().iter().all(|c| *c == Signal::Unknown));
    assert!(reg.inputs().iter().all(|n| n.bit_width().bits() == 3));
}
