//! End-to-end tests for the serial input bridge lifecycle.
//!
//! Each test drives: construct -> start(provider) -> feed reads -> observe
//! the node value, connection flag and state. The scripted provider stands
//! in for hardware so every failure path is deterministic.
//!
//! REQUIRES: the `serial` feature (on by default).
#![cfg(feature = "serial")]

use std::time::Duration;

use circuit_elements::serial::{DeviceProvider, ScriptStep, ScriptedProvider};
use circuit_elements::{
    BitWidth, BridgeState, Element, ElementConfig, SerialConfig, SerialInput, Signal,
};

// ============================================================================
// Helpers
// ============================================================================

fn bridge(bits: u32) -> SerialInput {
    SerialInput::new(ElementConfig::default().with_bit_width(BitWidth::new(bits).unwrap()))
}

/// Poll until `cond` holds; the read task runs concurrently with the test.
async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

// ============================================================================
// 1. Permission denied: no update, no panic, permanently disconnected
// ============================================================================

#[tokio::test]
async fn test_permission_denied_leaves_node_untouched() {
    let input = bridge(4);
    let handle = input.start(ScriptedProvider::denied("user dismissed the port picker")).unwrap();
    handle.await.unwrap();

    assert_eq!(input.state(), BridgeState::Disconnected);
    assert!(!input.is_connected());
    assert_eq!(input.output().value(), Signal::Unknown);
    assert_eq!(input.stats().chunks_received, 0);
    assert!(input.failure().unwrap().contains("port picker"));
}

// ============================================================================
// 2. One chunk then end-of-stream
// ============================================================================

#[tokio::test]
async fn test_chunk_then_end_of_stream() {
    let input = bridge(3);
    let (provider, feed) = ScriptedProvider::channel();
    let handle = input.start(provider.clone()).unwrap();

    eventually(|| input.is_connected()).await;
    assert_eq!(provider.opened_config(), Some(SerialConfig::default()));

    feed.bytes(&[0x05]);
    eventually(|| input.output().value() == Signal::Value(5)).await;
    assert!(input.is_connected());

    feed.push(ScriptStep::Done);
    handle.await.unwrap();
    assert!(!input.is_connected());
    assert_eq!(input.state(), BridgeState::Disconnected);
    assert_eq!(input.output().value(), Signal::Value(5));
}

// ============================================================================
// 3. Only the first byte of a chunk is used, masked to width
// ============================================================================

#[tokio::test]
async fn test_first_byte_masked_to_width() {
    let input = bridge(4);
    let provider = ScriptedProvider::from_steps([ScriptStep::bytes(&[0b1011_0111, 0xFF, 0x00])]);
    input.start(provider).unwrap().await.unwrap();

    assert_eq!(input.output().value(), Signal::Value(0b0111));
    assert_eq!(input.stats().chunks_received, 1);
}

// ============================================================================
// 4. Read errors are logged and the loop keeps going
// ============================================================================

#[tokio::test]
async fn test_read_errors_are_recoverable() {
    let input = bridge(8);
    let provider = ScriptedProvider::from_steps([
        ScriptStep::bytes(&[1]),
        ScriptStep::Fail("framing error".into()),
        ScriptStep::Fail("framing error".into()),
        ScriptStep::bytes(&[2]),
    ]);
    input.start(provider).unwrap().await.unwrap();

    assert_eq!(input.output().value(), Signal::Value(2));
    assert_eq!(input.stats().read_errors, 2);
    assert_eq!(input.stats().chunks_received, 2);
    assert!(input.failure().is_none());
}

// ============================================================================
// 5. Open failure is terminal and never retried
// ============================================================================

#[tokio::test]
async fn test_open_failure_is_not_retried() {
    let input = bridge(1);
    let provider = ScriptedProvider::failing_open("port in use");
    input.start(provider.clone()).unwrap().await.unwrap();

    assert_eq!(input.state(), BridgeState::Disconnected);
    assert!(provider.opened_config().is_none());
    assert!(input.start(provider).is_err());
}

// ============================================================================
// 6. stop() ends a loop that is parked on a read
// ============================================================================

#[tokio::test]
async fn test_stop_interrupts_pending_read() {
    let input = bridge(8);
    let (provider, feed) = ScriptedProvider::channel();
    let handle = input.start(provider).unwrap();
    eventually(|| input.is_connected()).await;

    input.stop();
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    assert!(!input.is_connected());
    assert_eq!(input.state(), BridgeState::Disconnected);

    // Data arriving after stop is not applied.
    feed.bytes(&[9]);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(input.output().value(), Signal::Unknown);
}

// ============================================================================
// 7. Width change re-masks the value already on the node
// ============================================================================

#[tokio::test]
async fn test_width_change_remasks_buffered_value() {
    let mut input = bridge(8);
    input.start(ScriptedProvider::from_steps([ScriptStep::bytes(&[0xB7])])).unwrap().await.unwrap();
    assert_eq!(input.output().value(), Signal::Value(0xB7));

    input.set_bit_width(BitWidth::new(4).unwrap());
    assert_eq!(input.output().value(), Signal::Value(0x7));
    assert_eq!(input.bit_width().bits(), 4);
}

// ============================================================================
// 8. Device provider over a real file
// ============================================================================

#[tokio::test]
async fn test_device_provider_reads_file_until_eof() {
    let path = std::env::temp_dir().join(format!("circuit-elements-serial-{}.bin", std::process::id()));
    tokio::fs::write(&path, [0x2Au8]).await.unwrap();

    let input = bridge(8);
    input.start(DeviceProvider::new(&path)).unwrap().await.unwrap();
    tokio::fs::remove_file(&path).await.unwrap();

    assert_eq!(input.output().value(), Signal::Value(0x2A));
    assert_eq!(input.state(), BridgeState::Disconnected);
}
