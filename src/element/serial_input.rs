//! Serial input bridge.
//!
//! Puts bytes from an external serial stream onto a single output node.
//! Construction only configures the element; [`SerialInput::start`] spawns
//! the access → open → read lifecycle as a tokio task, and
//! [`SerialInput::stop`] ends it at its next suspension point.
//!
//! The task never touches the scheduler. Its only effect on the simulation
//! is a masked whole-value store into the node's signal cell, which the
//! scheduler observes on its own terms.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::model::{BitWidth, ElementId, SignalWriter, ValueNode};
use crate::persist::SaveRecord;
use crate::scheduler::Scheduler;
use crate::serial::{ByteReader, ReadChunk, SerialConfig, SerialPort, SerialProvider};
use crate::{Error, Result};
use super::{Element, ElementConfig, ElementKind, NodeList};

/// Where the bridge is in its lifecycle.
///
/// `Idle → Connecting → Connected → Disconnected`, or
/// `Idle → Connecting → Disconnected` when access or open fails.
/// `Disconnected` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

/// Counters for one bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeStats {
    pub chunks_received: u64,
    pub read_errors: u64,
}

/// State shared between the element and its read task.
#[derive(Debug)]
struct BridgeShared {
    connected: AtomicBool,
    started: AtomicBool,
    stop_requested: AtomicBool,
    state: RwLock<BridgeState>,
    failure: RwLock<Option<String>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    chunks_received: AtomicU64,
    read_errors: AtomicU64,
}

impl BridgeShared {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            started: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            state: RwLock::new(BridgeState::Idle),
            failure: RwLock::new(None),
            shutdown_tx: Mutex::new(None),
            chunks_received: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
        }
    }

    fn set_state(&self, state: BridgeState) {
        *self.state.write() = state;
    }

    fn fail(&self, element: ElementId, error: &Error) {
        tracing::warn!(element = %element, error = %error, "serial input stays disconnected");
        *self.failure.write() = Some(error.to_string());
        self.connected.store(false, Ordering::SeqCst);
        self.set_state(BridgeState::Disconnected);
    }

    fn finish(&self, element: ElementId) {
        self.connected.store(false, Ordering::SeqCst);
        self.set_state(BridgeState::Disconnected);
        tracing::info!(element = %element, "serial input disconnected");
    }
}

/// Element whose single node `sIn` is driven by an external byte stream.
#[derive(Debug)]
pub struct SerialInput {
    id: ElementId,
    config: ElementConfig,
    serial: SerialConfig,
    s_in: ValueNode,
    shared: Arc<BridgeShared>,
}

impl SerialInput {
    /// A disconnected bridge. Nothing is requested or opened yet.
    pub fn new(config: ElementConfig) -> Self {
        let id = ElementId::next();
        Self {
            id,
            config,
            serial: SerialConfig::default(),
            s_in: ValueNode::output(id, config.bit_width, "Sin"),
            shared: Arc::new(BridgeShared::new()),
        }
    }

    /// Override the line configuration used when the port is opened.
    pub fn with_serial_config(mut self, serial: SerialConfig) -> Self {
        self.serial = serial;
        self
    }

    pub fn serial_config(&self) -> &SerialConfig {
        &self.serial
    }

    pub fn output(&self) -> &ValueNode {
        &self.s_in
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> BridgeState {
        *self.shared.state.read()
    }

    /// Why access or open failed, if it did.
    pub fn failure(&self) -> Option<String> {
        self.shared.failure.read().clone()
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            chunks_received: self.shared.chunks_received.load(Ordering::SeqCst),
            read_errors: self.shared.read_errors.load(Ordering::SeqCst),
        }
    }

    /// Spawn the lifecycle task on the current tokio runtime.
    ///
    /// Access and open are attempted once each; a failure of either leaves
    /// the bridge permanently disconnected. A bridge can be started once.
    pub fn start<P: SerialProvider>(&self, provider: P) -> Result<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(e.to_string()))?;
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted(format!("serial input {}", self.id)));
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.shared.shutdown_tx.lock() = Some(shutdown_tx);
        self.shared.set_state(BridgeState::Connecting);

        let task = BridgeTask {
            element: self.id,
            serial: self.serial,
            writer: self.s_in.writer(),
            shared: Arc::clone(&self.shared),
        };
        Ok(runtime.spawn(task.run(provider, shutdown_rx)))
    }

    /// Clear the connection flag and wake the read task so it exits.
    ///
    /// A stop issued before [`start`](Self::start) is remembered: the bridge
    /// then goes straight to `Disconnected` without requesting access.
    pub fn stop(&self) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        self.shared.connected.store(false, Ordering::SeqCst);
        if let Some(tx) = self.shared.shutdown_tx.lock().take() {
            let _ = tx.send(());
            tracing::info!(element = %self.id, "serial input stop requested");
        }
    }
}

impl Drop for SerialInput {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Read task
// ============================================================================

struct BridgeTask {
    element: ElementId,
    serial: SerialConfig,
    writer: SignalWriter,
    shared: Arc<BridgeShared>,
}

impl BridgeTask {
    async fn run<P: SerialProvider>(self, provider: P, mut shutdown_rx: oneshot::Receiver<()>) {
        if self.shared.stop_requested.load(Ordering::SeqCst) {
            return self.shared.finish(self.element);
        }

        let access = tokio::select! {
            biased;
            _ = &mut shutdown_rx => return self.shared.finish(self.element),
            access = provider.request_access() => access,
        };
        let port = match access {
            Ok(port) => port,
            Err(e) => return self.shared.fail(self.element, &e),
        };
        let opened = tokio::select! {
            biased;
            _ = &mut shutdown_rx => return self.shared.finish(self.element),
            opened = port.open(&self.serial) => opened,
        };
        let mut reader = match opened {
            Ok(reader) => reader,
            Err(e) => return self.shared.fail(self.element, &e),
        };

        self.shared.connected.store(true, Ordering::SeqCst);
        self.shared.set_state(BridgeState::Connected);
        tracing::info!(element = %self.element, baud_rate = self.serial.baud_rate, "serial input connected");

        while self.shared.connected.load(Ordering::SeqCst) {
            let chunk = tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                chunk = reader.read() => chunk,
            };

            match chunk {
                Ok(ReadChunk::Done) => {
                    tracing::info!(element = %self.element, "serial stream ended");
                    break;
                }
                Ok(ReadChunk::Data(bytes)) => {
                    if let Some(&byte) = bytes.first() {
                        let value = self.writer.store_byte(byte);
                        self.shared.chunks_received.fetch_add(1, Ordering::SeqCst);
                        tracing::debug!(element = %self.element, byte, %value, "serial data received");
                    }
                }
                Err(e) => {
                    self.shared.read_errors.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!(element = %self.element, error = %e, "serial read failed");
                }
            }
        }

        self.shared.finish(self.element);
    }
}

// ============================================================================
// Element impl
// ============================================================================

impl Element for SerialInput {
    fn id(&self) -> ElementId {
        self.id
    }

    fn kind(&self) -> ElementKind {
        ElementKind::SerialInput
    }

    fn config(&self) -> &ElementConfig {
        &self.config
    }

    fn nodes(&self) -> NodeList<'_> {
        NodeList::from_iter([&self.s_in])
    }

    /// Always false: `sIn` is driven out of band, never by a propagation pass.
    fn is_resolvable(&self) -> bool {
        false
    }

    /// Explicit kick: publish the current `sIn` value.
    fn resolve(&mut self, queue: &mut dyn Scheduler) {
        queue.add(&self.s_in, self.propagation_delay());
    }

    fn set_bit_width(&mut self, width: BitWidth) {
        self.config.bit_width = width;
        self.s_in.set_bit_width(width);
    }

    fn snapshot(&self) -> SaveRecord {
        let mut record = SaveRecord::new(ElementKind::SerialInput, self.config.position)
            .with_node("sIn", self.s_in.id())
            .with_parameter(self.config.direction)
            .with_parameter(self.config.bit_width);
        record.propagation_delay = self.config.propagation_delay;
        record
    }

    fn restore(record: &SaveRecord) -> Result<Self> {
        if record.object_type != ElementKind::SerialInput {
            return Err(Error::InvalidRecord(format!("expected SerialInput, got {}", record.object_type)));
        }
        let config = ElementConfig {
            position: record.position,
            direction: record.parameter(0, "direction")?,
            bit_width: record.parameter(1, "bit width")?,
            propagation_delay: record.propagation_delay,
        };
        let mut input = SerialInput::new(config);
        input.s_in.reassign_id(record.node("sIn")?);
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Signal;
    use crate::scheduler::SimulationQueue;
    use crate::serial::{ScriptStep, ScriptedProvider};

    fn bridge(bits: u32) -> SerialInput {
        SerialInput::new(ElementConfig::default().with_bit_width(BitWidth::new(bits).unwrap()))
    }

    #[test]
    fn test_new_bridge_is_idle_and_unknown() {
        let input = bridge(1);
        assert_eq!(input.state(), BridgeState::Idle);
        assert!(!input.is_connected());
        assert!(!input.is_resolvable());
        assert_eq!(input.output().value(), Signal::Unknown);
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let input = bridge(1);
        assert!(matches!(input.start(ScriptedProvider::from_steps([])), Err(Error::Runtime(_))));
        assert_eq!(input.state(), BridgeState::Idle);
    }

    #[test]
    fn test_resolve_enqueues_sin() {
        let mut input = bridge(4);
        let mut queue = SimulationQueue::new();
        input.resolve(&mut queue);
        assert_eq!(queue.events_for(input.output().id()), 1);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let input = bridge(1);
        let (provider, _feed) = ScriptedProvider::channel();
        let handle = input.start(provider.clone()).unwrap();
        assert!(matches!(input.start(provider), Err(Error::AlreadyStarted(_))));
        input.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_open_failure_is_terminal() {
        let input = bridge(8);
        input.start(ScriptedProvider::failing_open("device busy")).unwrap().await.unwrap();
        assert_eq!(input.state(), BridgeState::Disconnected);
        assert!(input.failure().unwrap().contains("device busy"));
        assert_eq!(input.output().value(), Signal::Unknown);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_honoured() {
        let input = bridge(8);
        input.stop();
        input.start(ScriptedProvider::from_steps([ScriptStep::bytes(&[7])])).unwrap().await.unwrap();
        assert_eq!(input.state(), BridgeState::Disconnected);
        assert_eq!(input.output().value(), Signal::Unknown);
        assert_eq!(input.stats().chunks_received, 0);
        assert!(input.failure().is_none());
    }

    #[tokio::test]
    async fn test_empty_chunk_is_ignored() {
        let input = bridge(8);
        let provider = ScriptedProvider::from_steps([ScriptStep::bytes(&[]), ScriptStep::bytes(&[9])]);
        input.start(provider).unwrap().await.unwrap();
        assert_eq!(input.output().value(), Signal::Value(9));
        assert_eq!(input.stats().chunks_received, 1);
    }
}
