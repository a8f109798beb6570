//! Scripted serial provider.
//!
//! A fake port whose access check, open and reads are all decided up front
//! (or fed live through a [`ScriptFeed`]). Lets the bridge's permission,
//! open-failure, read-error and end-of-stream paths run without hardware.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{Error, Result};
use super::{ByteReader, ReadChunk, SerialConfig, SerialPort, SerialProvider};

/// One scripted read result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Chunk(Bytes),
    Fail(String),
    Done,
}

impl ScriptStep {
    pub fn bytes(data: &[u8]) -> Self {
        ScriptStep::Chunk(Bytes::copy_from_slice(data))
    }
}

/// Pushes read results into a running [`ScriptedProvider`] reader.
///
/// Dropping every feed ends the stream.
#[derive(Debug, Clone)]
pub struct ScriptFeed {
    tx: mpsc::UnboundedSender<ScriptStep>,
}

impl ScriptFeed {
    /// Queue a step. Returns false once the reader is gone.
    pub fn push(&self, step: ScriptStep) -> bool {
        self.tx.send(step).is_ok()
    }

    pub fn bytes(&self, data: &[u8]) -> bool {
        self.push(ScriptStep::bytes(data))
    }
}

#[derive(Debug)]
struct Shared {
    steps: Mutex<Option<mpsc::UnboundedReceiver<ScriptStep>>>,
    opened_with: Mutex<Option<SerialConfig>>,
}

/// Deterministic fake provider.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    deny: Option<String>,
    fail_open: Option<String>,
    shared: Arc<Shared>,
}

impl ScriptedProvider {
    /// Grants access, opens, and replays `steps`; end-of-stream follows the last step.
    pub fn from_steps(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        let (provider, feed) = Self::channel();
        for step in steps {
            feed.push(step);
        }
        provider
    }

    /// Grants access and opens; reads wait on the returned feed.
    pub fn channel() -> (Self, ScriptFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let provider = Self {
            deny: None,
            fail_open: None,
            shared: Arc::new(Shared {
                steps: Mutex::new(Some(rx)),
                opened_with: Mutex::new(None),
            }),
        };
        (provider, ScriptFeed { tx })
    }

    /// Access is refused.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self { deny: Some(reason.into()), ..Self::from_steps([]) }
    }

    /// Access is granted but the port cannot be opened.
    pub fn failing_open(reason: impl Into<String>) -> Self {
        Self { fail_open: Some(reason.into()), ..Self::from_steps([]) }
    }

    /// Configuration the port was opened with, once opened.
    pub fn opened_config(&self) -> Option<SerialConfig> {
        *self.shared.opened_with.lock()
    }
}

/// Granted scripted port.
#[derive(Debug)]
pub struct ScriptedPort {
    fail_open: Option<String>,
    shared: Arc<Shared>,
}

/// Open scripted reader.
#[derive(Debug)]
pub struct ScriptedReader {
    steps: mpsc::UnboundedReceiver<ScriptStep>,
}

#[async_trait]
impl SerialProvider for ScriptedProvider {
    type Port = ScriptedPort;

    async fn request_access(&self) -> Result<ScriptedPort> {
        if let Some(reason) = &self.deny {
            return Err(Error::PermissionDenied(reason.clone()));
        }
        Ok(ScriptedPort { fail_open: self.fail_open.clone(), shared: Arc::clone(&self.shared) })
    }
}

#[async_trait]
impl SerialPort for ScriptedPort {
    type Reader = ScriptedReader;

    async fn open(self, config: &SerialConfig) -> Result<ScriptedReader> {
        if let Some(reason) = self.fail_open {
            return Err(Error::ChannelOpen(reason));
        }
        let steps = self
            .shared
            .steps
            .lock()
            .take()
            .ok_or_else(|| Error::ChannelOpen("port already open".into()))?;
        *self.shared.opened_with.lock() = Some(*config);
        Ok(ScriptedReader { steps })
    }
}

#[async_trait]
impl ByteReader for ScriptedReader {
    async fn read(&mut self) -> Result<ReadChunk> {
        match self.steps.recv().await {
            Some(ScriptStep::Chunk(bytes)) => Ok(ReadChunk::Data(bytes)),
            Some(ScriptStep::Fail(reason)) => Err(Error::TransientRead(reason)),
            Some(ScriptStep::Done) | None => Ok(ReadChunk::Done),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_steps_then_ends() {
        let provider = ScriptedProvider::from_steps([
            ScriptStep::bytes(&[1, 2]),
            ScriptStep::Fail("parity".into()),
        ]);
        let port = provider.request_access().await.unwrap();
        let mut reader = port.open(&SerialConfig::default()).await.unwrap();

        assert_eq!(reader.read().await.unwrap(), ReadChunk::Data(Bytes::from_static(&[1, 2])));
        assert!(matches!(reader.read().await, Err(Error::TransientRead(_))));
        assert_eq!(reader.read().await.unwrap(), ReadChunk::Done);
        assert_eq!(provider.opened_config(), Some(SerialConfig::default()));
    }

    #[tokio::test]
    async fn test_second_open_fails() {
        let provider = ScriptedProvider::from_steps([]);
        let first = provider.request_access().await.unwrap();
        let second = provider.request_access().await.unwrap();
        first.open(&SerialConfig::default()).await.unwrap();
        assert!(matches!(second.open(&SerialConfig::default()).await, Err(Error::ChannelOpen(_))));
    }

    #[tokio::test]
    async fn test_denied_and_failing_open() {
        assert!(matches!(
            ScriptedProvider::denied("user cancelled").request_access().await,
            Err(Error::PermissionDenied(_))
        ));
        let port = ScriptedProvider::failing_open("busy").request_access().await.unwrap();
        assert!(matches!(port.open(&SerialConfig::default()).await, Err(Error::ChannelOpen(_))));
    }
}
