//! Device-path provider.
//!
//! Access means the path exists, is not a directory, and can be opened for
//! reading. A character device (a tty) is then opened through `tokio-serial`
//! with the baud rate, framing, parity and flow control of [`SerialConfig`].
//! Any other path (a FIFO, a plain file) is read as-is with tokio, which is
//! how captured byte streams are replayed. `buffer_size` bounds each read.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio_serial::{DataBits, SerialPortBuilderExt, SerialStream, StopBits};

use crate::{Error, Result};
use super::{ByteReader, FlowControl, Parity, ReadChunk, SerialConfig, SerialPort, SerialProvider};

/// Provider for a single device path.
#[derive(Debug, Clone)]
pub struct DeviceProvider {
    path: PathBuf,
}

impl DeviceProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// A device path that passed the access check.
#[derive(Debug)]
pub struct DevicePort {
    path: PathBuf,
    is_tty: bool,
}

impl DevicePort {
    /// True when the path is a character device and will be opened with line settings.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }
}

fn access_error(path: &Path, e: io::Error) -> Error {
    let reason = match e.kind() {
        io::ErrorKind::PermissionDenied => "not readable",
        io::ErrorKind::NotFound => "no such device",
        _ => "not accessible",
    };
    Error::PermissionDenied(format!("{}: {reason} ({e})", path.display()))
}

#[cfg(unix)]
fn is_char_device(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    meta.file_type().is_char_device()
}

#[cfg(not(unix))]
fn is_char_device(meta: &std::fs::Metadata) -> bool {
    !meta.is_file()
}

#[async_trait]
impl SerialProvider for DeviceProvider {
    type Port = DevicePort;

    async fn request_access(&self) -> Result<DevicePort> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| access_error(&self.path, e))?;
        if meta.is_dir() {
            return Err(Error::PermissionDenied(format!("{} is a directory", self.path.display())));
        }
        // Readability check only; the channel is opened by `DevicePort::open`.
        drop(tokio::fs::File::open(&self.path).await.map_err(|e| access_error(&self.path, e))?);

        Ok(DevicePort { path: self.path.clone(), is_tty: is_char_device(&meta) })
    }
}

// ============================================================================
// Line settings
// ============================================================================

fn data_bits(bits: u8) -> Result<DataBits> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(Error::ChannelOpen(format!("unsupported data bits: {other}"))),
    }
}

fn stop_bits(bits: u8) -> Result<StopBits> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(Error::ChannelOpen(format!("unsupported stop bits: {other}"))),
    }
}

fn parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Even => tokio_serial::Parity::Even,
        Parity::Odd => tokio_serial::Parity::Odd,
    }
}

fn flow_control(flow: FlowControl) -> tokio_serial::FlowControl {
    match flow {
        FlowControl::None => tokio_serial::FlowControl::None,
        FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
    }
}

fn open_tty(path: &Path, config: &SerialConfig) -> Result<SerialStream> {
    tokio_serial::new(path.to_string_lossy(), config.baud_rate)
        .data_bits(data_bits(config.data_bits)?)
        .stop_bits(stop_bits(config.stop_bits)?)
        .parity(parity(config.parity))
        .flow_control(flow_control(config.flow_control))
        .open_native_async()
        .map_err(|e| Error::ChannelOpen(format!("{}: {e}", path.display())))
}

// ============================================================================
// Open channel
// ============================================================================

/// The byte stream behind an open [`DevicePort`].
#[derive(Debug)]
pub enum DeviceStream {
    Tty(SerialStream),
    File(tokio::fs::File),
}

impl AsyncRead for DeviceStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DeviceStream::Tty(port) => Pin::new(port).poll_read(cx, buf),
            DeviceStream::File(file) => Pin::new(file).poll_read(cx, buf),
        }
    }
}

#[async_trait]
impl SerialPort for DevicePort {
    type Reader = StreamReader<DeviceStream>;

    async fn open(self, config: &SerialConfig) -> Result<Self::Reader> {
        let stream = if self.is_tty {
            DeviceStream::Tty(open_tty(&self.path, config)?)
        } else {
            let file = tokio::fs::File::open(&self.path)
                .await
                .map_err(|e| Error::ChannelOpen(format!("{}: {e}", self.path.display())))?;
            DeviceStream::File(file)
        };
        tracing::debug!(
            path = %self.path.display(),
            tty = self.is_tty,
            baud_rate = config.baud_rate,
            "device opened"
        );
        Ok(StreamReader::new(stream, config.buffer_size))
    }
}

/// Chunked reader over any tokio byte stream.
#[derive(Debug)]
pub struct StreamReader<R> {
    inner: R,
    buf: BytesMut,
    chunk: usize,
}

impl<R> StreamReader<R> {
    pub fn new(inner: R, chunk: usize) -> Self {
        let chunk = chunk.max(1);
        Self { inner, buf: BytesMut::with_capacity(chunk), chunk }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[async_trait]
impl<R> ByteReader for StreamReader<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn read(&mut self) -> Result<ReadChunk> {
        self.buf.clear();
        self.buf.reserve(self.chunk);
        let mut limited = (&mut self.inner).take(self.chunk as u64);
        let n = limited
            .read_buf(&mut self.buf)
            .await
            .map_err(|e| Error::TransientRead(e.to_string()))?;
        if n == 0 {
            return Ok(ReadChunk::Done);
        }
        Ok(ReadChunk::Data(self.buf.split().freeze()))
    }
}
