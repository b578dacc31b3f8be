//! Serial port transport implementation

use crate::transport::Transport;
use async_trait::async_trait;
use comm_core::{CommError, CommResult};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_serial::SerialStream;

/// Serial port transport layer settings
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub stop_bits: tokio_serial::StopBits,
    pub parity: tokio_serial::Parity,
    pub flow_control: tokio_serial::FlowControl,
}

impl SerialSettings {
    /// Create new serial settings with default parameters (8N1, no flow control)
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            data_bits: tokio_serial::DataBits::Eight,
            stop_bits: tokio_serial::StopBits::One,
            parity: tokio_serial::Parity::None,
            flow_control: tokio_serial::FlowControl::None,
        }
    }

    pub fn with_parity(mut self, parity: tokio_serial::Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_flow_control(mut self, flow_control: tokio_serial::FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }
}

/// Serial port transport layer implementation
pub struct SerialTransport {
    settings: SerialSettings,
    reader: Mutex<Option<ReadHalf<SerialStream>>>,
    writer: Mutex<Option<WriteHalf<SerialStream>>>,
    open: AtomicBool,
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("settings", &self.settings)
            .field("open", &self.is_open())
            .finish()
    }
}

impl SerialTransport {
    /// Create a new serial transport layer
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            open: AtomicBool::new(false),
        }
    }

    /// Create serial transport with port name and baud rate
    pub fn new_simple(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self::new(SerialSettings::new(port_name, baud_rate))
    }

    /// Transport settings
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&self) -> CommResult<()> {
        if self.is_open() {
            return Err(CommError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let builder = tokio_serial::new(&self.settings.port_name, self.settings.baud_rate)
            .data_bits(self.settings.data_bits)
            .stop_bits(self.settings.stop_bits)
            .parity(self.settings.parity)
            .flow_control(self.settings.flow_control);

        let stream = SerialStream::open(&builder).map_err(|e| {
            CommError::Connection(std::io::Error::other(format!(
                "Failed to open serial port {}: {}",
                self.settings.port_name, e
            )))
        })?;

        let (read_half, write_half) = tokio::io::split(stream);
        *self.reader.lock().await = Some(read_half);
        *self.writer.lock().await = Some(write_half);
        self.open.store(true, Ordering::Release);

        log::info!(
            "Serial port {} opened at {} baud",
            self.settings.port_name,
            self.settings.baud_rate
        );
        Ok(())
    }

    async fn close(&self) -> CommResult<()> {
        self.open.store(false, Ordering::Release);
        self.reader.lock().await.take();
        if let Some(mut write_half) = self.writer.lock().await.take() {
            let _ = write_half.flush().await;
            log::info!("Serial port {} closed", self.settings.port_name);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn read(&self, buf: &mut [u8]) -> CommResult<usize> {
        let mut guard = self.reader.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| CommError::not_connected("Serial stream"))?;

        stream.read(buf).await.map_err(|e| {
            self.open.store(false, Ordering::Release);
            CommError::Connection(e)
        })
    }

    async fn write(&self, buf: &[u8]) -> CommResult<usize> {
        let mut guard = self.writer.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| CommError::not_connected("Serial stream"))?;

        stream.write(buf).await.map_err(CommError::Connection)
    }
}
