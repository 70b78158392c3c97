//! Abstracts the underlying byte transport behind a trait so the engine can
//! be driven by a real serial port in production and an in-memory duplex
//! stream in tests.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite};

/// Opens (and reopens) the underlying transport. One instance is bound to a
/// single logical endpoint (e.g. a device path); `open` may be called
/// repeatedly across the engine's reopen supervisor.
pub trait PortFactory: Send + Sync + 'static {
    /// The concrete byte stream type produced by `open`.
    type Port: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Opens a fresh connection. Called once at `SerialIo::open()` and again
    /// by the reopen supervisor after an unexpected close.
    fn open(&self) -> impl Future<Output = io::Result<Self::Port>> + Send;
}

/// Opens a real serial port by device path at a fixed baud rate.
#[derive(Debug, Clone)]
pub struct SerialPortFactory {
    path: String,
    baud: u32,
}

impl SerialPortFactory {
    pub fn new(path: impl Into<String>, baud: u32) -> Self {
        Self {
            path: path.into(),
            baud,
        }
    }
}

impl PortFactory for SerialPortFactory {
    type Port = serial2_tokio::SerialPort;

    async fn open(&self) -> io::Result<Self::Port> {
        serial2_tokio::SerialPort::open(&self.path, self.baud)
    }
}

/// Lists available serial ports on the system, best-effort.
pub fn list() -> io::Result<Vec<PathBuf>> {
    serial2::SerialPort::available_ports()
}
