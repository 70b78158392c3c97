//! Assembles a [`SerialIo`] engine around a [`PortFactory`] and a [`Config`].

use crate::config::Config;
use crate::engine::SerialIo;
use crate::transport::{PortFactory, SerialPortFactory};
use std::time::Duration;

/// Builds a [`SerialIo`] engine. Start from [`SerialIoBuilder::serial`] for a
/// real device, or supply any other [`PortFactory`] via [`SerialIoBuilder::with_factory`]
/// (the `testing` module's `ScriptedFactory` is the common case in tests).
pub struct SerialIoBuilder<F: PortFactory> {
    factory: F,
    config: Config,
}

impl SerialIoBuilder<SerialPortFactory> {
    /// Starts a builder bound to a real serial device at `path`, `baud`.
    pub fn serial(path: impl Into<String>, baud: u32) -> Self {
        Self::with_factory(SerialPortFactory::new(path, baud))
    }
}

impl<F: PortFactory> SerialIoBuilder<F> {
    pub fn with_factory(factory: F) -> Self {
        Self {
            factory,
            config: Config::default(),
        }
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.config.ping_timeout = timeout;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    pub fn reopen_backoff(mut self, backoff: Duration) -> Self {
        self.config.reopen_backoff = backoff;
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Builds the engine. The port is not opened; call `SerialIo::open()`.
    pub fn build(self) -> SerialIo<F> {
        SerialIo::new(self.factory, self.config)
    }
}
