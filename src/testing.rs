//! Test support: a `PortFactory` backed by in-memory duplex streams, so the
//! full engine (parser, transaction correlator, write queue, reopen
//! supervision) can be driven without a real UART.

use crate::transport::PortFactory;
use std::io;
use std::sync::Mutex;
use tokio::io::DuplexStream;

/// A factory that hands out a pre-built sequence of `open()` outcomes, one
/// per call, in order. Once exhausted, further calls fail with `NotFound`.
///
/// Use this to script both steady-state connections (a single `Ok`) and
/// reopen-loop scenarios (some `Err`s followed by an `Ok`).
pub struct ScriptedFactory {
    outcomes: Mutex<Vec<io::Result<DuplexStream>>>,
}

impl ScriptedFactory {
    pub fn new(outcomes: Vec<io::Result<DuplexStream>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
        }
    }

    /// A factory whose every `open()` fails, for "missing port" scenarios.
    pub fn always_missing() -> Self {
        Self::new(Vec::new())
    }

    /// A factory with a single successful connection, returning the peer end
    /// of the duplex for the test to drive.
    pub fn single_connection(buf_size: usize) -> (Self, DuplexStream) {
        let (a, b) = tokio::io::duplex(buf_size);
        (Self::new(vec![Ok(a)]), b)
    }
}

impl PortFactory for ScriptedFactory {
    type Port = DuplexStream;

    async fn open(&self) -> io::Result<DuplexStream> {
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no port at this path"));
        }
        outcomes.remove(0)
    }
}
