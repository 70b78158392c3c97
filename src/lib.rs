//! Request/reply messaging over a byte-oriented serial transport.
//!
//! `serialio` frames messages onto an `AsyncRead + AsyncWrite` byte stream,
//! parses the incoming stream back into messages (recovering from garbage
//! and resyncing on the next frame start), correlates REQUESTs with their
//! REPLY/ERROR by id with a timeout, serializes writes through a single
//! concurrency-1 queue, and supervises reopening the port if it closes
//! unexpectedly.
//!
//! # Example
//! ```no_run
//! use serialio::SerialIoBuilder;
//!
//! # async fn example() -> serialio::Result<()> {
//! tracing_subscriber::fmt::init();
//! let port = SerialIoBuilder::serial("/dev/ttyUSB0", 115_200).build();
//! port.on_message(|msg| async move {
//!     Ok(format!("echo:{}", msg.id()).into_bytes())
//! });
//! port.open().await?;
//! let reply = port.send_request(b"ping".to_vec()).await?;
//! println!("{:?}", reply.payload());
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod engine;
mod error;
mod handlers;
mod parser;
mod queue;
mod transaction;
mod wire;

pub mod transport;

#[cfg_attr(not(test), doc(hidden))]
pub mod testing;

pub use builder::SerialIoBuilder;
pub use config::Config;
pub use engine::SerialIo;
pub use error::{Error, Result};
pub use transport::{PortFactory, SerialPortFactory, list};
pub use wire::{Message, MessageType};
