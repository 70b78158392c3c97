//! Wires transport bytes to the parser, dispatches requests to a user
//! handler, correlates replies, and drives the supervised reopen loop.

use crate::config::Config;
use crate::handlers::Handlers;
use crate::parser::DataParser;
use crate::queue::WriteQueue;
use crate::transaction::TransactionHolder;
use crate::transport::PortFactory;
use crate::wire::{IdAllocator, Message, MessageType};
use crate::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

const READ_CHUNK_SIZE: usize = 4096;

struct Inner<F: PortFactory> {
    factory: F,
    config: Config,
    handlers: Handlers,
    transactions: TransactionHolder,
    ids: IdAllocator,
    queue: WriteQueue<WriteHalf<F::Port>>,
    open: AtomicBool,
    closing: AtomicBool,
    reader_task: AsyncMutex<Option<JoinHandle<()>>>,
    reopen_task: AsyncMutex<Option<JoinHandle<()>>>,
}

/// A clone-able handle onto the running engine. Binding, lifecycle and the
/// outbound send API all live here; cloning is cheap (an `Arc` bump).
pub struct SerialIo<F: PortFactory>(Arc<Inner<F>>);

impl<F: PortFactory> Clone for SerialIo<F> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<F: PortFactory> SerialIo<F> {
    pub(crate) fn new(factory: F, config: Config) -> Self {
        Self(Arc::new(Inner {
            factory,
            config,
            handlers: Handlers::default(),
            transactions: TransactionHolder::new(),
            ids: IdAllocator::new(),
            queue: WriteQueue::new(),
            open: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            reader_task: AsyncMutex::new(None),
            reopen_task: AsyncMutex::new(None),
        }))
    }

    // ---- handler registration -------------------------------------------------

    /// Registers the handler invoked for inbound REQUEST messages. `Ok(payload)`
    /// sends a REPLY; `Err(text)` sends an ERROR reply carrying `text`. With no
    /// handler installed, REQUESTs are silently dropped.
    pub fn on_message<H, Fut>(&self, handler: H)
    where
        H: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Vec<u8>, String>> + Send + 'static,
    {
        self.0
            .handlers
            .set_message(Box::new(move |msg| Box::pin(handler(msg))));
    }

    pub fn on_open<H>(&self, handler: H)
    where
        H: Fn() + Send + Sync + 'static,
    {
        self.0.handlers.set_open(Box::new(handler));
    }

    /// `unexpected` is true when the close was not requested via `close()`,
    /// i.e. the engine will attempt a reopen.
    pub fn on_close<H>(&self, handler: H)
    where
        H: Fn(bool) + Send + Sync + 'static,
    {
        self.0.handlers.set_close(Box::new(handler));
    }

    pub fn on_drain<H>(&self, handler: H)
    where
        H: Fn() + Send + Sync + 'static,
    {
        self.0.handlers.set_drain(Box::new(handler));
    }

    pub fn on_error<H>(&self, handler: H)
    where
        H: Fn(&Error) + Send + Sync + 'static,
    {
        self.0.handlers.set_error(Box::new(handler));
    }

    // ---- lifecycle --------------------------------------------------------

    pub fn is_open(&self) -> bool {
        self.0.open.load(Ordering::SeqCst)
    }

    /// Opens the underlying port. Clears any prior `closing` state so a
    /// fresh `open()` after `close()` starts a new supervised session.
    pub async fn open(&self) -> Result<()> {
        self.0.closing.store(false, Ordering::SeqCst);
        self.open_once().await
    }

    /// Requests an orderly close: stops the reopen supervisor and the
    /// reader task, drops the write half, and fires the close handler with
    /// `unexpected = false`.
    pub async fn close(&self) -> Result<()> {
        self.0.closing.store(true, Ordering::SeqCst);
        if let Some(task) = self.0.reopen_task.lock().await.take() {
            task.abort();
        }
        if let Some(task) = self.0.reader_task.lock().await.take() {
            task.abort();
        }
        self.0.queue.set(None).await;
        self.0.open.store(false, Ordering::SeqCst);
        self.0.handlers.call_close(false);
        Ok(())
    }

    async fn open_once(&self) -> Result<()> {
        let port = self.0.factory.open().await?;
        let (read_half, write_half) = tokio::io::split(port);
        self.0.queue.set(Some(write_half)).await;
        self.0.open.store(true, Ordering::SeqCst);
        self.0.handlers.call_open();
        self.spawn_reader(read_half).await;
        Ok(())
    }

    async fn spawn_reader(&self, read_half: ReadHalf<F::Port>) {
        let handle = self.clone();
        let task = tokio::spawn(async move {
            handle.read_loop(read_half).await;
        });
        let mut guard = self.0.reader_task.lock().await;
        if let Some(old) = guard.take() {
            old.abort();
        }
        *guard = Some(task);
    }

    async fn read_loop(&self, mut reader: ReadHalf<F::Port>) {
        let mut parser = DataParser::new();
        let mut buf = [0u8; READ_CHUNK_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    for msg in parser.parse_data(&buf[..n]) {
                        self.handle_message(msg).await;
                    }
                }
                Err(e) => {
                    self.0.handlers.call_error(&Error::Io(e));
                    break;
                }
            }
        }
        self.handle_unexpected_close().await;
    }

    async fn handle_unexpected_close(&self) {
        self.0.open.store(false, Ordering::SeqCst);
        let closing = self.0.closing.load(Ordering::SeqCst);
        self.0.handlers.call_close(!closing);
        if !closing {
            self.spawn_reopen().await;
        }
    }

    async fn spawn_reopen(&self) {
        let handle = self.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(handle.0.config.reopen_backoff).await;
                if handle.0.closing.load(Ordering::SeqCst) {
                    return;
                }
                match handle.open_once().await {
                    Ok(()) => {
                        tracing::info!("reopened port after unexpected close");
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "reopen attempt failed, retrying");
                    }
                }
            }
        });
        let mut guard = self.0.reopen_task.lock().await;
        if let Some(old) = guard.take() {
            old.abort();
        }
        *guard = Some(task);
    }

    // ---- inbound dispatch ---------------------------------------------------

    async fn handle_message(&self, msg: Message) {
        match msg.message_type() {
            Some(MessageType::Request) => {
                let id = msg.id();
                let Some(fut) = self.0.handlers.call_message(msg) else {
                    return;
                };
                match fut.await {
                    Ok(payload) => {
                        if let Err(e) = self.send_reply(payload, id).await {
                            tracing::warn!(error = %e, id, "failed to send reply");
                        }
                    }
                    Err(text) => {
                        if let Err(e) = self.send_error_reply(text, id).await {
                            tracing::warn!(error = %e, id, "failed to send error reply");
                        }
                    }
                }
            }
            Some(MessageType::Ping) => {
                let id = msg.id();
                if let Err(e) = self.send_reply(Vec::new(), id).await {
                    tracing::warn!(error = %e, id, "failed to send ping reply");
                }
            }
            Some(MessageType::Reply) => {
                self.0.transactions.resolve(msg.id(), msg.clone()).await;
            }
            Some(MessageType::Error) => {
                let id = msg.id();
                let err = match msg.payload_str() {
                    Ok(text) => Error::Remote(text.to_string()),
                    Err(e) => Error::Utf8(e),
                };
                self.0.transactions.reject(id, err).await;
            }
            None => {
                tracing::warn!(
                    ty = msg.type_byte(),
                    id = msg.id(),
                    "dropping message with unknown type"
                );
            }
        }
    }

    // ---- outbound API -------------------------------------------------------

    /// Core send primitive: registers a transaction, enqueues the write, and
    /// awaits resolution by reply, error reply, timeout, or write failure.
    pub async fn send(&self, msg: Message, timeout: Option<Duration>) -> Result<Message> {
        let timeout = timeout.unwrap_or(self.0.config.default_timeout);
        let id = msg.id();
        // A REPLY or ERROR we originate is terminal: no remote reply follows it.
        let is_terminal = matches!(
            msg.message_type(),
            Some(MessageType::Reply) | Some(MessageType::Error)
        );
        let rx = self.0.transactions.add(id, timeout).await;

        match self
            .0
            .queue
            .write_chunked(msg.as_bytes(), self.0.config.chunk_size)
            .await
        {
            Ok(()) => {
                self.0.handlers.call_drain();
                if is_terminal {
                    self.0.transactions.resolve(id, msg).await;
                }
            }
            Err(e) => {
                self.0.transactions.reject(id, e).await;
            }
        }

        rx.await.unwrap_or(Err(Error::Closed))
    }

    pub async fn send_request(&self, data: impl Into<Vec<u8>>) -> Result<Message> {
        let id = self.0.ids.next_id();
        let msg = Message::create(&data.into(), MessageType::Request, id);
        self.send(msg, None).await
    }

    pub async fn send_reply(&self, data: impl Into<Vec<u8>>, id: u16) -> Result<Message> {
        let msg = Message::create(&data.into(), MessageType::Reply, id);
        self.send(msg, None).await
    }

    pub async fn send_error_reply(&self, text: impl Into<String>, id: u16) -> Result<Message> {
        let text = text.into();
        let msg = Message::create(text.as_bytes(), MessageType::Error, id);
        self.send(msg, None).await
    }

    pub async fn ping(&self) -> Result<Message> {
        let id = self.0.ids.next_id();
        let msg = Message::create(&[], MessageType::Ping, id);
        self.send(msg, Some(self.0.config.ping_timeout)).await
    }
}
