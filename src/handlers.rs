//! A small record of optional handler closures, the Rust translation of the
//! distilled spec's event-emitter taps (`open`/`close`/`drain`/`error`/`message`).

use crate::Error;
use crate::wire::Message;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

/// The outcome of a user message handler: `Ok` becomes a REPLY payload,
/// `Err` becomes an ERROR reply carrying the text, the structural
/// equivalent of "the handler threw".
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, String>> + Send>>;
pub type MessageHandler = Box<dyn Fn(Message) -> HandlerFuture + Send + Sync>;
pub type OpenHandler = Box<dyn Fn() + Send + Sync>;
/// Called with `unexpected = true` when the close was not requested via
/// `close()` (i.e. the engine will attempt a reopen).
pub type CloseHandler = Box<dyn Fn(bool) + Send + Sync>;
pub type DrainHandler = Box<dyn Fn() + Send + Sync>;
pub type ErrorHandler = Box<dyn Fn(&Error) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Handlers {
    message: RwLock<Option<MessageHandler>>,
    open: RwLock<Option<OpenHandler>>,
    close: RwLock<Option<CloseHandler>>,
    drain: RwLock<Option<DrainHandler>>,
    error: RwLock<Option<ErrorHandler>>,
}

impl Handlers {
    pub(crate) fn set_message(&self, handler: MessageHandler) {
        *self.message.write().unwrap() = Some(handler);
    }

    pub(crate) fn set_open(&self, handler: OpenHandler) {
        *self.open.write().unwrap() = Some(handler);
    }

    pub(crate) fn set_close(&self, handler: CloseHandler) {
        *self.close.write().unwrap() = Some(handler);
    }

    pub(crate) fn set_drain(&self, handler: DrainHandler) {
        *self.drain.write().unwrap() = Some(handler);
    }

    pub(crate) fn set_error(&self, handler: ErrorHandler) {
        *self.error.write().unwrap() = Some(handler);
    }

    /// Runs the registered message handler, if any. Returns `None` when no
    /// handler is installed (REQUEST is silently dropped, per spec).
    pub(crate) fn call_message(&self, msg: Message) -> Option<HandlerFuture> {
        let guard = self.message.read().unwrap();
        guard.as_ref().map(|h| h(msg))
    }

    pub(crate) fn call_open(&self) {
        if let Some(h) = self.open.read().unwrap().as_ref() {
            h();
        }
    }

    pub(crate) fn call_close(&self, unexpected: bool) {
        if let Some(h) = self.close.read().unwrap().as_ref() {
            h(unexpected);
        }
    }

    pub(crate) fn call_drain(&self) {
        if let Some(h) = self.drain.read().unwrap().as_ref() {
            h();
        }
    }

    pub(crate) fn call_error(&self, err: &Error) {
        if let Some(h) = self.error.read().unwrap().as_ref() {
            h(err);
        }
    }
}
