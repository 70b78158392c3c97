//! Maps outbound request ids to pending completion handles, enforces timeouts.

use crate::Error;
use crate::wire::Message;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

pub(crate) type TransactionResult = Result<Message, Error>;

struct Pending {
    sender: oneshot::Sender<TransactionResult>,
    timer: JoinHandle<()>,
}

/// Id-keyed table of in-flight transactions, one per outbound message that
/// expects a completion signal. Cheap to clone; internally `Arc`-shared so
/// the timer tasks spawned by `add` can call back into the same table.
#[derive(Clone)]
pub struct TransactionHolder {
    inner: Arc<Mutex<HashMap<u16, Pending>>>,
}

impl TransactionHolder {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers a pending transaction for `id` and starts its timeout timer.
    /// Returns the receiving half the caller should await.
    pub async fn add(&self, id: u16, timeout: Duration) -> oneshot::Receiver<TransactionResult> {
        let (tx, rx) = oneshot::channel();

        let holder = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            holder.reject(id, Error::Timeout).await;
        });

        let mut map = self.inner.lock().await;
        map.insert(id, Pending { sender: tx, timer });
        rx
    }

    /// Cancels the timer and removes the entry, if present.
    async fn remove(&self, id: u16) -> Option<Pending> {
        let mut map = self.inner.lock().await;
        let pending = map.remove(&id);
        if let Some(p) = &pending {
            p.timer.abort();
        }
        pending
    }

    /// Resolves the transaction with a reply. A no-op if the id is unknown
    /// (already resolved, rejected, or timed out).
    pub async fn resolve(&self, id: u16, msg: Message) {
        if let Some(p) = self.remove(id).await {
            let _ = p.sender.send(Ok(msg));
        }
    }

    /// Rejects the transaction with an error. A no-op if the id is unknown.
    pub async fn reject(&self, id: u16, err: Error) {
        if let Some(p) = self.remove(id).await {
            let _ = p.sender.send(Err(err));
        }
    }
}

impl Default for TransactionHolder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::MessageType;

    #[tokio::test]
    async fn resolve_delivers_the_reply() {
        let holder = TransactionHolder::new();
        let rx = holder.add(1, Duration::from_secs(5)).await;
        let reply = Message::create(b"ok", MessageType::Reply, 1);
        holder.resolve(1, reply.clone()).await;
        assert_eq!(rx.await.unwrap().unwrap(), reply);
    }

    #[tokio::test]
    async fn reject_delivers_the_error() {
        let holder = TransactionHolder::new();
        let rx = holder.add(2, Duration::from_secs(5)).await;
        holder.reject(2, Error::Remote("boom".into())).await;
        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn resolve_is_idempotent_after_reject() {
        let holder = TransactionHolder::new();
        let rx = holder.add(3, Duration::from_secs(5)).await;
        holder.reject(3, Error::Timeout).await;
        // A late resolve for the same id (e.g. a duplicate reply) is dropped.
        holder
            .resolve(3, Message::create(b"", MessageType::Reply, 3))
            .await;
        assert!(matches!(rx.await.unwrap(), Err(Error::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_when_no_reply_arrives() {
        let holder = TransactionHolder::new();
        let rx = holder.add(4, Duration::from_millis(50)).await;
        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(matches!(rx.await.unwrap(), Err(Error::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn removing_before_timeout_cancels_the_timer() {
        let holder = TransactionHolder::new();
        let rx = holder.add(5, Duration::from_millis(50)).await;
        holder
            .resolve(5, Message::create(b"fast", MessageType::Reply, 5))
            .await;
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(rx.await.unwrap().unwrap().payload(), b"fast");
    }
}
