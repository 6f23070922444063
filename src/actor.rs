//! Generic per-key mailbox infrastructure (spec §5, §9).
//!
//! Each logical actor (wallet, bet, odds, sport event, bet index) is a tokio
//! task owning one mutable state cell and a bounded mpsc mailbox. Calls are
//! request/response: the caller sends a boxed request plus a oneshot reply
//! sender, and awaits the reply. Tokio's multi-threaded runtime work-steals
//! across these tasks, so "single-threaded cooperative executor keyed by its
//! identifier" falls out of "one task per key, mailbox is the only ordering
//! primitive" without any locks in the actor body.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};

use crate::error::{DomainError, DomainResult};

/// An envelope carrying a request and the channel its reply goes back on.
pub struct Envelope<Req, Resp> {
    pub request: Req,
    pub reply: oneshot::Sender<Resp>,
}

/// A handle callers hold to talk to one actor instance. Cheap to clone -
/// cloning only clones the mpsc sender.
pub struct Mailbox<Req, Resp> {
    tx: mpsc::Sender<Envelope<Req, Resp>>,
}

impl<Req, Resp> Clone for Mailbox<Req, Resp> {
    fn clone(&self) -> Self {
        Mailbox { tx: self.tx.clone() }
    }
}

impl<Req, Resp> fmt::Debug for Mailbox<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox").finish_non_exhaustive()
    }
}

/// Mailbox depth. A bounded channel applies natural backpressure to a single
/// hot key without blocking unrelated keys (they each have their own task).
pub const MAILBOX_CAPACITY: usize = 256;

impl<Req: Send + 'static, Resp: Send + 'static> Mailbox<Req, Resp> {
    /// Spawns the actor loop and returns a handle to it. `state` is the
    /// actor's sole mutable cell; `handle_fn` processes one request against
    /// it and returns the reply. Persistence (if the handler performs any)
    /// happens inside `handle_fn` before it returns, so a reply always
    /// reflects durably-written state (read-your-writes, spec §5).
    pub fn spawn<S, F>(mut state: S, mut handle_fn: F) -> Self
    where
        S: Send + 'static,
        F: for<'a> FnMut(&'a mut S, Req) -> Pin<Box<dyn Future<Output = Resp> + Send + 'a>>
            + Send
            + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Envelope<Req, Resp>>(MAILBOX_CAPACITY);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let resp = handle_fn(&mut state, envelope.request).await;
                let _ = envelope.reply.send(resp);
            }
        });
        Mailbox { tx }
    }

    /// Sends a request and awaits the reply. Fails with `ActorUnavailable`
    /// if the actor task has terminated (e.g. panicked) rather than blocking
    /// forever - a caller-provided deadline should wrap this (spec §5).
    pub async fn call(&self, request: Req) -> DomainResult<Resp> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| DomainError::ActorUnavailable("mailbox closed".into()))?;
        reply_rx
            .await
            .map_err(|_| DomainError::ActorUnavailable("actor dropped reply".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mailbox_serializes_calls_in_order() {
        let mailbox: Mailbox<i32, i32> = Mailbox::spawn(0i32, |state, req| {
            *state += req;
            let value = *state;
            Box::pin(async move { value })
        });

        for i in 1..=5 {
            let result = mailbox.call(i).await.unwrap();
            assert_eq!(result, (1..=i).sum::<i32>());
        }
    }

    #[tokio::test]
    async fn dropped_actor_reports_unavailable() {
        let (tx, rx) = mpsc::channel::<Envelope<i32, i32>>(1);
        drop(rx);
        let mailbox = Mailbox { tx };
        let err = mailbox.call(1).await.unwrap_err();
        assert_eq!(err, DomainError::ActorUnavailable("mailbox closed".into()));
    }
}
