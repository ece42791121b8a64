use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Outcome of one submitted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The record did not opt in; the store was not touched.
    Skipped,
    Delivered,
    Failed { reason: String },
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Delivery::Failed { .. })
    }
}

/// Resolves exactly once with the [`Delivery`] of a submitted record.
///
/// Await it from async code or call [`Completion::wait`] from a plain thread.
/// Dropping it does not cancel the delivery.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Delivery>,
}

/// Sending half held by the delivery task. Consumed on use, so it can fire at
/// most once.
#[derive(Debug)]
pub(crate) struct CompletionSender {
    tx: oneshot::Sender<Delivery>,
}

pub(crate) fn completion_pair() -> (CompletionSender, Completion) {
    let (tx, rx) = oneshot::channel();
    (CompletionSender { tx }, Completion { rx })
}

impl CompletionSender {
    pub(crate) fn complete(self, delivery: Delivery) {
        // The caller may have dropped the Completion; that is fine.
        let _ = self.tx.send(delivery);
    }
}

impl Completion {
    pub(crate) fn resolved(delivery: Delivery) -> Self {
        let (tx, rx) = completion_pair();
        tx.complete(delivery);
        rx
    }

    /// Block the current thread until the delivery attempt has finished.
    ///
    /// Must not be called from within an async runtime.
    pub fn wait(self) -> Delivery {
        self.rx.blocking_recv().unwrap_or_else(|_| abandoned())
    }
}

impl Future for Completion {
    type Output = Delivery;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| abandoned()))
    }
}

fn abandoned() -> Delivery {
    Delivery::Failed {
        reason: "delivery task ended without reporting".to_string(),
    }
}
