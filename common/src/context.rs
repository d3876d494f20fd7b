use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;

/// Why a context finished.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CancelReason {
    Parent,
    Deadline,
    Cancel,
}

impl Display for CancelReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parent => write!(f, "Parent"),
            Self::Deadline => write!(f, "Deadline"),
            Self::Cancel => write!(f, "Cancel"),
        }
    }
}

struct RawContext {
    // Dropped when the last context clone goes away, which is what wakes up
    // `Handler::done`.
    _sender: oneshot::Sender<()>,
    deadline: Option<Instant>,
    parent: Option<Context>,
    cancel_receiver: broadcast::Receiver<()>,
}

impl RawContext {
    fn new() -> (Self, Handler) {
        let (sender, recv) = oneshot::channel();
        let (cancel_sender, cancel_receiver) = broadcast::channel(1);

        (
            Self {
                _sender: sender,
                deadline: None,
                parent: None,
                cancel_receiver,
            },
            Handler {
                recv,
                cancel_sender,
            },
        )
    }

    fn done(&self) -> Pin<Box<dyn Future<Output = CancelReason> + '_ + Send>> {
        let mut recv = self.cancel_receiver.resubscribe();

        Box::pin(async move {
            match (&self.parent, self.deadline) {
                (Some(parent), Some(deadline)) => {
                    tokio::select! {
                        _ = parent.done() => CancelReason::Parent,
                        _ = tokio::time::sleep_until(deadline) => CancelReason::Deadline,
                        _ = recv.recv() => CancelReason::Cancel,
                    }
                }
                (Some(parent), None) => {
                    tokio::select! {
                        _ = parent.done() => CancelReason::Parent,
                        _ = recv.recv() => CancelReason::Cancel,
                    }
                }
                (None, Some(deadline)) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => CancelReason::Deadline,
                        _ = recv.recv() => CancelReason::Cancel,
                    }
                }
                (None, None) => {
                    let _ = recv.recv().await;
                    CancelReason::Cancel
                }
            }
        })
    }
}

/// The other half of a [`Context`]: waits for every clone of the context to
/// drop, and can cancel them all.
pub struct Handler {
    recv: oneshot::Receiver<()>,
    cancel_sender: broadcast::Sender<()>,
}

impl Handler {
    /// Wait for all contexts to drop without cancelling them.
    pub async fn done(&mut self) {
        let _ = (&mut self.recv).await;
    }

    /// Cancel all contexts and wait for them to drop.
    pub async fn cancel(self) {
        drop(self.cancel_sender);

        let _ = self.recv.await;
    }
}

#[derive(Clone)]
pub struct Context(Arc<RawContext>);

impl Context {
    pub fn new() -> (Self, Handler) {
        let (ctx, handler) = RawContext::new();
        (Self(Arc::new(ctx)), handler)
    }

    pub fn with_deadline(deadline: Instant) -> (Self, Handler) {
        let (mut ctx, handler) = RawContext::new();
        ctx.deadline = Some(deadline);
        (Self(Arc::new(ctx)), handler)
    }

    pub fn with_timeout(timeout: std::time::Duration) -> (Self, Handler) {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_parent(parent: Context, deadline: Option<Instant>) -> (Self, Handler) {
        let (mut ctx, handler) = RawContext::new();
        ctx.parent = Some(parent);
        ctx.deadline = deadline;
        (Self(Arc::new(ctx)), handler)
    }

    /// Resolves when the context is cancelled, its deadline passes, or its
    /// parent finishes.
    pub async fn done(&self) -> CancelReason {
        self.0.done().await
    }
}
