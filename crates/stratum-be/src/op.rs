//! Operation objects.
//!
//! Every backend and metadata operation is an `async fn`. Callers that want
//! to poll progress instead of awaiting wrap the future in an [`Op`], which
//! exposes the `Init → Active → Success | Failure` state machine. Blocking
//! callers use [`Op::wait`] or the free function [`wait`], both built on
//! `futures::executor::block_on`, so the synchronous and asynchronous
//! calling conventions share one implementation.

use futures::future::{FutureExt, LocalBoxFuture};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// State of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpState {
    /// Created, not yet polled.
    Init,
    /// Polled at least once, not finished.
    Active,
    /// Finished with `Ok`.
    Success,
    /// Finished with `Err`.
    Failure,
}

impl OpState {
    /// True for `Success` and `Failure`.
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

/// An operation object wrapping a fallible future.
pub struct Op<'a, T, E> {
    state: OpState,
    fut: Option<LocalBoxFuture<'a, Result<T, E>>>,
}

impl<'a, T, E> Op<'a, T, E> {
    /// Wrap `fut` into an operation in the `Init` state.
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T, E>> + 'a,
    {
        Self {
            state: OpState::Init,
            fut: Some(fut.boxed_local()),
        }
    }

    /// Current state.
    pub const fn state(&self) -> OpState {
        self.state
    }

    /// Block the calling thread until the operation finishes.
    pub fn wait(self) -> Result<T, E> {
        futures::executor::block_on(self)
    }
}

impl<T, E> Future for Op<'_, T, E> {
    type Output = Result<T, E>;

    #[allow(clippy::panic)]
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let Some(fut) = this.fut.as_mut() else {
            panic!("operation polled after completion");
        };
        this.state = OpState::Active;
        match fut.as_mut().poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                this.state = if result.is_ok() {
                    OpState::Success
                } else {
                    OpState::Failure
                };
                this.fut = None;
                Poll::Ready(result)
            }
        }
    }
}

impl<T, E> fmt::Debug for Op<'_, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Op").field("state", &self.state).finish()
    }
}

/// Run `fut` to completion on the current thread.
pub fn wait<F: Future>(fut: F) -> F::Output {
    futures::executor::block_on(fut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker_ref;

    #[test]
    fn test_state_transitions_success() {
        let mut op: Op<'_, u32, ()> = Op::new(async { Ok(7) });
        assert_eq!(op.state(), OpState::Init);

        let mut cx = Context::from_waker(noop_waker_ref());
        let polled = Pin::new(&mut op).poll(&mut cx);
        assert_eq!(polled, Poll::Ready(Ok(7)));
        assert_eq!(op.state(), OpState::Success);
        assert!(op.state().is_done());
    }

    #[test]
    fn test_state_transitions_failure() {
        let mut op: Op<'_, (), &str> = Op::new(async { Err("boom") });
        let mut cx = Context::from_waker(noop_waker_ref());
        assert_eq!(Pin::new(&mut op).poll(&mut cx), Poll::Ready(Err("boom")));
        assert_eq!(op.state(), OpState::Failure);
    }

    #[test]
    fn test_active_while_pending() {
        let (tx, rx) = futures::channel::oneshot::channel::<u8>();
        let mut op: Op<'_, u8, futures::channel::oneshot::Canceled> = Op::new(rx);
        let mut cx = Context::from_waker(noop_waker_ref());

        assert!(Pin::new(&mut op).poll(&mut cx).is_pending());
        assert_eq!(op.state(), OpState::Active);

        tx.send(3).unwrap_or_else(|_| panic!("receiver dropped"));
        assert_eq!(Pin::new(&mut op).poll(&mut cx), Poll::Ready(Ok(3)));
        assert_eq!(op.state(), OpState::Success);
    }

    #[test]
    fn test_wait() {
        let op: Op<'_, &str, ()> = Op::new(async { Ok("done") });
        assert_eq!(op.wait(), Ok("done"));
        assert_eq!(wait(async { 5 }), 5);
    }
}
