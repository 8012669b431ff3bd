//! Context implementation for per-operation cancellation and deadlines
//!
//! Every gateway operation and every task poll takes a Context first. A
//! cancelled Context stops in-flight requests and poll sleeps.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time;

use super::error::ApiError;

/// Context carries the cancel signal and optional deadline of one operation
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, done_rx) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                done: done_rx,
                done_tx,
            }),
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that is done at `deadline` or when `self` is cancelled,
    /// whichever comes first. Must be called inside a tokio runtime.
    pub fn with_deadline(self, deadline: Instant) -> Self {
        let deadline = match self.inner.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };

        let (done_tx, done_rx) = watch::channel(*self.inner.done.borrow());

        let mut parent = self.done();
        let done_tx_clone = done_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep_until(deadline.into()) => {}
                Ok(_) = parent.wait_for(|done| *done) => {}
                // Every receiver is gone, nobody can observe the deadline
                _ = done_tx_clone.closed() => return,
            }
            let _ = done_tx_clone.send(true);
        });

        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                done: done_rx,
                done_tx,
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns a channel that flips to `true` when work done on behalf of
    /// this context should stop
    pub fn done(&self) -> watch::Receiver<bool> {
        self.inner.done.clone()
    }

    pub fn cancel(&self) {
        let _ = self.inner.done_tx.send(true);
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn cancelled(&self) {
        let mut done = self.done();
        let _ = done.wait_for(|done| *done).await;
    }

    /// Error describing why this context stopped
    pub fn interruption(&self) -> ApiError {
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => ApiError::DeadlineExceeded,
            _ => ApiError::Cancelled,
        }
    }

    /// Fail fast when the context is already done
    pub fn check(&self) -> Result<(), ApiError> {
        if self.is_cancelled() {
            Err(self.interruption())
        } else {
            Ok(())
        }
    }

    /// Run `fut` unless the context finishes first
    pub async fn run<F, T>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(self.interruption()),
            result = fut => result,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
