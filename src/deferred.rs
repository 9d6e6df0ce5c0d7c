use crate::error::SettlementFailure;
use once_cell::sync::OnceCell;
use std::{
    collections::HashMap,
    fmt,
    future::Future,
    mem,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll, Waker},
    time::Duration,
};
use tokio::time::Instant;

pub const DROPPED_REASON: &str = "producer dropped without settling";

type ReaderId = usize;

/// Wakers of readers that are currently parked, one per `Settled`.
#[derive(Default)]
struct Readers {
    next_id: ReaderId,
    wakers: HashMap<ReaderId, Waker>,
}

impl Readers {
    fn register(&mut self, waker: &Waker) -> ReaderId {
        let id = self.next_id;
        self.next_id += 1;
        self.wakers.insert(id, waker.clone());
        id
    }

    fn refresh(&mut self, id: ReaderId, waker: &Waker) {
        match self.wakers.get_mut(&id) {
            Some(current) if current.will_wake(waker) => {}
            Some(current) => *current = waker.clone(),
            None => {
                self.wakers.insert(id, waker.clone());
            }
        }
    }
}

struct Inner<T> {
    result: OnceCell<Result<T, SettlementFailure>>,
    readers: Mutex<Readers>,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Inner {
            result: OnceCell::new(),
            readers: Mutex::new(Readers::default()),
        }
    }

    fn settle(&self, result: Result<T, SettlementFailure>) {
        let ok = result.is_ok();
        if self.result.set(result).is_err() {
            tracing::warn!("deferred value settled twice, keeping the first result");
            return;
        }
        tracing::debug!(ok, "deferred value settled");

        // The cell is written before the wakers are taken, so a reader that
        // registered under the lock is always woken.
        let wakers = mem::take(&mut self.lock_readers().wakers);
        for waker in wakers.into_values() {
            waker.wake();
        }
    }

    fn lock_readers(&self) -> MutexGuard<'_, Readers> {
        self.readers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One-shot handle a producer uses to settle its `DeferredValue`.
///
/// `resolve` and `reject` consume the handle, so a value settles at most
/// once. Dropping an unsettled handle rejects the value.
pub struct Settler<T> {
    inner: Option<Arc<Inner<T>>>,
}

impl<T> Settler<T> {
    pub fn resolve(mut self, value: T) {
        if let Some(inner) = self.inner.take() {
            inner.settle(Ok(value));
        }
    }

    pub fn reject(self, reason: impl Into<String>) {
        self.fail(SettlementFailure::new(reason));
    }

    fn fail(mut self, failure: SettlementFailure) {
        if let Some(inner) = self.inner.take() {
            inner.settle(Err(failure));
        }
    }
}

impl<T: Send + Sync + 'static> Settler<T> {
    /// Schedules `resolve(value)` for `delay` from now and returns at once.
    ///
    /// Must be called from within a tokio runtime.
    pub fn resolve_after(self, delay: Duration, value: T) {
        let deadline = Instant::now() + delay;
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            self.resolve(value);
        });
    }
}

impl<T> Drop for Settler<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            tracing::warn!("{}", DROPPED_REASON);
            inner.settle(Err(SettlementFailure::new(DROPPED_REASON)));
        }
    }
}

/// A computation that is already running and settles exactly once.
///
/// The producer runs inside the constructor, so the work starts when the
/// value is built. Reading it only observes the outcome.
pub struct DeferredValue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> DeferredValue<T> {
    pub fn new<P>(producer: P) -> Self
    where
        P: FnOnce(Settler<T>),
    {
        let inner = Arc::new(Inner::new());
        producer(Settler {
            inner: Some(inner.clone()),
        });
        DeferredValue { inner }
    }

    pub fn resolved(value: T) -> Self {
        Self::new(|settler| settler.resolve(value))
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::new(|settler| settler.reject(reason))
    }

    pub fn is_settled(&self) -> bool {
        self.inner.result.get().is_some()
    }
}

impl<T: Send + Sync + 'static> DeferredValue<T> {
    /// Resolves to `value` once `delay` has passed since this call.
    ///
    /// Must be called from within a tokio runtime.
    pub fn after(delay: Duration, value: T) -> Self {
        Self::new(move |settler| settler.resolve_after(delay, value))
    }

    /// Spawns `future` right away and settles with its output.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, SettlementFailure>> + Send + 'static,
    {
        Self::new(move |settler| {
            tokio::spawn(async move {
                match future.await {
                    Ok(value) => settler.resolve(value),
                    Err(failure) => settler.fail(failure),
                }
            });
        })
    }
}

impl<T: Clone> DeferredValue<T> {
    /// The settled result, or `None` while still pending.
    pub fn peek(&self) -> Option<Result<T, SettlementFailure>> {
        self.inner.result.get().cloned()
    }

    /// Waits for settlement. Can be called any number of times; every call
    /// yields the same result.
    pub fn settled(&self) -> Settled<'_, T> {
        Settled {
            value: self,
            reader: None,
        }
    }
}

impl<T> Clone for DeferredValue<T> {
    fn clone(&self) -> Self {
        DeferredValue {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DeferredValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredValue")
            .field("result", &self.inner.result.get())
            .finish()
    }
}

/// Future returned by [`DeferredValue::settled`].
///
/// Holds at most one parked waker, which is removed again when the future
/// is dropped before the value settles.
#[derive(Debug)]
pub struct Settled<'a, T> {
    value: &'a DeferredValue<T>,
    reader: Option<ReaderId>,
}

impl<T: Clone> Future for Settled<'_, T> {
    type Output = Result<T, SettlementFailure>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let value = self.value;
        if let Some(result) = value.peek() {
            self.reader = None;
            return Poll::Ready(result);
        }

        let mut readers = value.inner.lock_readers();
        // Checked again under the lock, `settle` may have run in between.
        if let Some(result) = value.peek() {
            drop(readers);
            self.reader = None;
            return Poll::Ready(result);
        }
        let reader = match self.reader {
            Some(id) => {
                readers.refresh(id, cx.waker());
                id
            }
            None => readers.register(cx.waker()),
        };
        drop(readers);
        self.reader = Some(reader);

        tracing::trace!(reader, "waiting for deferred value to settle");
        Poll::Pending
    }
}

impl<T> Drop for Settled<'_, T> {
    fn drop(&mut self) {
        if let Some(id) = self.reader.take() {
            self.value.inner.lock_readers().wakers.remove(&id);
        }
    }
}
