use crate::actions::BrowserActions;
use crate::error::{PoolError, Result};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Creates browser contexts on demand.
#[async_trait::async_trait]
pub trait ContextFactory: Send + Sync + 'static {
    /// Context type handed out by the pool
    type Context: BrowserActions + 'static;

    /// Start a fresh context
    async fn launch(&self) -> Result<Self::Context>;
}

type IdleList<C> = Arc<Mutex<Vec<C>>>;

/// A bounded set of browser contexts shared by concurrent searches.
///
/// At most `size` contexts exist at any time, counting both idle and leased
/// ones. Callers beyond that wait in FIFO order for up to the admission
/// timeout and then fail with [`PoolError::Exhausted`].
pub struct ContextPool<F: ContextFactory> {
    factory: F,
    slots: Arc<Semaphore>,
    idle: IdleList<F::Context>,
    size: usize,
    admission_timeout: Duration,
    launched: AtomicUsize,
    closed: Arc<AtomicBool>,
}

impl<F: ContextFactory> ContextPool<F> {
    pub fn new(factory: F, size: usize, admission_timeout: Duration) -> Self {
        let size = size.max(1);
        Self {
            factory,
            slots: Arc::new(Semaphore::new(size)),
            idle: Arc::new(Mutex::new(Vec::with_capacity(size))),
            size,
            admission_timeout,
            launched: AtomicUsize::new(0),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Lease a context, reusing an idle one when possible.
    pub async fn acquire(&self) -> std::result::Result<PooledContext<F::Context>, PoolError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }

        let permit = match tokio::time::timeout(
            self.admission_timeout,
            Arc::clone(&self.slots).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Closed),
            Err(_) => {
                tracing::warn!(
                    "No browser context free after {:?} (pool size {})",
                    self.admission_timeout,
                    self.size
                );
                return Err(PoolError::Exhausted {
                    waited: self.admission_timeout,
                });
            }
        };

        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let context = if let Some(context) = reused {
            context
        } else {
            let context = self.factory.launch().await.map_err(PoolError::Launch)?;
            let total = self.launched.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!("Launched browser context #{}", total);
            context
        };

        Ok(PooledContext {
            context: Some(context),
            permit: Some(permit),
            idle: Arc::clone(&self.idle),
            closed: Arc::clone(&self.closed),
        })
    }

    /// Slots that can be leased right now without waiting.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Maximum number of contexts.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Contexts launched over the pool's lifetime.
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::Relaxed)
    }

    /// Stop admitting callers and close every idle context.
    ///
    /// Contexts still leased are closed when their lease ends, whether it
    /// is released, discarded or dropped.
    pub async fn shutdown(&self) {
        let idle: Vec<_> = {
            let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
            // Set under the idle lock so a concurrent release cannot slip in
            self.closed.store(true, Ordering::Release);
            idle.drain(..).collect()
        };
        self.slots.close();

        for context in idle {
            if let Err(e) = context.close().await {
                tracing::debug!("Closing idle context failed: {}", e);
            }
        }
        tracing::info!("Context pool shut down");
    }
}

/// A leased browser context.
///
/// End the lease with [`release`](Self::release) when the context is healthy
/// or [`discard`](Self::discard) after a failure. A lease that is simply
/// dropped is treated as a discard; the slot frees only once the context has
/// been closed.
pub struct PooledContext<C: BrowserActions + 'static> {
    context: Option<C>,
    permit: Option<OwnedSemaphorePermit>,
    idle: IdleList<C>,
    closed: Arc<AtomicBool>,
}

impl<C: BrowserActions + 'static> PooledContext<C> {
    /// Return the context to the pool for reuse.
    ///
    /// After the pool has shut down the context is closed instead.
    pub fn release(mut self) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::Acquire) {
            drop(idle);
            tracing::debug!("Pool closed; closing released context");
            // Drop closes the context before freeing the slot
            return;
        }
        if let Some(context) = self.context.take() {
            idle.push(context);
        }
        drop(idle);
        drop(self.permit.take());
    }

    /// Close the context and free its slot.
    pub async fn discard(mut self) {
        if let Some(context) = self.context.take() {
            if let Err(e) = context.close().await {
                tracing::debug!("Closing discarded context failed: {}", e);
            }
        }
        drop(self.permit.take());
    }
}

impl<C: BrowserActions + 'static> Deref for PooledContext<C> {
    type Target = C;

    fn deref(&self) -> &C {
        match &self.context {
            Some(context) => context,
            // Only release/discard take the context, and both consume self
            None => unreachable!("pooled context used after its lease ended"),
        }
    }
}

impl<C: BrowserActions + 'static> Drop for PooledContext<C> {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };
        let permit = self.permit.take();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = context.close().await {
                        tracing::debug!("Closing abandoned context failed: {}", e);
                    }
                    drop(permit);
                });
            }
            Err(_) => {
                drop(context);
                drop(permit);
            }
        }
    }
}
