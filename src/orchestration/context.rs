use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug, Default)]
struct CancellationState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation flag shared between a caller and the saga it drives.
///
/// Clones share the same flag. Work in flight can either poll
/// [`is_cancelled`](Self::is_cancelled) or await [`cancelled`](Self::cancelled)
/// inside a `tokio::select!`.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<CancellationState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            state: Arc::new(CancellationState::default()),
        }
    }

    /// Signal cancellation and wake every task awaiting [`cancelled`](Self::cancelled).
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once the token is cancelled; immediately if it already is.
    pub async fn cancelled(&self) {
        loop {
            // registered before the flag check so a concurrent cancel is not missed
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    pub fn reset(&self) {
        self.state.cancelled.store(false, Ordering::Release);
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Request-scoped data passed to every orchestrator and handler call
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant_id: Uuid,
    /// User performing the operation
    pub actor_id: Uuid,
    pub cancellation: CancellationToken,
    pub deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(tenant_id: Uuid, actor_id: Uuid) -> Self {
        Self {
            tenant_id,
            actor_id,
            cancellation: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Resolves when the deadline passes; never without one.
    pub async fn deadline_reached(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
            None => std::future::pending().await,
        }
    }
}
