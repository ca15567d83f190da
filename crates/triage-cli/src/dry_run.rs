//! Dry-run ticket tracker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use triage_core::{CollaboratorResult, CreatedTicket, TicketRequest, TicketSummary, TicketTracker};

/// Searches the real tracker, logs creations instead of performing them.
///
/// Created tickets get synthetic `DRY-RUN-n` keys.
pub struct DryRunTracker {
    inner: Arc<dyn TicketTracker>,
    created: AtomicUsize,
}

impl DryRunTracker {
    pub fn new(inner: Arc<dyn TicketTracker>) -> Self {
        Self {
            inner,
            created: AtomicUsize::new(0),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TicketTracker for DryRunTracker {
    async fn search_by_comment_id(
        &self,
        comment_id: &str,
    ) -> CollaboratorResult<Vec<TicketSummary>> {
        self.inner.search_by_comment_id(comment_id).await
    }

    async fn create_ticket(&self, request: &TicketRequest) -> CollaboratorResult<CreatedTicket> {
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let key = format!("DRY-RUN-{n}");
        info!(
            key = %key,
            priority = %request.priority,
            summary = %request.summary,
            "dry run: ticket not created"
        );
        Ok(CreatedTicket { key })
    }
}
