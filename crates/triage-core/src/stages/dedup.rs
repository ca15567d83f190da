//! Dedup gate: skip comments the tracker already references.

use std::time::Duration;

use tracing::{debug, instrument};

use super::{with_deadline, SkipReason, Stage, StageFailure, StageOutcome};
use crate::collaborators::TicketTracker;
use crate::domain::Comment;

/// Ask the tracker whether a ticket already references `comment`.
///
/// A failed lookup fails the comment; it never counts as "not filed".
#[instrument(skip_all, fields(comment_id = %comment.id))]
pub async fn check_duplicate(
    tracker: &dyn TicketTracker,
    comment: &Comment,
    deadline: Duration,
) -> StageOutcome<()> {
    match with_deadline(deadline, tracker.search_by_comment_id(&comment.id)).await {
        Ok(existing) if existing.is_empty() => {
            debug!("no existing ticket references comment");
            StageOutcome::Proceed(())
        }
        Ok(existing) => {
            let keys: Vec<String> = existing.into_iter().map(|t| t.key).collect();
            debug!(existing = ?keys, "comment already filed");
            StageOutcome::Skip(SkipReason::Duplicate { existing: keys })
        }
        Err(e) => StageOutcome::Fail(StageFailure::qualified(
            Stage::Dedup,
            &format!("comment {}", comment.id),
            format!("searching tracker for comment {} failed: {e}", comment.id),
        )),
    }
}
