//! Ticket filing, one independent creation per complaint group.

use std::time::Duration;

use tracing::{info, instrument, warn};

use super::{with_deadline, Stage, StageFailure};
use crate::collaborators::TicketTracker;
use crate::domain::{Comment, ComplaintGroup, ComplaintGroups, FiledTicket, Priority, TicketRequest};

/// What happened to each group of one comment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilingReport {
    pub created: Vec<FiledTicket>,

    /// One entry per group whose creation failed.
    pub failures: Vec<StageFailure>,
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Build the ticket for one complaint group.
///
/// The description always carries the comment id; the dedup gate of later
/// runs searches for it.
pub fn build_ticket_request(
    comment: &Comment,
    group: &ComplaintGroup,
    priority: Priority,
    summary: &str,
) -> TicketRequest {
    let complaint_message = format!("{}: {}", group.target, group.assessment_texts().join(", "));
    let description = format!(
        "User has made {count} complaint(s) about '{target}', specifically saying that it's \
         '{complaint_message}'.\nComment: {comment_id}.\nSummary: {summary}",
        count = group.opinions.len(),
        target = group.target,
        comment_id = comment.id,
    );

    TicketRequest {
        summary: capitalize_first(&complaint_message),
        description,
        priority,
    }
}

/// File one ticket per group. Filing is not transactional: a failed group is
/// recorded and the next group is still attempted.
#[instrument(skip_all, fields(comment_id = %comment.id, groups = groups.len()))]
pub async fn file_tickets(
    tracker: &dyn TicketTracker,
    comment: &Comment,
    groups: &ComplaintGroups,
    priority: Priority,
    summary: &str,
    deadline: Duration,
) -> FilingReport {
    let mut report = FilingReport::default();

    for group in groups {
        let request = build_ticket_request(comment, group, priority, summary);
        match with_deadline(deadline, tracker.create_ticket(&request)).await {
            Ok(ticket) => {
                info!(key = %ticket.key, complaint_target = %group.target, %priority, "ticket filed");
                report.created.push(FiledTicket {
                    key: ticket.key,
                    target: group.target.clone(),
                    priority,
                });
            }
            Err(e) => {
                warn!(complaint_target = %group.target, error = %e, "ticket creation failed");
                report.failures.push(StageFailure::qualified(
                    Stage::File,
                    &format!("target '{}'", group.target),
                    format!("creating ticket for comment {} failed: {e}", comment.id),
                ));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SentenceOpinion, TargetSentiment};

    fn group(target: &str, assessments: &[&[&str]]) -> ComplaintGroup {
        ComplaintGroup {
            target: target.to_string(),
            opinions: assessments
                .iter()
                .map(|a| SentenceOpinion::new(target, TargetSentiment::Negative, a.iter().copied()))
                .collect(),
        }
    }

    #[test]
    fn test_summary_joins_assessments_and_capitalizes() {
        let comment = Comment::new("c1", "game crashes constantly");
        let request = build_ticket_request(
            &comment,
            &group("game", &[&["crashes"], &["laggy", "broken"]]),
            Priority::High,
            "",
        );
        assert_eq!(request.summary, "Game: crashes, laggy, broken");
        assert_eq!(request.priority, Priority::High);
    }

    #[test]
    fn test_capitalize_keeps_rest_of_string() {
        assert_eq!(capitalize_first("multiplayer MODE: slow"), "Multiplayer MODE: slow");
        assert_eq!(capitalize_first(""), "");
        assert_eq!(capitalize_first("ärger"), "Ärger");
    }

    #[test]
    fn test_description_is_traceable() {
        let comment = Comment::new("k3x9q", "the lobby is slow");
        let request = build_ticket_request(
            &comment,
            &group("lobby", &[&["slow"]]),
            Priority::Medium,
            "Lobby is slow. ",
        );
        assert!(request.description.contains("k3x9q"));
        assert!(request.description.contains("1 complaint(s) about 'lobby'"));
        assert!(request.description.contains("lobby: slow"));
        assert!(request.description.contains("Summary: Lobby is slow. "));
    }
}
