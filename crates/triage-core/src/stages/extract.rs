//! Complaint extraction.

use crate::domain::{ComplaintGroups, SentimentResult, TargetSentiment};

/// Group every negative mined opinion by its literal target text.
///
/// Opinions about positive or neutral targets are dropped. A comment can be
/// mixed overall and still yield no group at all.
pub fn extract_complaints(result: &SentimentResult) -> ComplaintGroups {
    let mut groups = ComplaintGroups::new();
    for opinion in result.opinions() {
        if opinion.target_sentiment == TargetSentiment::Negative {
            groups.push(opinion.clone());
        }
    }
    groups
}
