//! Negative opinions grouped by complaint target.

use serde::{Deserialize, Serialize};

use super::analysis::SentenceOpinion;

/// All negative opinions a single comment expressed about one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintGroup {
    /// Literal target text; no normalization or case-folding.
    pub target: String,
    pub opinions: Vec<SentenceOpinion>,
}

impl ComplaintGroup {
    /// Every assessment text of the group, in opinion order.
    pub fn assessment_texts(&self) -> Vec<&str> {
        self.opinions
            .iter()
            .flat_map(|o| o.assessments.iter())
            .map(|a| a.text.as_str())
            .collect()
    }
}

/// Target → complaints mapping for one comment.
///
/// Targets keep the order in which they were first seen, so tickets for a
/// comment are filed in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComplaintGroups {
    groups: Vec<ComplaintGroup>,
}

impl ComplaintGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `opinion` to the group for its target, creating it if needed.
    pub fn push(&mut self, opinion: SentenceOpinion) {
        match self.groups.iter_mut().find(|g| g.target == opinion.target) {
            Some(group) => group.opinions.push(opinion),
            None => self.groups.push(ComplaintGroup {
                target: opinion.target.clone(),
                opinions: vec![opinion],
            }),
        }
    }

    pub fn get(&self, target: &str) -> Option<&ComplaintGroup> {
        self.groups.iter().find(|g| g.target == target)
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.target.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ComplaintGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl<'a> IntoIterator for &'a ComplaintGroups {
    type Item = &'a ComplaintGroup;
    type IntoIter = std::slice::Iter<'a, ComplaintGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}
