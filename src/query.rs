//! Read-side views over a built [`HistoryGraph`].

use serde::Serialize;
use serde_json::Value;

use crate::display;
use crate::graph::HistoryGraph;

/// A display-oriented snapshot of one version node.
///
/// Borrows from the graph it was taken from; serialize it or copy the
/// fields out before the graph goes away.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionSummary<'a> {
    /// Canonical identifier of the version.
    pub id: &'a str,
    /// Human-readable label, derived by [`crate::display::label_for`].
    pub label: String,
    /// The raw record backing this node.
    pub record: &'a Value,
    /// Direct descendants, newest first.
    pub children: &'a [String],
    /// The version this one descends from, when it has one.
    pub parent: Option<&'a str>,
}

impl HistoryGraph {
    /// The parent of `id`, found by scanning the child table in order.
    ///
    /// When a node somehow appears in more than one child list, the
    /// earliest-inserted branch wins.
    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.branches()
            .find(|(_, kids)| kids.iter().any(|kid| kid == id))
            .map(|(parent, _)| parent)
    }

    /// Summarize a single node, or `None` when `id` is unknown.
    ///
    /// `label_key` names a record field to prefer when deriving the label.
    pub fn summary(&self, id: &str, label_key: Option<&str>) -> Option<VersionSummary<'_>> {
        let (id, record) = self.node_entry(id)?;
        Some(VersionSummary {
            id,
            label: display::label_for(id, record, label_key),
            record,
            children: self.children_of(id),
            parent: self.parent_of(id),
        })
    }

    /// Summaries for every node, in first-seen order.
    pub fn summaries(&self, label_key: Option<&str>) -> Vec<VersionSummary<'_>> {
        self.nodes()
            .map(|(id, record)| VersionSummary {
                id,
                label: display::label_for(id, record, label_key),
                record,
                children: self.children_of(id),
                parent: self.parent_of(id),
            })
            .collect()
    }
}
