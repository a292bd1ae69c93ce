//! Reconstruction of a version forest from flat store records.
//!
//! The builder is total: any slice of JSON values produces a graph.
//! Records without a usable identity are ignored, and links that point
//! outside the dataset are dropped rather than invented.

use std::cmp::Reverse;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashSet;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::record::{self, LinkTarget};

/// A reconstructed version forest.
///
/// Nodes keep the order in which their identifiers were first seen, and
/// child lists are sorted newest-first by effective timestamp. All
/// lookups are by the canonical identifier returned by
/// [`crate::record::resolve_id`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryGraph {
    nodes: IndexMap<String, Value>,
    children: IndexMap<String, Vec<String>>,
    roots: Vec<String>,
}

impl HistoryGraph {
    /// Build the forest for a slice of version records.
    ///
    /// Records without a resolvable identifier are skipped. When several
    /// records share an identifier, the node keeps its first-seen position
    /// but the last record's content, and their link contributions are
    /// merged. Links to identifiers absent from the dataset are dropped,
    /// as are self-referential ones.
    pub fn build(records: &[Value]) -> Self {
        let mut nodes: IndexMap<String, Value> = IndexMap::new();
        for rec in records {
            if let Some(id) = record::resolve_id(rec) {
                nodes.insert(id.to_owned(), rec.clone());
            }
        }

        let mut edges: IndexMap<String, IndexSet<String>> = IndexMap::new();
        let mut connect = |parent: &str, child: &str| {
            if parent != child {
                edges
                    .entry(parent.to_owned())
                    .or_default()
                    .insert(child.to_owned());
            }
        };
        for rec in records {
            let Some(id) = record::resolve_id(rec) else { continue };
            if let Some(parent) = record::previous_link(rec).and_then(LinkTarget::resolve) {
                connect(parent, id);
            }
        }
        for rec in records {
            let Some(id) = record::resolve_id(rec) else { continue };
            for child in record::next_links(rec).into_iter().filter_map(LinkTarget::resolve) {
                connect(id, child);
            }
        }

        let mut children: IndexMap<String, Vec<String>> = IndexMap::new();
        for (parent, targets) in edges {
            if !nodes.contains_key(&parent) {
                continue;
            }
            let kept: Vec<String> = targets
                .into_iter()
                .filter(|child| nodes.contains_key(child))
                .collect();
            if !kept.is_empty() {
                children.insert(parent, kept);
            }
        }
        for bucket in children.values_mut() {
            bucket.sort_by_key(|child| {
                Reverse(nodes.get(child).map(record::effective_timestamp).unwrap_or(0))
            });
        }

        let roots = select_roots(&nodes, &children);
        debug!(
            nodes = nodes.len(),
            branches = children.len(),
            roots = roots.len(),
            "history graph built"
        );
        HistoryGraph { nodes, children, roots }
    }

    /// The record stored under `id`, if the graph knows it.
    pub fn node(&self, id: &str) -> Option<&Value> {
        self.nodes.get(id)
    }

    /// The stored identifier and record for `id`, both borrowed from the
    /// graph rather than from the caller's lookup key.
    pub fn node_entry(&self, id: &str) -> Option<(&str, &Value)> {
        self.nodes
            .get_key_value(id)
            .map(|(id, rec)| (id.as_str(), rec))
    }

    /// Whether `id` names a node in the graph.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Node identifiers in first-seen order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Nodes in first-seen order, paired with their records.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.nodes.iter().map(|(id, rec)| (id.as_str(), rec))
    }

    /// Direct descendants of `id`, newest first. Empty for leaves and
    /// for identifiers the graph does not know.
    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every parent with at least one child, in insertion order.
    pub fn branches(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.children
            .iter()
            .map(|(parent, kids)| (parent.as_str(), kids.as_slice()))
    }

    /// The entry points of the forest, in selection order.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Root selection cascade.
///
/// Tried in order, first non-empty tier wins: records explicitly marked
/// as prime roots, then records named as the true root by another
/// record's prime pointer, then nodes that appear in no child list. A
/// fully cyclic dataset with no markers yields no roots.
fn select_roots(
    nodes: &IndexMap<String, Value>,
    children: &IndexMap<String, Vec<String>>,
) -> Vec<String> {
    let marked: Vec<String> = nodes
        .iter()
        .filter(|(_, rec)| record::is_prime_root(rec))
        .map(|(id, _)| id.clone())
        .collect();
    if !marked.is_empty() {
        return marked;
    }

    let mut named: IndexSet<String> = IndexSet::new();
    for rec in nodes.values() {
        if let Some(target) = record::prime_reference(rec) {
            if nodes.contains_key(target) {
                named.insert(target.to_owned());
            }
        }
    }
    if !named.is_empty() {
        return named.into_iter().collect();
    }

    let child_ids: FxHashSet<&str> = children
        .values()
        .flatten()
        .map(String::as_str)
        .collect();
    nodes
        .keys()
        .filter(|id| !child_ids.contains(id.as_str()))
        .cloned()
        .collect()
}

/// Drop records that repeat an already-seen identifier, keeping the first
/// occurrence, and drop records with no identifier at all.
///
/// This is the merge step for records gathered from more than one
/// endpoint; [`HistoryGraph::build`] itself resolves duplicates the other
/// way around (last content wins), so callers that want first-wins
/// semantics run their batch through here before building.
pub fn dedup_records(records: Vec<Value>) -> Vec<Value> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    records
        .into_iter()
        .filter(|rec| match record::resolve_id(rec) {
            Some(id) => seen.insert(id.to_owned()),
            None => false,
        })
        .collect()
}
