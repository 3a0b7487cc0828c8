// src/plan/hierarchy.rs

//! Path-trie index of which nodes touch which filesystem locations.
//!
//! Each plan keeps one long-lived hierarchy for outputs and one for
//! destroyables; input hierarchies are created per project through
//! [`ExecutionNodeAccessHierarchies::create_input_hierarchy`].
//!
//! The trie is built single-threaded during plan assembly and is never
//! mutated once parallel execution begins; that phase boundary replaces
//! fine-grained locking.

use std::collections::HashSet;
use std::path::Path;

use crate::plan::node::NodeId;
use crate::types::CaseSensitivity;

/// Compressed (radix) trie over path components, accumulating the nodes
/// that declared access at or under each location.
#[derive(Debug, Clone)]
pub struct ExecutionNodeAccessHierarchy {
    case_sensitivity: CaseSensitivity,
    root: TrieNode,
}

#[derive(Debug, Clone, Default)]
struct TrieNode {
    /// Nodes recorded exactly at this location.
    accessors: HashSet<NodeId>,
    children: Vec<TrieEdge>,
}

/// A compressed run of path segments leading to a child node.
///
/// Sibling edges never share a first segment; insertion splits them at the
/// longest common prefix.
#[derive(Debug, Clone)]
struct TrieEdge {
    segments: Vec<String>,
    child: TrieNode,
}

impl ExecutionNodeAccessHierarchy {
    pub fn new(case_sensitivity: CaseSensitivity) -> Self {
        Self {
            case_sensitivity,
            root: TrieNode::default(),
        }
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case_sensitivity
    }

    /// Record that `node` accesses `path`.
    ///
    /// Paths with no normal components are a caller programming error.
    pub fn record_access(&mut self, node: NodeId, path: &Path) {
        let segments = split_components(path);
        debug_assert!(
            !segments.is_empty(),
            "access path must have at least one component: {path:?}"
        );
        insert(&mut self.root, &segments, node, self.case_sensitivity);
    }

    /// Nodes recorded exactly at `path`.
    pub fn exact_match(&self, path: &Path) -> HashSet<NodeId> {
        let segments = split_components(path);
        match walk(&self.root, &segments, self.case_sensitivity) {
            WalkResult::AtNode(node) => node.accessors.clone(),
            _ => HashSet::new(),
        }
    }

    /// Nodes recorded at `path` itself or at any ancestor of it.
    pub fn ancestors_and_self_of(&self, path: &Path) -> HashSet<NodeId> {
        let segments = split_components(path);
        let mut found = HashSet::new();
        let mut current = &self.root;
        let mut remaining: &[String] = &segments;

        loop {
            found.extend(current.accessors.iter().copied());
            if remaining.is_empty() {
                return found;
            }
            match current.matching_edge(remaining, self.case_sensitivity) {
                Some((edge, lcp)) if lcp == edge.segments.len() => {
                    current = &edge.child;
                    remaining = &remaining[lcp..];
                }
                // Path ends mid-edge or diverges: everything stored below
                // here is a sibling or descendant, not an ancestor.
                _ => return found,
            }
        }
    }

    /// Nodes recorded strictly below `path` (exact matches excluded).
    pub fn descendants_of(&self, path: &Path) -> HashSet<NodeId> {
        let segments = split_components(path);
        let mut found = HashSet::new();
        match walk(&self.root, &segments, self.case_sensitivity) {
            WalkResult::AtNode(node) => {
                for edge in &node.children {
                    collect_subtree(&edge.child, &mut found);
                }
            }
            WalkResult::MidEdge(child) => {
                // The stored run extends past the queried path, so the whole
                // child subtree, including its own accessors, lies below it.
                collect_subtree(child, &mut found);
            }
            WalkResult::Diverged => {}
        }
        found
    }

    /// All nodes whose recorded location overlaps `path`: an ancestor, the
    /// exact location, or a descendant.
    pub fn overlapping(&self, path: &Path) -> HashSet<NodeId> {
        let mut found = self.ancestors_and_self_of(path);
        found.extend(self.descendants_of(path));
        found
    }
}

impl TrieNode {
    fn matching_edge<'a>(
        &'a self,
        segments: &[String],
        cs: CaseSensitivity,
    ) -> Option<(&'a TrieEdge, usize)> {
        self.children
            .iter()
            .find(|edge| cs.segments_equal(&edge.segments[0], &segments[0]))
            .map(|edge| (edge, common_prefix_len(&edge.segments, segments, cs)))
    }
}

enum WalkResult<'a> {
    /// Path consumed exactly at a trie node boundary.
    AtNode(&'a TrieNode),
    /// Path consumed inside an edge; the edge's child lies below the path.
    MidEdge(&'a TrieNode),
    /// Path diverges from everything stored.
    Diverged,
}

fn walk<'a>(root: &'a TrieNode, segments: &[String], cs: CaseSensitivity) -> WalkResult<'a> {
    let mut current = root;
    let mut remaining = segments;

    loop {
        if remaining.is_empty() {
            return WalkResult::AtNode(current);
        }
        match current.matching_edge(remaining, cs) {
            Some((edge, lcp)) if lcp == edge.segments.len() => {
                current = &edge.child;
                remaining = &remaining[lcp..];
            }
            Some((edge, lcp)) if lcp == remaining.len() => {
                return WalkResult::MidEdge(&edge.child);
            }
            _ => return WalkResult::Diverged,
        }
    }
}

fn insert(trie: &mut TrieNode, segments: &[String], node: NodeId, cs: CaseSensitivity) {
    if segments.is_empty() {
        trie.accessors.insert(node);
        return;
    }

    for edge in &mut trie.children {
        if !cs.segments_equal(&edge.segments[0], &segments[0]) {
            continue;
        }
        let lcp = common_prefix_len(&edge.segments, segments, cs);
        if lcp < edge.segments.len() {
            // Split the edge at the longest common prefix; the old child
            // moves one level down.
            let tail = edge.segments.split_off(lcp);
            let old_child = std::mem::take(&mut edge.child);
            edge.child.children.push(TrieEdge {
                segments: tail,
                child: old_child,
            });
        }
        insert(&mut edge.child, &segments[lcp..], node, cs);
        return;
    }

    let mut child = TrieNode::default();
    child.accessors.insert(node);
    trie.children.push(TrieEdge {
        segments: segments.to_vec(),
        child,
    });
}

fn collect_subtree(node: &TrieNode, out: &mut HashSet<NodeId>) {
    out.extend(node.accessors.iter().copied());
    for edge in &node.children {
        collect_subtree(&edge.child, out);
    }
}

fn common_prefix_len(a: &[String], b: &[String], cs: CaseSensitivity) -> usize {
    a.iter()
        .zip(b.iter())
        .take_while(|(x, y)| cs.segments_equal(x, y))
        .count()
}

fn split_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// The set of access hierarchies shared by one execution plan.
#[derive(Debug)]
pub struct ExecutionNodeAccessHierarchies {
    case_sensitivity: CaseSensitivity,
    outputs: ExecutionNodeAccessHierarchy,
    destroyables: ExecutionNodeAccessHierarchy,
}

impl ExecutionNodeAccessHierarchies {
    pub fn new(case_sensitivity: CaseSensitivity) -> Self {
        Self {
            case_sensitivity,
            outputs: ExecutionNodeAccessHierarchy::new(case_sensitivity),
            destroyables: ExecutionNodeAccessHierarchy::new(case_sensitivity),
        }
    }

    pub fn outputs(&self) -> &ExecutionNodeAccessHierarchy {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut ExecutionNodeAccessHierarchy {
        &mut self.outputs
    }

    pub fn destroyables(&self) -> &ExecutionNodeAccessHierarchy {
        &self.destroyables
    }

    pub fn destroyables_mut(&mut self) -> &mut ExecutionNodeAccessHierarchy {
        &mut self.destroyables
    }

    /// Create an input hierarchy.
    ///
    /// Input hierarchies are kept one per project for performance isolation,
    /// so there is only a factory method here.
    pub fn create_input_hierarchy(&self) -> ExecutionNodeAccessHierarchy {
        ExecutionNodeAccessHierarchy::new(self.case_sensitivity)
    }
}
