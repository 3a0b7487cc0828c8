// src/plan/ordinal_access.rs

//! Creation and caching of synthetic ordinal anchor nodes.

use std::collections::BTreeMap;

use tracing::debug;

use crate::plan::node::{AnchorKind, Node, NodeId, NodeKind};
use crate::plan::ordinal::OrdinalGroupFactory;

/// Get-or-create access to the per-ordinal anchor nodes, one destroyer
/// location and one producer location per group.
///
/// Anchors are pure ordering devices: they are required from the moment they
/// are created and are never pruned, even when nothing else depends on them.
#[derive(Debug, Default)]
pub struct OrdinalNodeAccess {
    destroyer_location_nodes: BTreeMap<usize, NodeId>,
    producer_location_nodes: BTreeMap<usize, NodeId>,
}

impl OrdinalNodeAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor marking "all destroyer work of `ordinal` reached this point".
    pub fn destroyer_location_node(&mut self, ordinal: usize, nodes: &mut Vec<Node>) -> NodeId {
        Self::get_or_create(
            &mut self.destroyer_location_nodes,
            AnchorKind::DestroyerLocation,
            ordinal,
            nodes,
        )
    }

    /// Anchor marking "all producer work of `ordinal` reached this point".
    pub fn producer_location_node(&mut self, ordinal: usize, nodes: &mut Vec<Node>) -> NodeId {
        Self::get_or_create(
            &mut self.producer_location_nodes,
            AnchorKind::ProducerLocation,
            ordinal,
            nodes,
        )
    }

    /// Producer anchor of `ordinal - 1`, or `None` for ordinal 0.
    ///
    /// Used to make a destroyer of `ordinal` wait for all earlier producer
    /// work.
    pub fn preceding_producer_location_node(
        &mut self,
        ordinal: usize,
        nodes: &mut Vec<Node>,
    ) -> Option<NodeId> {
        if ordinal == 0 {
            None
        } else {
            Some(self.producer_location_node(ordinal - 1, nodes))
        }
    }

    /// Destroyer anchor of `ordinal - 1`, or `None` for ordinal 0.
    pub fn preceding_destroyer_location_node(
        &mut self,
        ordinal: usize,
        nodes: &mut Vec<Node>,
    ) -> Option<NodeId> {
        if ordinal == 0 {
            None
        } else {
            Some(self.destroyer_location_node(ordinal - 1, nodes))
        }
    }

    /// All anchor node ids created so far.
    pub fn all_anchor_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.destroyer_location_nodes
            .values()
            .chain(self.producer_location_nodes.values())
            .copied()
    }

    /// Chain anchors of the same kind across ordinals: the anchor of ordinal
    /// N depends on every existing anchor of ordinal 0..N of its kind.
    ///
    /// This keeps a destroyer ordinal from being treated as complete before
    /// all preceding producer ordinals have settled (and vice versa), even
    /// when the tasks of a batch have no explicit dependencies among
    /// themselves.
    pub fn create_inter_node_relationships(&self, nodes: &mut Vec<Node>) {
        Self::chain(&self.destroyer_location_nodes, nodes);
        Self::chain(&self.producer_location_nodes, nodes);
    }

    /// Clear the anchor caches and the group factory.
    pub fn reset(&mut self, groups: &mut OrdinalGroupFactory) {
        groups.reset();
        self.destroyer_location_nodes.clear();
        self.producer_location_nodes.clear();
    }

    fn chain(anchors: &BTreeMap<usize, NodeId>, nodes: &mut Vec<Node>) {
        for (&ordinal, &node) in anchors {
            for i in 0..ordinal {
                if let Some(&preceding) = anchors.get(&i) {
                    nodes[node.index()].add_dependency(preceding);
                }
            }
        }
    }

    fn get_or_create(
        cache: &mut BTreeMap<usize, NodeId>,
        kind: AnchorKind,
        ordinal: usize,
        nodes: &mut Vec<Node>,
    ) -> NodeId {
        *cache.entry(ordinal).or_insert_with(|| {
            let id = NodeId(nodes.len());
            debug!(ordinal, kind = kind.describe(), "creating ordinal anchor node");
            nodes.push(Node::new(id, NodeKind::OrdinalAnchor { kind, ordinal }));
            id
        })
    }
}
