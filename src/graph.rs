// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::{Edge, KDTree, Node};
use std::cell::RefCell;
use std::collections::btree_map::{BTreeMap, Entry};

/// Verdict returned when a [RouteGraph] is asked whether a traversed prefix of
/// node ids may be extended.
///
/// [Graph] never returns anything but [RestrictionVerdict::None] — turn
/// restrictions are compiled directly into its topology by the OSM graph
/// builder (see [crate::osm]), so the search never needs to consult a
/// separate table. The hook exists for other [RouteGraph] implementations
/// that would rather carry restriction state explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum RestrictionVerdict {
    /// Nothing forbids or forces the next step.
    None,
    /// Continuing to any of these node ids is forbidden.
    Prohibit(Vec<i64>),
    /// Only continuing to one of these node ids is allowed.
    Mandate(Vec<i64>),
}

/// Protocol an A* search ([crate::find_route],
/// [crate::find_route_without_turn_around]) consumes. Anything implementing
/// this trait — not just the in-memory [Graph] — can be routed over.
pub trait RouteGraph {
    /// Retrieves a [Node] with the provided id.
    fn get_node(&self, id: i64) -> Option<Node>;

    /// Gets all outgoing [Edges](Edge) from a node with a given id.
    fn edges_from(&self, id: i64) -> &[Edge];

    /// Checks whether the given traversed node-id prefix (oldest first) forbids
    /// or mandates a specific continuation. Defaults to never restricting.
    fn is_turn_restricted(&self, _prefix: &[i64]) -> RestrictionVerdict {
        RestrictionVerdict::None
    }
}

/// Represents an OpenStreetMap network as a set of [Nodes](Node)
/// and [Edges](Edge) between them.
///
/// Turn restrictions compiled in by the OSM graph builder are represented
/// purely as graph topology (synthetic "arrived via X" node clones — see
/// [crate::osm]); `Graph` itself carries no separate restriction table.
///
/// Nearest-node queries are served by a [KDTree] built lazily on first use
/// and invalidated whenever nodes are inserted or removed.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: BTreeMap<i64, (Node, Vec<Edge>)>,
    nearest_index: RefCell<Option<KDTree>>,
}

impl Clone for Graph {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            nearest_index: RefCell::new(None),
        }
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns an iterator over all [Nodes](Node) in the graph.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().map(|(_, (node, _))| node)
    }

    /// Retrieves a [Node] with the provided id.
    pub fn get_node(&self, id: i64) -> Option<Node> {
        self.nodes.get(&id).map(|&(node, _)| node)
    }

    /// Creates or updates a [Node] with `node.id`.
    ///
    /// All outgoing and incoming edges are preserved.
    /// Updating a [Node] position might result in violation of the
    /// [Edge] cost invariant (and thus break route finding) and
    /// is therefore disallowed.
    pub fn set_node(&mut self, node: Node) {
        assert_ne!(node.id, 0);

        match self.nodes.entry(node.id) {
            Entry::Vacant(e) => {
                e.insert((node, Vec::default()));
            }
            Entry::Occupied(mut e) => {
                debug_assert_eq!(e.get().0.id, node.id);
                e.get_mut().0 = node;
            }
        }

        self.nearest_index.borrow_mut().take();
    }

    /// Deletes a [Node] with a given `id`.
    ///
    /// While all outgoing edges are removed, incoming edges are preserved
    /// (as this would require a walk over all nodes in the graph).
    /// Thus, deleting a node and then re-using its id might result in violation
    /// of the [Edge] cost invariant (and break route finding) is disallowed.
    pub fn delete_node(&mut self, id: i64) {
        self.nodes.remove(&id);
        self.nearest_index.borrow_mut().take();
    }

    /// Finds the closest canonical (`id == osm_id`) [Node] to the given position,
    /// via a [KDTree] that is built lazily on first use and cached until the
    /// next node mutation.
    ///
    /// Returns `None` if the graph has no canonical nodes.
    pub fn find_nearest_node(&self, lat: f32, lon: f32) -> Option<Node> {
        let mut cache = self.nearest_index.borrow_mut();
        if cache.is_none() {
            *cache = KDTree::build_from_graph(self);
        }
        cache.as_ref().map(|tree| tree.find_nearest_node(lat, lon))
    }

    /// Gets all outgoing [Edges](Edge) from a node with a given id.
    pub fn get_edges(&self, from_id: i64) -> &[Edge] {
        self.nodes
            .get(&from_id)
            .map(|(_, e)| e.as_slice())
            .unwrap_or_default()
    }

    /// Gets the cost of an [Edge] from one node to another.
    /// If such an edge doesn't exist, returns [f32::INFINITY].
    pub fn get_edge(&self, from_id: i64, to_id: i64) -> f32 {
        self.nodes
            .get(&from_id)
            .map(|(_, e)| {
                e.iter().find_map(|edge| {
                    if edge.to == to_id {
                        Some(edge.cost)
                    } else {
                        None
                    }
                })
            })
            .flatten()
            .unwrap_or(f32::INFINITY)
    }

    /// Creates or updates an [Edge] from a node with a given id.
    pub fn set_edge(&mut self, from_id: i64, edge: Edge) {
        assert_ne!(from_id, 0);
        assert_ne!(edge.to, 0);

        if let Some((_, edges)) = self.nodes.get_mut(&from_id) {
            if let Some(candidate) = edges.iter_mut().find(|e| e.to == edge.to) {
                *candidate = edge;
            } else {
                edges.push(edge);
            }
        }
    }

    /// Inserts an [Edge], keeping the cheaper of the new and any pre-existing
    /// edge to the same `to` node.
    ///
    /// This is how the OSM graph builder satisfies the "parallel edges are
    /// collapsed by minimum cost" invariant; unlike [Graph::set_edge] it never
    /// regresses an existing edge to a higher cost.
    pub fn insert_edge_min_cost(&mut self, from_id: i64, edge: Edge) {
        assert_ne!(from_id, 0);
        assert_ne!(edge.to, 0);

        if let Some((_, edges)) = self.nodes.get_mut(&from_id) {
            if let Some(candidate) = edges.iter_mut().find(|e| e.to == edge.to) {
                if edge.cost < candidate.cost {
                    *candidate = edge;
                }
            } else {
                edges.push(edge);
            }
        }
    }

    /// Removes an edge from one node to another.
    pub fn delete_edge(&mut self, from_id: i64, to_id: i64) {
        if let Some((_, edges)) = self.nodes.get_mut(&from_id) {
            if let Some(idx) =
                edges.iter().enumerate().find_map(
                    |(idx, edge)| {
                        if edge.to == to_id {
                            Some(idx)
                        } else {
                            None
                        }
                    },
                )
            {
                edges.swap_remove(idx);
            }
        }
    }
}

impl RouteGraph for Graph {
    fn get_node(&self, id: i64) -> Option<Node> {
        Graph::get_node(self, id)
    }

    fn edges_from(&self, id: i64) -> &[Edge] {
        self.get_edges(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, lat: f32, lon: f32) -> Node {
        Node {
            id,
            osm_id: id,
            lat,
            lon,
        }
    }

    #[test]
    fn insert_edge_min_cost_keeps_cheaper() {
        let mut g = Graph::new();
        g.set_node(node(1, 0.0, 0.0));
        g.set_node(node(2, 0.0, 1.0));

        g.insert_edge_min_cost(1, Edge { to: 2, cost: 5.0 });
        assert_eq!(g.get_edge(1, 2), 5.0);

        g.insert_edge_min_cost(1, Edge { to: 2, cost: 10.0 });
        assert_eq!(g.get_edge(1, 2), 5.0, "must not regress to a higher cost");

        g.insert_edge_min_cost(1, Edge { to: 2, cost: 1.0 });
        assert_eq!(g.get_edge(1, 2), 1.0);
    }

    #[test]
    fn find_nearest_node_uses_cache_and_invalidates() {
        let mut g = Graph::new();
        g.set_node(node(1, 0.0, 0.0));
        g.set_node(node(2, 1.0, 1.0));

        assert_eq!(g.find_nearest_node(0.1, 0.1).unwrap().id, 1);

        g.set_node(node(3, 0.09, 0.09));
        assert_eq!(
            g.find_nearest_node(0.1, 0.1).unwrap().id,
            3,
            "cache must be invalidated by set_node"
        );

        g.delete_node(3);
        assert_eq!(
            g.find_nearest_node(0.1, 0.1).unwrap().id,
            1,
            "cache must be invalidated by delete_node"
        );
    }

    #[test]
    fn find_nearest_node_empty_graph_is_none() {
        let g = Graph::new();
        assert_eq!(g.find_nearest_node(0.0, 0.0), None);
    }
}
