// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use super::model::{self, Feature, FeatureType};
use super::{FeatureReader, Options};
use crate::osm::profile::TurnRestriction;
use crate::{earth_distance, Edge, Graph, Node};

/// First synthetic node id handed out for turn-restriction node duplication.
/// Matches the reservation documented on [crate::Node].
const FIRST_SYNTHETIC_ID: i64 = 0x0008_0000_0000_0000;

/// Helper object used for storing state related to converting [OSM features](super::model::Feature)
/// into a [Graph].
pub(super) struct GraphBuilder<'a> {
    g: &'a mut Graph,
    options: &'a Options<'a>,
    routable_ways: Vec<model::Way>,
    way_nodes: HashMap<i64, Vec<i64>>,
    restriction_candidates: Vec<model::Relation>,
    next_synthetic_id: i64,
}

impl<'a> GraphBuilder<'a> {
    /// Create a new, empty graph builder.
    pub fn new(g: &'a mut Graph, options: &'a Options<'a>) -> Self {
        Self {
            g,
            options,
            routable_ways: Vec::new(),
            way_nodes: HashMap::new(),
            restriction_candidates: Vec::new(),
            next_synthetic_id: FIRST_SYNTHETIC_ID,
        }
    }

    /// Add all features from the provided [FeatureReader].
    pub fn add_features<F: FeatureReader>(&mut self, mut features: F) -> Result<(), F::Error> {
        // First pass: nodes go straight into the graph (subject to bbox filtering);
        // way node lists are kept (for restriction-chain resolution) and routable
        // ways are additionally buffered for edge emission; restriction-candidate
        // relations are buffered for the final pass, since they reference ways and
        // nodes that may appear later in the stream.
        while let Some(feature) = features.next()? {
            match feature {
                Feature::Node(node) => self.add_node(node),
                Feature::Way(way) => self.add_way(way),
                Feature::Relation(relation) => self.add_relation(relation),
            }
        }

        self.build_edges();
        self.build_restrictions();

        Ok(())
    }

    fn add_node(&mut self, node: Node) {
        if self.in_bbox(node.lat, node.lon) {
            self.g.set_node(node);
        }
    }

    fn in_bbox(&self, lat: f32, lon: f32) -> bool {
        let [left, bottom, right, top] = self.options.bbox;
        if left == 0.0 && bottom == 0.0 && right == 0.0 && top == 0.0 {
            return true;
        }
        if !left.is_finite() || !bottom.is_finite() || !right.is_finite() || !top.is_finite() {
            return true;
        }
        lon >= left && lon <= right && lat >= bottom && lat <= top
    }

    fn add_way(&mut self, way: model::Way) {
        self.way_nodes.insert(way.id, way.nodes.clone());
        if self.options.profile.way_penalty(&way.tags).is_finite() {
            self.routable_ways.push(way);
        }
    }

    fn add_relation(&mut self, relation: model::Relation) {
        if self.options.profile.restriction_kind(&relation.tags) != TurnRestriction::Inapplicable {
            self.restriction_candidates.push(relation);
        }
    }

    /// Emits direction-aware, minimum-cost-deduplicated edges for every accepted way.
    fn build_edges(&mut self) {
        for way in std::mem::take(&mut self.routable_ways) {
            let penalty = self.options.profile.way_penalty(&way.tags);
            let (forward, backward) = self.options.profile.way_direction(&way.tags);

            for pair in way.nodes.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let (Some(pos_a), Some(pos_b)) = (self.g.get_node(a), self.g.get_node(b)) else {
                    continue;
                };

                let cost = earth_distance(pos_a.lat, pos_a.lon, pos_b.lat, pos_b.lon) * penalty;

                if forward {
                    self.g.insert_edge_min_cost(a, Edge { to: b, cost });
                }
                if backward {
                    self.g.insert_edge_min_cost(b, Edge { to: a, cost });
                }
            }
        }
    }

    /// Resolves every restriction candidate into a node-edge chain and compiles
    /// it into the graph's topology via node duplication.
    fn build_restrictions(&mut self) {
        let candidates = std::mem::take(&mut self.restriction_candidates);
        for relation in candidates {
            let kind = self.options.profile.restriction_kind(&relation.tags);
            if kind == TurnRestriction::Inapplicable {
                continue;
            }

            match self.resolve_chain(&relation) {
                Some(chain) => self.compile_restriction(&chain, kind),
                None => {
                    log::warn!(
                        target: "wayfare",
                        "relation {} is a turn restriction but its from/via/to chain could not be resolved, skipping",
                        relation.id,
                    );
                }
            }
        }
    }

    /// Reconstructs the ordered node sequence `from -> via -> to` of a restriction relation.
    ///
    /// Only the common single `via`-node shape is supported: `from` and `to` must
    /// each have the via node as one of their end nodes. Restrictions routed
    /// through a `via` way (or a chain of several) are not resolved, since OSM's
    /// relation member order carries no explicit connectivity beyond shared nodes.
    fn resolve_chain(&self, relation: &model::Relation) -> Option<Vec<i64>> {
        let from_way_id = relation
            .members
            .iter()
            .find(|m| m.role == "from" && m.type_ == FeatureType::Way)?
            .ref_;
        let via_node = relation
            .members
            .iter()
            .find(|m| m.role == "via" && m.type_ == FeatureType::Node)?
            .ref_;
        let to_way_id = relation
            .members
            .iter()
            .find(|m| m.role == "to" && m.type_ == FeatureType::Way)?
            .ref_;

        let from_nodes = self.way_nodes.get(&from_way_id)?;
        let to_nodes = self.way_nodes.get(&to_way_id)?;

        let n0 = adjacent_to_endpoint(from_nodes, via_node)?;
        let n2 = adjacent_to_endpoint(to_nodes, via_node)?;

        Some(vec![n0, via_node, n2])
    }

    /// Compiles a resolved `[n0, via.., nk]` restriction chain into the graph via
    /// node duplication: a dedicated clone is made of every via node, reachable
    /// only by redirecting the entry edge `n0 -> n1` onto the clone chain, with
    /// the final clone's continuation restricted per `kind`.
    fn compile_restriction(&mut self, chain: &[i64], kind: TurnRestriction) {
        let n0 = chain[0];
        let n1 = chain[1];

        let entry_cost = self.g.get_edge(n0, n1);
        if !entry_cost.is_finite() {
            log::warn!(
                target: "wayfare",
                "turn restriction via node {n1} has no incoming edge from {n0} in this profile, skipping",
            );
            return;
        }

        let via_ids = &chain[1..chain.len() - 1];
        let mut clone_ids = Vec::with_capacity(via_ids.len());

        for &via_id in via_ids {
            let Some(original) = self.g.get_node(via_id) else {
                log::warn!(target: "wayfare", "turn restriction via node {via_id} is missing from the graph, skipping");
                return;
            };

            let clone_id = self.next_synthetic_id;
            self.next_synthetic_id += 1;

            self.g.set_node(Node {
                id: clone_id,
                osm_id: original.osm_id,
                lat: original.lat,
                lon: original.lon,
            });

            for edge in self.g.get_edges(via_id).to_vec() {
                self.g.set_edge(clone_id, edge);
            }

            clone_ids.push(clone_id);
        }

        // Redirect the entry edge so only traffic arriving from the exact
        // restricted predecessor is funnelled through the clone chain.
        let first_clone = clone_ids[0];
        self.g.delete_edge(n0, n1);
        self.g.set_edge(
            n0,
            Edge {
                to: first_clone,
                cost: entry_cost,
            },
        );

        // Chain intermediate clones to each other instead of to the originals.
        for (clone_a, (original_b, clone_b)) in clone_ids
            .iter()
            .zip(via_ids.iter().skip(1).zip(clone_ids.iter().skip(1)))
        {
            let cost = self.g.get_edge(*clone_a, *original_b);
            if cost.is_finite() {
                self.g.delete_edge(*clone_a, *original_b);
                self.g.set_edge(
                    *clone_a,
                    Edge {
                        to: *clone_b,
                        cost,
                    },
                );
            }
        }

        // Final clone: apply the prohibit/mandate verdict against the target node.
        let last_clone = *clone_ids.last().unwrap();
        let target = chain[chain.len() - 1];

        match kind {
            TurnRestriction::Prohibitory => {
                self.g.delete_edge(last_clone, target);
            }
            TurnRestriction::Mandatory => {
                let allowed_cost = self.g.get_edge(last_clone, target);
                let edges = self.g.get_edges(last_clone).to_vec();
                for edge in edges {
                    if edge.to != target {
                        self.g.delete_edge(last_clone, edge.to);
                    }
                }
                if allowed_cost.is_finite() {
                    self.g.set_edge(
                        last_clone,
                        Edge {
                            to: target,
                            cost: allowed_cost,
                        },
                    );
                }
            }
            TurnRestriction::Inapplicable => {
                unreachable!("filtered out before compile_restriction")
            }
        }
    }
}

/// Returns the node adjacent to `node` if `node` is one of `nodes`' two endpoints.
fn adjacent_to_endpoint(nodes: &[i64], node: i64) -> Option<i64> {
    if nodes.len() < 2 {
        return None;
    }
    if nodes[0] == node {
        Some(nodes[1])
    } else if nodes[nodes.len() - 1] == node {
        Some(nodes[nodes.len() - 2])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osm::profile::{Penalty, Profile};
    use crate::osm::reader::model::{Relation, RelationMember, Way};
    use crate::osm::reader::FileFormat;
    use std::collections::HashMap as Map;

    const TEST_PROFILE: Profile = Profile {
        name: "car",
        penalties: &[Penalty {
            key: "highway",
            value: "residential",
            penalty: 1.0,
        }],
        access: &["access"],
        disallow_motorroad: false,
        disable_restrictions: false,
    };

    fn node(id: i64, lat: f32, lon: f32) -> Node {
        Node {
            id,
            osm_id: id,
            lat,
            lon,
        }
    }

    fn way(id: i64, nodes: &[i64]) -> model::Way {
        Way {
            id,
            nodes: nodes.to_vec(),
            tags: Map::from_iter([("highway".to_string(), "residential".to_string())]),
        }
    }

    fn feed(g: &mut Graph, options: &Options, features: Vec<Feature>) {
        let reader = features.into_iter().map(Ok::<_, std::convert::Infallible>);
        GraphBuilder::new(g, options).add_features(reader).unwrap();
    }

    #[test]
    fn builds_bidirectional_edges() {
        let mut g = Graph::new();
        let options = Options {
            profile: &TEST_PROFILE,
            file_format: FileFormat::Unknown,
            bbox: [0.0; 4],
        };

        feed(
            &mut g,
            &options,
            vec![
                Feature::Node(node(1, 0.0, 0.0)),
                Feature::Node(node(2, 0.0, 1.0)),
                Feature::Way(way(10, &[1, 2])),
            ],
        );

        assert!(g.get_edge(1, 2).is_finite());
        assert!(g.get_edge(2, 1).is_finite());
    }

    #[test]
    fn skips_segments_with_missing_nodes() {
        let mut g = Graph::new();
        let options = Options {
            profile: &TEST_PROFILE,
            file_format: FileFormat::Unknown,
            bbox: [0.0; 4],
        };

        feed(
            &mut g,
            &options,
            vec![
                Feature::Node(node(1, 0.0, 0.0)),
                Feature::Way(way(10, &[1, 2])),
            ],
        );

        assert_eq!(g.get_edge(1, 2), f32::INFINITY);
    }

    #[test]
    fn compiles_prohibitory_restriction_via_node_duplication() {
        let mut g = Graph::new();
        let options = Options {
            profile: &TEST_PROFILE,
            file_format: FileFormat::Unknown,
            bbox: [0.0; 4],
        };

        // A -> B -> C and A -> B -> D, restriction forbids A,B,C.
        feed(
            &mut g,
            &options,
            vec![
                Feature::Node(node(1, 0.0, 0.0)),
                Feature::Node(node(2, 0.0, 1.0)),
                Feature::Node(node(3, 0.0, 2.0)),
                Feature::Node(node(4, 1.0, 2.0)),
                Feature::Way(way(10, &[1, 2])),
                Feature::Way(way(11, &[2, 3])),
                Feature::Way(way(12, &[2, 4])),
                Feature::Relation(Relation {
                    id: 100,
                    members: vec![
                        RelationMember {
                            type_: FeatureType::Way,
                            ref_: 10,
                            role: "from".to_string(),
                        },
                        RelationMember {
                            type_: FeatureType::Node,
                            ref_: 2,
                            role: "via".to_string(),
                        },
                        RelationMember {
                            type_: FeatureType::Way,
                            ref_: 11,
                            role: "to".to_string(),
                        },
                    ],
                    tags: Map::from_iter([
                        ("type".to_string(), "restriction".to_string()),
                        ("restriction".to_string(), "no_straight_on".to_string()),
                    ]),
                }),
            ],
        );

        // Original node 2 keeps its normal edges (reachable via other predecessors).
        assert!(g.get_edge(2, 3).is_finite());
        assert!(g.get_edge(2, 4).is_finite());

        // The edge leaving 1 no longer points at node 2 directly.
        assert_eq!(g.get_edge(1, 2), f32::INFINITY);

        let clone_edges: Vec<_> = g
            .get_edges(1)
            .iter()
            .map(|e| (e.to, e.cost))
            .collect();
        assert_eq!(clone_edges.len(), 1);
        let (clone_id, _) = clone_edges[0];
        assert!(clone_id >= FIRST_SYNTHETIC_ID);

        // The clone forbids continuing to 3, but still allows 4.
        assert_eq!(g.get_edge(clone_id, 3), f32::INFINITY);
        assert!(g.get_edge(clone_id, 4).is_finite());
    }

    #[test]
    fn compiles_mandatory_restriction_via_node_duplication() {
        let mut g = Graph::new();
        let options = Options {
            profile: &TEST_PROFILE,
            file_format: FileFormat::Unknown,
            bbox: [0.0; 4],
        };

        feed(
            &mut g,
            &options,
            vec![
                Feature::Node(node(1, 0.0, 0.0)),
                Feature::Node(node(2, 0.0, 1.0)),
                Feature::Node(node(3, 0.0, 2.0)),
                Feature::Node(node(4, 1.0, 2.0)),
                Feature::Way(way(10, &[1, 2])),
                Feature::Way(way(11, &[2, 3])),
                Feature::Way(way(12, &[2, 4])),
                Feature::Relation(Relation {
                    id: 101,
                    members: vec![
                        RelationMember {
                            type_: FeatureType::Way,
                            ref_: 10,
                            role: "from".to_string(),
                        },
                        RelationMember {
                            type_: FeatureType::Node,
                            ref_: 2,
                            role: "via".to_string(),
                        },
                        RelationMember {
                            type_: FeatureType::Way,
                            ref_: 11,
                            role: "to".to_string(),
                        },
                    ],
                    tags: Map::from_iter([
                        ("type".to_string(), "restriction".to_string()),
                        ("restriction".to_string(), "only_straight_on".to_string()),
                    ]),
                }),
            ],
        );

        let clone_id = g.get_edges(1)[0].to;
        assert!(g.get_edge(clone_id, 3).is_finite());
        assert_eq!(g.get_edge(clone_id, 4), f32::INFINITY);
    }

    #[test]
    fn unresolvable_chain_is_skipped_without_panic() {
        let mut g = Graph::new();
        let options = Options {
            profile: &TEST_PROFILE,
            file_format: FileFormat::Unknown,
            bbox: [0.0; 4],
        };

        feed(
            &mut g,
            &options,
            vec![
                Feature::Node(node(1, 0.0, 0.0)),
                Feature::Node(node(2, 0.0, 1.0)),
                Feature::Way(way(10, &[1, 2])),
                Feature::Relation(Relation {
                    id: 102,
                    members: vec![
                        RelationMember {
                            type_: FeatureType::Way,
                            ref_: 999, // does not exist
                            role: "from".to_string(),
                        },
                        RelationMember {
                            type_: FeatureType::Node,
                            ref_: 2,
                            role: "via".to_string(),
                        },
                        RelationMember {
                            type_: FeatureType::Way,
                            ref_: 10,
                            role: "to".to_string(),
                        },
                    ],
                    tags: Map::from_iter([
                        ("type".to_string(), "restriction".to_string()),
                        ("restriction".to_string(), "no_u_turn".to_string()),
                    ]),
                }),
            ],
        );

        assert!(g.get_edge(1, 2).is_finite());
    }
}
