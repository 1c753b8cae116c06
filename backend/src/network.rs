use std::{
    collections::{HashMap, VecDeque},
    path::Path,
};

use petgraph::{
    graph::{NodeIndex, UnGraph},
    visit::EdgeRef,
};
use serde::Serialize;

use crate::{
    geojson::{self, GeoJsonError, LinkRecord, NodeRecord},
    models::{Coordinate, LinkId, NodeId, ParsedRoute, Place, RouteSegment},
    routing::{approximate_distance_km, haversine_m},
};

/// Places further than this from every node stay unmapped.
pub const DEFAULT_MAX_RADIUS_M: f64 = 100.0;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error(transparent)]
    GeoJson(#[from] GeoJsonError),
    #[error("road network has no nodes")]
    EmptyNetwork,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMatch {
    pub node_id: NodeId,
    pub coord: Coordinate,
    pub distance_m: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingStats {
    pub mapped: usize,
    pub unmatched: usize,
    /// Places without usable coordinates.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    pub nodes: Vec<NodeId>,
    /// BFS could not connect the endpoints; `nodes` is `[start, end]`.
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub node_count: usize,
    pub link_count: usize,
    pub isolated_nodes: usize,
    pub skipped_links: usize,
}

/// Road network loaded from the node/link GeoJSON files.
///
/// Adjacency is undirected: every link joins its `F_NODE` and `T_NODE` both ways.
#[derive(Clone, Debug)]
pub struct RoadNetwork {
    graph: UnGraph<NodeId, LinkId>,
    index: HashMap<NodeId, NodeIndex>,
    /// Indexed by `NodeIndex::index()`.
    nodes: Vec<NodeRecord>,
    links: HashMap<LinkId, LinkRecord>,
    skipped_links: usize,
}

impl RoadNetwork {
    pub fn from_files(
        node_path: impl AsRef<Path>,
        link_path: impl AsRef<Path>,
    ) -> Result<Self, NetworkError> {
        let nodes = geojson::read_nodes(node_path)?;
        let links = geojson::read_links(link_path)?;
        Self::from_records(nodes.records, links.records)
    }

    pub fn from_records(
        node_records: Vec<NodeRecord>,
        link_records: Vec<LinkRecord>,
    ) -> Result<Self, NetworkError> {
        if node_records.is_empty() {
            return Err(NetworkError::EmptyNetwork);
        }

        let mut graph = UnGraph::with_capacity(node_records.len(), link_records.len());
        let mut index = HashMap::with_capacity(node_records.len());
        let mut nodes = Vec::with_capacity(node_records.len());

        for node in node_records {
            if index.contains_key(&node.id) {
                tracing::warn!("duplicate node id {}, keeping the first", node.id);
                continue;
            }
            let idx = graph.add_node(node.id);
            index.insert(node.id, idx);
            nodes.push(node);
        }

        let mut links = HashMap::with_capacity(link_records.len());
        let mut skipped_links = 0;
        for link in link_records {
            let (Some(&from), Some(&to)) = (index.get(&link.from), index.get(&link.to)) else {
                tracing::warn!(
                    "link {} references unknown node ({} -> {}), skipping",
                    link.id,
                    link.from,
                    link.to
                );
                skipped_links += 1;
                continue;
            };
            graph.add_edge(from, to, link.id);
            links.insert(link.id, link);
        }

        tracing::debug!(
            nodes = nodes.len(),
            links = links.len(),
            skipped_links,
            "road network built"
        );

        Ok(Self {
            graph,
            index,
            nodes,
            links,
            skipped_links,
        })
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.index.get(&id).map(|idx| &self.nodes[idx.index()])
    }

    pub fn link(&self, id: LinkId) -> Option<&LinkRecord> {
        self.links.get(&id)
    }

    pub fn stats(&self) -> NetworkStats {
        let isolated_nodes = self
            .graph
            .node_indices()
            .filter(|&idx| self.graph.neighbors(idx).next().is_none())
            .count();
        NetworkStats {
            node_count: self.nodes.len(),
            link_count: self.links.len(),
            isolated_nodes,
            skipped_links: self.skipped_links,
        }
    }

    /// Closest node to `target` by great-circle distance, or `None` when even the
    /// closest one is further than `max_radius_m`.
    ///
    /// Linear scan over every node; the Jeju network is small and loaded once.
    pub fn nearest_node(&self, target: Coordinate, max_radius_m: f64) -> Option<NodeMatch> {
        let (node, distance_m) = self
            .nodes
            .iter()
            .map(|node| (node, haversine_m(target, node.coord)))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;

        (distance_m <= max_radius_m).then_some(NodeMatch {
            node_id: node.id,
            coord: node.coord,
            distance_m,
        })
    }

    /// Annotate places with their nearest node. Places with invalid coordinates
    /// are left untouched; places with no node in range have stale matches cleared.
    pub fn map_places_to_nodes(&self, places: &mut [Place], max_radius_m: f64) -> MappingStats {
        let mut stats = MappingStats::default();

        for place in places.iter_mut() {
            let Some(coord) = place.coordinate() else {
                stats.skipped += 1;
                continue;
            };
            match self.nearest_node(coord, max_radius_m) {
                Some(found) => {
                    place.geo_node_id = Some(found.node_id);
                    place.geo_node_distance = Some(found.distance_m);
                    stats.mapped += 1;
                }
                None => {
                    place.geo_node_id = None;
                    place.geo_node_distance = None;
                    stats.unmatched += 1;
                }
            }
        }

        tracing::debug!(
            "mapped {} places to nodes ({} out of range, {} without coordinates)",
            stats.mapped,
            stats.unmatched,
            stats.skipped
        );
        stats
    }

    /// Fewest-hops path between two nodes, by breadth-first search.
    ///
    /// Falls back to `[start, end]` when either node is unknown or isolated, or when
    /// the two are not connected. That includes `start == end` on a node without
    /// adjacency. Hop count is minimised, not distance.
    pub fn find_node_path(&self, start: NodeId, end: NodeId) -> NodePath {
        let fallback = NodePath {
            nodes: vec![start, end],
            fallback: true,
        };

        let (Some(&s), Some(&e)) = (self.index.get(&start), self.index.get(&end)) else {
            return fallback;
        };
        if self.graph.neighbors(s).next().is_none() || self.graph.neighbors(e).next().is_none() {
            return fallback;
        }
        if s == e {
            return NodePath {
                nodes: vec![start],
                fallback: false,
            };
        }

        let mut parent: Vec<Option<NodeIndex>> = vec![None; self.graph.node_count()];
        let mut visited = vec![false; self.graph.node_count()];
        let mut queue = VecDeque::from([s]);
        visited[s.index()] = true;

        while let Some(current) = queue.pop_front() {
            if current == e {
                break;
            }
            for next in self.graph.neighbors(current) {
                if !visited[next.index()] {
                    visited[next.index()] = true;
                    parent[next.index()] = Some(current);
                    queue.push_back(next);
                }
            }
        }

        if !visited[e.index()] {
            return fallback;
        }

        let mut path = vec![self.graph[e]];
        let mut cursor = e;
        while let Some(prev) = parent[cursor.index()] {
            path.push(self.graph[prev]);
            cursor = prev;
        }
        path.reverse();

        NodePath {
            nodes: path,
            fallback: false,
        }
    }

    pub fn are_adjacent(&self, a: NodeId, b: NodeId) -> bool {
        match (self.index.get(&a), self.index.get(&b)) {
            (Some(&a), Some(&b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    /// A link joining two adjacent nodes; the shortest one when several do.
    pub fn link_between(&self, a: NodeId, b: NodeId) -> Option<LinkId> {
        let (&a, &b) = (self.index.get(&a)?, self.index.get(&b)?);
        self.graph
            .edges_connecting(a, b)
            .map(|edge| *edge.weight())
            .min_by(|x, y| self.link_length_km(*x).total_cmp(&self.link_length_km(*y)))
    }

    /// Links along a node path; pairs without a direct link are skipped.
    pub fn path_links(&self, nodes: &[NodeId]) -> Vec<LinkId> {
        nodes
            .windows(2)
            .filter_map(|pair| self.link_between(pair[0], pair[1]))
            .collect()
    }

    /// Express a node path as an interleaved-route shaped [`ParsedRoute`].
    pub fn path_to_route(&self, nodes: &[NodeId]) -> ParsedRoute {
        let segments: Vec<RouteSegment> = nodes
            .windows(2)
            .map(|pair| RouteSegment {
                from: pair[0],
                to: pair[1],
                links: self.link_between(pair[0], pair[1]).into_iter().collect(),
            })
            .collect();
        let link_ids = segments.iter().flat_map(|s| s.links.iter().copied()).collect();
        ParsedRoute {
            segments,
            node_ids: nodes.to_vec(),
            link_ids,
        }
    }

    /// Coordinates of one segment, following each link's line-string.
    ///
    /// Unknown links degrade to a straight line between the segment's nodes.
    pub fn segment_geometry(&self, segment: &RouteSegment) -> Vec<Coordinate> {
        let from = self.node(segment.from).map(|n| n.coord);
        let to = self.node(segment.to).map(|n| n.coord);

        let mut result: Vec<Coordinate> = Vec::new();
        let mut cursor = segment.from;
        for link_id in &segment.links {
            let Some(link) = self.link(*link_id) else {
                tracing::debug!("link {} not in network, drawing straight segment", link_id);
                result.clear();
                break;
            };
            let forward = if link.from == cursor {
                true
            } else if link.to == cursor {
                false
            } else {
                // Endpoint ids disagree with the walk; orient by proximity instead.
                match (from, link.geometry.first(), link.geometry.last()) {
                    (Some(f), Some(first), Some(last)) => haversine_m(f, *first) <= haversine_m(f, *last),
                    _ => true,
                }
            };
            cursor = if forward { link.to } else { link.from };

            let points: Box<dyn Iterator<Item = &Coordinate>> = if forward {
                Box::new(link.geometry.iter())
            } else {
                Box::new(link.geometry.iter().rev())
            };
            for point in points {
                if result.last() != Some(point) {
                    result.push(*point);
                }
            }
        }

        if result.is_empty() {
            result.extend(from);
            result.extend(to);
        }
        result
    }

    /// Full polyline of a parsed route, joints de-duplicated.
    pub fn route_geometry(&self, route: &ParsedRoute) -> Vec<Coordinate> {
        let mut path: Vec<Coordinate> = Vec::new();
        for segment in &route.segments {
            let geometry = self.segment_geometry(segment);
            let skip = usize::from(path.last().is_some() && path.last() == geometry.first());
            path.extend(geometry.into_iter().skip(skip));
        }
        path
    }

    /// Route length, using each link's surveyed `LENGTH` where present.
    pub fn route_distance_km(&self, route: &ParsedRoute) -> f64 {
        route
            .segments
            .iter()
            .map(|segment| {
                let all_known = !segment.links.is_empty()
                    && segment.links.iter().all(|id| self.links.contains_key(id));
                if all_known {
                    segment.links.iter().map(|id| self.link_length_km(*id)).sum()
                } else {
                    approximate_distance_km(&self.segment_geometry(segment))
                }
            })
            .sum()
    }

    fn link_length_km(&self, id: LinkId) -> f64 {
        match self.links.get(&id) {
            Some(link) => link
                .length_m
                .map(|m| m / 1000.0)
                .unwrap_or_else(|| approximate_distance_km(&link.geometry)),
            None => f64::INFINITY,
        }
    }

    /// Nodes in load order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.iter()
    }
}
