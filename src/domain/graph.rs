//! Undirected simple graph over string-labelled nodes.
//!
//! Adjacency is a `BTreeMap` from node to its neighbour set, which keeps
//! iteration order stable across runs. Self-loops are ignored and adding an
//! edge twice (in either direction) is a no-op.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct Graph {
    adjacency: BTreeMap<String, BTreeSet<String>>,
    edge_count: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: &str) {
        if !self.adjacency.contains_key(node) {
            self.adjacency.insert(node.to_string(), BTreeSet::new());
        }
    }

    /// Returns `true` if a new edge was inserted.
    pub fn add_edge(&mut self, a: &str, b: &str) -> bool {
        if a == b {
            return false;
        }
        self.add_node(a);
        self.add_node(b);

        let inserted = self
            .adjacency
            .get_mut(a)
            .map(|n| n.insert(b.to_string()))
            .unwrap_or(false);
        if inserted {
            if let Some(n) = self.adjacency.get_mut(b) {
                n.insert(a.to_string());
            }
            self.edge_count += 1;
        }
        inserted
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        self.adjacency.get(a).is_some_and(|n| n.contains(b))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.adjacency.keys().map(String::as_str)
    }

    pub fn neighbors(&self, node: &str) -> Option<&BTreeSet<String>> {
        self.adjacency.get(node)
    }

    pub fn degree(&self, node: &str) -> usize {
        self.adjacency.get(node).map_or(0, BTreeSet::len)
    }

    /// 2m / (n(n-1)); zero when there are fewer than two nodes.
    pub fn density(&self) -> f64 {
        let n = self.node_count();
        if n < 2 {
            return 0.0;
        }
        2.0 * self.edge_count as f64 / (n as f64 * (n as f64 - 1.0))
    }

    /// Fraction of neighbour pairs of `node` that are themselves adjacent.
    /// Nodes with degree below two have coefficient zero.
    pub fn local_clustering(&self, node: &str) -> f64 {
        let Some(neighbors) = self.adjacency.get(node) else {
            return 0.0;
        };
        let k = neighbors.len();
        if k < 2 {
            return 0.0;
        }

        // Each triangle through `node` is seen once per neighbour endpoint.
        let mut links = 0usize;
        for u in neighbors {
            if let Some(u_neighbors) = self.adjacency.get(u) {
                links += u_neighbors.intersection(neighbors).count();
            }
        }
        let triangles = links / 2;
        let possible = k * (k - 1) / 2;
        triangles as f64 / possible as f64
    }

    pub fn average_clustering(&self) -> f64 {
        if self.adjacency.is_empty() {
            return 0.0;
        }
        let total: f64 = self.nodes().map(|n| self.local_clustering(n)).sum();
        total / self.node_count() as f64
    }

    /// Connected components found by breadth-first traversal, in order of
    /// their smallest node.
    pub fn connected_components(&self) -> Vec<Vec<&str>> {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut components = Vec::new();

        for start in self.nodes() {
            if visited.contains(start) {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::new();
            visited.insert(start);
            queue.push_back(start);

            while let Some(node) = queue.pop_front() {
                component.push(node);
                if let Some(neighbors) = self.adjacency.get(node) {
                    for next in neighbors {
                        if visited.insert(next.as_str()) {
                            queue.push_back(next.as_str());
                        }
                    }
                }
            }
            components.push(component);
        }
        components
    }

    pub fn largest_component_size(&self) -> usize {
        self.connected_components()
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
    }
}
