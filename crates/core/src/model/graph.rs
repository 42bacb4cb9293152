use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ServiceNode {
    pub spans: u64,
    pub error_spans: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceEdge {
    pub source: String,
    pub target: String,
    pub weight: u64,
}

/// Directed service-interaction graph. Edge weight counts parent/child span
/// pairs crossing from `source` to `target`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ServiceGraph {
    pub nodes: BTreeMap<String, ServiceNode>,
    pub edges: BTreeMap<String, BTreeMap<String, u64>>,
}

impl ServiceGraph {
    pub fn add_node(&mut self, service: &str) -> &mut ServiceNode {
        self.nodes.entry(service.to_string()).or_default()
    }

    pub fn add_edge(&mut self, source: &str, target: &str, weight: u64) {
        self.add_node(source);
        self.add_node(target);
        *self
            .edges
            .entry(source.to_string())
            .or_default()
            .entry(target.to_string())
            .or_default() += weight;
    }

    pub fn edge_weight(&self, source: &str, target: &str) -> Option<u64> {
        self.edges.get(source).and_then(|t| t.get(target)).copied()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    pub fn edge_list(&self) -> Vec<ServiceEdge> {
        self.edges
            .iter()
            .flat_map(|(source, targets)| {
                targets.iter().map(move |(target, weight)| ServiceEdge {
                    source: source.clone(),
                    target: target.clone(),
                    weight: *weight,
                })
            })
            .collect()
    }

    /// Adds every node metric and edge weight of `other` into `self`.
    pub fn merge(&mut self, other: &ServiceGraph) {
        for (service, node) in &other.nodes {
            let mine = self.add_node(service);
            mine.spans += node.spans;
            mine.error_spans += node.error_spans;
        }
        for edge in other.edge_list() {
            self.add_edge(&edge.source, &edge.target, edge.weight);
        }
    }
}
