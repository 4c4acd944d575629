// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Maximal clique discovery and greedy disjoint clique cover
//!
//! The compatibility graph has one node per tool and an edge between every
//! pair that may run concurrently. Cliques are found with the pivot-free
//! Bron–Kerbosch recursion, then covered greedily: largest cliques first, a
//! clique is accepted only if none of its members is already assigned.

use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::BTreeSet;

/// Undirected graph of pairwise-compatible tools
#[derive(Debug, Clone)]
pub struct CompatibilityGraph {
    graph: UnGraph<String, ()>,
}

impl CompatibilityGraph {
    /// Builds the graph, asking `compatible` once per unordered pair.
    /// Duplicate tool ids are ignored.
    pub fn build<F>(tools: &[String], mut compatible: F) -> Self
    where
        F: FnMut(&str, &str) -> bool,
    {
        let mut graph = UnGraph::new_undirected();
        let mut seen = BTreeSet::new();
        let nodes: Vec<NodeIndex> = tools
            .iter()
            .filter(|tool| seen.insert(tool.as_str()))
            .map(|tool| graph.add_node(tool.clone()))
            .collect();

        for (i, &a) in nodes.iter().enumerate() {
            for &b in &nodes[i + 1..] {
                if compatible(graph[a].as_str(), graph[b].as_str()) {
                    graph.add_edge(a, b, ());
                }
            }
        }

        Self { graph }
    }

    pub fn tool_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn tools(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    fn neighbors(&self, node: NodeIndex) -> BTreeSet<NodeIndex> {
        self.graph.neighbors(node).collect()
    }

    /// Every maximal clique, each sorted by tool id
    pub fn maximal_cliques(&self) -> Vec<Vec<String>> {
        let mut found = Vec::new();
        let candidates: BTreeSet<NodeIndex> = self.graph.node_indices().collect();
        self.bron_kerbosch(BTreeSet::new(), candidates, BTreeSet::new(), &mut found);

        let mut cliques: Vec<Vec<String>> = found
            .into_iter()
            .map(|clique| {
                let mut tools: Vec<String> = clique.into_iter().map(|node| self.graph[node].clone()).collect();
                tools.sort();
                tools
            })
            .collect();
        cliques.sort();
        cliques
    }

    fn bron_kerbosch(&self, clique: BTreeSet<NodeIndex>, mut candidates: BTreeSet<NodeIndex>, mut excluded: BTreeSet<NodeIndex>, found: &mut Vec<BTreeSet<NodeIndex>>) {
        if candidates.is_empty() && excluded.is_empty() {
            if !clique.is_empty() {
                found.push(clique);
            }
            return;
        }

        while let Some(node) = candidates.pop_first() {
            let neighbors = self.neighbors(node);
            let mut next_clique = clique.clone();
            next_clique.insert(node);

            self.bron_kerbosch(
                next_clique,
                candidates.intersection(&neighbors).copied().collect(),
                excluded.intersection(&neighbors).copied().collect(),
                found,
            );

            excluded.insert(node);
        }
    }

    /// Partition of every tool into cliques, see [`disjoint_clique_cover`]
    pub fn clique_cover(&self) -> Vec<Vec<String>> {
        let tools: Vec<String> = self.tools().map(str::to_string).collect();
        disjoint_clique_cover(self.maximal_cliques(), &tools)
    }
}

/// Greedy disjoint cover: cliques by descending size (ties by tool ids),
/// accepting each whose members are all unassigned. Tools left over become
/// singletons in their input order.
pub fn disjoint_clique_cover(mut cliques: Vec<Vec<String>>, tools: &[String]) -> Vec<Vec<String>> {
    cliques.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut assigned: BTreeSet<&str> = BTreeSet::new();
    let mut cover = Vec::new();

    for clique in &cliques {
        if clique.len() > 1 && clique.iter().all(|tool| !assigned.contains(tool.as_str())) {
            assigned.extend(clique.iter().map(String::as_str));
            cover.push(clique.clone());
        }
    }

    for tool in tools {
        if assigned.insert(tool.as_str()) {
            cover.push(vec![tool.clone()]);
        }
    }

    cover
}

/// Compatibility graph plus greedy cover in one call
pub fn clique_cover<F>(tools: &[String], compatible: F) -> Vec<Vec<String>>
where
    F: FnMut(&str, &str) -> bool,
{
    match tools {
        [] => Vec::new(),
        [only] => vec![vec![only.clone()]],
        _ => CompatibilityGraph::build(tools, compatible).clique_cover(),
    }
}

/// True if every pair in `group` is compatible
pub fn is_clique<F>(group: &[String], mut compatible: F) -> bool
where
    F: FnMut(&str, &str) -> bool,
{
    group.iter().enumerate().all(|(i, a)| group[i + 1..].iter().all(|b| compatible(a, b)))
}
