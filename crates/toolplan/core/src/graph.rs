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

//! Tool dependency graph with topological levels
//!
//! Levels are assigned by Kahn's algorithm in waves: every node whose
//! dependencies have all been peeled off joins the current wave, so a tool's
//! level is one more than the deepest of its dependencies.

use crate::error::{PlannerError, PlannerResult};
use metrics::counter;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Acyclic dependency graph over tool ids
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyGraph {
    /// Every tool in the graph, requested or pulled in as a dependency
    pub nodes: BTreeSet<String>,

    /// Tool -> tools it depends on
    pub edges: BTreeMap<String, BTreeSet<String>>,

    /// Tool -> topological depth
    pub levels: BTreeMap<String, usize>,

    /// Linearization consistent with `levels`
    pub topological_order: Vec<String>,

    /// Non-fatal problems found while building
    pub diagnostics: Vec<String>,
}

impl DependencyGraph {
    /// Builds the graph from a tool -> dependencies mapping.
    ///
    /// Dependencies that are not keys themselves become level-0 nodes with no
    /// edges.
    ///
    /// # Returns
    /// - Ok(DependencyGraph): Fully levelled graph
    /// - Err(PlannerError::CircularDependency): Some nodes never reached zero in-degree
    pub fn from_edges(edges: BTreeMap<String, BTreeSet<String>>) -> PlannerResult<Self> {
        Self::from_edges_with_diagnostics(edges, Vec::new())
    }

    pub(crate) fn from_edges_with_diagnostics(mut edges: BTreeMap<String, BTreeSet<String>>, diagnostics: Vec<String>) -> PlannerResult<Self> {
        let referenced: Vec<String> = edges.values().flatten().filter(|dep| !edges.contains_key(*dep)).cloned().collect();
        for dependency in referenced {
            edges.entry(dependency).or_default();
        }

        let nodes: BTreeSet<String> = edges.keys().cloned().collect();

        let mut remaining: BTreeMap<&str, usize> = edges.iter().map(|(tool, deps)| (tool.as_str(), deps.len())).collect();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (tool, deps) in &edges {
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().push(tool.as_str());
            }
        }

        let mut levels = BTreeMap::new();
        let mut topological_order = Vec::with_capacity(nodes.len());
        let mut wave: Vec<&str> = remaining.iter().filter(|(_, count)| **count == 0).map(|(tool, _)| *tool).collect();
        let mut level = 0;

        while !wave.is_empty() {
            let mut next_wave = Vec::new();
            for tool in &wave {
                levels.insert(tool.to_string(), level);
                topological_order.push(tool.to_string());
                remaining.remove(tool);

                for dependent in dependents.get(tool).into_iter().flatten() {
                    if let Some(count) = remaining.get_mut(dependent) {
                        *count -= 1;
                        if *count == 0 {
                            next_wave.push(*dependent);
                        }
                    }
                }
            }
            next_wave.sort_unstable();
            wave = next_wave;
            level += 1;
        }

        if topological_order.len() < nodes.len() {
            let tools = cycle_members(&edges, remaining.keys().copied());
            warn!(tools = ?tools, "Circular dependency detected");
            counter!("toolplan_cycles_detected", 1);
            return Err(PlannerError::CircularDependency { tools });
        }

        debug!(nodes = nodes.len(), levels = level, "Dependency graph built");
        counter!("toolplan_graphs_built", 1);

        Ok(Self {
            nodes,
            edges,
            levels,
            topological_order,
            diagnostics,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, tool_id: &str) -> bool {
        self.nodes.contains(tool_id)
    }

    pub fn level_of(&self, tool_id: &str) -> Option<usize> {
        self.levels.get(tool_id).copied()
    }

    /// Direct dependencies of a tool (empty for unknown tools)
    pub fn dependencies_of(&self, tool_id: &str) -> impl Iterator<Item = &str> {
        self.edges.get(tool_id).into_iter().flatten().map(String::as_str)
    }

    /// Tools that list `tool_id` as a direct dependency
    pub fn dependents_of(&self, tool_id: &str) -> Vec<&str> {
        self.edges.iter().filter(|(_, deps)| deps.contains(tool_id)).map(|(tool, _)| tool.as_str()).collect()
    }

    /// Number of distinct levels
    pub fn total_levels(&self) -> usize {
        self.levels.values().max().map_or(0, |max| max + 1)
    }

    /// Tools grouped by level, ascending, each group sorted
    pub fn tools_by_level(&self) -> BTreeMap<usize, Vec<String>> {
        let mut grouped: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (tool, level) in &self.levels {
            grouped.entry(*level).or_default().push(tool.clone());
        }
        grouped
    }

    /// True if `tool_id` reaches `dependency` by following dependency edges
    pub fn depends_transitively(&self, tool_id: &str, dependency: &str) -> bool {
        let mut stack: Vec<&str> = self.dependencies_of(tool_id).collect();
        let mut visited = BTreeSet::new();

        while let Some(current) = stack.pop() {
            if current == dependency {
                return true;
            }
            if visited.insert(current) {
                stack.extend(self.dependencies_of(current));
            }
        }
        false
    }

    /// Every dependency edge whose dependency is not on a strictly lower level
    pub fn level_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for (tool, deps) in &self.edges {
            let tool_level = self.level_of(tool);
            for dep in deps {
                match (tool_level, self.level_of(dep)) {
                    (Some(tl), Some(dl)) if dl < tl => {}
                    (tl, dl) => violations.push(format!("{tool} (level {tl:?}) depends on {dep} (level {dl:?})")),
                }
            }
        }
        violations
    }

    /// Longest chain through the graph weighted by `cost`.
    ///
    /// Returns the chain in execution order and its total cost.
    pub fn critical_path<F>(&self, cost: F) -> (Vec<String>, f64)
    where
        F: Fn(&str) -> f64,
    {
        let mut finish: BTreeMap<&str, (f64, Option<&str>)> = BTreeMap::new();

        for tool in &self.topological_order {
            let (start, predecessor) = self
                .dependencies_of(tool)
                .filter_map(|dep| finish.get(dep).map(|(end, _)| (*end, Some(dep))))
                .fold((0.0, None), |best, candidate| if candidate.0 > best.0 { candidate } else { best });
            finish.insert(tool.as_str(), (start + cost(tool), predecessor));
        }

        let Some((&last, &(total, _))) = finish.iter().max_by(|a, b| a.1.0.total_cmp(&b.1.0)) else {
            return (Vec::new(), 0.0);
        };

        let mut path = vec![last.to_string()];
        let mut cursor = finish.get(last).and_then(|(_, prev)| *prev);
        while let Some(tool) = cursor {
            path.push(tool.to_string());
            cursor = finish.get(tool).and_then(|(_, prev)| *prev);
        }
        path.reverse();
        (path, total)
    }
}

/// Tools on a cycle, found as non-trivial strongly connected components
fn cycle_members<'a>(edges: &'a BTreeMap<String, BTreeSet<String>>, unresolved: impl Iterator<Item = &'a str>) -> Vec<String> {
    let unresolved: BTreeSet<&str> = unresolved.collect();
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for &tool in &unresolved {
        graph.add_node(tool);
        for dep in edges.get(tool).into_iter().flatten() {
            if unresolved.contains(dep.as_str()) {
                graph.add_edge(tool, dep.as_str(), ());
            }
        }
    }

    let mut members: Vec<String> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| component.len() > 1 || component.iter().any(|&node| graph.contains_edge(node, node)))
        .flatten()
        .map(str::to_string)
        .collect();

    if members.is_empty() {
        members = unresolved.into_iter().map(str::to_string).collect();
    }
    members.sort();
    members
}
