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

//! Contract analysis: dependency extraction, resource profiles and graph assembly

use super::{ContractStore, ToolContract};
use crate::error::PlannerResult;
use crate::graph::DependencyGraph;
use crate::resources::ResourceUsage;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, warn};

/// Translates contracts into dependency graphs and resource profiles
#[derive(Debug)]
pub struct ContractAnalyzer {
    /// Source contracts
    store: ContractStore,

    /// Resource profiles computed so far, keyed by tool id
    resource_cache: RwLock<HashMap<String, ResourceUsage>>,
}

impl ContractAnalyzer {
    pub fn new(store: ContractStore) -> Self {
        Self {
            store,
            resource_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Loads the store from a contracts directory
    pub fn from_dir(dir: impl AsRef<Path>) -> PlannerResult<Self> {
        Ok(Self::new(ContractStore::load_dir(dir)?))
    }

    pub fn store(&self) -> &ContractStore {
        &self.store
    }

    /// Swaps in a new store and drops every cached profile
    pub fn replace_store(&mut self, store: ContractStore) {
        self.store = store;
        self.invalidate_cache();
    }

    pub fn invalidate_cache(&self) {
        self.resource_cache.write().clear();
    }

    /// Dependency tool ids declared by the contract, in declaration order.
    ///
    /// Dependencies without a contract in the store are logged but kept.
    pub fn extract_dependencies(&self, contract: &ToolContract) -> Vec<String> {
        for dependency in &contract.depends_on {
            if !self.store.contains(dependency) {
                warn!(tool_id = %contract.tool_id, dependency = %dependency, "Dependency has no contract");
            }
        }
        contract.depends_on.clone()
    }

    /// Declared dependencies of a tool, empty if the tool has no contract
    pub fn dependencies_of(&self, tool_id: &str) -> Vec<String> {
        self.store.get(tool_id).map(|contract| self.extract_dependencies(contract)).unwrap_or_default()
    }

    /// Tools whose contracts list `tool_id` in `depends_on`
    pub fn get_dependents(&self, tool_id: &str) -> Vec<String> {
        self.store.contracts().filter(|contract| contract.depends_on.iter().any(|dep| dep == tool_id)).map(|contract| contract.tool_id.clone()).collect()
    }

    /// Every tool reachable through `depends_on`, excluding `tool_id` itself
    pub fn transitive_dependencies(&self, tool_id: &str) -> BTreeSet<String> {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<String> = self.store.get(tool_id).map(|c| c.depends_on.clone()).unwrap_or_default();

        while let Some(current) = stack.pop() {
            if current != tool_id && visited.insert(current.clone()) {
                if let Some(contract) = self.store.get(&current) {
                    stack.extend(contract.depends_on.iter().cloned());
                }
            }
        }
        visited
    }

    /// Resource profile derived from one contract
    pub fn extract_resources(&self, contract: &ToolContract) -> ResourceUsage {
        ResourceUsage::from_contract(contract)
    }

    /// Cached resource profile for a tool, `None` if it has no contract
    pub fn resource_usage(&self, tool_id: &str) -> Option<ResourceUsage> {
        if let Some(usage) = self.resource_cache.read().get(tool_id) {
            return Some(usage.clone());
        }

        let contract = self.store.get(tool_id)?;
        let usage = self.extract_resources(contract);
        self.resource_cache.write().insert(tool_id.to_string(), usage.clone());
        Some(usage)
    }

    /// Dependency graph over every contract in the store
    pub fn build_dependency_graph(&self) -> PlannerResult<DependencyGraph> {
        let tools: Vec<String> = self.store.tool_ids().map(str::to_string).collect();
        self.build_dependency_graph_for(&tools)
    }

    /// Dependency graph over `tools` and everything they transitively depend on.
    ///
    /// Tools without a contract, requested or referenced, become level-0 nodes
    /// with no edges and are reported in the graph's diagnostics.
    pub fn build_dependency_graph_for(&self, tools: &[String]) -> PlannerResult<DependencyGraph> {
        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut diagnostics = Vec::new();
        let mut stack: Vec<String> = tools.to_vec();

        while let Some(tool) = stack.pop() {
            if edges.contains_key(&tool) {
                continue;
            }

            match self.store.get(&tool) {
                Some(contract) => {
                    let dependencies = self.extract_dependencies(contract);
                    stack.extend(dependencies.iter().filter(|dep| !edges.contains_key(*dep)).cloned());
                    edges.insert(tool, dependencies.into_iter().collect());
                }
                None => {
                    diagnostics.push(format!("unresolved dependency {tool}: {}, treated as level 0", self.missing_reason(&tool)));
                    edges.insert(tool, BTreeSet::new());
                }
            }
        }

        diagnostics.sort();
        debug!(requested = tools.len(), nodes = edges.len(), "Collected dependency closure");
        DependencyGraph::from_edges_with_diagnostics(edges, self.seed_diagnostics(diagnostics))
    }

    /// Why a tool has no usable contract
    pub fn missing_reason(&self, tool_id: &str) -> &'static str {
        if self.store.is_rejected(tool_id) { "contract rejected" } else { "no contract" }
    }

    /// Store load problems first, then `diagnostics`
    pub(crate) fn seed_diagnostics(&self, diagnostics: Vec<String>) -> Vec<String> {
        self.store.diagnostics().iter().cloned().chain(diagnostics).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlannerError;

    fn analyzer(contracts: Vec<ToolContract>) -> ContractAnalyzer {
        ContractAnalyzer::new(ContractStore::from_contracts(contracts))
    }

    #[test]
    fn test_whole_store_graph() {
        let analyzer = analyzer(vec![
            ToolContract::new("A"),
            ToolContract::new("B").depends_on(["A"]),
            ToolContract::new("C").depends_on(["A"]),
        ]);

        let graph = analyzer.build_dependency_graph().unwrap();
        assert_eq!(graph.levels, BTreeMap::from([("A".to_string(), 0), ("B".to_string(), 1), ("C".to_string(), 1)]));
        assert!(graph.diagnostics.is_empty());
    }

    #[test]
    fn test_unresolved_dependency_kept_as_root() {
        let analyzer = analyzer(vec![ToolContract::new("B").depends_on(["GHOST"])]);
        let graph = analyzer.build_dependency_graph().unwrap();

        assert!(graph.contains("GHOST"));
        assert_eq!(graph.level_of("GHOST"), Some(0));
        assert_eq!(graph.level_of("B"), Some(1));
        assert_eq!(graph.diagnostics.len(), 1);
        assert!(graph.diagnostics[0].contains("GHOST"));
    }

    #[test]
    fn test_cycle_aborts_graph() {
        let analyzer = analyzer(vec![
            ToolContract::new("A").depends_on(["C"]),
            ToolContract::new("B").depends_on(["A"]),
            ToolContract::new("C").depends_on(["B"]),
        ]);
        assert!(matches!(analyzer.build_dependency_graph(), Err(PlannerError::CircularDependency { .. })));
    }

    #[test]
    fn test_graph_for_subset_pulls_in_closure() {
        let analyzer = analyzer(vec![
            ToolContract::new("Z"),
            ToolContract::new("Y").depends_on(["Z"]),
            ToolContract::new("X").depends_on(["Y"]),
            ToolContract::new("UNRELATED"),
        ]);

        let graph = analyzer.build_dependency_graph_for(&["X".to_string()]).unwrap();
        assert_eq!(graph.nodes, BTreeSet::from(["X".to_string(), "Y".to_string(), "Z".to_string()]));
        assert_eq!(analyzer.transitive_dependencies("X"), BTreeSet::from(["Y".to_string(), "Z".to_string()]));
        assert_eq!(analyzer.get_dependents("Z"), vec!["Y"]);
    }

    #[test]
    fn test_resource_cache_invalidation() {
        let mut analyzer = analyzer(vec![ToolContract::new("T").with_dependencies(["neo4j"])]);
        assert!(analyzer.resource_usage("T").unwrap().database_access.contains("write_neo4j"));
        assert!(analyzer.resource_usage("MISSING").is_none());

        analyzer.replace_store(ContractStore::from_contracts(vec![ToolContract::new("T")]));
        assert!(analyzer.resource_usage("T").unwrap().database_access.is_empty());
    }

    #[test]
    fn test_store_problems_reach_graph_diagnostics() {
        let mut store = ContractStore::new();
        store.insert(ToolContract::new("A"));
        store.insert(ToolContract::new("B").depends_on(["A"]));
        store.insert(ToolContract::new("C").depends_on(["A", "A"]));
        store.insert(ToolContract::new("D").depends_on(["C"]));
        let analyzer = ContractAnalyzer::new(store);

        let graph = analyzer.build_dependency_graph_for(&["D".to_string()]).unwrap();
        assert_eq!(graph.diagnostics.len(), 2);
        assert!(graph.diagnostics[0].starts_with("skipped contract C"));
        assert_eq!(graph.diagnostics[1], "unresolved dependency C: contract rejected, treated as level 0");
    }

    #[test]
    fn test_dependency_order_preserved() {
        let analyzer = analyzer(vec![ToolContract::new("D").depends_on(["C", "A", "B"])]);
        assert_eq!(analyzer.dependencies_of("D"), vec!["C", "A", "B"]);
        assert!(analyzer.dependencies_of("NOPE").is_empty());
    }
}
