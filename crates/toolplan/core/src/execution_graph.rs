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

//! Minimal dependency graph and level plan for a set of required tools

use crate::contracts::ContractAnalyzer;
use crate::costs::CostModel;
use crate::error::{PlannerError, PlannerResult};
use crate::graph::DependencyGraph;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Tools sharing one dependency level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionLevel {
    pub level: usize,
    pub tools: Vec<String>,
    /// Naive bound: every tool of the level at once
    pub max_parallelism: usize,
    /// Longest execution time among the level's tools
    pub estimated_time: f64,
}

/// Level-by-level plan without conflict analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelPlan {
    pub levels: Vec<ExecutionLevel>,
    pub total_estimated_time: f64,
    /// Sum of `size - 1` over levels holding more than one tool
    pub parallelization_opportunities: usize,
    pub diagnostics: Vec<String>,
}

impl LevelPlan {
    pub fn tool_count(&self) -> usize {
        self.levels.iter().map(|level| level.tools.len()).sum()
    }

    pub fn level_of(&self, tool_id: &str) -> Option<usize> {
        self.levels.iter().find(|level| level.tools.iter().any(|tool| tool == tool_id)).map(|level| level.level)
    }
}

pub struct DependencyGraphBuilder<'a> {
    analyzer: &'a ContractAnalyzer,
    costs: &'a CostModel,
}

impl<'a> DependencyGraphBuilder<'a> {
    pub fn new(analyzer: &'a ContractAnalyzer, costs: &'a CostModel) -> Self {
        Self { analyzer, costs }
    }

    /// Graph over the transitive closure of `required_tools`.
    ///
    /// Required tools without a contract are skipped with a diagnostic.
    pub fn build_execution_graph(&self, required_tools: &[String]) -> PlannerResult<DependencyGraph> {
        let mut skipped = Vec::new();
        let known: Vec<String> = required_tools
            .iter()
            .filter(|tool| {
                let found = self.analyzer.store().contains(tool);
                if !found {
                    let reason = self.analyzer.missing_reason(tool);
                    warn!(tool_id = %tool, reason, "Required tool skipped");
                    skipped.push(format!("required tool {tool}: {reason}, skipped"));
                }
                found
            })
            .cloned()
            .collect();

        let mut graph = self.analyzer.build_dependency_graph_for(&known)?;
        skipped.append(&mut graph.diagnostics);
        graph.diagnostics = skipped;

        info!(required = required_tools.len(), nodes = graph.len(), levels = graph.total_levels(), "Execution graph built");
        Ok(graph)
    }

    pub fn create_execution_plan(&self, required_tools: &[String]) -> PlannerResult<LevelPlan> {
        let graph = self.build_execution_graph(required_tools)?;
        Ok(self.plan_levels(&graph))
    }

    /// Level plan for an already built graph
    pub fn plan_levels(&self, graph: &DependencyGraph) -> LevelPlan {
        let levels: Vec<ExecutionLevel> = graph
            .tools_by_level()
            .into_iter()
            .map(|(level, tools)| {
                let estimated_time = tools.iter().map(|tool| self.costs.execution_time(tool)).fold(0.0, f64::max);
                ExecutionLevel {
                    level,
                    max_parallelism: tools.len(),
                    tools,
                    estimated_time,
                }
            })
            .collect();

        LevelPlan {
            total_estimated_time: levels.iter().map(|level| level.estimated_time).sum(),
            parallelization_opportunities: levels.iter().filter(|level| level.tools.len() > 1).map(|level| level.tools.len() - 1).sum(),
            levels,
            diagnostics: graph.diagnostics.clone(),
        }
    }

    /// Checks that every declared dependency sits on a strictly lower level
    pub fn validate_execution_plan(&self, plan: &LevelPlan) -> PlannerResult<()> {
        let levels: BTreeMap<&str, usize> = plan.levels.iter().flat_map(|level| level.tools.iter().map(move |tool| (tool.as_str(), level.level))).collect();

        let mut violations = Vec::new();
        for (tool, level) in &levels {
            for dependency in self.analyzer.dependencies_of(tool) {
                match levels.get(dependency.as_str()) {
                    Some(dep_level) if dep_level < level => {}
                    Some(dep_level) => violations.push(format!("{tool} (level {level}) depends on {dependency} (level {dep_level})")),
                    None => violations.push(format!("{tool} depends on {dependency}, which is not in the plan")),
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(PlannerError::InvalidPlan(violations.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ContractStore, ToolContract};

    fn ids(tools: &[&str]) -> Vec<String> {
        tools.iter().map(|tool| tool.to_string()).collect()
    }

    fn chain() -> ContractAnalyzer {
        ContractAnalyzer::new(ContractStore::from_contracts(vec![
            ToolContract::new("X").depends_on(["Y"]),
            ToolContract::new("Y").depends_on(["Z"]),
            ToolContract::new("Z"),
            ToolContract::new("UNRELATED"),
        ]))
    }

    #[test]
    fn test_closure_of_required_tools() {
        let analyzer = chain();
        let costs = CostModel::default();
        let builder = DependencyGraphBuilder::new(&analyzer, &costs);

        let graph = builder.build_execution_graph(&ids(&["X"])).unwrap();
        assert_eq!(graph.nodes.iter().map(String::as_str).collect::<Vec<_>>(), vec!["X", "Y", "Z"]);
        assert_eq!(graph.level_of("X"), Some(2));
    }

    #[test]
    fn test_missing_required_tool_skipped() {
        let analyzer = chain();
        let costs = CostModel::default();
        let builder = DependencyGraphBuilder::new(&analyzer, &costs);

        let graph = builder.build_execution_graph(&ids(&["Z", "NOPE"])).unwrap();
        assert!(!graph.contains("NOPE"));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.diagnostics, vec!["required tool NOPE: no contract, skipped".to_string()]);
    }

    #[test]
    fn test_rejected_required_tool_is_named() {
        let mut store = ContractStore::new();
        store.insert(ToolContract::new("A"));
        store.insert(ToolContract::new("C").depends_on(["A", "A"]));
        let analyzer = ContractAnalyzer::new(store);
        let costs = CostModel::default();
        let builder = DependencyGraphBuilder::new(&analyzer, &costs);

        let plan = builder.create_execution_plan(&ids(&["A", "C"])).unwrap();
        assert_eq!(plan.tool_count(), 1);
        assert_eq!(plan.diagnostics[0], "required tool C: contract rejected, skipped");
        assert!(plan.diagnostics[1].contains("more than once"));
    }

    #[test]
    fn test_level_plan_metrics() {
        let analyzer = ContractAnalyzer::new(ContractStore::from_contracts(vec![
            ToolContract::new("A"),
            ToolContract::new("B").depends_on(["A"]),
            ToolContract::new("C").depends_on(["A"]),
            ToolContract::new("D").depends_on(["A"]),
        ]));
        let costs = CostModel::uniform(1.0).with_execution_time("C", 4.0);
        let builder = DependencyGraphBuilder::new(&analyzer, &costs);

        let plan = builder.create_execution_plan(&ids(&["B", "C", "D"])).unwrap();
        assert_eq!(plan.levels.len(), 2);
        assert_eq!(plan.levels[1].max_parallelism, 3);
        assert_eq!(plan.levels[1].estimated_time, 4.0);
        assert_eq!(plan.total_estimated_time, 5.0);
        assert_eq!(plan.parallelization_opportunities, 2);
        assert_eq!(plan.tool_count(), 4);
        assert!(builder.validate_execution_plan(&plan).is_ok());
    }

    #[test]
    fn test_validation_catches_flattened_plan() {
        let analyzer = chain();
        let costs = CostModel::default();
        let builder = DependencyGraphBuilder::new(&analyzer, &costs);

        let plan = LevelPlan {
            levels: vec![ExecutionLevel {
                level: 0,
                tools: ids(&["X", "Y", "Z"]),
                max_parallelism: 3,
                estimated_time: 1.0,
            }],
            total_estimated_time: 1.0,
            parallelization_opportunities: 2,
            diagnostics: Vec::new(),
        };
        let err = builder.validate_execution_plan(&plan).unwrap_err();
        assert!(err.to_string().contains("X (level 0) depends on Y (level 0)"));
    }
}
