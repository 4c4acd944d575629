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

//! Single entry point over the planner components
//!
//! Callers hand in workflow steps, each carrying its own `depends_on` which
//! may come from somewhere other than the contract store. Step edges are
//! merged with contract edges before levelling.

use crate::cliques::clique_cover;
use crate::config::PlannerConfig;
use crate::conflicts::ResourceConflictAnalyzer;
use crate::contracts::{ContractAnalyzer, ContractStore};
use crate::costs::CostModel;
use crate::error::{PlannerError, PlannerResult};
use crate::execution_graph::{DependencyGraphBuilder, LevelPlan};
use crate::graph::DependencyGraph;
use crate::optimizer::{ExecutionPlanOptimizer, OptimizationStrategy, OptimizedExecutionPlan};
use crate::parallel::{ExecutionPlan, ParallelOpportunityFinder};
use crate::usage::ResourceUsageDetector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

/// One requested pipeline step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub tool_id: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl WorkflowStep {
    pub fn new(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(tools.into_iter().map(Into::into));
        self
    }
}

/// Workflow document: `steps: [{tool_id, depends_on}]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn from_yaml_str(content: &str) -> PlannerResult<Self> {
        serde_yaml::from_str(content).map_err(|e| PlannerError::ContractLoad(format!("invalid workflow: {e}")))
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> PlannerResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn tool_ids(&self) -> Vec<String> {
        step_tool_ids(&self.steps)
    }
}

/// Result of [`ProgrammaticDependencyAnalyzer::analyze_dependencies`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyAnalysis {
    /// True if at least one group holds more than one tool
    pub can_parallelize: bool,
    /// Every group, ordered by level
    pub parallel_groups: Vec<Vec<String>>,
    pub groups_by_level: BTreeMap<usize, Vec<Vec<String>>>,
    /// Level of each requested tool
    pub dependency_levels: BTreeMap<String, usize>,
    /// Requested pairs that neither depend on each other nor conflict
    pub independent_pairs: Vec<(String, String)>,
    pub diagnostics: Vec<String>,
}

/// Owns the contract store, configuration and resolved costs for a session
pub struct ProgrammaticDependencyAnalyzer {
    config: PlannerConfig,
    analyzer: ContractAnalyzer,
    costs: CostModel,
}

impl ProgrammaticDependencyAnalyzer {
    pub fn new(config: PlannerConfig, store: ContractStore) -> PlannerResult<Self> {
        config.validate()?;
        let costs = config.costs.resolve_for(&store)?;
        Ok(Self {
            config,
            analyzer: ContractAnalyzer::new(store),
            costs,
        })
    }

    /// Loads contracts from the configured directory
    pub fn from_config(config: PlannerConfig) -> PlannerResult<Self> {
        let store = ContractStore::load_dir(&config.contracts_dir)?;
        info!(contracts = store.len(), dir = %config.contracts_dir.display(), "Loaded tool contracts");
        Self::new(config, store)
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &ContractAnalyzer {
        &self.analyzer
    }

    pub fn costs(&self) -> &CostModel {
        &self.costs
    }

    pub fn conflict_analyzer(&self) -> ResourceConflictAnalyzer<'_> {
        ResourceConflictAnalyzer::new(&self.analyzer, &self.config)
    }

    pub fn usage_detector(&self) -> ResourceUsageDetector<'_> {
        ResourceUsageDetector::new(&self.analyzer, &self.costs, &self.config)
    }

    pub fn graph_builder(&self) -> DependencyGraphBuilder<'_> {
        DependencyGraphBuilder::new(&self.analyzer, &self.costs)
    }

    /// Graph over the steps and everything they depend on, through either
    /// the contract store or the steps' own `depends_on`
    pub fn workflow_graph(&self, steps: &[WorkflowStep]) -> PlannerResult<DependencyGraph> {
        let declared: BTreeMap<&str, &WorkflowStep> = steps.iter().map(|step| (step.tool_id.as_str(), step)).collect();
        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut diagnostics = Vec::new();
        let mut stack = step_tool_ids(steps);

        while let Some(tool) = stack.pop() {
            if edges.contains_key(&tool) {
                continue;
            }

            let mut dependencies: BTreeSet<String> = self.analyzer.dependencies_of(&tool).into_iter().collect();
            let step = declared.get(tool.as_str());
            if let Some(step) = step {
                dependencies.extend(step.depends_on.iter().cloned());
            }

            if !self.analyzer.store().contains(&tool) {
                let reason = self.analyzer.missing_reason(&tool);
                let message = match (step, dependencies.is_empty()) {
                    (Some(_), false) => format!("step {tool}: {reason}, ordered by its workflow depends_on only"),
                    _ => format!("unresolved dependency {tool}: {reason}, treated as level 0"),
                };
                warn!("{}", message);
                diagnostics.push(message);
            }

            stack.extend(dependencies.iter().filter(|dep| !edges.contains_key(*dep)).cloned());
            edges.insert(tool, dependencies);
        }

        diagnostics.sort();
        DependencyGraph::from_edges_with_diagnostics(edges, self.analyzer.seed_diagnostics(diagnostics))
    }

    /// Levels, independent pairs and per-level clique cover for the steps
    pub fn analyze_dependencies(&self, steps: &[WorkflowStep]) -> PlannerResult<DependencyAnalysis> {
        let tools = step_tool_ids(steps);
        let graph = self.workflow_graph(steps)?;
        let conflicts = self.conflict_analyzer();

        let dependency_levels: BTreeMap<String, usize> = tools.iter().map(|tool| (tool.clone(), graph.level_of(tool).unwrap_or(0))).collect();

        let mut independent_pairs = Vec::new();
        for (i, a) in tools.iter().enumerate() {
            for b in &tools[i + 1..] {
                let ordered = graph.depends_transitively(a, b) || graph.depends_transitively(b, a);
                if !ordered && conflicts.can_run_in_parallel(a, b) {
                    independent_pairs.push((a.clone(), b.clone()));
                }
            }
        }

        let mut by_level: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for tool in &tools {
            by_level.entry(dependency_levels[tool]).or_default().push(tool.clone());
        }

        let groups_by_level: BTreeMap<usize, Vec<Vec<String>>> = by_level
            .into_iter()
            .map(|(level, level_tools)| (level, clique_cover(&level_tools, |a, b| conflicts.can_run_in_parallel(a, b))))
            .collect();
        let parallel_groups: Vec<Vec<String>> = groups_by_level.values().flatten().cloned().collect();

        let analysis = DependencyAnalysis {
            can_parallelize: parallel_groups.iter().any(|group| group.len() > 1),
            parallel_groups,
            groups_by_level,
            dependency_levels,
            independent_pairs,
            diagnostics: graph.diagnostics,
        };
        info!(steps = tools.len(), groups = analysis.parallel_groups.len(), can_parallelize = analysis.can_parallelize, "Dependency analysis complete");
        Ok(analysis)
    }

    /// Level plan over the required tools and their dependencies
    pub fn level_plan(&self, tools: &[String]) -> PlannerResult<LevelPlan> {
        let builder = self.graph_builder();
        let plan = builder.create_execution_plan(tools)?;
        builder.validate_execution_plan(&plan)?;
        Ok(plan)
    }

    /// Grouped plan over the required tools and their dependencies
    pub fn execution_plan(&self, tools: &[String]) -> PlannerResult<ExecutionPlan> {
        let graph = self.graph_builder().build_execution_graph(tools)?;
        let conflicts = self.conflict_analyzer();
        Ok(ParallelOpportunityFinder::new(&conflicts, &self.costs).optimize_execution_plan(&graph))
    }

    /// Scheduled plan over the required tools and their dependencies
    pub fn optimize(&self, tools: &[String], strategy: OptimizationStrategy) -> PlannerResult<OptimizedExecutionPlan> {
        let graph = self.graph_builder().build_execution_graph(tools)?;
        Ok(self.schedule_graph(&graph, strategy))
    }

    /// Scheduled plan for workflow steps, honouring their own `depends_on`
    pub fn optimize_workflow(&self, steps: &[WorkflowStep], strategy: OptimizationStrategy) -> PlannerResult<OptimizedExecutionPlan> {
        let graph = self.workflow_graph(steps)?;
        Ok(self.schedule_graph(&graph, strategy))
    }

    fn schedule_graph(&self, graph: &DependencyGraph, strategy: OptimizationStrategy) -> OptimizedExecutionPlan {
        let conflicts = self.conflict_analyzer();
        ExecutionPlanOptimizer::new(&conflicts, &self.costs, &self.config).optimize_execution_plan(graph, strategy)
    }
}

/// Step tool ids in order, first occurrence kept
fn step_tool_ids(steps: &[WorkflowStep]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    steps.iter().filter(|step| seen.insert(step.tool_id.as_str())).map(|step| step.tool_id.clone()).collect()
}
