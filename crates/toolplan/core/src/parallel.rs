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

//! Per-level discovery of concurrently safe tool groups

use crate::cliques::{clique_cover, is_clique};
use crate::conflicts::ResourceConflictAnalyzer;
use crate::costs::CostModel;
use crate::error::{PlannerError, PlannerResult};
use crate::graph::DependencyGraph;
use serde::Serialize;
use tracing::{debug, info};

/// Largest tool set accepted by the brute-force combination search
pub const MAX_COMBINATION_TOOLS: usize = 16;

/// Tools of one level that may run together
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParallelGroup {
    pub group_id: String,
    pub tools: Vec<String>,
    pub level: usize,
    /// Longest member time for a parallel group, the member's time otherwise
    pub execution_time: f64,
    /// Sum of member times over the group time
    pub estimated_speedup: f64,
}

impl ParallelGroup {
    pub fn is_parallel(&self) -> bool {
        self.tools.len() > 1
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, tool_id: &str) -> bool {
        self.tools.iter().any(|tool| tool == tool_id)
    }
}

/// Grouped plan produced by [`ParallelOpportunityFinder::optimize_execution_plan`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    /// Ordered by level, then by group discovery order
    pub parallel_groups: Vec<ParallelGroup>,
    pub total_tools: usize,
    pub total_levels: usize,
    pub estimated_total_time: f64,
    pub estimated_sequential_time: f64,
    pub estimated_speedup: f64,
    /// Fraction of tools that sit in a group of more than one
    pub parallelization_ratio: f64,
    pub diagnostics: Vec<String>,
}

impl ExecutionPlan {
    pub fn groups_at(&self, level: usize) -> impl Iterator<Item = &ParallelGroup> {
        self.parallel_groups.iter().filter(move |group| group.level == level)
    }

    pub fn group_of(&self, tool_id: &str) -> Option<&ParallelGroup> {
        self.parallel_groups.iter().find(|group| group.contains(tool_id))
    }

    /// Parallelization ratio restricted to one level
    pub fn level_parallelization_ratio(&self, level: usize) -> f64 {
        let (grouped, total) = self.groups_at(level).fold((0, 0), |(grouped, total), group| {
            let size = group.len();
            (grouped + if group.is_parallel() { size } else { 0 }, total + size)
        });
        ratio(grouped, total)
    }
}

pub struct ParallelOpportunityFinder<'a> {
    conflicts: &'a ResourceConflictAnalyzer<'a>,
    costs: &'a CostModel,
}

impl<'a> ParallelOpportunityFinder<'a> {
    pub fn new(conflicts: &'a ResourceConflictAnalyzer<'a>, costs: &'a CostModel) -> Self {
        Self { conflicts, costs }
    }

    /// Partitions `tools` into conflict-free groups
    pub fn find_parallel_groups(&self, tools: &[String]) -> Vec<Vec<String>> {
        clique_cover(tools, |a, b| self.conflicts.can_run_in_parallel(a, b))
    }

    fn group(&self, level: usize, index: usize, tools: Vec<String>) -> ParallelGroup {
        let times: Vec<f64> = tools.iter().map(|tool| self.costs.execution_time(tool)).collect();
        let execution_time = times.iter().copied().fold(0.0, f64::max);
        let estimated_speedup = if execution_time > 0.0 { times.iter().sum::<f64>() / execution_time } else { 1.0 };

        ParallelGroup {
            group_id: format!("L{level}G{}", index + 1),
            tools,
            level,
            execution_time,
            estimated_speedup,
        }
    }

    /// Groups every level of `graph` and aggregates time estimates
    pub fn optimize_execution_plan(&self, graph: &DependencyGraph) -> ExecutionPlan {
        let mut parallel_groups = Vec::new();
        let mut sequential_time = 0.0;
        let mut parallel_time = 0.0;
        let mut grouped_tools = 0;

        for (level, tools) in graph.tools_by_level() {
            sequential_time += tools.iter().map(|tool| self.costs.execution_time(tool)).sum::<f64>();

            let cover = self.find_parallel_groups(&tools);
            debug!(level, tools = tools.len(), groups = cover.len(), "Grouped level");

            for (index, members) in cover.into_iter().enumerate() {
                let group = self.group(level, index, members);
                parallel_time += group.execution_time;
                if group.is_parallel() {
                    grouped_tools += group.len();
                }
                parallel_groups.push(group);
            }
        }

        let total_tools = graph.len();
        let estimated_speedup = if parallel_time > 0.0 { sequential_time / parallel_time } else { 1.0 };
        let plan = ExecutionPlan {
            parallel_groups,
            total_tools,
            total_levels: graph.total_levels(),
            estimated_total_time: parallel_time,
            estimated_sequential_time: sequential_time,
            estimated_speedup,
            parallelization_ratio: ratio(grouped_tools, total_tools),
            diagnostics: graph.diagnostics.clone(),
        };

        info!(
            groups = plan.parallel_groups.len(),
            speedup = plan.estimated_speedup,
            ratio = plan.parallelization_ratio,
            "Execution plan optimized"
        );
        plan
    }

    /// Every combination of two or more tools that is pairwise compatible,
    /// smallest first. Exponential, so bounded by [`MAX_COMBINATION_TOOLS`].
    pub fn find_all_parallel_combinations(&self, tools: &[String]) -> PlannerResult<Vec<Vec<String>>> {
        if tools.len() > MAX_COMBINATION_TOOLS {
            return Err(PlannerError::InvalidPlan(format!(
                "combination search over {} tools exceeds the limit of {MAX_COMBINATION_TOOLS}",
                tools.len()
            )));
        }

        let mut combinations = Vec::new();
        for size in 2..=tools.len() {
            for_each_combination(tools.len(), size, |indices| {
                let group: Vec<String> = indices.iter().map(|&i| tools[i].clone()).collect();
                if is_clique(&group, |a, b| self.conflicts.can_run_in_parallel(a, b)) {
                    combinations.push(group);
                }
            });
        }
        Ok(combinations)
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { part as f64 / total as f64 }
}

/// Visits every `size`-subset of `0..n` in lexicographic order
fn for_each_combination<F>(n: usize, size: usize, mut visit: F)
where
    F: FnMut(&[usize]),
{
    if size == 0 || size > n {
        return;
    }

    let mut indices: Vec<usize> = (0..size).collect();
    loop {
        visit(&indices);

        // Rightmost index that can still move
        let Some(pos) = (0..size).rev().find(|&i| indices[i] != i + n - size) else {
            return;
        };
        indices[pos] += 1;
        for i in pos + 1..size {
            indices[i] = indices[i - 1] + 1;
        }
    }
}
