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

//! Absolute-time scheduling of grouped execution plans
//!
//! Levels run back to back. Within a level, groups that conflict with an
//! already placed group wait for it to finish, so the schedule never overlaps
//! two tools that were not found compatible.

use crate::config::PlannerConfig;
use crate::conflicts::ResourceConflictAnalyzer;
use crate::costs::{CostModel, ResourceAllocation, SystemLimits};
use crate::error::PlannerError;
use crate::graph::DependencyGraph;
use crate::parallel::{ExecutionPlan, ParallelGroup, ParallelOpportunityFinder};
use metrics::{counter, gauge};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

const TIME_EPSILON: f64 = 1e-9;

/// Objective used when placing groups on the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStrategy {
    /// Start every group as early as dependencies and conflicts allow.
    ///
    /// Groups of one level start together at the level start unless they
    /// conflict; a conflicting group waits for the end of the group it
    /// conflicts with, so a level can take longer than its longest group
    /// and the makespan can exceed the sum of those per-level maxima.
    #[default]
    MinimizeMakespan,
    /// Also keep summed CPU and memory under the system limits
    BalanceResources,
}

impl fmt::Display for OptimizationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationStrategy::MinimizeMakespan => write!(f, "minimize_makespan"),
            OptimizationStrategy::BalanceResources => write!(f, "balance_resources"),
        }
    }
}

impl FromStr for OptimizationStrategy {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "makespan" | "minimize_makespan" => Ok(OptimizationStrategy::MinimizeMakespan),
            "balance" | "balance_resources" => Ok(OptimizationStrategy::BalanceResources),
            other => Err(PlannerError::Config(format!("unknown optimization strategy: {other}"))),
        }
    }
}

/// One tool placed on the timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledTask {
    pub tool_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub level: usize,
    pub resources: ResourceAllocation,
    pub dependencies: Vec<String>,
    /// Set when the tool runs inside a multi-tool group
    pub parallel_group: Option<String>,
}

impl ScheduledTask {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn is_active_at(&self, instant: f64) -> bool {
        self.start_time <= instant && instant < self.end_time
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizedExecutionPlan {
    /// Ordered by start time, then tool id
    pub scheduled_tasks: Vec<ScheduledTask>,
    pub total_makespan: f64,
    /// Average fraction of each limit in use: `cpu`, `memory`, `disk_io`, `network`
    pub resource_utilization: BTreeMap<String, f64>,
    /// Sequential time over makespan times peak concurrency
    pub parallelization_efficiency: f64,
    pub critical_path: Vec<String>,
    pub critical_path_time: f64,
    /// Constraint violations and capacity warnings; never fatal
    pub bottlenecks: Vec<String>,
    pub strategy: OptimizationStrategy,
    pub diagnostics: Vec<String>,
}

impl OptimizedExecutionPlan {
    pub fn task(&self, tool_id: &str) -> Option<&ScheduledTask> {
        self.scheduled_tasks.iter().find(|task| task.tool_id == tool_id)
    }
}

/// Members of one group placed on the timeline together
struct Placement<'g> {
    group: &'g ParallelGroup,
    tools: &'g [String],
    start: f64,
    end: f64,
    allocation: ResourceAllocation,
}

impl Placement<'_> {
    fn is_parallel(&self) -> bool {
        self.tools.len() > 1
    }
}

pub struct ExecutionPlanOptimizer<'a> {
    conflicts: &'a ResourceConflictAnalyzer<'a>,
    costs: &'a CostModel,
    limits: SystemLimits,
    utilization_samples: usize,
}

impl<'a> ExecutionPlanOptimizer<'a> {
    pub fn new(conflicts: &'a ResourceConflictAnalyzer<'a>, costs: &'a CostModel, config: &PlannerConfig) -> Self {
        Self {
            conflicts,
            costs,
            limits: config.limits,
            utilization_samples: config.utilization_samples.max(1),
        }
    }

    /// Groups `graph` level by level and schedules the result
    pub fn optimize_execution_plan(&self, graph: &DependencyGraph, strategy: OptimizationStrategy) -> OptimizedExecutionPlan {
        let plan = ParallelOpportunityFinder::new(self.conflicts, self.costs).optimize_execution_plan(graph);
        self.schedule(graph, &plan, strategy)
    }

    /// Schedules an already grouped plan
    pub fn schedule(&self, graph: &DependencyGraph, plan: &ExecutionPlan, strategy: OptimizationStrategy) -> OptimizedExecutionPlan {
        let mut bottlenecks = Vec::new();

        let mut levels: BTreeMap<usize, Vec<&ParallelGroup>> = BTreeMap::new();
        for group in &plan.parallel_groups {
            levels.entry(group.level).or_default().push(group);
        }

        let mut placements = Vec::new();
        let mut level_start = 0.0;
        for (level, groups) in levels {
            let placed = match strategy {
                OptimizationStrategy::MinimizeMakespan => self.place_level_makespan(&groups, level_start),
                OptimizationStrategy::BalanceResources => self.place_level_balanced(&groups, level_start, &mut bottlenecks),
            };
            let level_end = placed.iter().map(|p| p.end).fold(level_start, f64::max);
            debug!(level, start = level_start, end = level_end, groups = placed.len(), "Scheduled level");
            level_start = level_end;
            placements.extend(placed);
        }

        let mut scheduled_tasks = self.expand(graph, &placements);
        scheduled_tasks.sort_by(|a, b| a.start_time.total_cmp(&b.start_time).then_with(|| a.tool_id.cmp(&b.tool_id)));

        let total_makespan = scheduled_tasks.iter().map(|task| task.end_time).fold(0.0, f64::max);
        bottlenecks.extend(self.check_resource_constraints(&scheduled_tasks));
        bottlenecks.extend(self.check_dependency_constraints(&scheduled_tasks));
        for bottleneck in &bottlenecks {
            warn!(bottleneck = %bottleneck, "Schedule bottleneck");
        }

        let (critical_path, critical_path_time) = graph.critical_path(|tool| self.costs.execution_time(tool));
        let optimized = OptimizedExecutionPlan {
            resource_utilization: self.resource_utilization(&scheduled_tasks, total_makespan),
            parallelization_efficiency: parallelization_efficiency(&scheduled_tasks, total_makespan),
            scheduled_tasks,
            total_makespan,
            critical_path,
            critical_path_time,
            bottlenecks,
            strategy,
            diagnostics: plan.diagnostics.clone(),
        };

        counter!("toolplan_plans_scheduled", 1);
        gauge!("toolplan_last_makespan_seconds", optimized.total_makespan);
        info!(
            strategy = %strategy,
            tasks = optimized.scheduled_tasks.len(),
            makespan = optimized.total_makespan,
            efficiency = optimized.parallelization_efficiency,
            "Execution plan scheduled"
        );
        optimized
    }

    fn members_conflict(&self, a: &[String], b: &[String]) -> bool {
        a.iter().any(|x| b.iter().any(|y| !self.conflicts.can_run_in_parallel(x, y)))
    }

    fn members_allocation(&self, tools: &[String]) -> ResourceAllocation {
        tools.iter().map(|tool| self.costs.allocation(tool)).sum()
    }

    fn members_time(&self, tools: &[String]) -> f64 {
        tools.iter().map(|tool| self.costs.execution_time(tool)).fold(0.0, f64::max)
    }

    /// Every group starts at the level start unless it conflicts with a group
    /// already placed, in which case it starts after the latest such group.
    fn place_level_makespan<'g>(&self, groups: &[&'g ParallelGroup], level_start: f64) -> Vec<Placement<'g>> {
        let mut placed: Vec<Placement<'g>> = Vec::with_capacity(groups.len());
        for &group in groups {
            let start = placed
                .iter()
                .filter(|other| self.members_conflict(&group.tools, other.tools))
                .map(|other| other.end)
                .fold(level_start, f64::max);
            placed.push(Placement {
                group,
                tools: &group.tools,
                start,
                end: start + group.execution_time,
                allocation: self.members_allocation(&group.tools),
            });
        }
        placed
    }

    /// List scheduling under the CPU and memory limits, longest units first.
    ///
    /// A group whose members do not fit together is split into single tools.
    /// Start times are non-decreasing so the running set only shrinks while a
    /// candidate start is pushed forward.
    fn place_level_balanced<'g>(&self, groups: &[&'g ParallelGroup], level_start: f64, bottlenecks: &mut Vec<String>) -> Vec<Placement<'g>> {
        let mut units: Vec<(&'g ParallelGroup, &'g [String])> = Vec::new();
        for &group in groups {
            if group.is_parallel() && !self.members_allocation(&group.tools).fits_within(&self.limits) {
                debug!(group = %group.group_id, "Group exceeds limits together, scheduling members individually");
                units.extend(group.tools.iter().map(|tool| (group, std::slice::from_ref(tool))));
            } else {
                units.push((group, group.tools.as_slice()));
            }
        }
        units.sort_by(|a, b| self.members_time(b.1).total_cmp(&self.members_time(a.1)).then_with(|| a.1.cmp(b.1)));

        let mut placed: Vec<Placement<'g>> = Vec::with_capacity(units.len());
        let mut cursor = level_start;

        for (group, tools) in units {
            let allocation = self.members_allocation(tools);
            let oversized = !allocation.fits_within(&self.limits);
            if oversized {
                bottlenecks.push(format!(
                    "{} needs {:.1} cores / {:.0} MB, above the limit of {:.1} cores / {:.0} MB; it runs alone",
                    tools.join(", "),
                    allocation.cpu_cores,
                    allocation.memory_mb,
                    self.limits.cpu_cores,
                    self.limits.memory_mb
                ));
            }

            let mut start = cursor;
            loop {
                let running: Vec<&Placement<'g>> = placed.iter().filter(|p| p.end > start + TIME_EPSILON).collect();
                let blocked = if oversized {
                    !running.is_empty()
                } else {
                    let in_use: ResourceAllocation = running.iter().map(|p| p.allocation).sum();
                    !(in_use + allocation).fits_within(&self.limits) || running.iter().any(|p| self.members_conflict(tools, p.tools))
                };
                if !blocked {
                    break;
                }
                // Advance to the next completion among the running units
                match running.iter().map(|p| p.end).min_by(f64::total_cmp) {
                    Some(next) => start = next,
                    None => break,
                }
            }

            cursor = start;
            placed.push(Placement {
                group,
                tools,
                start,
                end: start + self.members_time(tools),
                allocation,
            });
        }
        placed
    }

    fn expand(&self, graph: &DependencyGraph, placements: &[Placement<'_>]) -> Vec<ScheduledTask> {
        placements
            .iter()
            .flat_map(|placement| {
                placement.tools.iter().map(move |tool| {
                    let end_time = if placement.is_parallel() { placement.end } else { placement.start + self.costs.execution_time(tool) };
                    ScheduledTask {
                        tool_id: tool.clone(),
                        start_time: placement.start,
                        end_time,
                        level: placement.group.level,
                        resources: self.costs.allocation(tool),
                        dependencies: graph.dependencies_of(tool).map(str::to_string).collect(),
                        parallel_group: placement.is_parallel().then(|| placement.group.group_id.clone()),
                    }
                })
            })
            .collect()
    }

    /// Instants where summed CPU or memory of running tasks exceeds the limits
    pub fn check_resource_constraints(&self, tasks: &[ScheduledTask]) -> Vec<String> {
        let mut instants: Vec<f64> = tasks.iter().map(|task| task.start_time).collect();
        instants.sort_by(f64::total_cmp);
        instants.dedup_by(|a, b| (*a - *b).abs() < TIME_EPSILON);

        let mut violations = Vec::new();
        for instant in instants {
            let in_use: ResourceAllocation = tasks.iter().filter(|task| task.is_active_at(instant)).map(|task| task.resources).sum();
            if in_use.cpu_cores > self.limits.cpu_cores + TIME_EPSILON {
                violations.push(format!(
                    "t={instant:.2}s: {:.1} CPU cores in use, limit is {:.1}",
                    in_use.cpu_cores, self.limits.cpu_cores
                ));
            }
            if in_use.memory_mb > self.limits.memory_mb + TIME_EPSILON {
                violations.push(format!(
                    "t={instant:.2}s: {:.0} MB memory in use, limit is {:.0}",
                    in_use.memory_mb, self.limits.memory_mb
                ));
            }
        }
        violations
    }

    /// Tasks that start before one of their dependencies has finished
    pub fn check_dependency_constraints(&self, tasks: &[ScheduledTask]) -> Vec<String> {
        let by_tool: BTreeMap<&str, &ScheduledTask> = tasks.iter().map(|task| (task.tool_id.as_str(), task)).collect();

        let mut violations = Vec::new();
        for task in tasks {
            for dependency in &task.dependencies {
                if let Some(dep) = by_tool.get(dependency.as_str()) {
                    if dep.end_time > task.start_time + TIME_EPSILON {
                        violations.push(format!(
                            "{} starts at {:.2}s before dependency {} ends at {:.2}s",
                            task.tool_id, task.start_time, dep.tool_id, dep.end_time
                        ));
                    }
                }
            }
        }
        violations
    }

    /// Average share of each limit in use, sampled at evenly spaced instants
    pub fn resource_utilization(&self, tasks: &[ScheduledTask], makespan: f64) -> BTreeMap<String, f64> {
        let mut totals = ResourceAllocation::default();
        if makespan > 0.0 {
            let samples = self.utilization_samples;
            for i in 0..samples {
                let instant = makespan * (i as f64 + 0.5) / samples as f64;
                totals = totals + tasks.iter().filter(|task| task.is_active_at(instant)).map(|task| task.resources).sum::<ResourceAllocation>();
            }
            let samples = samples as f64;
            totals = ResourceAllocation::new(totals.cpu_cores / samples, totals.memory_mb / samples, totals.disk_io / samples, totals.network / samples);
        }

        BTreeMap::from([
            ("cpu".to_string(), share(totals.cpu_cores, self.limits.cpu_cores)),
            ("memory".to_string(), share(totals.memory_mb, self.limits.memory_mb)),
            ("disk_io".to_string(), share(totals.disk_io, self.limits.disk_io)),
            ("network".to_string(), share(totals.network, self.limits.network)),
        ])
    }
}

fn share(used: f64, limit: f64) -> f64 {
    if limit > 0.0 { used / limit } else { 0.0 }
}

fn parallelization_efficiency(tasks: &[ScheduledTask], makespan: f64) -> f64 {
    let peak = tasks
        .iter()
        .map(|task| tasks.iter().filter(|other| other.is_active_at(task.start_time)).count())
        .max()
        .unwrap_or(0);
    if makespan <= 0.0 || peak == 0 {
        return 0.0;
    }
    let sequential: f64 = tasks.iter().map(ScheduledTask::duration).sum();
    sequential / (makespan * peak as f64)
}
