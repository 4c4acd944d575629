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

use super::{CommandContext, print_diagnostics};
use anyhow::Result;
use serde::Serialize;
use toolplan_core::{ExecutionPlan, OptimizationStrategy, OptimizedExecutionPlan};

#[derive(Serialize)]
struct PlanOutput {
    plan: ExecutionPlan,
    schedule: OptimizedExecutionPlan,
}

pub fn show_plan(ctx: &CommandContext, tools: &[String], strategy: OptimizationStrategy) -> Result<()> {
    let planner = ctx.planner()?;
    let plan = planner.execution_plan(tools)?;
    let schedule = planner.optimize(tools, strategy)?;

    if ctx.json {
        return ctx.print_json(&PlanOutput { plan, schedule });
    }

    println!(
        "Execution plan: {} tools, {} levels, {} groups",
        plan.total_tools,
        plan.total_levels,
        plan.parallel_groups.len()
    );
    println!("{:<8} {:<8} {:<10} {}", "Group", "Level", "Time (s)", "Tools");
    println!("{}", "-".repeat(80));
    for group in &plan.parallel_groups {
        println!("{:<8} {:<8} {:<10.1} {}", group.group_id, group.level, group.execution_time, group.tools.join(", "));
    }
    println!();
    println!(
        "Sequential {:.1}s, parallel {:.1}s, speedup {:.2}x, parallelization ratio {:.0}%",
        plan.estimated_sequential_time,
        plan.estimated_total_time,
        plan.estimated_speedup,
        plan.parallelization_ratio * 100.0
    );

    print_schedule(&schedule);
    print_diagnostics(&plan.diagnostics);
    Ok(())
}

pub fn print_schedule(schedule: &OptimizedExecutionPlan) {
    println!();
    println!("Schedule ({}): makespan {:.1}s, efficiency {:.0}%", schedule.strategy, schedule.total_makespan, schedule.parallelization_efficiency * 100.0);
    println!("{:<36} {:<8} {:<8} {:<6} {}", "Tool", "Start", "End", "Level", "Group");
    println!("{}", "-".repeat(80));
    for task in &schedule.scheduled_tasks {
        println!(
            "{:<36} {:<8.1} {:<8.1} {:<6} {}",
            task.tool_id,
            task.start_time,
            task.end_time,
            task.level,
            task.parallel_group.as_deref().unwrap_or("-")
        );
    }

    let utilization: Vec<String> = schedule.resource_utilization.iter().map(|(resource, share)| format!("{} {:.0}%", resource, share * 100.0)).collect();
    println!();
    println!("Utilization: {}", utilization.join(", "));
    println!("Critical path ({:.1}s): {}", schedule.critical_path_time, schedule.critical_path.join(" -> "));

    if !schedule.bottlenecks.is_empty() {
        println!();
        println!("Bottlenecks:");
        for bottleneck in &schedule.bottlenecks {
            println!("  - {}", bottleneck);
        }
    }
}
