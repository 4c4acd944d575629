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

use super::plan::print_schedule;
use super::{CommandContext, print_diagnostics};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use toolplan_core::{DependencyAnalysis, OptimizationStrategy, OptimizedExecutionPlan, Workflow};

#[derive(Serialize)]
struct AnalysisOutput {
    analysis: DependencyAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<OptimizedExecutionPlan>,
}

pub fn analyze_workflow(ctx: &CommandContext, path: &Path, strategy: Option<OptimizationStrategy>) -> Result<()> {
    let workflow = Workflow::load_from_file(path).with_context(|| format!("failed to read workflow {}", path.display()))?;
    let planner = ctx.planner()?;

    let analysis = planner.analyze_dependencies(&workflow.steps)?;
    let schedule = strategy.map(|strategy| planner.optimize_workflow(&workflow.steps, strategy)).transpose()?;

    if ctx.json {
        return ctx.print_json(&AnalysisOutput { analysis, schedule });
    }

    println!("Workflow {}: {} steps", path.display(), workflow.steps.len());
    println!("Can parallelize: {}", if analysis.can_parallelize { "yes" } else { "no" });
    println!();
    for (level, groups) in &analysis.groups_by_level {
        let rendered: Vec<String> = groups.iter().map(|group| format!("[{}]", group.join(", "))).collect();
        println!("Level {}: {}", level, rendered.join(" "));
    }

    if !analysis.independent_pairs.is_empty() {
        println!();
        println!("Independent pairs:");
        for (a, b) in &analysis.independent_pairs {
            println!("  {} || {}", a, b);
        }
    }

    if let Some(schedule) = &schedule {
        print_schedule(schedule);
    }
    print_diagnostics(&analysis.diagnostics);
    Ok(())
}
