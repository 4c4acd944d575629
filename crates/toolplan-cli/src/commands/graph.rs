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

pub fn show_graph(ctx: &CommandContext, tools: &[String]) -> Result<()> {
    let planner = ctx.planner()?;
    let graph = if tools.is_empty() {
        planner.analyzer().build_dependency_graph()?
    } else {
        planner.graph_builder().build_execution_graph(tools)?
    };

    if ctx.json {
        return ctx.print_json(&graph);
    }

    if graph.is_empty() {
        println!("No tools to plan.");
        return Ok(());
    }

    println!("Dependency graph: {} tools, {} levels", graph.len(), graph.total_levels());
    println!("{:<8} {:<36} {}", "Level", "Tool", "Depends on");
    println!("{}", "-".repeat(80));

    for (level, level_tools) in graph.tools_by_level() {
        for tool in level_tools {
            let dependencies: Vec<&str> = graph.dependencies_of(&tool).collect();
            println!("{:<8} {:<36} {}", level, tool, dependencies.join(", "));
        }
    }

    let (path, time) = graph.critical_path(|tool| planner.costs().execution_time(tool));
    println!();
    println!("Critical path ({:.1}s): {}", time, path.join(" -> "));
    print_diagnostics(&graph.diagnostics);

    Ok(())
}
