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
use toolplan_core::conflicts::ConflictMatrix;
use toolplan_core::PairReport;

#[derive(Serialize)]
struct ConflictSummary {
    matrix: ConflictMatrix,
    safe_pairs: Vec<(String, String)>,
    reports: Vec<PairReport>,
    warnings: Vec<String>,
}

pub fn show_conflicts(ctx: &CommandContext, tools: &[String]) -> Result<()> {
    let planner = ctx.planner()?;
    let conflicts = planner.conflict_analyzer();
    let warnings = conflicts.dangling_overrides();

    let tools: Vec<String> = if tools.is_empty() {
        planner.analyzer().store().tool_ids().map(str::to_string).collect()
    } else {
        tools.to_vec()
    };

    let matrix = conflicts.conflict_matrix_for(&tools);
    let safe_pairs = conflicts.safe_pairs_among(&tools);
    let mut reports = Vec::new();
    for (i, a) in tools.iter().enumerate() {
        for b in &tools[i + 1..] {
            let report = conflicts.analyze_pair(a, b);
            if !report.conflicts.is_empty() {
                reports.push(report);
            }
        }
    }

    if ctx.json {
        return ctx.print_json(&ConflictSummary { matrix, safe_pairs, reports, warnings });
    }

    for warning in &warnings {
        println!("warning: {}", warning);
    }

    println!("Safe parallel pairs ({}):", safe_pairs.len());
    for (a, b) in &safe_pairs {
        println!("  {} || {}", a, b);
    }

    println!();
    println!("Detected conflicts ({}):", reports.len());
    println!("{:<30} {:<30} {:<8} {:<10} {}", "Tool A", "Tool B", "Severity", "Parallel", "Details");
    println!("{}", "-".repeat(110));
    for report in &reports {
        for conflict in &report.conflicts {
            println!(
                "{:<30} {:<30} {:<8} {:<10} {}",
                report.tool_a,
                report.tool_b,
                format!("{:?}", conflict.severity),
                if report.can_run_in_parallel { "yes" } else { "no" },
                conflict.details
            );
        }
        if let Some(entry) = &report.override_applied {
            println!("{:<30} {:<30} override {:?}: {}", "", "", entry.verdict, entry.rationale);
        }
    }
    print_diagnostics(planner.analyzer().store().diagnostics());

    Ok(())
}
