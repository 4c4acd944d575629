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
use toolplan_core::ConcurrencySafety;

pub fn show_profiles(ctx: &CommandContext) -> Result<()> {
    let planner = ctx.planner()?;
    let detector = planner.usage_detector();
    let profiles = detector.detect_all();

    if ctx.json {
        return ctx.print_json(&profiles);
    }

    if profiles.is_empty() {
        println!("No tool contracts found.");
        print_diagnostics(planner.analyzer().store().diagnostics());
        return Ok(());
    }

    println!("{:<36} {:<10} {:<6} {}", "Tool", "Safety", "Load", "Unsafe accesses");
    println!("{}", "-".repeat(90));
    for profile in profiles.values() {
        let safety = match profile.concurrency_safety {
            ConcurrencySafety::Safe => "safe",
            ConcurrencySafety::Caution => "caution",
            ConcurrencySafety::Unsafe => "unsafe",
        };
        let risky: Vec<String> = profile
            .unsafe_accesses()
            .map(|access| format!("{:?} {} ({:?})", access.access_pattern, access.resource_name, access.resource_type))
            .collect();
        println!("{:<36} {:<10} {:<6.1} {}", profile.tool_id, safety, profile.estimated_resource_load, risky.join(", "));
    }

    let report = detector.concurrency_report();
    println!();
    println!("Safe: {}  Caution: {}  Unsafe: {}", report.safe.len(), report.caution.len(), report.unsafe_tools.len());
    print_diagnostics(planner.analyzer().store().diagnostics());

    Ok(())
}
