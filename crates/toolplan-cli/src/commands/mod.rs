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

pub mod analyze;
pub mod conflicts;
pub mod graph;
pub mod plan;
pub mod profile;

use anyhow::{Context, Result};
use serde::Serialize;
use toolplan_core::{PlannerConfig, ProgrammaticDependencyAnalyzer};
use tracing::info;

pub struct CommandContext {
    pub config: PlannerConfig,
    pub json: bool,
}

impl CommandContext {
    pub fn new(config: PlannerConfig, json: bool) -> Self {
        Self { config, json }
    }

    /// Loads the contract store named by the configuration
    pub fn planner(&self) -> Result<ProgrammaticDependencyAnalyzer> {
        let planner = ProgrammaticDependencyAnalyzer::from_config(self.config.clone())
            .with_context(|| format!("failed to load contracts from {}", self.config.contracts_dir.display()))?;

        let store = planner.analyzer().store();
        info!(contracts = store.len(), skipped = store.diagnostics().len(), "Contract store ready");
        Ok(planner)
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

pub fn print_diagnostics(diagnostics: &[String]) {
    if diagnostics.is_empty() {
        return;
    }
    println!();
    println!("Diagnostics:");
    for diagnostic in diagnostics {
        println!("  - {}", diagnostic);
    }
}

pub fn show_config(ctx: &CommandContext) -> Result<()> {
    if ctx.json {
        return ctx.print_json(&ctx.config);
    }
    print!("{}", ctx.config.to_toml_string()?);
    Ok(())
}
