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

//! Helpers shared by the integration tests

#![allow(dead_code)]

use std::path::Path;
use tempfile::TempDir;
use toolplan_core::{ContractAnalyzer, ContractStore, PlannerConfig, ProgrammaticDependencyAnalyzer};

/// Contract fixture: (tool_id, depends_on, resource tags)
pub type Fixture<'a> = (&'a str, &'a [&'a str], &'a [&'a str]);

pub fn contract_yaml(tool_id: &str, depends_on: &[&str], dependencies: &[&str]) -> String {
    let list = |items: &[&str]| items.iter().map(|item| format!("\"{item}\"")).collect::<Vec<_>>().join(", ");
    format!("tool_id: {tool_id}\ndepends_on: [{}]\ndependencies: [{}]\n", list(depends_on), list(dependencies))
}

pub fn write_contract(dir: &Path, tool_id: &str, depends_on: &[&str], dependencies: &[&str]) {
    let path = dir.join(format!("{}.yaml", tool_id.to_lowercase()));
    std::fs::write(path, contract_yaml(tool_id, depends_on, dependencies)).unwrap();
}

/// Temporary contracts directory populated from fixtures
pub fn contracts_dir(fixtures: &[Fixture<'_>]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (tool_id, depends_on, dependencies) in fixtures {
        write_contract(dir.path(), tool_id, depends_on, dependencies);
    }
    dir
}

pub fn load_analyzer(dir: &TempDir) -> ContractAnalyzer {
    ContractAnalyzer::new(ContractStore::load_dir(dir.path()).unwrap())
}

pub fn facade(dir: &TempDir) -> ProgrammaticDependencyAnalyzer {
    ProgrammaticDependencyAnalyzer::from_config(PlannerConfig::default().with_contracts_dir(dir.path())).unwrap()
}

pub fn ids(tools: &[&str]) -> Vec<String> {
    tools.iter().map(|tool| tool.to_string()).collect()
}
