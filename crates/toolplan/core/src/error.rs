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

//! Error types for contract loading and execution planning

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Circular dependency detected among tools: {}", tools.join(", "))]
    CircularDependency { tools: Vec<String> },

    #[error("Failed to load contracts: {0}")]
    ContractLoad(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid execution plan: {0}")]
    InvalidPlan(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("Failed to read contract {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse contract {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value: {0} - {1}")]
    InvalidField(String, String),

    #[error("Tool {tool_id} lists dependency {dependency} more than once")]
    DuplicateDependency { tool_id: String, dependency: String },
}

pub type PlannerResult<T> = Result<T, PlannerError>;
