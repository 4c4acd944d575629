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

//! Declarative tool contracts
//!
//! A contract names one pipeline tool, the tools it must run after, and opaque
//! resource tags describing what it touches:
//!
//! ```yaml
//! tool_id: T31_ENTITY_BUILDER
//! depends_on: [T23A_SPACY_NER]
//! dependencies: [neo4j, identity_service]
//! category: graph_building
//! ```

use crate::error::ContractError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One tool's declared dependencies and resource tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolContract {
    /// Unique tool identifier
    pub tool_id: String,

    /// Tools that must complete before this one starts
    pub depends_on: Vec<String>,

    /// Opaque resource tags (`neo4j`, `sqlite`, `identity_service`, ...)
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Free-form category tag (`loader`, `graph_building`, ...)
    #[serde(default)]
    pub category: String,

    /// Measured execution time in seconds, superseding the cost table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<f64>,
}

impl ToolContract {
    /// Creates a contract with no dependencies, resource tags or category
    pub fn new(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            depends_on: Vec::new(),
            dependencies: Vec::new(),
            category: String::new(),
            estimated_time: None,
        }
    }

    pub fn depends_on<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependencies<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_estimated_time(mut self, seconds: f64) -> Self {
        self.estimated_time = Some(seconds);
        self
    }

    /// Checks the fields the planner relies on
    ///
    /// # Returns
    /// - Ok(()): Contract is usable for graph building
    /// - Err(ContractError): Empty identifier, duplicate or blank dependency, bad estimate
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.tool_id.trim().is_empty() {
            return Err(ContractError::MissingField("tool_id".to_string()));
        }

        let mut seen = HashSet::new();
        for dependency in &self.depends_on {
            if dependency.trim().is_empty() {
                return Err(ContractError::InvalidField("depends_on".to_string(), format!("{} has an empty dependency entry", self.tool_id)));
            }
            if !seen.insert(dependency.as_str()) {
                return Err(ContractError::DuplicateDependency {
                    tool_id: self.tool_id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }

        if let Some(seconds) = self.estimated_time {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(ContractError::InvalidField("estimated_time".to_string(), seconds.to_string()));
            }
        }

        Ok(())
    }
}

/// Returns true iff the document has a string `tool_id` and a list `depends_on`.
///
/// Guards documents arriving from sources other than the contract store.
pub fn validate_contract(document: &serde_yaml::Value) -> bool {
    let Some(mapping) = document.as_mapping() else {
        return false;
    };

    let has_tool_id = mapping.get("tool_id").and_then(serde_yaml::Value::as_str).is_some();
    let has_depends_on = mapping.get("depends_on").map(serde_yaml::Value::is_sequence).unwrap_or(false);

    has_tool_id && has_depends_on
}

/// Parses and validates one YAML contract document
pub fn parse_contract(content: &str, path: &Path) -> Result<ToolContract, ContractError> {
    let document: serde_yaml::Value = serde_yaml::from_str(content).map_err(|source| ContractError::Parse { path: path.to_path_buf(), source })?;

    if !validate_contract(&document) {
        let missing = match document.as_mapping() {
            Some(mapping) if mapping.get("tool_id").and_then(serde_yaml::Value::as_str).is_some() => "depends_on",
            _ => "tool_id",
        };
        return Err(ContractError::MissingField(missing.to_string()));
    }

    let contract: ToolContract = serde_yaml::from_value(document).map_err(|source| ContractError::Parse { path: path.to_path_buf(), source })?;
    contract.validate()?;
    Ok(contract)
}
