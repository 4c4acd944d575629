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

//! Coarse resource-usage profiles derived from tool contracts
//!
//! Tags follow an `<access>_<resource>` convention: `read_neo4j`,
//! `write_sqlite`, `write_output`, `service_identity_service`.

use crate::contracts::ToolContract;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Shared services recognised in a contract's resource tags
pub const SHARED_SERVICES: [&str; 3] = ["identity_service", "provenance_service", "quality_service"];

const READ_PREFIX: &str = "read_";
const WRITE_PREFIX: &str = "write_";
const SERVICE_PREFIX: &str = "service_";

/// Access direction carried by a qualified database tag such as `neo4j-write`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagAccess {
    Read,
    Write,
    Both,
}

/// Resource access profile of a single tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Database tags such as `read_neo4j`, `write_sqlite`
    pub database_access: BTreeSet<String>,
    /// File tags such as `read_input`, `write_output`
    pub file_access: BTreeSet<String>,
    /// Shared service tags such as `service_identity_service`
    pub shared_state: BTreeSet<String>,
}

impl ResourceUsage {
    /// Derives the profile from the contract's resource tags, category and naming conventions
    pub fn from_contract(contract: &ToolContract) -> Self {
        let mut usage = Self::default();
        usage.file_access.insert("read_input".to_string());

        for tag in &contract.dependencies {
            usage.add_dependency_tag(tag);
        }

        let tool_id = contract.tool_id.to_lowercase();
        let category = contract.category.to_lowercase();

        if tool_id.contains("builder") || category.contains("builder") || category == "graph_building" {
            usage.file_access.insert("write_output".to_string());
            usage.database_access.insert("write_neo4j".to_string());
        }
        if tool_id.contains("loader") || category == "loader" {
            usage.file_access.insert("read_file".to_string());
            usage.file_access.insert("write_output".to_string());
        }
        if tool_id.contains("chunker") || category == "chunker" {
            usage.file_access.insert("write_output".to_string());
        }

        usage
    }

    fn add_dependency_tag(&mut self, tag: &str) {
        let tag = tag.trim().to_lowercase();
        let (name, access) = split_access_suffix(&tag);

        let database = if name == "neo4j" {
            Some("neo4j")
        } else if name.contains("sqlite") {
            Some("sqlite")
        } else {
            None
        };

        if let Some(database) = database {
            if matches!(access, TagAccess::Read | TagAccess::Both) {
                self.database_access.insert(format!("{READ_PREFIX}{database}"));
            }
            if matches!(access, TagAccess::Write | TagAccess::Both) {
                self.database_access.insert(format!("{WRITE_PREFIX}{database}"));
            }
        } else if SHARED_SERVICES.contains(&name) {
            self.shared_state.insert(format!("{SERVICE_PREFIX}{name}"));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.database_access.is_empty() && self.file_access.is_empty() && self.shared_state.is_empty()
    }

    /// Database names written by the tool
    pub fn database_writes(&self) -> BTreeSet<&str> {
        strip_prefixed(&self.database_access, WRITE_PREFIX)
    }

    /// Database names read by the tool
    pub fn database_reads(&self) -> BTreeSet<&str> {
        strip_prefixed(&self.database_access, READ_PREFIX)
    }

    /// File resources written by the tool
    pub fn file_writes(&self) -> BTreeSet<&str> {
        strip_prefixed(&self.file_access, WRITE_PREFIX)
    }

    /// File resources read by the tool
    pub fn file_reads(&self) -> BTreeSet<&str> {
        strip_prefixed(&self.file_access, READ_PREFIX)
    }

    /// Shared service names, without the `service_` prefix
    pub fn services(&self) -> BTreeSet<&str> {
        strip_prefixed(&self.shared_state, SERVICE_PREFIX)
    }
}

fn strip_prefixed<'a>(tags: &'a BTreeSet<String>, prefix: &str) -> BTreeSet<&'a str> {
    tags.iter().filter_map(|tag| tag.strip_prefix(prefix)).collect()
}

fn split_access_suffix(tag: &str) -> (&str, TagAccess) {
    for separator in ['-', '_', ':'] {
        if let Some((name, access)) = tag.rsplit_once(separator) {
            match access {
                "read" => return (name, TagAccess::Read),
                "write" => return (name, TagAccess::Write),
                _ => {}
            }
        }
    }
    (tag, TagAccess::Both)
}
