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

//! Directory-backed contract store

use super::contract::{ToolContract, parse_contract};
use crate::error::{ContractError, PlannerError, PlannerResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File extensions recognised as contract documents
pub const CONTRACT_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Optional cost overlay kept next to the contracts
pub const COST_FILE_NAME: &str = "costs.toml";

/// Immutable set of tool contracts keyed by tool id
#[derive(Debug, Clone, Default)]
pub struct ContractStore {
    contracts: BTreeMap<String, ToolContract>,
    root: Option<PathBuf>,
    diagnostics: Vec<String>,
    /// Tool ids whose only contract failed to parse or validate
    rejected: BTreeSet<String>,
}

impl ContractStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an in-memory store, skipping contracts that fail validation
    pub fn from_contracts<I>(contracts: I) -> Self
    where
        I: IntoIterator<Item = ToolContract>,
    {
        let mut store = Self::new();
        for contract in contracts {
            store.insert(contract);
        }
        store
    }

    /// Loads every `*.yaml` / `*.yml` file directly under `dir`.
    ///
    /// Unreadable, malformed or invalid documents are logged, recorded as
    /// diagnostics and skipped. Only a missing or unreadable directory fails.
    pub fn load_dir(dir: impl AsRef<Path>) -> PlannerResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(PlannerError::ContractLoad(format!("contracts directory {} does not exist", dir.display())));
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| CONTRACT_EXTENSIONS.contains(&ext)))
            .collect();
        paths.sort();

        let mut store = Self {
            root: Some(dir.to_path_buf()),
            ..Self::default()
        };

        for path in paths {
            match Self::read_contract(&path) {
                Ok(contract) => {
                    debug!(tool_id = %contract.tool_id, path = %path.display(), "Loaded tool contract");
                    store.insert(contract);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping tool contract");
                    store.diagnostics.push(format!("skipped {}: {}", path.display(), e));
                    if let Some(tool_id) = declared_tool_id(&path) {
                        store.rejected.insert(tool_id);
                    }
                }
            }
        }

        Ok(store)
    }

    fn read_contract(path: &Path) -> Result<ToolContract, ContractError> {
        let content = fs::read_to_string(path).map_err(|source| ContractError::Read { path: path.to_path_buf(), source })?;
        parse_contract(&content, path)
    }

    /// Adds a contract unless it is invalid or its id is already taken.
    ///
    /// Returns whether the contract was stored.
    pub fn insert(&mut self, contract: ToolContract) -> bool {
        if let Err(e) = contract.validate() {
            warn!(tool_id = %contract.tool_id, error = %e, "Skipping invalid tool contract");
            self.diagnostics.push(format!("skipped contract {}: {}", contract.tool_id, e));
            self.rejected.insert(contract.tool_id);
            return false;
        }

        if self.contracts.contains_key(&contract.tool_id) {
            warn!(tool_id = %contract.tool_id, "Duplicate tool contract ignored");
            self.diagnostics.push(format!("duplicate contract for {} ignored", contract.tool_id));
            return false;
        }

        self.contracts.insert(contract.tool_id.clone(), contract);
        true
    }

    pub fn get(&self, tool_id: &str) -> Option<&ToolContract> {
        self.contracts.get(tool_id)
    }

    pub fn contains(&self, tool_id: &str) -> bool {
        self.contracts.contains_key(tool_id)
    }

    /// Tool ids in sorted order
    pub fn tool_ids(&self) -> impl Iterator<Item = &str> {
        self.contracts.keys().map(String::as_str)
    }

    pub fn contracts(&self) -> impl Iterator<Item = &ToolContract> {
        self.contracts.values()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Directory the store was loaded from, if any
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Path of the cost overlay file, if the store is directory-backed and the file exists
    pub fn cost_file(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(COST_FILE_NAME)).filter(|path| path.is_file())
    }

    /// Non-fatal problems found while loading
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// True if a contract for `tool_id` was seen but rejected, and no valid one replaced it
    pub fn is_rejected(&self, tool_id: &str) -> bool {
        !self.contains(tool_id) && self.rejected.contains(tool_id)
    }
}

/// Best-effort `tool_id` of a document that failed to load
fn declared_tool_id(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let document: serde_yaml::Value = serde_yaml::from_str(&content).ok()?;
    document.get("tool_id")?.as_str().map(str::to_string)
}
