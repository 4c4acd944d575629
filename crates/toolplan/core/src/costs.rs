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

//! Execution-time, resource-allocation and load tables used for scheduling
//!
//! The seeded values are estimates for the knowledge-graph pipeline tools.
//! Measured costs can replace them through the planner configuration, a
//! `costs.toml` next to the contracts, or a contract's `estimated_time`.

use crate::contracts::ContractStore;
use crate::error::{PlannerError, PlannerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Add;
use std::path::Path;

/// Resource units held by one running task
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub cpu_cores: f64,
    pub memory_mb: f64,
    pub disk_io: f64,
    pub network: f64,
}

impl ResourceAllocation {
    pub const fn new(cpu_cores: f64, memory_mb: f64, disk_io: f64, network: f64) -> Self {
        Self {
            cpu_cores,
            memory_mb,
            disk_io,
            network,
        }
    }

    /// True if neither CPU nor memory exceeds the limits
    pub fn fits_within(&self, limits: &SystemLimits) -> bool {
        self.cpu_cores <= limits.cpu_cores + f64::EPSILON && self.memory_mb <= limits.memory_mb + f64::EPSILON
    }
}

impl Add for ResourceAllocation {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            cpu_cores: self.cpu_cores + other.cpu_cores,
            memory_mb: self.memory_mb + other.memory_mb,
            disk_io: self.disk_io + other.disk_io,
            network: self.network + other.network,
        }
    }
}

impl std::iter::Sum for ResourceAllocation {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Capacity of the machine the plan will run on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemLimits {
    pub cpu_cores: f64,
    pub memory_mb: f64,
    pub disk_io: f64,
    pub network: f64,
}

impl Default for SystemLimits {
    fn default() -> Self {
        Self {
            cpu_cores: 8.0,
            memory_mb: 8000.0,
            disk_io: 10.0,
            network: 10.0,
        }
    }
}

/// Per-tool cost tables with defaults for unknown tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    pub default_execution_time: f64,
    pub default_resource_load: f64,
    pub default_allocation: ResourceAllocation,
    pub execution_times: BTreeMap<String, f64>,
    pub allocations: BTreeMap<String, ResourceAllocation>,
    pub resource_loads: BTreeMap<String, f64>,
}

impl Default for CostModel {
    fn default() -> Self {
        let execution_times = [
            ("T01_PDF_LOADER", 2.0),
            ("T15A_TEXT_CHUNKER", 1.0),
            ("T23A_SPACY_NER", 3.0),
            ("T23C_ONTOLOGY_AWARE_EXTRACTOR", 8.0),
            ("T27_RELATIONSHIP_EXTRACTOR", 5.0),
            ("T31_ENTITY_BUILDER", 4.0),
            ("T34_EDGE_BUILDER", 4.0),
            ("T68_PAGE_RANK", 6.0),
            ("T49_MULTI_HOP_QUERY", 3.0),
        ];

        let allocations = [
            ("T01_PDF_LOADER", ResourceAllocation::new(1.0, 512.0, 3.0, 0.0)),
            ("T15A_TEXT_CHUNKER", ResourceAllocation::new(1.0, 256.0, 1.0, 0.0)),
            ("T23A_SPACY_NER", ResourceAllocation::new(2.0, 2048.0, 1.0, 0.0)),
            ("T23C_ONTOLOGY_AWARE_EXTRACTOR", ResourceAllocation::new(1.0, 1024.0, 0.0, 5.0)),
            ("T27_RELATIONSHIP_EXTRACTOR", ResourceAllocation::new(1.0, 1024.0, 0.0, 5.0)),
            ("T31_ENTITY_BUILDER", ResourceAllocation::new(2.0, 1024.0, 2.0, 1.0)),
            ("T34_EDGE_BUILDER", ResourceAllocation::new(2.0, 1024.0, 2.0, 1.0)),
            ("T68_PAGE_RANK", ResourceAllocation::new(4.0, 4096.0, 2.0, 1.0)),
            ("T49_MULTI_HOP_QUERY", ResourceAllocation::new(2.0, 1024.0, 1.0, 1.0)),
        ];

        // Graph algorithms, LLM calls and file-heavy loaders weigh more
        let resource_loads = [
            ("T68_PAGE_RANK", 2.0),
            ("T49_MULTI_HOP_QUERY", 1.5),
            ("T23C_ONTOLOGY_AWARE_EXTRACTOR", 1.8),
            ("T27_RELATIONSHIP_EXTRACTOR", 1.5),
            ("T01_PDF_LOADER", 1.3),
        ];

        Self {
            default_execution_time: 1.0,
            execution_times: execution_times.into_iter().map(|(tool, secs)| (tool.to_string(), secs)).collect(),
            default_allocation: ResourceAllocation::new(1.0, 512.0, 1.0, 0.0),
            allocations: allocations.into_iter().map(|(tool, alloc)| (tool.to_string(), alloc)).collect(),
            default_resource_load: 1.0,
            resource_loads: resource_loads.into_iter().map(|(tool, load)| (tool.to_string(), load)).collect(),
        }
    }
}

impl CostModel {
    /// Cost model with empty tables, falling back to defaults for every tool
    pub fn uniform(execution_time: f64) -> Self {
        Self {
            default_execution_time: execution_time,
            execution_times: BTreeMap::new(),
            allocations: BTreeMap::new(),
            resource_loads: BTreeMap::new(),
            ..Self::default()
        }
    }

    pub fn execution_time(&self, tool_id: &str) -> f64 {
        self.execution_times.get(tool_id).copied().unwrap_or(self.default_execution_time)
    }

    pub fn allocation(&self, tool_id: &str) -> ResourceAllocation {
        self.allocations.get(tool_id).copied().unwrap_or(self.default_allocation)
    }

    pub fn resource_load(&self, tool_id: &str) -> f64 {
        self.resource_loads.get(tool_id).copied().unwrap_or(self.default_resource_load)
    }

    pub fn with_execution_time(mut self, tool_id: impl Into<String>, seconds: f64) -> Self {
        self.execution_times.insert(tool_id.into(), seconds);
        self
    }

    pub fn with_allocation(mut self, tool_id: impl Into<String>, allocation: ResourceAllocation) -> Self {
        self.allocations.insert(tool_id.into(), allocation);
        self
    }

    /// Applies an overlay; entries present in the overlay win
    pub fn merge(&mut self, overlay: CostOverlay) {
        if let Some(seconds) = overlay.default_execution_time {
            self.default_execution_time = seconds;
        }
        if let Some(allocation) = overlay.default_allocation {
            self.default_allocation = allocation;
        }
        if let Some(load) = overlay.default_resource_load {
            self.default_resource_load = load;
        }
        self.execution_times.extend(overlay.execution_times);
        self.allocations.extend(overlay.allocations);
        self.resource_loads.extend(overlay.resource_loads);
    }

    /// Cost model for a contract store: this model, then the store's
    /// `costs.toml`, then contract-declared execution times.
    pub fn resolve_for(&self, store: &ContractStore) -> PlannerResult<Self> {
        let mut resolved = self.clone();

        if let Some(path) = store.cost_file() {
            resolved.merge(CostOverlay::load_from_file(&path)?);
        }

        for contract in store.contracts() {
            if let Some(seconds) = contract.estimated_time {
                resolved.execution_times.insert(contract.tool_id.clone(), seconds);
            }
        }

        resolved.validate()?;
        Ok(resolved)
    }

    /// Rejects negative or non-finite times, loads and allocations
    pub fn validate(&self) -> PlannerResult<()> {
        let times = std::iter::once(("default", self.default_execution_time)).chain(self.execution_times.iter().map(|(tool, secs)| (tool.as_str(), *secs)));
        for (tool, seconds) in times {
            if !is_valid_amount(seconds) {
                return Err(PlannerError::Config(format!("execution time for {tool} must be a non-negative number, got {seconds}")));
            }
        }

        let loads = std::iter::once(("default", self.default_resource_load)).chain(self.resource_loads.iter().map(|(tool, load)| (tool.as_str(), *load)));
        for (tool, load) in loads {
            if !is_valid_amount(load) {
                return Err(PlannerError::Config(format!("resource load for {tool} must be a non-negative number, got {load}")));
            }
        }

        let allocations = std::iter::once(("default", &self.default_allocation)).chain(self.allocations.iter().map(|(tool, alloc)| (tool.as_str(), alloc)));
        for (tool, allocation) in allocations {
            let amounts = [allocation.cpu_cores, allocation.memory_mb, allocation.disk_io, allocation.network];
            if !amounts.into_iter().all(is_valid_amount) {
                return Err(PlannerError::Config(format!("allocation for {tool} must be non-negative numbers, got {allocation:?}")));
            }
        }

        Ok(())
    }
}

fn is_valid_amount(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Partial cost tables merged over a [`CostModel`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostOverlay {
    pub default_execution_time: Option<f64>,
    pub default_resource_load: Option<f64>,
    pub default_allocation: Option<ResourceAllocation>,
    pub execution_times: BTreeMap<String, f64>,
    pub allocations: BTreeMap<String, ResourceAllocation>,
    pub resource_loads: BTreeMap<String, f64>,
}

impl CostOverlay {
    pub fn load_from_file(path: &Path) -> PlannerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PlannerError::Config(format!("invalid cost file {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ToolContract;

    #[test]
    fn test_defaults_for_unknown_tools() {
        let costs = CostModel::default();
        assert_eq!(costs.execution_time("T68_PAGE_RANK"), 6.0);
        assert_eq!(costs.execution_time("UNKNOWN"), 1.0);
        assert_eq!(costs.allocation("UNKNOWN"), ResourceAllocation::new(1.0, 512.0, 1.0, 0.0));
        assert_eq!(costs.resource_load("UNKNOWN"), 1.0);
    }

    #[test]
    fn test_overlay_from_toml() {
        let overlay: CostOverlay = toml::from_str(
            r#"
default_execution_time = 0.5

[execution_times]
T68_PAGE_RANK = 12.0

[allocations.T68_PAGE_RANK]
cpu_cores = 6.0
memory_mb = 6000.0
disk_io = 1.0
network = 0.0
"#,
        )
        .unwrap();

        let mut costs = CostModel::default();
        costs.merge(overlay);
        assert_eq!(costs.default_execution_time, 0.5);
        assert_eq!(costs.execution_time("T68_PAGE_RANK"), 12.0);
        assert_eq!(costs.allocation("T68_PAGE_RANK").cpu_cores, 6.0);
        assert_eq!(costs.execution_time("T31_ENTITY_BUILDER"), 4.0);
    }

    #[test]
    fn test_contract_estimates_supersede_table() {
        let store = ContractStore::from_contracts(vec![ToolContract::new("T31_ENTITY_BUILDER").with_estimated_time(9.5)]);
        let costs = CostModel::default().resolve_for(&store).unwrap();
        assert_eq!(costs.execution_time("T31_ENTITY_BUILDER"), 9.5);
    }

    #[test]
    fn test_cost_file_cannot_introduce_invalid_times() {
        for overlay in ["[execution_times]\nA = -5.0\n", "[execution_times]\nA = nan\n", "[allocations.A]\ncpu_cores = -1.0\nmemory_mb = 1.0\ndisk_io = 0.0\nnetwork = 0.0\n"] {
            let dir = tempfile::TempDir::new().unwrap();
            std::fs::write(dir.path().join("a.yaml"), "tool_id: A\ndepends_on: []\n").unwrap();
            std::fs::write(dir.path().join(crate::contracts::COST_FILE_NAME), overlay).unwrap();

            let store = ContractStore::load_dir(dir.path()).unwrap();
            let result = CostModel::default().resolve_for(&store);
            assert!(matches!(result, Err(PlannerError::Config(_))), "overlay accepted: {overlay}");
        }
    }

    #[test]
    fn test_allocation_sum_and_limits() {
        let total: ResourceAllocation = [ResourceAllocation::new(4.0, 4000.0, 1.0, 0.0), ResourceAllocation::new(4.0, 4000.0, 1.0, 1.0)].into_iter().sum();
        assert_eq!(total, ResourceAllocation::new(8.0, 8000.0, 2.0, 1.0));
        assert!(total.fits_within(&SystemLimits::default()));
        assert!(!(total + ResourceAllocation::new(1.0, 0.0, 0.0, 0.0)).fits_within(&SystemLimits::default()));
    }
}
