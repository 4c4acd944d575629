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

//! Typed resource profiling for safety classification and cost estimation

use crate::config::PlannerConfig;
use crate::conflicts::UnknownToolPolicy;
use crate::contracts::ContractAnalyzer;
use crate::costs::CostModel;
use crate::resources::ResourceUsage;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Extra load charged per database write
const DATABASE_WRITE_LOAD: f64 = 0.5;

const NETWORK_MARKERS: [&str; 4] = ["llm", "openai", "gemini", "api"];
const MEMORY_MARKERS: [&str; 2] = ["spacy", "model"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Database,
    FileSystem,
    Memory,
    Network,
    SharedService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPattern {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    Create,
    Delete,
}

impl AccessPattern {
    pub fn writes(self) -> bool {
        !matches!(self, AccessPattern::ReadOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    Low,
    Medium,
    High,
}

/// One typed resource access of a tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceAccess {
    pub resource_type: ResourceType,
    pub resource_name: String,
    pub access_pattern: AccessPattern,
    pub concurrent_safe: bool,
    pub criticality: Criticality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencySafety {
    Safe,
    Caution,
    Unsafe,
}

/// Full profile of one tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResourceProfile {
    pub tool_id: String,
    pub accesses: Vec<ResourceAccess>,
    pub concurrency_safety: ConcurrencySafety,
    pub estimated_resource_load: f64,
    /// False when the tool has no contract and the profile is empty
    pub has_contract: bool,
}

impl ToolResourceProfile {
    pub fn database_writes(&self) -> usize {
        self.accesses
            .iter()
            .filter(|access| access.resource_type == ResourceType::Database && access.access_pattern.writes())
            .count()
    }

    pub fn unsafe_accesses(&self) -> impl Iterator<Item = &ResourceAccess> {
        self.accesses.iter().filter(|access| !access.concurrent_safe)
    }
}

/// Tools bucketed by safety verdict
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConcurrencyReport {
    pub safe: Vec<String>,
    pub caution: Vec<String>,
    #[serde(rename = "unsafe")]
    pub unsafe_tools: Vec<String>,
}

impl ConcurrencyReport {
    pub fn total(&self) -> usize {
        self.safe.len() + self.caution.len() + self.unsafe_tools.len()
    }
}

pub struct ResourceUsageDetector<'a> {
    analyzer: &'a ContractAnalyzer,
    costs: &'a CostModel,
    denylist: BTreeSet<String>,
    unknown_tool_policy: UnknownToolPolicy,
}

impl<'a> ResourceUsageDetector<'a> {
    pub fn new(analyzer: &'a ContractAnalyzer, costs: &'a CostModel, config: &PlannerConfig) -> Self {
        Self {
            analyzer,
            costs,
            denylist: config.shared_state_denylist.iter().cloned().collect(),
            unknown_tool_policy: config.unknown_tool_policy,
        }
    }

    /// Profiles one tool.
    ///
    /// A tool without a contract has no accesses; it is `Unsafe` under the
    /// conservative unknown-tool policy and `Safe` under the permissive one.
    pub fn profile(&self, tool_id: &str) -> ToolResourceProfile {
        let contract = self.analyzer.store().get(tool_id);
        let mut accesses = Vec::new();

        if let Some(contract) = contract {
            let usage = self.analyzer.extract_resources(contract);
            accesses.extend(self.typed_accesses(&usage));

            let tags: BTreeSet<String> = contract.dependencies.iter().map(|tag| tag.to_lowercase()).collect();
            for tag in &tags {
                if NETWORK_MARKERS.iter().any(|marker| tag.contains(marker)) {
                    accesses.push(access(ResourceType::Network, tag, AccessPattern::ReadWrite, true, Criticality::Low));
                } else if MEMORY_MARKERS.iter().any(|marker| tag.contains(marker)) {
                    accesses.push(access(ResourceType::Memory, tag, AccessPattern::ReadOnly, true, Criticality::Low));
                }
            }
        }

        let concurrency_safety = match (contract, self.unknown_tool_policy) {
            (None, UnknownToolPolicy::Conservative) => ConcurrencySafety::Unsafe,
            _ => classify(&accesses),
        };
        let database_writes = accesses
            .iter()
            .filter(|access| access.resource_type == ResourceType::Database && access.access_pattern.writes())
            .count();
        let estimated_resource_load = self.costs.resource_load(tool_id) + DATABASE_WRITE_LOAD * database_writes as f64;

        debug!(tool_id, ?concurrency_safety, estimated_resource_load, "Profiled tool");

        ToolResourceProfile {
            tool_id: tool_id.to_string(),
            accesses,
            concurrency_safety,
            estimated_resource_load,
            has_contract: contract.is_some(),
        }
    }

    fn typed_accesses(&self, usage: &ResourceUsage) -> Vec<ResourceAccess> {
        let mut accesses = Vec::new();

        for (name, pattern) in merge_patterns(&usage.database_reads(), &usage.database_writes()) {
            let criticality = if pattern.writes() { Criticality::Medium } else { Criticality::Low };
            accesses.push(access(ResourceType::Database, name, pattern, !pattern.writes(), criticality));
        }

        for (name, pattern) in merge_patterns(&usage.file_reads(), &usage.file_writes()) {
            let criticality = if pattern.writes() { Criticality::Medium } else { Criticality::Low };
            accesses.push(access(ResourceType::FileSystem, name, pattern, !pattern.writes(), criticality));
        }

        for service in usage.services() {
            let denied = self.denylist.contains(service);
            let criticality = if denied { Criticality::High } else { Criticality::Low };
            accesses.push(access(ResourceType::SharedService, service, AccessPattern::ReadWrite, !denied, criticality));
        }

        accesses
    }

    /// Profiles every tool in the contract store
    pub fn detect_all(&self) -> BTreeMap<String, ToolResourceProfile> {
        self.analyzer
            .store()
            .tool_ids()
            .map(|tool_id| (tool_id.to_string(), self.profile(tool_id)))
            .collect()
    }

    pub fn concurrency_report(&self) -> ConcurrencyReport {
        let mut report = ConcurrencyReport::default();
        for (tool_id, profile) in self.detect_all() {
            match profile.concurrency_safety {
                ConcurrencySafety::Safe => report.safe.push(tool_id),
                ConcurrencySafety::Caution => report.caution.push(tool_id),
                ConcurrencySafety::Unsafe => report.unsafe_tools.push(tool_id),
            }
        }
        report
    }
}

fn access(resource_type: ResourceType, name: &str, access_pattern: AccessPattern, concurrent_safe: bool, criticality: Criticality) -> ResourceAccess {
    ResourceAccess {
        resource_type,
        resource_name: name.to_string(),
        access_pattern,
        concurrent_safe,
        criticality,
    }
}

fn merge_patterns<'s>(reads: &BTreeSet<&'s str>, writes: &BTreeSet<&'s str>) -> Vec<(&'s str, AccessPattern)> {
    reads
        .union(writes)
        .map(|name| {
            let pattern = match (reads.contains(name), writes.contains(name)) {
                (true, true) => AccessPattern::ReadWrite,
                (false, true) => AccessPattern::WriteOnly,
                _ => AccessPattern::ReadOnly,
            };
            (*name, pattern)
        })
        .collect()
}

fn classify(accesses: &[ResourceAccess]) -> ConcurrencySafety {
    let database_writes = accesses
        .iter()
        .filter(|access| access.resource_type == ResourceType::Database && access.access_pattern.writes())
        .count();
    let high_risk = accesses.iter().any(|access| !access.concurrent_safe && access.criticality == Criticality::High);
    let any_unsafe = accesses.iter().any(|access| !access.concurrent_safe);

    if high_risk || database_writes > 1 {
        ConcurrencySafety::Unsafe
    } else if any_unsafe || database_writes == 1 {
        ConcurrencySafety::Caution
    } else {
        ConcurrencySafety::Safe
    }
}
