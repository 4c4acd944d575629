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

//! Pairwise resource-conflict analysis
//!
//! Two tools may run concurrently when they do not write the same database,
//! do not write a database the other reads, do not write the same file
//! resource and do not share a service on the denylist. A configured override
//! for the pair replaces that verdict.

use crate::config::PlannerConfig;
use crate::contracts::ContractAnalyzer;
use crate::resources::ResourceUsage;
use metrics::counter;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Kind of resource conflict between two tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    None,
    DatabaseWriteConflict,
    DatabaseReadWriteConflict,
    FileWriteConflict,
    SharedStateConflict,
    /// At least one tool has no contract to analyze
    UnknownResources,
    /// Vetoed by a configured override
    BusinessRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Verdict of one conflict check for a pair of tools
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictResult {
    pub tool_a: String,
    pub tool_b: String,
    pub conflict_type: ConflictType,
    pub has_conflict: bool,
    pub details: String,
    pub severity: Severity,
}

impl ConflictResult {
    fn clear(tool_a: &str, tool_b: &str, details: impl Into<String>) -> Self {
        Self {
            tool_a: tool_a.to_string(),
            tool_b: tool_b.to_string(),
            conflict_type: ConflictType::None,
            has_conflict: false,
            details: details.into(),
            severity: Severity::Low,
        }
    }

    fn conflict(tool_a: &str, tool_b: &str, conflict_type: ConflictType, severity: Severity, details: impl Into<String>) -> Self {
        Self {
            tool_a: tool_a.to_string(),
            tool_b: tool_b.to_string(),
            conflict_type,
            has_conflict: true,
            details: details.into(),
            severity,
        }
    }
}

/// Forced verdict for a pair of tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Treat the pair as safe regardless of detected conflicts
    Allow,
    /// Never run the pair concurrently
    Deny,
}

/// Business-logic entry in the override table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    /// Unordered pair of tool ids
    pub pair: (String, String),
    pub verdict: Verdict,
    pub rationale: String,
}

impl Override {
    pub fn new(tool_a: impl Into<String>, tool_b: impl Into<String>, verdict: Verdict, rationale: impl Into<String>) -> Self {
        Self {
            pair: (tool_a.into(), tool_b.into()),
            verdict,
            rationale: rationale.into(),
        }
    }

    pub fn matches(&self, tool_a: &str, tool_b: &str) -> bool {
        let (a, b) = (&self.pair.0, &self.pair.1);
        (a == tool_a && b == tool_b) || (a == tool_b && b == tool_a)
    }
}

/// How tools without a contract are judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownToolPolicy {
    /// A tool with no contract conflicts with every other tool
    #[default]
    Conservative,
    /// A tool with no contract has an empty profile and never conflicts
    Permissive,
}

/// Every check for one pair, composed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairReport {
    pub tool_a: String,
    pub tool_b: String,
    /// Checks that found a conflict
    pub conflicts: Vec<ConflictResult>,
    /// Override consulted for the final verdict, if any
    pub override_applied: Option<Override>,
    pub can_run_in_parallel: bool,
}

impl PairReport {
    /// Most severe detected conflict
    pub fn worst_conflict(&self) -> Option<&ConflictResult> {
        self.conflicts.iter().max_by_key(|conflict| conflict.severity)
    }
}

/// Tool -> tool -> can run concurrently (diagonal omitted)
pub type ConflictMatrix = BTreeMap<String, BTreeMap<String, bool>>;

/// Decides whether pairs of tools may execute concurrently
pub struct ResourceConflictAnalyzer<'a> {
    analyzer: &'a ContractAnalyzer,
    overrides: Vec<Override>,
    shared_state_denylist: BTreeSet<String>,
    unknown_tool_policy: UnknownToolPolicy,
    verdict_cache: RwLock<HashMap<(String, String), bool>>,
}

impl<'a> ResourceConflictAnalyzer<'a> {
    pub fn new(analyzer: &'a ContractAnalyzer, config: &PlannerConfig) -> Self {
        Self {
            analyzer,
            overrides: config.overrides.clone(),
            shared_state_denylist: config.shared_state_denylist.iter().cloned().collect(),
            unknown_tool_policy: config.unknown_tool_policy,
            verdict_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn contract_analyzer(&self) -> &'a ContractAnalyzer {
        self.analyzer
    }

    fn usage(&self, tool_id: &str) -> ResourceUsage {
        self.analyzer.resource_usage(tool_id).unwrap_or_default()
    }

    /// Database write/write and write/read overlaps
    pub fn analyze_database_conflicts(&self, tool_a: &str, tool_b: &str) -> ConflictResult {
        database_conflict(tool_a, tool_b, &self.usage(tool_a), &self.usage(tool_b))
    }

    /// File write/write overlaps; shared reads are always safe
    pub fn analyze_file_conflicts(&self, tool_a: &str, tool_b: &str) -> ConflictResult {
        file_conflict(tool_a, tool_b, &self.usage(tool_a), &self.usage(tool_b))
    }

    /// Shared services used by both tools that are on the denylist
    pub fn analyze_shared_state_conflicts(&self, tool_a: &str, tool_b: &str) -> ConflictResult {
        let usage_a = self.usage(tool_a);
        let usage_b = self.usage(tool_b);
        let shared: BTreeSet<&str> = usage_a.services().intersection(&usage_b.services()).copied().collect();
        let denied: Vec<&str> = shared.iter().copied().filter(|service| self.shared_state_denylist.contains(*service)).collect();

        if !denied.is_empty() {
            return ConflictResult::conflict(
                tool_a,
                tool_b,
                ConflictType::SharedStateConflict,
                Severity::Medium,
                format!("both use {} which does not tolerate concurrent callers", denied.join(", ")),
            );
        }

        if shared.is_empty() {
            ConflictResult::clear(tool_a, tool_b, "no shared services")
        } else {
            let names: Vec<&str> = shared.into_iter().collect();
            ConflictResult::clear(tool_a, tool_b, format!("shared services {} handle their own concurrency", names.join(", ")))
        }
    }

    /// Override entry for the pair, if configured
    pub fn find_override(&self, tool_a: &str, tool_b: &str) -> Option<&Override> {
        self.overrides.iter().find(|entry| entry.matches(tool_a, tool_b))
    }

    /// Runs every check for the pair and composes the verdict
    pub fn analyze_pair(&self, tool_a: &str, tool_b: &str) -> PairReport {
        let mut conflicts = Vec::new();

        if self.unknown_tool_policy == UnknownToolPolicy::Conservative {
            let unknown: Vec<&str> = [tool_a, tool_b].into_iter().filter(|tool| !self.analyzer.store().contains(tool)).collect();
            if !unknown.is_empty() {
                conflicts.push(ConflictResult::conflict(
                    tool_a,
                    tool_b,
                    ConflictType::UnknownResources,
                    Severity::Medium,
                    format!("no contract for {}; resource usage cannot be analyzed", unknown.join(", ")),
                ));
            }
        }

        for result in [
            self.analyze_database_conflicts(tool_a, tool_b),
            self.analyze_file_conflicts(tool_a, tool_b),
            self.analyze_shared_state_conflicts(tool_a, tool_b),
        ] {
            if result.has_conflict {
                conflicts.push(result);
            }
        }

        let override_applied = self.find_override(tool_a, tool_b).cloned();
        let can_run_in_parallel = match &override_applied {
            Some(entry) if entry.verdict == Verdict::Allow => true,
            Some(entry) => {
                conflicts.push(ConflictResult::conflict(tool_a, tool_b, ConflictType::BusinessRule, Severity::High, entry.rationale.clone()));
                false
            }
            None => conflicts.is_empty(),
        };

        if !conflicts.is_empty() {
            counter!("toolplan_conflicts_detected", 1);
        }
        debug!(tool_a, tool_b, can_run_in_parallel, conflicts = conflicts.len(), "Analyzed tool pair");

        PairReport {
            tool_a: tool_a.to_string(),
            tool_b: tool_b.to_string(),
            conflicts,
            override_applied,
            can_run_in_parallel,
        }
    }

    /// True iff the pair may execute concurrently. Symmetric and cached.
    pub fn can_run_in_parallel(&self, tool_a: &str, tool_b: &str) -> bool {
        if tool_a == tool_b {
            return false;
        }

        let key = ordered_pair(tool_a, tool_b);
        if let Some(verdict) = self.verdict_cache.read().get(&key) {
            return *verdict;
        }

        let verdict = self.analyze_pair(&key.0, &key.1).can_run_in_parallel;
        self.verdict_cache.write().insert(key, verdict);
        verdict
    }

    /// Pairwise verdicts over every tool in the contract store
    pub fn get_conflict_matrix(&self) -> ConflictMatrix {
        let tools: Vec<String> = self.analyzer.store().tool_ids().map(str::to_string).collect();
        self.conflict_matrix_for(&tools)
    }

    pub fn conflict_matrix_for(&self, tools: &[String]) -> ConflictMatrix {
        let mut matrix = ConflictMatrix::new();
        for tool_a in tools {
            let row = matrix.entry(tool_a.clone()).or_default();
            for tool_b in tools {
                if tool_a != tool_b {
                    row.insert(tool_b.clone(), self.can_run_in_parallel(tool_a, tool_b));
                }
            }
        }
        matrix
    }

    /// Every unordered pair of store tools that may run concurrently
    pub fn get_safe_parallel_pairs(&self) -> Vec<(String, String)> {
        let tools: Vec<String> = self.analyzer.store().tool_ids().map(str::to_string).collect();
        self.safe_pairs_among(&tools)
    }

    pub fn safe_pairs_among(&self, tools: &[String]) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (i, tool_a) in tools.iter().enumerate() {
            for tool_b in &tools[i + 1..] {
                if self.can_run_in_parallel(tool_a, tool_b) {
                    pairs.push((tool_a.clone(), tool_b.clone()));
                }
            }
        }
        pairs
    }

    /// Warns about overrides that name tools missing from the store
    pub fn dangling_overrides(&self) -> Vec<String> {
        let store = self.analyzer.store();
        let dangling: Vec<String> = self
            .overrides
            .iter()
            .filter(|entry| !store.contains(&entry.pair.0) || !store.contains(&entry.pair.1))
            .map(|entry| format!("override {} / {} names a tool without a contract", entry.pair.0, entry.pair.1))
            .collect();
        for message in &dangling {
            warn!("{}", message);
        }
        dangling
    }
}

fn ordered_pair(tool_a: &str, tool_b: &str) -> (String, String) {
    if tool_a <= tool_b {
        (tool_a.to_string(), tool_b.to_string())
    } else {
        (tool_b.to_string(), tool_a.to_string())
    }
}

fn database_conflict(tool_a: &str, tool_b: &str, usage_a: &ResourceUsage, usage_b: &ResourceUsage) -> ConflictResult {
    let writes_a = usage_a.database_writes();
    let writes_b = usage_b.database_writes();

    let both_write: Vec<&str> = writes_a.intersection(&writes_b).copied().collect();
    if !both_write.is_empty() {
        return ConflictResult::conflict(
            tool_a,
            tool_b,
            ConflictType::DatabaseWriteConflict,
            Severity::High,
            format!("both write to {}", both_write.join(", ")),
        );
    }

    let reads_a = usage_a.database_reads();
    let reads_b = usage_b.database_reads();
    let read_write: BTreeSet<&str> = writes_a.intersection(&reads_b).chain(writes_b.intersection(&reads_a)).copied().collect();
    if !read_write.is_empty() {
        let names: Vec<&str> = read_write.into_iter().collect();
        return ConflictResult::conflict(
            tool_a,
            tool_b,
            ConflictType::DatabaseReadWriteConflict,
            Severity::Medium,
            format!("one writes {} while the other reads it", names.join(", ")),
        );
    }

    ConflictResult::clear(tool_a, tool_b, "no database overlap")
}

fn file_conflict(tool_a: &str, tool_b: &str, usage_a: &ResourceUsage, usage_b: &ResourceUsage) -> ConflictResult {
    let both_write: Vec<&str> = usage_a.file_writes().intersection(&usage_b.file_writes()).copied().collect();
    if both_write.is_empty() {
        ConflictResult::clear(tool_a, tool_b, "no file write overlap")
    } else {
        ConflictResult::conflict(
            tool_a,
            tool_b,
            ConflictType::FileWriteConflict,
            Severity::High,
            format!("both write {}", both_write.join(", ")),
        )
    }
}
