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

//! Toolplan Core Library
//!
//! Contract-driven parallel execution planning for pipeline tools. Tool
//! contracts declare dependencies and resource tags; the planner levels the
//! dependency graph, finds conflict-free groups per level and schedules them
//! on an absolute timeline.

pub mod cliques;
pub mod config;
pub mod conflicts;
pub mod contracts;
pub mod costs;
pub mod error;
pub mod execution_graph;
pub mod graph;
pub mod optimizer;
pub mod parallel;
pub mod programmatic;
pub mod resources;
pub mod usage;

// Re-export the types most callers need
pub use config::PlannerConfig;
pub use conflicts::{ConflictResult, ConflictType, Override, PairReport, ResourceConflictAnalyzer, Severity, UnknownToolPolicy, Verdict};
pub use contracts::{ContractAnalyzer, ContractStore, ToolContract, validate_contract};
pub use costs::{CostModel, ResourceAllocation, SystemLimits};
pub use error::{ContractError, PlannerError, PlannerResult};
pub use execution_graph::{DependencyGraphBuilder, ExecutionLevel, LevelPlan};
pub use graph::DependencyGraph;
pub use optimizer::{ExecutionPlanOptimizer, OptimizationStrategy, OptimizedExecutionPlan, ScheduledTask};
pub use parallel::{ExecutionPlan, ParallelGroup, ParallelOpportunityFinder};
pub use programmatic::{DependencyAnalysis, ProgrammaticDependencyAnalyzer, Workflow, WorkflowStep};
pub use resources::ResourceUsage;
pub use usage::{ConcurrencyReport, ConcurrencySafety, ResourceUsageDetector, ToolResourceProfile};
