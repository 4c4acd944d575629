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

//! Planner configuration
//!
//! Resolution order mirrors the CLI: an explicit TOML file, else
//! `$TOOLPLAN_CONFIG`, else defaults; the contracts directory may then be
//! overridden by a flag or `$TOOLPLAN_CONTRACTS_DIR`.

use crate::conflicts::{Override, UnknownToolPolicy, Verdict};
use crate::costs::{CostModel, SystemLimits};
use crate::error::{PlannerError, PlannerResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a configuration file
pub const CONFIG_ENV: &str = "TOOLPLAN_CONFIG";

/// Environment variable overriding the contracts directory
pub const CONTRACTS_DIR_ENV: &str = "TOOLPLAN_CONTRACTS_DIR";

/// Default contracts directory, relative to the project root
pub const DEFAULT_CONTRACTS_DIR: &str = "contracts/tools";

/// Configuration shared by every planner component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Directory holding one YAML contract per tool
    pub contracts_dir: PathBuf,
    /// How tools without a contract are treated by conflict analysis
    pub unknown_tool_policy: UnknownToolPolicy,
    /// Instants sampled when computing resource utilization
    pub utilization_samples: usize,
    /// Shared services that do not tolerate concurrent callers
    pub shared_state_denylist: Vec<String>,
    /// Capacity used for resource-constraint checks
    pub limits: SystemLimits,
    /// Execution-time and allocation tables
    pub costs: CostModel,
    /// Known-safe and known-unsafe tool pairs
    pub overrides: Vec<Override>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            contracts_dir: PathBuf::from(DEFAULT_CONTRACTS_DIR),
            unknown_tool_policy: UnknownToolPolicy::Conservative,
            utilization_samples: 100,
            shared_state_denylist: vec!["identity_service".to_string()],
            limits: SystemLimits::default(),
            costs: CostModel::default(),
            overrides: vec![Override::new(
                "T31_ENTITY_BUILDER",
                "T34_EDGE_BUILDER",
                Verdict::Allow,
                "entity and edge builders write disjoint graph substructures",
            )],
        }
    }
}

impl PlannerConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contracts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.contracts_dir = dir.into();
        self
    }

    pub fn with_limits(mut self, limits: SystemLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_costs(mut self, costs: CostModel) -> Self {
        self.costs = costs;
        self
    }

    pub fn with_override(mut self, entry: Override) -> Self {
        self.overrides.push(entry);
        self
    }

    pub fn with_unknown_tool_policy(mut self, policy: UnknownToolPolicy) -> Self {
        self.unknown_tool_policy = policy;
        self
    }

    pub fn with_shared_state_denylist<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared_state_denylist = services.into_iter().map(Into::into).collect();
        self
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> PlannerResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| PlannerError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> PlannerResult<String> {
        toml::to_string_pretty(self).map_err(|e| PlannerError::Config(e.to_string()))
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> PlannerResult<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Resolves the effective configuration from CLI arguments and the environment
    pub fn resolve(cli_config: Option<PathBuf>, cli_contracts_dir: Option<PathBuf>) -> PlannerResult<Self> {
        let mut config = if let Some(config_path) = cli_config {
            Self::load_from_file(config_path)?
        } else if let Ok(env_config) = std::env::var(CONFIG_ENV) {
            Self::load_from_file(env_config)?
        } else {
            Self::default()
        };

        // CLI contracts dir overrides environment settings
        if let Some(dir) = cli_contracts_dir {
            config.contracts_dir = dir;
        } else if let Ok(env_dir) = std::env::var(CONTRACTS_DIR_ENV) {
            config.contracts_dir = PathBuf::from(env_dir);
        }

        Ok(config)
    }

    /// Rejects limits and sample counts the optimizer cannot work with
    pub fn validate(&self) -> PlannerResult<()> {
        if self.limits.cpu_cores <= 0.0 || self.limits.memory_mb <= 0.0 {
            return Err(PlannerError::Config("system limits must be positive".to_string()));
        }
        if self.utilization_samples == 0 {
            return Err(PlannerError::Config("utilization_samples must be at least 1".to_string()));
        }
        self.costs.validate()
    }
}
