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

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use toolplan_core::{OptimizationStrategy, PlannerConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::CommandContext;

#[derive(Parser, Debug)]
#[command(name = "toolplan", about = "Contract-driven parallel execution planning for pipeline tools")]
pub struct Cli {
    /// Path to configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Contracts directory (overrides $TOOLPLAN_CONTRACTS_DIR)
    #[arg(long, global = true)]
    pub contracts_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands for toolplan
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the dependency graph of the whole store, or of the listed tools and their dependencies
    Graph {
        /// Tools to build the minimal graph for
        tools: Vec<String>,
    },

    /// Show the pairwise conflict matrix and every safe pair
    Conflicts {
        /// Restrict the matrix to these tools
        tools: Vec<String>,
    },

    /// Profile resource usage and concurrency safety of every tool
    Profile,

    /// Group and schedule the listed tools and their dependencies
    Plan {
        #[arg(required = true)]
        tools: Vec<String>,

        /// Scheduling strategy: makespan or balance
        #[arg(long, default_value = "makespan")]
        strategy: String,
    },

    /// Analyze a workflow file of steps with their own depends_on
    Analyze {
        /// Path to the workflow YAML file
        workflow: PathBuf,

        /// Also schedule the workflow with this strategy
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Logs go to stderr so JSON output stays parseable
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Load configuration
    let config = PlannerConfig::resolve(cli.config, cli.contracts_dir)?;
    debug!(contracts_dir = %config.contracts_dir.display(), "Configuration resolved");

    // Create command context
    let ctx = CommandContext::new(config, cli.json);

    // Dispatch commands
    match cli.command {
        Commands::Graph { tools } => {
            commands::graph::show_graph(&ctx, &tools)?;
        }
        Commands::Conflicts { tools } => {
            commands::conflicts::show_conflicts(&ctx, &tools)?;
        }
        Commands::Profile => {
            commands::profile::show_profiles(&ctx)?;
        }
        Commands::Plan { tools, strategy } => {
            commands::plan::show_plan(&ctx, &tools, strategy.parse::<OptimizationStrategy>()?)?;
        }
        Commands::Analyze { workflow, strategy } => {
            let strategy = strategy.map(|s| s.parse::<OptimizationStrategy>()).transpose()?;
            commands::analyze::analyze_workflow(&ctx, &workflow, strategy)?;
        }
        Commands::Config => {
            commands::show_config(&ctx)?;
        }
    }

    Ok(())
}
