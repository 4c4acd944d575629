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

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use toolplan_core::cliques::clique_cover;
use toolplan_core::{
    ContractAnalyzer, ContractStore, CostModel, ExecutionPlanOptimizer, OptimizationStrategy, ParallelOpportunityFinder, PlannerConfig,
    ResourceConflictAnalyzer, ToolContract,
};

/// Layered pipeline: `width` tools per layer, each depending on the whole previous layer
fn layered_contracts(layers: usize, width: usize) -> Vec<ToolContract> {
    let mut contracts = Vec::with_capacity(layers * width);
    for layer in 0..layers {
        for slot in 0..width {
            let depends_on: Vec<String> = if layer == 0 { Vec::new() } else { (0..width).map(|prev| format!("L{}_{prev}", layer - 1)).collect() };
            let tags: Vec<&str> = match slot % 4 {
                0 => vec!["neo4j-write"],
                1 => vec!["neo4j-read"],
                2 => vec!["quality_service"],
                _ => Vec::new(),
            };
            contracts.push(ToolContract::new(format!("L{layer}_{slot}")).depends_on(depends_on).with_dependencies(tags));
        }
    }
    contracts
}

fn benchmark_clique_cover(c: &mut Criterion) {
    let mut group = c.benchmark_group("clique_cover");
    for size in [4usize, 8, 12, 16] {
        let tools: Vec<String> = (0..size).map(|i| format!("T{i}")).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &tools, |b, tools| {
            // Every third pair conflicts
            b.iter(|| clique_cover(black_box(tools), |x, y| (x.len() + y.len() + x.as_bytes()[1] as usize) % 3 != 0));
        });
    }
    group.finish();
}

fn benchmark_plan_optimization(c: &mut Criterion) {
    let analyzer = ContractAnalyzer::new(ContractStore::from_contracts(layered_contracts(6, 8)));
    let config = PlannerConfig::default();
    let costs = CostModel::default();
    let graph = match analyzer.build_dependency_graph() {
        Ok(graph) => graph,
        Err(e) => panic!("benchmark graph must be acyclic: {e}"),
    };

    c.bench_function("dependency_graph", |b| b.iter(|| analyzer.build_dependency_graph()));

    c.bench_function("grouped_plan", |b| {
        b.iter(|| {
            let conflicts = ResourceConflictAnalyzer::new(&analyzer, &config);
            ParallelOpportunityFinder::new(&conflicts, &costs).optimize_execution_plan(black_box(&graph))
        })
    });

    for strategy in [OptimizationStrategy::MinimizeMakespan, OptimizationStrategy::BalanceResources] {
        c.bench_function(&format!("schedule_{strategy}"), |b| {
            b.iter(|| {
                let conflicts = ResourceConflictAnalyzer::new(&analyzer, &config);
                ExecutionPlanOptimizer::new(&conflicts, &costs, &config).optimize_execution_plan(black_box(&graph), strategy)
            })
        });
    }
}

criterion_group!(benches, benchmark_clique_cover, benchmark_plan_optimization);
criterion_main!(benches);
