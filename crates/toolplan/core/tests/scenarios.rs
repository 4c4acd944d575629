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

//! End-to-end planning scenarios over contract directories on disk

mod common;

use common::{contracts_dir, facade, ids, load_analyzer, write_contract};
use std::path::Path;
use toolplan_core::{
    CostModel, DependencyGraphBuilder, ExecutionPlanOptimizer, OptimizationStrategy, ParallelOpportunityFinder, PlannerConfig, PlannerError,
    ProgrammaticDependencyAnalyzer, ResourceConflictAnalyzer, Workflow, WorkflowStep,
};

#[test]
fn test_fork_groups_siblings() {
    let dir = contracts_dir(&[("A", &[], &[]), ("B", &["A"], &[]), ("C", &["A"], &[])]);
    let analyzer = load_analyzer(&dir);
    let config = PlannerConfig::default();

    let graph = analyzer.build_dependency_graph().unwrap();
    assert_eq!(graph.level_of("A"), Some(0));
    assert_eq!(graph.level_of("B"), Some(1));
    assert_eq!(graph.level_of("C"), Some(1));

    let conflicts = ResourceConflictAnalyzer::new(&analyzer, &config);
    let costs = CostModel::default();
    let plan = ParallelOpportunityFinder::new(&conflicts, &costs).optimize_execution_plan(&graph);

    let level_one: Vec<_> = plan.groups_at(1).collect();
    assert_eq!(level_one.len(), 1);
    assert_eq!(level_one[0].tools, ids(&["B", "C"]));
    assert_eq!(plan.level_parallelization_ratio(1), 1.0);
}

#[test]
fn test_shared_database_writers_stay_apart() {
    let dir = contracts_dir(&[("A", &[], &[]), ("B", &["A"], &["neo4j-write"]), ("C", &["A"], &["neo4j-write"])]);
    let analyzer = load_analyzer(&dir);
    let config = PlannerConfig::default();
    let conflicts = ResourceConflictAnalyzer::new(&analyzer, &config);
    let costs = CostModel::default();

    let plan = ParallelOpportunityFinder::new(&conflicts, &costs).optimize_execution_plan(&analyzer.build_dependency_graph().unwrap());
    let level_one: Vec<_> = plan.groups_at(1).collect();
    assert_eq!(level_one.len(), 2);
    assert!(level_one.iter().all(|group| group.len() == 1));
    assert_eq!(plan.level_parallelization_ratio(1), 0.0);
}

#[test]
fn test_three_cycle_is_rejected() {
    let dir = contracts_dir(&[("A", &["C"], &[]), ("B", &["A"], &[]), ("C", &["B"], &[])]);
    let analyzer = load_analyzer(&dir);

    match analyzer.build_dependency_graph() {
        Err(PlannerError::CircularDependency { tools }) => assert_eq!(tools, ids(&["A", "B", "C"])),
        other => panic!("expected a cycle error, got {other:?}"),
    }
}

#[test]
fn test_required_tool_pulls_in_chain() {
    let dir = contracts_dir(&[("X", &["Y"], &[]), ("Y", &["Z"], &[]), ("Z", &[], &[]), ("W", &[], &[])]);
    let analyzer = load_analyzer(&dir);
    let costs = CostModel::default();

    let graph = DependencyGraphBuilder::new(&analyzer, &costs).build_execution_graph(&ids(&["X"])).unwrap();
    assert_eq!(graph.nodes.iter().cloned().collect::<Vec<_>>(), ids(&["X", "Y", "Z"]));
}

#[test]
fn test_denylisted_service_conflicts() {
    let dir = contracts_dir(&[("P", &[], &["identity_service"]), ("Q", &[], &["identity_service"])]);
    let analyzer = load_analyzer(&dir);
    let config = PlannerConfig::default();
    let conflicts = ResourceConflictAnalyzer::new(&analyzer, &config);

    assert!(conflicts.analyze_shared_state_conflicts("P", "Q").has_conflict);
    assert!(!conflicts.can_run_in_parallel("Q", "P"));
}

#[test]
fn test_graph_building_is_idempotent() {
    let dir = contracts_dir(&[("A", &[], &[]), ("B", &["A"], &[]), ("C", &["A", "B"], &[]), ("D", &[], &[])]);
    let analyzer = load_analyzer(&dir);

    let first = analyzer.build_dependency_graph().unwrap();
    let second = analyzer.build_dependency_graph().unwrap();
    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.edges, second.edges);
    assert_eq!(first.levels, second.levels);
}

#[test]
fn test_malformed_contract_is_skipped() {
    let dir = contracts_dir(&[("A", &[], &[]), ("B", &["A"], &[])]);
    std::fs::write(dir.path().join("broken.yaml"), "tool_id: [not, a, string\n").unwrap();
    std::fs::write(dir.path().join("no_deps.yaml"), "tool_id: LONELY\n").unwrap();

    let analyzer = load_analyzer(&dir);
    assert_eq!(analyzer.store().len(), 2);
    assert_eq!(analyzer.store().diagnostics().len(), 2);
    assert!(analyzer.build_dependency_graph().is_ok());
}

#[test]
fn test_skipped_contract_travels_with_every_result() {
    let dir = contracts_dir(&[("A", &[], &[]), ("B", &["A"], &[])]);
    std::fs::write(dir.path().join("c.yaml"), "tool_id: C\ndepends_on: [A, A]\n").unwrap();
    let facade = facade(&dir);
    let tools = ids(&["B", "C"]);

    let names_file = |diagnostics: &[String]| diagnostics.iter().any(|d| d.contains("c.yaml") && d.contains("more than once"));

    let plan = facade.execution_plan(&tools).unwrap();
    assert!(names_file(&plan.diagnostics));
    assert!(plan.diagnostics.contains(&"required tool C: contract rejected, skipped".to_string()));

    let schedule = facade.optimize(&tools, OptimizationStrategy::MinimizeMakespan).unwrap();
    assert!(names_file(&schedule.diagnostics));

    let analysis = facade.analyze_dependencies(&[WorkflowStep::new("B"), WorkflowStep::new("C")]).unwrap();
    assert!(names_file(&analysis.diagnostics));
}

#[test]
fn test_negative_cost_file_entry_is_rejected() {
    let dir = contracts_dir(&[("A", &[], &[]), ("B", &["A"], &[])]);
    std::fs::write(dir.path().join("costs.toml"), "[execution_times]\nA = -5.0\n").unwrap();

    let result = ProgrammaticDependencyAnalyzer::from_config(PlannerConfig::default().with_contracts_dir(dir.path()));
    assert!(matches!(result, Err(PlannerError::Config(_))));
}

#[test]
fn test_pipeline_schedule_respects_dependencies() {
    let dir = contracts_dir(&[
        ("T01_PDF_LOADER", &[], &[]),
        ("T15A_TEXT_CHUNKER", &["T01_PDF_LOADER"], &[]),
        ("T23A_SPACY_NER", &["T15A_TEXT_CHUNKER"], &["spacy"]),
        ("T27_RELATIONSHIP_EXTRACTOR", &["T15A_TEXT_CHUNKER"], &["litellm"]),
        ("T31_ENTITY_BUILDER", &["T23A_SPACY_NER"], &["neo4j", "identity_service"]),
        ("T34_EDGE_BUILDER", &["T27_RELATIONSHIP_EXTRACTOR"], &["neo4j"]),
        ("T68_PAGE_RANK", &["T31_ENTITY_BUILDER", "T34_EDGE_BUILDER"], &["neo4j"]),
        ("T49_MULTI_HOP_QUERY", &["T68_PAGE_RANK"], &["neo4j-read"]),
    ]);
    let analyzer = load_analyzer(&dir);
    let config = PlannerConfig::default();
    let conflicts = ResourceConflictAnalyzer::new(&analyzer, &config);
    let costs = config.costs.resolve_for(analyzer.store()).unwrap();
    let optimizer = ExecutionPlanOptimizer::new(&conflicts, &costs, &config);
    let graph = analyzer.build_dependency_graph().unwrap();

    for strategy in [OptimizationStrategy::MinimizeMakespan, OptimizationStrategy::BalanceResources] {
        let plan = optimizer.optimize_execution_plan(&graph, strategy);
        assert_eq!(plan.scheduled_tasks.len(), 8);
        assert!(optimizer.check_dependency_constraints(&plan.scheduled_tasks).is_empty());

        for task in &plan.scheduled_tasks {
            for dependency in &task.dependencies {
                let dep = plan.task(dependency).unwrap();
                assert!(dep.end_time <= task.start_time, "{} starts before {} ends", task.tool_id, dep.tool_id);
            }
        }

        // The builders are allowed together by the default override table
        let entity = plan.task("T31_ENTITY_BUILDER").unwrap();
        let edge = plan.task("T34_EDGE_BUILDER").unwrap();
        assert_eq!(entity.start_time, edge.start_time);
        assert_eq!(plan.critical_path.last().map(String::as_str), Some("T49_MULTI_HOP_QUERY"));
    }
}

#[test]
fn test_cost_file_next_to_contracts() {
    let dir = contracts_dir(&[("A", &[], &[]), ("B", &["A"], &[])]);
    std::fs::write(dir.path().join("costs.toml"), "[execution_times]\nA = 7.5\n").unwrap();

    let facade = facade(&dir);
    assert_eq!(facade.costs().execution_time("A"), 7.5);

    let plan = facade.optimize(&ids(&["B"]), OptimizationStrategy::MinimizeMakespan).unwrap();
    assert_eq!(plan.task("B").unwrap().start_time, 7.5);
}

#[test]
fn test_facade_over_workflow_steps() {
    let dir = contracts_dir(&[("A", &[], &[]), ("B", &["A"], &[]), ("C", &["A"], &[])]);
    write_contract(dir.path(), "D", &["B"], &["sqlite"]);

    let facade = facade(&dir);
    let steps = vec![
        WorkflowStep::new("A"),
        WorkflowStep::new("B").depends_on(["A"]),
        WorkflowStep::new("C").depends_on(["A"]),
        WorkflowStep::new("D"),
    ];

    let analysis = facade.analyze_dependencies(&steps).unwrap();
    assert!(analysis.can_parallelize);
    assert_eq!(analysis.dependency_levels["D"], 2);
    assert_eq!(analysis.groups_by_level[&1], vec![ids(&["B", "C"])]);
    assert!(analysis.independent_pairs.contains(&("C".to_string(), "D".to_string())));
    assert!(!analysis.independent_pairs.contains(&("B".to_string(), "D".to_string())));

    let plan = facade.optimize_workflow(&steps, OptimizationStrategy::MinimizeMakespan).unwrap();
    assert!(plan.bottlenecks.is_empty());
    assert_eq!(plan.scheduled_tasks.len(), 4);
}

#[test]
fn test_shipped_knowledge_graph_contracts() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../..");
    let config = PlannerConfig::default().with_contracts_dir(root.join("contracts/tools"));
    let facade = ProgrammaticDependencyAnalyzer::from_config(config).unwrap();

    assert_eq!(facade.analyzer().store().len(), 8);
    assert!(facade.analyzer().store().diagnostics().is_empty());
    assert_eq!(facade.costs().execution_time("T23A_SPACY_NER"), 2.4);
    assert_eq!(facade.costs().execution_time("T68_PAGE_RANK"), 6.5);

    let workflow = Workflow::load_from_file(root.join("workflows/kg_pipeline.yaml")).unwrap();
    let analysis = facade.analyze_dependencies(&workflow.steps).unwrap();
    assert_eq!(analysis.groups_by_level[&2], vec![ids(&["T23A_SPACY_NER", "T27_RELATIONSHIP_EXTRACTOR"])]);
    assert_eq!(analysis.groups_by_level[&3], vec![ids(&["T31_ENTITY_BUILDER", "T34_EDGE_BUILDER"])]);

    let plan = facade.optimize(&ids(&["T49_MULTI_HOP_QUERY"]), OptimizationStrategy::MinimizeMakespan).unwrap();
    assert_eq!(plan.scheduled_tasks.len(), 8);
    assert!(plan.bottlenecks.is_empty());
}
