// tests/property_readiness.rs

mod common;

use std::collections::HashSet;

use common::{Node, graph_of};
use multijob::types::{ExecutionStatus as S, PipelineStatus};
use proptest::prelude::*;

fn status_strategy() -> impl Strategy<Value = S> {
    prop_oneof![
        Just(S::Unsubmitted),
        Just(S::Submitted),
        Just(S::Queued),
        Just(S::Running),
        Just(S::Succeeded),
        Just(S::Failed),
        Just(S::Error),
        Just(S::Stopped),
    ]
}

#[derive(Debug, Clone)]
struct NodeSpec {
    deps: Vec<usize>,
    max_retries: u32,
    retries: u32,
    status: S,
}

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<NodeSpec>> {
    proptest::collection::vec(
        (
            proptest::collection::vec(any::<usize>(), 0..4),
            0u32..3,
            0u32..3,
            status_strategy(),
        ),
        1..=max_tasks,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (potential, max_retries, retries, status))| {
                let deps: HashSet<usize> = if i == 0 {
                    HashSet::new()
                } else {
                    potential.into_iter().map(|d| d % i).collect()
                };
                let mut deps: Vec<usize> = deps.into_iter().collect();
                deps.sort();
                NodeSpec {
                    deps,
                    max_retries,
                    retries,
                    status,
                }
            })
            .collect()
    })
}

fn build(specs: &[NodeSpec], allow_partial_failure: bool) -> multijob::dag::DependencyGraph {
    let ids: Vec<String> = (0..specs.len()).map(|i| format!("t{i}")).collect();
    let dep_ids: Vec<Vec<&str>> = specs
        .iter()
        .map(|s| s.deps.iter().map(|d| ids[*d].as_str()).collect())
        .collect();
    let nodes = specs
        .iter()
        .enumerate()
        .map(|(i, s)| Node {
            id: ids[i].as_str(),
            deps: dep_ids[i].as_slice(),
            max_retries: s.max_retries,
            retries: s.retries,
            status: s.status.clone(),
        })
        .collect();
    graph_of(nodes, allow_partial_failure)
}

proptest! {
    #[test]
    fn ready_tasks_have_all_dependencies_succeeded(specs in dag_strategy(12)) {
        let graph = build(&specs, false);
        for id in graph.ready_tasks() {
            for dep in graph.dependencies_of(&id) {
                prop_assert_eq!(graph.task(dep).unwrap().cached_status(), &S::Succeeded);
            }
            let run = graph.task(&id).unwrap();
            prop_assert!(
                *run.cached_status() == S::Unsubmitted || run.retries() < run.max_retries()
            );
        }
    }

    #[test]
    fn exhausted_tasks_are_failed_and_never_ready(specs in dag_strategy(12)) {
        let graph = build(&specs, false);
        let ready: HashSet<String> = graph.ready_tasks().into_iter().collect();
        let failed = graph.failed_tasks();
        for id in &failed {
            prop_assert!(!ready.contains(id));
        }
        let expected = if !failed.is_empty() {
            PipelineStatus::Failed
        } else if graph.runs().all(|r| *r.cached_status() == S::Succeeded) {
            PipelineStatus::Succeeded
        } else {
            PipelineStatus::Running
        };
        prop_assert_eq!(graph.pipeline_status(), expected);
    }
}
