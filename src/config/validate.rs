use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::descriptor::TaskDescriptor;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{MultijobError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = MultijobError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        let tasks = raw
            .tasks
            .iter()
            .map(|(id, section)| TaskDescriptor::from_section(id, section))
            .collect::<Result<Vec<_>>>()?;
        validate_tasks(&tasks)?;
        Ok(ConfigFile::new_unchecked(tasks))
    }
}

/// Check dependency references and acyclicity of a descriptor list.
pub fn validate_tasks(tasks: &[TaskDescriptor]) -> Result<()> {
    validate_task_dependencies(tasks)?;
    validate_dag(tasks)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.tasks.is_empty() {
        return Err(MultijobError::ConfigError(
            "Empty config provided: at least one [<task_id>] section is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_dependencies(tasks: &[TaskDescriptor]) -> Result<()> {
    let known: HashSet<&str> = tasks.iter().map(|t| t.task_id.as_str()).collect();

    for task in tasks {
        for dep in task.depends.iter() {
            if dep == &task.task_id {
                return Err(MultijobError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `depends`",
                    task.task_id
                )));
            }
            if !known.contains(dep.as_str()) {
                return Err(MultijobError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `depends`",
                    task.task_id, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(tasks: &[TaskDescriptor]) -> Result<()> {
    // Edge direction: dep -> task
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for task in tasks {
        graph.add_node(task.task_id.as_str());
    }

    for task in tasks {
        for dep in task.depends.iter() {
            graph.add_edge(dep.as_str(), task.task_id.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(MultijobError::DagCycle(format!(
                "cycle detected in task DAG involving task '{}'",
                node
            )))
        }
    }
}
