//! Pipeline task graph
//!
//! Tasks are wired by their inputs: consuming another task's output makes
//! that task a dependency. The graph must be acyclic and every producer
//! must be declared.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use vitals_core::{Result, VitalsError};

/// Where a task input gets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputBinding {
    /// A parameter of the pipeline itself.
    PipelineParameter(String),
    /// A string output of an upstream task.
    TaskParameter { task: String, key: String },
    /// An artifact produced by an upstream task.
    TaskArtifact { task: String, key: String },
}

impl InputBinding {
    pub fn pipeline(name: &str) -> Self {
        Self::PipelineParameter(name.to_string())
    }

    pub fn parameter_of(task: &str, key: &str) -> Self {
        Self::TaskParameter {
            task: task.to_string(),
            key: key.to_string(),
        }
    }

    pub fn artifact_of(task: &str, key: &str) -> Self {
        Self::TaskArtifact {
            task: task.to_string(),
            key: key.to_string(),
        }
    }

    fn producer(&self) -> Option<&str> {
        match self {
            Self::PipelineParameter(_) => None,
            Self::TaskParameter { task, .. } | Self::TaskArtifact { task, .. } => Some(task),
        }
    }

    pub fn is_artifact(&self) -> bool {
        matches!(self, Self::TaskArtifact { .. })
    }
}

#[derive(Debug, Clone)]
pub struct TaskNode {
    pub name: String,
    /// Name of the component this task instantiates.
    pub component: String,
    pub inputs: BTreeMap<String, InputBinding>,
}

impl TaskNode {
    pub fn new(name: &str, component: &str) -> Self {
        Self {
            name: name.to_string(),
            component: component.to_string(),
            inputs: BTreeMap::new(),
        }
    }

    pub fn input(mut self, name: &str, binding: InputBinding) -> Self {
        self.inputs.insert(name.to_string(), binding);
        self
    }

    /// Upstream tasks, sorted.
    pub fn dependencies(&self) -> BTreeSet<&str> {
        self.inputs.values().filter_map(InputBinding::producer).collect()
    }
}

/// Tasks as nodes of a directed graph; an edge runs from producer to consumer.
#[derive(Debug, Clone, Default)]
pub struct PipelineGraph {
    graph: DiGraph<TaskNode, ()>,
    index: HashMap<String, NodeIndex>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task and connect it to already declared producers and consumers.
    pub fn add_task(&mut self, task: TaskNode) -> Result<()> {
        if self.index.contains_key(&task.name) {
            return Err(VitalsError::Pipeline(format!(
                "task '{}' declared twice",
                task.name
            )));
        }

        let name = task.name.clone();
        let self_dependent = task.dependencies().contains(name.as_str());
        let producers: Vec<NodeIndex> = task
            .dependencies()
            .into_iter()
            .filter_map(|dep| self.index.get(dep).copied())
            .collect();
        let consumers: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| self.graph[idx].dependencies().contains(name.as_str()))
            .collect();

        let idx = self.graph.add_node(task);
        self.index.insert(name, idx);
        for producer in producers {
            self.graph.add_edge(producer, idx, ());
        }
        for consumer in consumers {
            self.graph.add_edge(idx, consumer, ());
        }
        if self_dependent {
            self.graph.add_edge(idx, idx, ());
        }
        Ok(())
    }

    pub fn task(&self, name: &str) -> Option<&TaskNode> {
        self.index.get(name).map(|&idx| &self.graph[idx])
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Tasks in dependency order, ties broken by declaration order. Fails on
    /// a reference to an undeclared task or on a cycle.
    pub fn topological_order(&self) -> Result<Vec<&TaskNode>> {
        for task in self.graph.node_weights() {
            if let Some(dep) = task
                .dependencies()
                .into_iter()
                .find(|dep| !self.index.contains_key(*dep))
            {
                return Err(VitalsError::Pipeline(format!(
                    "task '{}' depends on unknown task '{}'",
                    task.name, dep
                )));
            }
        }

        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
            .collect();

        // Node indices follow declaration order.
        let mut ready: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.graph.node_count());

        while let Some(idx) = ready.pop_front() {
            order.push(&self.graph[idx]);

            let mut consumers: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .collect();
            consumers.sort();
            for consumer in consumers {
                if let Some(deg) = in_degree.get_mut(&consumer) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        ready.push_back(consumer);
                    }
                }
            }
        }

        if order.len() < self.graph.node_count() {
            let stuck: Vec<&str> = self
                .graph
                .node_indices()
                .filter(|idx| in_degree[idx] > 0)
                .map(|idx| self.graph[idx].name.as_str())
                .collect();
            return Err(VitalsError::Pipeline(format!(
                "dependency cycle among tasks: {}",
                stuck.join(", ")
            )));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(names: &[&str]) -> PipelineGraph {
        let mut graph = PipelineGraph::new();
        for (i, name) in names.iter().enumerate() {
            let mut task = TaskNode::new(name, name);
            if i > 0 {
                task = task.input("upstream", InputBinding::artifact_of(names[i - 1], "out"));
            }
            graph.add_task(task).unwrap();
        }
        graph
    }

    #[test]
    fn test_order_follows_wiring_not_names() {
        let graph = chain(&["zeta", "alpha", "mid"]);
        let order: Vec<&str> = graph
            .topological_order()
            .unwrap()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(order, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_consumer_declared_before_producer() {
        let mut graph = PipelineGraph::new();
        graph
            .add_task(TaskNode::new("train", "train").input("data", InputBinding::artifact_of("ingest", "out")))
            .unwrap();
        graph.add_task(TaskNode::new("ingest", "ingest")).unwrap();

        let order: Vec<&str> = graph
            .topological_order()
            .unwrap()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(order, vec!["ingest", "train"]);
    }

    #[test]
    fn test_independent_tasks_keep_declaration_order() {
        let mut graph = PipelineGraph::new();
        for name in ["c", "a", "b"] {
            graph.add_task(TaskNode::new(name, name)).unwrap();
        }
        let order: Vec<&str> = graph
            .topological_order()
            .unwrap()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert_eq!(graph.task("a").unwrap().component, "a");
    }

    #[test]
    fn test_pipeline_parameters_are_not_dependencies() {
        let task = TaskNode::new("a", "comp-a")
            .input("project_id", InputBinding::pipeline("project_id"))
            .input("model", InputBinding::parameter_of("b", "Output"));
        assert_eq!(task.dependencies().into_iter().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let mut graph = PipelineGraph::new();
        graph
            .add_task(TaskNode::new("train", "train").input("data", InputBinding::artifact_of("ghost", "out")))
            .unwrap();
        let err = graph.topological_order().unwrap_err();
        assert!(err.to_string().contains("unknown task 'ghost'"));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut graph = PipelineGraph::new();
        graph
            .add_task(TaskNode::new("a", "a").input("x", InputBinding::parameter_of("b", "Output")))
            .unwrap();
        graph
            .add_task(TaskNode::new("b", "b").input("y", InputBinding::parameter_of("a", "Output")))
            .unwrap();
        graph.add_task(TaskNode::new("c", "c")).unwrap();

        let err = graph.topological_order().unwrap_err();
        assert!(matches!(err, VitalsError::Pipeline(_)));
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut graph = PipelineGraph::new();
        graph
            .add_task(TaskNode::new("a", "a").input("x", InputBinding::parameter_of("a", "Output")))
            .unwrap();
        let err = graph.topological_order().unwrap_err();
        assert!(err.to_string().contains("dependency cycle among tasks: a"));
    }

    #[test]
    fn test_duplicate_task_rejected() {
        let mut graph = chain(&["a"]);
        assert!(graph.add_task(TaskNode::new("a", "a")).is_err());
        assert_eq!(graph.len(), 1);
    }
}
