//! Mutable graph under construction.
//!
//! Register steps with `add_step`, wire them with `add_edge` and
//! `add_conditional_edge`, pick the entry with `set_entry`, then `compile`.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use tracing::debug;

use stategraph_core::error::{GraphError, Result, ValidationIssue};

use super::compiled::{CompiledGraph, Transition};
use super::edge::{ConditionalEdge, Destination, Edge, END, START};
use super::step::Step;

/// A graph of named steps over state `S`, not yet validated.
pub struct StateGraph<S> {
    steps: HashMap<String, Box<dyn Step<S>>>,
    /// Registration order, kept so diagrams and diagnostics are deterministic.
    order: Vec<String>,
    edges: Vec<Edge>,
    conditional_edges: Vec<ConditionalEdge<S>>,
    entry: Option<String>,
}

impl<S> Default for StateGraph<S>
where
    S: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> StateGraph<S>
where
    S: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            conditional_edges: Vec::new(),
            entry: None,
        }
    }

    /// Register a step under a unique name.
    pub fn add_step(&mut self, name: impl Into<String>, step: impl Step<S>) -> Result<&mut Self> {
        let name = name.into();
        if name == START || name == END {
            return Err(GraphError::ReservedName(name));
        }
        if self.steps.contains_key(&name) {
            return Err(GraphError::DuplicateName(name));
        }
        self.order.push(name.clone());
        self.steps.insert(name, Box::new(step));
        Ok(self)
    }

    /// Register an unconditional transition. `to` may be `END`.
    ///
    /// An edge from `START` designates the entry step instead.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        let from = from.into();
        let to = to.into();
        if from == START {
            return self.set_entry(to);
        }
        self.edges.push(Edge::new(from, to));
        self
    }

    /// Register a routed transition out of `from`.
    ///
    /// After `from` runs, `router` inspects the state and returns a label,
    /// which `label_map` turns into the next step (or `END`). A label missing
    /// from the map fails the run with `UnknownLabel`.
    pub fn add_conditional_edge<L, R, D>(
        &mut self,
        from: impl Into<String>,
        router: R,
        label_map: impl IntoIterator<Item = (L, D)>,
    ) -> &mut Self
    where
        L: Eq + Hash + Debug + Send + Sync + 'static,
        R: Fn(&S) -> Result<L> + Send + Sync + 'static,
        D: Into<Destination>,
    {
        let label_map: HashMap<L, Destination> = label_map
            .into_iter()
            .map(|(label, dest)| (label, dest.into()))
            .collect();
        self.conditional_edges
            .push(ConditionalEdge::new(from.into(), router, label_map));
        self
    }

    /// Designate the first step of every run.
    pub fn set_entry(&mut self, name: impl Into<String>) -> &mut Self {
        self.entry = Some(name.into());
        self
    }

    /// Validate referential integrity and freeze the graph.
    ///
    /// All problems are collected and returned together in
    /// `GraphError::GraphValidation`.
    pub fn compile(self) -> Result<CompiledGraph<S>> {
        let issues = self.validate();
        if !issues.is_empty() {
            debug!(issues = issues.len(), "Graph validation failed");
            return Err(GraphError::GraphValidation(issues));
        }

        let Self {
            steps,
            order,
            edges,
            conditional_edges,
            entry,
        } = self;

        let mut transitions: HashMap<String, Transition<S>> = HashMap::new();
        for edge in edges {
            transitions.insert(edge.from, Transition::Direct(edge.to));
        }
        for edge in conditional_edges {
            transitions.insert(edge.from.clone(), Transition::Conditional(edge));
        }

        let entry =
            entry.ok_or_else(|| GraphError::GraphValidation(vec![ValidationIssue::MissingEntry]))?;
        debug!(entry = %entry, steps = order.len(), "Graph compiled");

        Ok(CompiledGraph::new(steps, transitions, order, entry))
    }

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        match &self.entry {
            None => issues.push(ValidationIssue::MissingEntry),
            Some(entry) if !self.steps.contains_key(entry) => {
                issues.push(ValidationIssue::UnknownEntry(entry.clone()))
            }
            Some(_) => {}
        }

        // Sources in first-seen order with their outgoing transition count.
        let mut outgoing: Vec<(&str, usize)> = Vec::new();
        for edge in &self.edges {
            self.check_target(&edge.from, &edge.to, &mut issues);
            count_source(&mut outgoing, &edge.from);
        }

        for edge in &self.conditional_edges {
            for dest in edge.destinations() {
                self.check_target(&edge.from, dest, &mut issues);
            }
            count_source(&mut outgoing, &edge.from);
        }

        for (from, _) in &outgoing {
            if !self.steps.contains_key(*from) {
                issues.push(ValidationIssue::UnknownSource {
                    from: from.to_string(),
                });
            }
        }

        for name in &self.order {
            let count = outgoing
                .iter()
                .find(|(from, _)| *from == name.as_str())
                .map_or(0, |(_, count)| *count);
            match count {
                0 => issues.push(ValidationIssue::DeadEnd(name.clone())),
                1 => {}
                count => issues.push(ValidationIssue::AmbiguousTransition {
                    step: name.clone(),
                    count,
                }),
            }
        }

        issues
    }

    fn check_target(&self, from: &str, to: &Destination, issues: &mut Vec<ValidationIssue>) {
        if let Destination::Step(name) = to {
            if !self.steps.contains_key(name) {
                issues.push(ValidationIssue::UnknownTarget {
                    from: from.to_string(),
                    to: name.clone(),
                });
            }
        }
    }
}

fn count_source<'a>(outgoing: &mut Vec<(&'a str, usize)>, from: &'a str) {
    match outgoing.iter_mut().find(|(name, _)| *name == from) {
        Some((_, count)) => *count += 1,
        None => outgoing.push((from, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(n: i64) -> Result<i64> {
        Ok(n)
    }

    fn issues_of(graph: StateGraph<i64>) -> Vec<ValidationIssue> {
        match graph.compile() {
            Err(GraphError::GraphValidation(issues)) => issues,
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected validation failure"),
        }
    }

    #[test]
    fn test_duplicate_step_name() {
        let mut graph = StateGraph::<i64>::new();
        graph.add_step("a", noop).unwrap();
        let err = graph.add_step("a", noop).err().unwrap();
        assert!(matches!(err, GraphError::DuplicateName(ref n) if n == "a"));
    }

    #[test]
    fn test_reserved_step_names() {
        let mut graph = StateGraph::<i64>::new();
        assert!(matches!(
            graph.add_step(END, noop).err(),
            Some(GraphError::ReservedName(_))
        ));
        assert!(matches!(
            graph.add_step(START, noop).err(),
            Some(GraphError::ReservedName(_))
        ));
    }

    #[test]
    fn test_start_edge_sets_entry() {
        let mut graph = StateGraph::<i64>::new();
        graph.add_step("a", noop).unwrap();
        graph.add_edge(START, "a").add_edge("a", END);
        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.entry(), "a");
    }

    #[test]
    fn test_dangling_edge_is_reported() {
        let mut graph = StateGraph::<i64>::new();
        graph.add_step("a", noop).unwrap();
        graph.set_entry("a").add_edge("a", "ghost");

        assert_eq!(
            issues_of(graph),
            vec![ValidationIssue::UnknownTarget {
                from: "a".into(),
                to: "ghost".into()
            }]
        );
    }

    #[test]
    fn test_all_issues_are_collected() {
        let mut graph = StateGraph::<i64>::new();
        graph.add_step("a", noop).unwrap();
        graph.add_step("b", noop).unwrap();
        graph
            .add_edge("a", "missing")
            .add_edge("a", END)
            .add_edge("phantom", "a")
            .add_conditional_edge("phantom", |_: &i64| Ok(true), [(true, "nowhere")]);

        let issues = issues_of(graph);
        assert!(issues.contains(&ValidationIssue::MissingEntry));
        assert!(issues.contains(&ValidationIssue::UnknownTarget {
            from: "a".into(),
            to: "missing".into()
        }));
        assert!(issues.contains(&ValidationIssue::UnknownSource {
            from: "phantom".into()
        }));
        assert!(issues.contains(&ValidationIssue::UnknownTarget {
            from: "phantom".into(),
            to: "nowhere".into()
        }));
        assert!(issues.contains(&ValidationIssue::AmbiguousTransition {
            step: "a".into(),
            count: 2
        }));
        assert!(issues.contains(&ValidationIssue::DeadEnd("b".into())));
    }

    #[test]
    fn test_unknown_entry() {
        let mut graph = StateGraph::<i64>::new();
        graph.add_step("a", noop).unwrap();
        graph.set_entry("b").add_edge("a", END);
        assert_eq!(issues_of(graph), vec![ValidationIssue::UnknownEntry("b".into())]);
    }

    #[test]
    fn test_conditional_edge_to_end_validates() {
        let mut graph = StateGraph::<i64>::new();
        graph.add_step("a", noop).unwrap();
        graph
            .set_entry("a")
            .add_conditional_edge("a", |n: &i64| Ok(*n > 0), [(true, END), (false, "a")]);
        assert!(graph.compile().is_ok());
    }
}
