use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;

use stategraph_core::error::{GraphError, Result};

/// Pseudo-step name for the graph entry. `add_edge(START, x)` sets the entry to `x`.
pub const START: &str = "__start__";

/// Terminal marker. A transition to `END` completes the run.
pub const END: &str = "__end__";

/// Where a transition leads: another step, or the end of the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    Step(String),
    End,
}

impl Destination {
    /// Parse a step name, mapping the `END` marker to [`Destination::End`].
    pub fn parse(name: &str) -> Self {
        if name == END {
            Destination::End
        } else {
            Destination::Step(name.to_string())
        }
    }

    pub fn step_name(&self) -> Option<&str> {
        match self {
            Destination::Step(name) => Some(name),
            Destination::End => None,
        }
    }
}

impl From<&str> for Destination {
    fn from(name: &str) -> Self {
        Destination::parse(name)
    }
}

impl From<String> for Destination {
    fn from(name: String) -> Self {
        Destination::parse(&name)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Step(name) => write!(f, "{}", name),
            Destination::End => write!(f, "{}", END),
        }
    }
}

/// An unconditional transition between two steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Source step name.
    pub from: String,
    /// Target step or `END`.
    pub to: Destination,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<Destination>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Render a router label for messages and diagrams. String labels lose
/// the quotes their `Debug` form adds.
pub(crate) fn render_label<L: Debug>(label: &L) -> String {
    let rendered = format!("{:?}", label);
    match rendered
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    {
        Some(inner) => inner.to_string(),
        None => rendered,
    }
}

pub(crate) enum RouteError {
    Router(GraphError),
    Unmapped(String),
}

type RouteFn<S> = Box<dyn Fn(&S) -> std::result::Result<Destination, RouteError> + Send + Sync>;

/// A transition chosen at run time by a router function.
///
/// The router's label type is erased at registration: the edge keeps the
/// rendered labels (for validation and diagrams) and a closure that runs the
/// router and looks the label up.
pub(crate) struct ConditionalEdge<S> {
    pub(crate) from: String,
    /// `(label, destination)` pairs sorted by label.
    pub(crate) branches: Vec<(String, Destination)>,
    route: RouteFn<S>,
}

impl<S> ConditionalEdge<S> {
    pub(crate) fn new<L, R>(from: String, router: R, label_map: HashMap<L, Destination>) -> Self
    where
        S: 'static,
        L: Eq + Hash + Debug + Send + Sync + 'static,
        R: Fn(&S) -> Result<L> + Send + Sync + 'static,
    {
        let mut branches: Vec<(String, Destination)> = label_map
            .iter()
            .map(|(label, dest)| (render_label(label), dest.clone()))
            .collect();
        branches.sort_by(|a, b| a.0.cmp(&b.0));

        let route = Box::new(move |state: &S| -> std::result::Result<Destination, RouteError> {
            let label = router(state).map_err(RouteError::Router)?;
            label_map
                .get(&label)
                .cloned()
                .ok_or_else(|| RouteError::Unmapped(render_label(&label)))
        });

        Self {
            from,
            branches,
            route,
        }
    }

    /// Run the router and map its label to a destination.
    ///
    /// Router failures are wrapped as a step execution error of the source
    /// step; an unmapped label is reported as-is.
    pub(crate) fn resolve(&self, state: &S) -> Result<Destination> {
        (self.route)(state).map_err(|e| match e {
            RouteError::Router(source) => GraphError::StepExecution {
                step: self.from.clone(),
                source: Box::new(source),
            },
            RouteError::Unmapped(label) => GraphError::UnknownLabel {
                step: self.from.clone(),
                label,
            },
        })
    }

    pub(crate) fn destinations(&self) -> impl Iterator<Item = &Destination> {
        self.branches.iter().map(|(_, dest)| dest)
    }
}
