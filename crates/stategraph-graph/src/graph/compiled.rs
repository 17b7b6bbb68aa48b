use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use tracing::{debug, info, warn};

use stategraph_core::config::GraphConfig;
use stategraph_core::error::{GraphError, Result, ValidationIssue};

use super::edge::{ConditionalEdge, Destination, END, START};
use super::step::Step;

/// Outgoing transition of a compiled step.
pub(crate) enum Transition<S> {
    Direct(Destination),
    Conditional(ConditionalEdge<S>),
}

/// Timing of one step execution within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// Which step was executed.
    pub step: String,
    /// Execution time in milliseconds.
    pub elapsed_ms: u64,
}

/// Final state of a run plus the path it took.
#[derive(Debug, Clone)]
pub struct RunReport<S> {
    pub state: S,
    /// Per-step records in execution order.
    pub steps: Vec<StepRecord>,
    pub total_elapsed_ms: u64,
}

impl<S> RunReport<S> {
    /// How many times `step` ran.
    pub fn visits(&self, step: &str) -> usize {
        self.steps.iter().filter(|r| r.step == step).count()
    }

    /// Step names in execution order.
    pub fn path(&self) -> Vec<&str> {
        self.steps.iter().map(|r| r.step.as_str()).collect()
    }
}

/// Validated, immutable graph. Each `invoke` owns its own state value, so one
/// compiled graph serves any number of independent runs.
pub struct CompiledGraph<S> {
    steps: HashMap<String, Box<dyn Step<S>>>,
    transitions: HashMap<String, Transition<S>>,
    order: Vec<String>,
    entry: String,
    step_limit: Option<usize>,
}

impl<S> fmt::Debug for CompiledGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("entry", &self.entry)
            .field("steps", &self.order)
            .field("step_limit", &self.step_limit)
            .finish()
    }
}

impl<S> CompiledGraph<S>
where
    S: Send + 'static,
{
    pub(crate) fn new(
        steps: HashMap<String, Box<dyn Step<S>>>,
        transitions: HashMap<String, Transition<S>>,
        order: Vec<String>,
        entry: String,
    ) -> Self {
        Self {
            steps,
            transitions,
            order,
            entry,
            step_limit: None,
        }
    }

    /// Abort runs after `limit` step executions with `StepLimitExceeded`.
    ///
    /// Runs are unbounded unless a limit is set here.
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    /// Apply executor settings from the `[graph]` config section.
    pub fn with_config(mut self, config: &GraphConfig) -> Self {
        if config.step_limit.is_some() {
            self.step_limit = config.step_limit;
        }
        self
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Step names in registration order.
    pub fn step_names(&self) -> &[String] {
        &self.order
    }

    /// Run the graph from the entry step until a transition reaches `END`.
    ///
    /// Step and router failures abort the run as `StepExecution`; a router
    /// label missing from its map aborts it as `UnknownLabel`.
    pub async fn invoke(&self, state: S) -> Result<S> {
        self.run(state, None).await
    }

    /// Like [`invoke`](Self::invoke), also recording every step executed.
    pub async fn invoke_with_report(&self, state: S) -> Result<RunReport<S>> {
        let start = Instant::now();
        let mut records = Vec::new();
        let state = self.run(state, Some(&mut records)).await?;
        Ok(RunReport {
            state,
            steps: records,
            total_elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn run(&self, mut state: S, mut records: Option<&mut Vec<StepRecord>>) -> Result<S> {
        let start = Instant::now();
        let mut current = self.entry.clone();
        let mut executed: usize = 0;

        info!(entry = %self.entry, "Starting graph run");

        loop {
            if let Some(limit) = self.step_limit {
                if executed >= limit {
                    warn!(step = %current, limit, "Step limit reached, aborting run");
                    return Err(GraphError::StepLimitExceeded(limit));
                }
            }

            let step = self.steps.get(&current).ok_or_else(|| {
                GraphError::GraphValidation(vec![ValidationIssue::UnknownEntry(current.clone())])
            })?;

            let step_start = Instant::now();
            state = step
                .run(state)
                .await
                .map_err(|e| GraphError::StepExecution {
                    step: current.clone(),
                    source: Box::new(e),
                })?;
            executed += 1;

            let elapsed_ms = step_start.elapsed().as_millis() as u64;
            debug!(step = %current, elapsed_ms, "Step complete");
            if let Some(records) = records.as_deref_mut() {
                records.push(StepRecord {
                    step: current.clone(),
                    elapsed_ms,
                });
            }

            let next = match self.transitions.get(&current) {
                Some(Transition::Direct(dest)) => dest.clone(),
                Some(Transition::Conditional(edge)) => {
                    let dest = edge.resolve(&state)?;
                    debug!(step = %current, next = %dest, "Routed");
                    dest
                }
                None => Destination::End,
            };

            match next {
                Destination::End => break,
                Destination::Step(name) => current = name,
            }
        }

        info!(
            steps = executed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Graph run complete"
        );
        Ok(state)
    }

    /// Render the transition table as a Mermaid flowchart.
    ///
    /// Conditional branches are dotted and labelled with the router label.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("flowchart TD\n");
        out.push_str(&format!("    {START}([{START}]) --> {}\n", self.entry));

        for name in &self.order {
            match self.transitions.get(name) {
                Some(Transition::Direct(dest)) => {
                    out.push_str(&format!("    {} --> {}\n", name, dest));
                }
                Some(Transition::Conditional(edge)) => {
                    for (label, dest) in &edge.branches {
                        let label = label.replace('"', "#quot;");
                        out.push_str(&format!("    {} -. {} .-> {}\n", name, label, dest));
                    }
                }
                None => {}
            }
        }

        out.push_str(&format!("    {END}([{END}])\n"));
        out
    }
}
