use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use stategraph_core::error::Result;
use stategraph_graph::{CompiledGraph, StateGraph, END};

/// Passes through the random step before the loop exits.
pub const LOOP_PASSES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    pub name: String,
    #[serde(default)]
    pub numbers: Vec<u32>,
    #[serde(default)]
    pub counter: u32,
}

impl LoopState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            numbers: Vec::new(),
            counter: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopRoute {
    Loop,
    Exit,
}

fn greeting_step(mut state: LoopState) -> Result<LoopState> {
    state.name = format!("Hi there, {}", state.name);
    state.counter = 0;
    Ok(state)
}

fn random_step(mut state: LoopState) -> Result<LoopState> {
    state.numbers.push(rand::thread_rng().gen_range(0..=10));
    state.counter += 1;
    Ok(state)
}

fn should_continue(state: &LoopState) -> Result<LoopRoute> {
    if state.counter < LOOP_PASSES {
        debug!(counter = state.counter, "Entering loop");
        Ok(LoopRoute::Loop)
    } else {
        Ok(LoopRoute::Exit)
    }
}

/// `greeting -> random -> (loop: random | exit: END)`
pub fn build() -> Result<CompiledGraph<LoopState>> {
    let mut graph = StateGraph::new();
    graph
        .add_step("greeting", greeting_step)?
        .add_step("random", random_step)?;

    graph
        .set_entry("greeting")
        .add_edge("greeting", "random")
        .add_conditional_edge(
            "random",
            should_continue,
            [(LoopRoute::Loop, "random"), (LoopRoute::Exit, END)],
        );

    graph.compile()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loops_exactly_five_times() {
        let graph = build().unwrap();
        let report = graph.invoke_with_report(LoopState::new("Vaibhav")).await.unwrap();

        assert_eq!(report.visits("greeting"), 1);
        assert_eq!(report.visits("random"), LOOP_PASSES as usize);
        assert_eq!(report.state.counter, LOOP_PASSES);
        assert_eq!(report.state.numbers.len(), LOOP_PASSES as usize);
        assert!(report.state.numbers.iter().all(|n| *n <= 10));
        assert_eq!(report.state.name, "Hi there, Vaibhav");
    }

    #[tokio::test]
    async fn test_greeting_resets_counter() {
        let graph = build().unwrap();
        let state = LoopState {
            name: "Ada".into(),
            numbers: vec![],
            counter: 42,
        };
        let out = graph.invoke(state).await.unwrap();
        assert_eq!(out.counter, LOOP_PASSES);
    }

    #[test]
    fn test_router_labels() {
        let mut state = LoopState::new("x");
        assert_eq!(should_continue(&state).unwrap(), LoopRoute::Loop);
        state.counter = LOOP_PASSES;
        assert_eq!(should_continue(&state).unwrap(), LoopRoute::Exit);
    }
}
