use serde::{Deserialize, Serialize};

use stategraph_core::error::Result;
use stategraph_graph::{CompiledGraph, StateGraph, END, START};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreetingState {
    pub message: String,
}

impl GreetingState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            message: name.into(),
        }
    }
}

fn greeting_step(mut state: GreetingState) -> Result<GreetingState> {
    state.message = format!("Hey {}, how is your day going?", state.message);
    Ok(state)
}

/// `greeting -> END`
pub fn build() -> Result<CompiledGraph<GreetingState>> {
    let mut graph = StateGraph::new();
    graph.add_step("greeting", greeting_step)?;
    graph.add_edge(START, "greeting").add_edge("greeting", END);
    graph.compile()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_greets_by_name() {
        let graph = build().unwrap();
        let out = graph.invoke(GreetingState::new("Alice")).await.unwrap();
        assert_eq!(out.message, "Hey Alice, how is your day going?");
    }
}
