use serde::{Deserialize, Serialize};
use tracing::info;

use stategraph_core::error::{GraphError, Result};
use stategraph_graph::{CompiledGraph, StateGraph, END, START};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorState {
    pub number1: f64,
    pub number2: f64,
    pub operation: String,
    #[serde(default)]
    pub final_number: f64,
}

impl CalculatorState {
    pub fn new(number1: f64, number2: f64, operation: impl Into<String>) -> Self {
        Self {
            number1,
            number2,
            operation: operation.into(),
            final_number: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalculatorRoute {
    Add,
    Subtract,
}

fn decide_step(state: CalculatorState) -> Result<CalculatorState> {
    info!(operation = %state.operation, "Deciding next step");
    Ok(state)
}

fn route_operation(state: &CalculatorState) -> Result<CalculatorRoute> {
    match state.operation.trim() {
        "+" => Ok(CalculatorRoute::Add),
        "-" => Ok(CalculatorRoute::Subtract),
        other => Err(GraphError::step(format!("unsupported operation: {other}"))),
    }
}

fn add_step(mut state: CalculatorState) -> Result<CalculatorState> {
    state.final_number = state.number1 + state.number2;
    info!(
        "Addition: {} + {} = {}",
        state.number1, state.number2, state.final_number
    );
    Ok(state)
}

fn subtract_step(mut state: CalculatorState) -> Result<CalculatorState> {
    state.final_number = state.number1 - state.number2;
    info!(
        "Subtraction: {} - {} = {}",
        state.number1, state.number2, state.final_number
    );
    Ok(state)
}

/// `decide -> {add_node | subtract_node} -> END`
pub fn build() -> Result<CompiledGraph<CalculatorState>> {
    let mut graph = StateGraph::new();
    graph
        .add_step("decide_next_node", decide_step)?
        .add_step("add_node", add_step)?
        .add_step("subtract_node", subtract_step)?;

    graph
        .add_edge(START, "decide_next_node")
        .add_conditional_edge(
            "decide_next_node",
            route_operation,
            [
                (CalculatorRoute::Add, "add_node"),
                (CalculatorRoute::Subtract, "subtract_node"),
            ],
        )
        .add_edge("add_node", END)
        .add_edge("subtract_node", END);

    graph.compile()
}
