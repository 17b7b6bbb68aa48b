use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use stategraph_core::error::{GraphError, Result};
use stategraph_graph::{CompiledGraph, StateGraph, END, START};

/// Reduction applied to the value list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "+")]
    Sum,
    #[serde(rename = "*")]
    Product,
}

impl FromStr for Operation {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "+" => Ok(Operation::Sum),
            "*" => Ok(Operation::Product),
            other => Err(GraphError::step(format!("unsupported operation: {other}"))),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Sum => write!(f, "+"),
            Operation::Product => write!(f, "*"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
    pub values: Vec<i64>,
    pub name: String,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl ProcessState {
    pub fn new(name: impl Into<String>, operation: Operation, values: Vec<i64>) -> Self {
        Self {
            values,
            name: name.into(),
            operation,
            total: None,
            result: None,
        }
    }
}

fn process_step(mut state: ProcessState) -> Result<ProcessState> {
    let overflow = || GraphError::step(format!("{} overflowed i64", state.operation));
    let (total, verb) = match state.operation {
        Operation::Sum => (
            state
                .values
                .iter()
                .try_fold(0i64, |acc, v| acc.checked_add(*v))
                .ok_or_else(overflow)?,
            "addition",
        ),
        Operation::Product => (
            state
                .values
                .iter()
                .try_fold(1i64, |acc, v| acc.checked_mul(*v))
                .ok_or_else(overflow)?,
            "multiplication",
        ),
    };

    state.result = Some(format!("{}'s {} result: {}", state.name, verb, total));
    state.total = Some(total);
    Ok(state)
}

/// `process -> END`
pub fn build() -> Result<CompiledGraph<ProcessState>> {
    let mut graph = StateGraph::new();
    graph.add_step("process", process_step)?;
    graph.add_edge(START, "process").add_edge("process", END);
    graph.compile()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sum() {
        let graph = build().unwrap();
        let out = graph
            .invoke(ProcessState::new("Alice", Operation::Sum, vec![1, 2, 3, 4, 5]))
            .await
            .unwrap();
        assert_eq!(out.total, Some(15));
        assert_eq!(out.result.as_deref(), Some("Alice's addition result: 15"));
    }

    #[tokio::test]
    async fn test_product() {
        let graph = build().unwrap();
        let out = graph
            .invoke(ProcessState::new("Bob", Operation::Product, vec![1, 2, 3, 4, 5]))
            .await
            .unwrap();
        assert_eq!(out.total, Some(120));
        assert_eq!(out.result.as_deref(), Some("Bob's multiplication result: 120"));
    }

    #[tokio::test]
    async fn test_empty_values() {
        let graph = build().unwrap();
        let sum = graph
            .invoke(ProcessState::new("Eve", Operation::Sum, vec![]))
            .await
            .unwrap();
        assert_eq!(sum.total, Some(0));
        let product = graph
            .invoke(ProcessState::new("Eve", Operation::Product, vec![]))
            .await
            .unwrap();
        assert_eq!(product.total, Some(1));
    }

    #[tokio::test]
    async fn test_overflow_fails_the_step() {
        let graph = build().unwrap();
        let err = graph
            .invoke(ProcessState::new("Max", Operation::Product, vec![i64::MAX, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::StepExecution { ref step, .. } if step == "process"));
    }

    #[test]
    fn test_operation_parsing() {
        assert_eq!("+".parse::<Operation>().unwrap(), Operation::Sum);
        assert_eq!(" * ".parse::<Operation>().unwrap(), Operation::Product);
        assert!("/".parse::<Operation>().is_err());
        assert_eq!(serde_json::to_string(&Operation::Sum).unwrap(), "\"+\"");
    }
}
