use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Open-ended graph state: string keys, JSON values.
///
/// For graphs whose fields are not known up front. Graphs with a fixed field
/// set should use their own struct instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateMap {
    data: HashMap<String, serde_json::Value>,
}

impl StateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(data: HashMap<String, serde_json::Value>) -> Self {
        Self { data }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Get a value as a string, if it's a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(|v| v.as_i64())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    /// Merge another state into this one (overwrites on conflict).
    pub fn merge(&mut self, other: &StateMap) {
        for (k, v) in &other.data {
            self.data.insert(k.clone(), v.clone());
        }
    }

    pub fn data(&self) -> &HashMap<String, serde_json::Value> {
        &self.data
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for StateMap {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            data: map.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{StateGraph, END};
    use stategraph_core::error::{GraphError, Result};

    #[test]
    fn test_basic_operations() {
        let mut state = StateMap::new();
        state.set("name", "Alice");
        state.set("count", 42);
        state.set("ratio", 0.5);

        assert_eq!(state.get_str("name"), Some("Alice"));
        assert_eq!(state.get_i64("count"), Some(42));
        assert_eq!(state.get_f64("ratio"), Some(0.5));
        assert_eq!(state.get("missing"), None);
        assert_eq!(state.remove("name"), Some(serde_json::json!("Alice")));
    }

    #[test]
    fn test_merge() {
        let mut a = StateMap::new();
        a.set("a", "1");
        a.set("b", "2");

        let mut b = StateMap::new();
        b.set("b", "overwritten");
        b.set("c", "3");

        a.merge(&b);

        assert_eq!(a.get_str("a"), Some("1"));
        assert_eq!(a.get_str("b"), Some("overwritten"));
        assert_eq!(a.get_str("c"), Some("3"));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let value = serde_json::json!({"message": "Alice"});
        let state: StateMap = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(state.get_str("message"), Some("Alice"));
        assert_eq!(serde_json::to_value(&state).unwrap(), value);
    }

    fn greet(mut state: StateMap) -> Result<StateMap> {
        let name = state
            .get_str("message")
            .ok_or_else(|| GraphError::step("message missing"))?
            .to_string();
        state.set("message", format!("Hey {}, how is your day going?", name));
        Ok(state)
    }

    #[tokio::test]
    async fn test_graph_over_dynamic_state() {
        let mut graph = StateGraph::new();
        graph.add_step("greeting", greet).unwrap();
        graph.set_entry("greeting").add_edge("greeting", END);
        let graph = graph.compile().unwrap();

        let mut input = StateMap::new();
        input.set("message", "Bob");
        let out = graph.invoke(input).await.unwrap();
        assert_eq!(out.get_str("message"), Some("Hey Bob, how is your day going?"));

        let err = graph.invoke(StateMap::new()).await.unwrap_err();
        assert!(matches!(err.root_cause(), GraphError::Step(_)));
    }
}
