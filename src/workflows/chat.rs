use std::io::{BufRead, Write};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use stategraph_core::config::ModelConfig;
use stategraph_core::error::Result;
use stategraph_core::traits::{collect_text, LlmClient};
use stategraph_core::types::ChatMessage;
use stategraph_graph::{CompiledGraph, StateGraph, Step, END, START};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatState {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

impl ChatState {
    pub fn from_user(text: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(text)],
            reply: None,
        }
    }
}

/// Sends the conversation to the model and records its answer.
pub struct ChatStep {
    client: Arc<dyn LlmClient>,
    config: ModelConfig,
}

impl ChatStep {
    pub fn new(client: Arc<dyn LlmClient>, config: ModelConfig) -> Self {
        Self { client, config }
    }
}

impl Step<ChatState> for ChatStep {
    fn run(&self, mut state: ChatState) -> BoxFuture<'_, Result<ChatState>> {
        Box::pin(async move {
            let stream = self
                .client
                .chat_stream(&self.config, state.messages.clone())
                .await?;
            let reply = collect_text(stream).await?;
            debug!(chars = reply.len(), "Model replied");

            state.messages.push(ChatMessage::assistant_text(reply.clone()));
            state.reply = Some(reply);
            Ok(state)
        })
    }
}

/// `process -> END`
pub fn build(client: Arc<dyn LlmClient>, config: ModelConfig) -> Result<CompiledGraph<ChatState>> {
    let mut graph = StateGraph::new();
    graph.add_step("process", ChatStep::new(client, config))?;
    graph.add_edge(START, "process").add_edge("process", END);
    graph.compile()
}

/// Read lines from `input` until `exit` or EOF, answering each one with a
/// fresh run of `graph`. Returns the number of exchanges.
///
/// A failed run is reported on `output` and the loop continues.
pub async fn run_repl<R, W>(graph: &CompiledGraph<ChatState>, input: R, mut output: W) -> Result<usize>
where
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();
    let mut exchanges = 0;

    loop {
        write!(output, "Enter: ")?;
        output.flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let line = line.trim();
        if line == "exit" {
            break;
        }
        if line.is_empty() {
            continue;
        }

        match graph.invoke(ChatState::from_user(line)).await {
            Ok(state) => {
                writeln!(output, "\nAI: {}", state.reply.unwrap_or_default())?;
                exchanges += 1;
            }
            Err(e) => writeln!(output, "\nError: {}", e)?,
        }
    }

    Ok(exchanges)
}
