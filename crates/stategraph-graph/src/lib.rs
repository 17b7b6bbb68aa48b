pub mod graph;
pub mod state;

pub use graph::{
    CompiledGraph, Destination, Edge, RunReport, StateGraph, Step, StepRecord, END, START,
};
pub use state::StateMap;
