//! Graph Execution Engine — named steps over a shared state value.
//!
//! A workflow is a set of `Step`s connected by `Edge`s or by conditional
//! edges whose router inspects the state and returns a label. The label is
//! mapped to the next step or to `END`.
//!
//! `StateGraph` collects the registrations and `compile()` validates them
//! into an immutable `CompiledGraph`. The compiled graph runs from the entry
//! step in an iterative dispatch loop, so cycles cost no stack per pass.

pub mod builder;
pub mod compiled;
pub mod edge;
pub mod step;

pub use builder::StateGraph;
pub use compiled::{CompiledGraph, RunReport, StepRecord};
pub use edge::{Destination, Edge, END, START};
pub use step::Step;
