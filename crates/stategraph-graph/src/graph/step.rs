use futures::future::BoxFuture;

use stategraph_core::error::Result;

/// One unit of work in a graph: state in, state out.
///
/// Synchronous functions `Fn(S) -> Result<S>` implement this automatically.
/// Steps that await I/O (an LLM call, for instance) implement it directly.
pub trait Step<S>: Send + Sync + 'static {
    fn run(&self, state: S) -> BoxFuture<'_, Result<S>>;
}

impl<S, F> Step<S> for F
where
    S: Send + 'static,
    F: Fn(S) -> Result<S> + Send + Sync + 'static,
{
    fn run(&self, state: S) -> BoxFuture<'_, Result<S>> {
        let result = self(state);
        Box::pin(async move { result })
    }
}
