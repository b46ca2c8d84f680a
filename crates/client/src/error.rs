use sheetwire_protocol::ContractError;

use crate::executor::ExecutorError;

/// Errors surfaced to the caller awaiting a pipeline operation.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The executor failed this request. Queue state is unaffected.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    /// The request broke the executor contract and was never queued.
    #[error("invalid request: {0}")]
    Contract(#[from] ContractError),
    /// The executor answered, but the answer shows the window is unusable.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),
    /// The queue went away before the request settled.
    #[error("request queue closed before the request settled")]
    Disconnected,
}
