use std::sync::Arc;

use sheetwire_protocol::{ContractError, Request, Response};

/// Future returned by [`GridExecutor::execute`].
pub type ExecuteFuture = smol::future::Boxed<Result<Response, ExecutorError>>;

/// Performs one fully-resolved request atomically against the grid.
///
/// The pipeline calls `execute` once per dispatched request and never
/// retries. Several read/write requests may be outstanding at once, a
/// structural request is always alone.
pub trait GridExecutor: Send + Sync + 'static {
    fn execute(&self, request: Request) -> ExecuteFuture;
}

impl<T: GridExecutor + ?Sized> GridExecutor for Arc<T> {
    fn execute(&self, request: Request) -> ExecuteFuture {
        (**self).execute(request)
    }
}

/// Error type for executor calls.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Network or I/O failure before a response arrived
    #[error("transport error: {0}")]
    Transport(String),
    /// Remote executor answered with a non-success status
    #[error("executor returned {status}: {message}")]
    Remote { status: u16, message: String },
    /// Response body could not be decoded
    #[error("cannot decode executor response: {0}")]
    Decode(String),
    /// Executor refused the request (e.g. unknown column header)
    #[error("executor rejected request: {0}")]
    Rejected(String),
    #[error(transparent)]
    Contract(#[from] ContractError),
}
