//! Remote grid executor.
//!
//! Posts each pipeline request as JSON to `{endpoint}/execute` and decodes
//! the executor's JSON response. Blocking reqwest client, moved off the
//! async executor with `smol::unblock`, so no Tokio runtime is required.

mod client;

pub use client::{HttpExecutor, PROTOCOL_HEADER};
