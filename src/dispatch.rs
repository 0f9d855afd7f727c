//! Concurrent dispatch of fetch units.
//!
//! `dispatch_many` is the only fan-out point in the engine: N descriptors go
//! out concurrently on the caller's task and the results come back
//! index-aligned with the input, whatever order the upstream answered in.
//! One failed call never aborts the rest of the batch.

use futures::future;

use crate::descriptor::RequestDescriptor;
use crate::response::{BatchResult, FetchResult};
use crate::transport::Transport;

/// Perform one upstream call.
pub async fn dispatch_one<T>(transport: &T, descriptor: &RequestDescriptor) -> FetchResult
where
    T: Transport + ?Sized,
{
    transport.fetch(descriptor).await
}

/// Perform every call concurrently, preserving input order in the output.
///
/// An empty input returns an empty batch without touching the transport.
/// The fetches are polled together on the current task; concurrency is
/// cooperative, no extra tasks or threads are spawned.
pub async fn dispatch_many<T>(transport: &T, descriptors: &[RequestDescriptor]) -> BatchResult
where
    T: Transport + ?Sized,
{
    match descriptors {
        [] => Vec::new(),
        [only] => vec![dispatch_one(transport, only).await],
        many => {
            tracing::debug!(count = many.len(), "Dispatching batch");
            future::join_all(many.iter().map(|descriptor| transport.fetch(descriptor))).await
        }
    }
}
