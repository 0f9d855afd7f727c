//! Failure reporting hook.
//!
//! The engine never implements an error sink itself. Callers attach a
//! [`FailureReporter`] to the transport; every classified failure is handed
//! to it on a detached task, best-effort. A slow or broken sink never delays
//! or fails the fetch that triggered it.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::response::FetchFailure;

/// Sink seam for classified upstream failures.
///
/// Implementations forward the failure wherever operations want it (an error
/// reporting service, a log pipeline). The reported [`FetchFailure`] already
/// carries kind, method, url, status and message.
#[async_trait]
pub trait FailureReporter: Send + Sync {
    async fn report(&self, failure: FetchFailure);
}

/// Reporter that remembers everything it was handed. For tests.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    failures: Arc<Mutex<Vec<FetchFailure>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All failures reported so far, in arrival order.
    pub fn reported(&self) -> Vec<FetchFailure> {
        self.failures.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.failures.lock().len()
    }
}

#[async_trait]
impl FailureReporter for RecordingReporter {
    async fn report(&self, failure: FetchFailure) {
        self.failures.lock().push(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Method;
    use crate::response::FailureKind;

    #[tokio::test]
    async fn test_recording_reporter_keeps_arrival_order() {
        let reporter = RecordingReporter::new();
        reporter
            .report(FetchFailure::new(
                FailureKind::Timeout,
                Method::Get,
                "https://example.com/a",
                "deadline",
            ))
            .await;
        reporter
            .report(FetchFailure::new(
                FailureKind::Network,
                Method::Post,
                "https://example.com/b",
                "refused",
            ))
            .await;

        let reported = reporter.reported();
        assert_eq!(reported.len(), 2);
        assert_eq!(reported[0].kind, FailureKind::Timeout);
        assert_eq!(reported[1].kind, FailureKind::Network);
    }
}
