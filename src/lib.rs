//! Concurrent fetch-and-merge engine for manufacturer vehicle inventory APIs.
//!
//! Every manufacturer exposes its own inventory API with its own pagination
//! protocol and its own idea of what an error looks like. This crate fans
//! requests out concurrently, classifies transport failures into one typed
//! envelope, and merges multi-page result sets into a single aggregate that
//! tolerates individual page failures.
//!
//! The core is layered bottom-up: a [`Transport`] owns a pooled connection to
//! one origin and classifies every fault; the dispatcher
//! ([`dispatch_one`]/[`dispatch_many`]) runs fetches concurrently while
//! preserving input order; [`paginate::gather`] drives an adapter-supplied
//! [`Paginator`] through the page-then-merge cycle. The [`adapters`] modules
//! encode each upstream's protocol on top.

pub mod adapters;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod paginate;
pub mod query;
pub mod report;
pub mod response;
pub mod transport;

pub use descriptor::{Method, Payload, RequestDescriptor};
pub use dispatch::{dispatch_many, dispatch_one};
pub use error::{MotorcadeError, Result};
pub use paginate::{AggregateResult, PageCount, PageOutcome, PagePlan, PageWindow, Paginator};
pub use query::InventoryQuery;
pub use report::{FailureReporter, RecordingReporter};
pub use response::{BatchResult, FailureKind, FetchFailure, FetchResult, FetchSuccess};
pub use transport::{HttpTransport, MockTransport, Transport, TransportConfig};
