//! Manufacturer adapters.
//!
//! One module per make. Each adapter owns its upstream constants (origin,
//! referer, page size), builds the descriptors for that upstream's request
//! shape, supplies the [`Paginator`](crate::paginate::Paginator) when the
//! upstream pages, and interprets the upstream's empty-result sentinel.
//!
//! Every inventory entry point comes in two forms: a generic one taking any
//! [`Transport`] (so tests run against `MockTransport`) and a `fetch_*`
//! wrapper that opens the production transport scoped to the call. Upstreams
//! with a vehicle-detail endpoint expose `vin_detail` / `fetch_vin_detail`
//! the same way.

pub mod audi;
pub mod bmw;
pub mod cadillac;
pub mod chevrolet;
pub mod ford;
pub mod genesis;
pub mod gmc;
pub mod hyundai;
pub mod kia;
pub mod volkswagen;
pub mod volvo;

use serde_json::Value;

use crate::descriptor::RequestDescriptor;
use crate::dispatch::dispatch_one;
use crate::error::{MotorcadeError, Result};
use crate::response::FetchResult;
use crate::transport::Transport;

/// Perform one call and decode the body as JSON.
///
/// A transport failure is operation-fatal here (`Upstream`), and a body that
/// is not JSON is `Malformed`. Adapters use this for every call whose result
/// the whole operation depends on.
pub(crate) async fn fetch_json<T>(transport: &T, descriptor: &RequestDescriptor) -> Result<Value>
where
    T: Transport + ?Sized,
{
    match dispatch_one(transport, descriptor).await {
        FetchResult::Success(success) => success
            .json()
            .map_err(|e| MotorcadeError::Malformed(format!("upstream body was not JSON: {e}"))),
        FetchResult::Failure(failure) => Err(MotorcadeError::Upstream(failure)),
    }
}

/// A missing key where the upstream promises one on every successful
/// response, even an empty one.
pub(crate) fn missing(make: &str, pointer: &str) -> MotorcadeError {
    MotorcadeError::Malformed(format!("{make} response has nothing at {pointer}"))
}
