//! Caller-facing query inputs.

use serde::{Deserialize, Serialize};

/// Inventory search inputs, already validated by the boundary above this
/// crate (postal-code ranges, model whitelists, radius bounds). The engine
/// treats them as opaque values and only formats them into upstream requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryQuery {
    /// Five-digit postal code, zero-padded by the caller.
    pub zip: String,
    /// Model year.
    pub year: u16,
    /// Manufacturer-specific model identifier.
    pub model: String,
    /// Search radius in miles.
    pub radius: u32,
}

impl InventoryQuery {
    pub fn new(zip: impl Into<String>, year: u16, model: impl Into<String>, radius: u32) -> Self {
        Self {
            zip: zip.into(),
            year,
            model: model.into(),
            radius,
        }
    }
}
