//! Inventory lookup trait definition.

use async_trait::async_trait;

use crate::connect::error::InventoryError;
use crate::connect::types::InventoryRecord;

/// Trait for device-management inventory lookups.
///
/// Each call performs exactly one independent request: no retry, no caching
/// and no shared connection state between calls.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Fetch the computer record registered under `name`.
    ///
    /// # Returns
    ///
    /// * `Ok(record)` - The record was found
    /// * `Err(InventoryError::NotFound)` - Well-formed answer without a record
    /// * `Err(InventoryError::LookupFailed)` - Transport, timeout or format failure
    async fn fetch_computer(&self, name: &str) -> Result<InventoryRecord, InventoryError>;

    /// Get ready for the first lookup. Backends that need credentials gather
    /// them here, which may prompt the user.
    ///
    /// # Returns
    ///
    /// * `Err(InventoryError::Interrupted)` - The user interrupted a prompt
    async fn prepare(&self) -> Result<(), InventoryError> {
        Ok(())
    }

    /// Get the name of this inventory backend.
    ///
    /// Used for logging and debugging purposes.
    fn name(&self) -> &'static str;
}
