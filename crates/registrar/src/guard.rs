use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{RecordIndex, StoreError};

/// Checks freshly formatted identifiers against the records that already
/// carry one.
///
/// Counter uniqueness alone is not enough: records imported from elsewhere,
/// a counter that was reset, or a manual edit can all leave an identifier in
/// place that the counter will produce again.
#[derive(Debug)]
pub struct CollisionGuard<I> {
    index: Arc<I>,
    field: String,
}

impl<I> CollisionGuard<I> {
    pub fn new(index: Arc<I>, field: impl Into<String>) -> Self {
        Self {
            index,
            field: field.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns `true` if `identifier` is already taken, as seen from `tx`.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self, tx)))]
    pub async fn check_exists<Tx>(&self, tx: &mut Tx, identifier: &str) -> Result<bool, StoreError>
    where
        I: RecordIndex<Tx>,
    {
        self.index.exists(tx, &self.field, identifier).await
    }

    /// Returns the members of `identifiers` that are already taken.
    pub async fn find_collisions<Tx>(&self, identifiers: &[String]) -> Result<Vec<String>, StoreError>
    where
        I: RecordIndex<Tx>,
    {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }
        self.index.find_existing(&self.field, identifiers).await
    }
}
