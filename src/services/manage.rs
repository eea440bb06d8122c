//! Interest management surface.
//!
//! Thin operations consumed by the application layer: listing interests
//! above a confidence floor and manually adjusting or removing an interest.

use crate::models::{Interest, InterestId};
use crate::storage::InterestStore;
use crate::{Error, Result};
use std::sync::Arc;

/// Manual interest administration over a store.
pub struct InterestManager<S: InterestStore> {
    store: Arc<S>,
}

impl<S: InterestStore> InterestManager<S> {
    /// Creates a new manager.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Lists active interests at or above the confidence floor, highest
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_interests(&self, min_confidence: f32) -> Result<Vec<Interest>> {
        self.store.list_interests_above(min_confidence)
    }

    /// Raises an interest's confidence by `delta`, capped at 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown or inactive interest.
    pub fn boost_confidence(&self, id: &InterestId, delta: f32) -> Result<Interest> {
        let mut interest = self.get_active(id)?;
        interest.confidence = (interest.confidence + delta.max(0.0)).min(1.0);
        self.store.update_interest(&interest)?;
        tracing::debug!(interest_id = %id, confidence = interest.confidence, "Boosted interest");
        Ok(interest)
    }

    /// Lowers an interest's confidence by `delta`.
    ///
    /// An interest reduced to zero confidence is deactivated: the user has
    /// said this is not an interest, and it disappears from every active
    /// view while keeping its history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown or inactive interest.
    pub fn reduce_confidence(&self, id: &InterestId, delta: f32) -> Result<Interest> {
        let mut interest = self.get_active(id)?;
        interest.confidence = (interest.confidence - delta.max(0.0)).max(0.0);
        if interest.confidence == 0.0 {
            interest.is_active = false;
            tracing::info!(interest_id = %id, "Interest reduced to zero, deactivating");
        }
        self.store.update_interest(&interest)?;
        Ok(interest)
    }

    /// Removes an interest: deactivates the row and deletes its hierarchy
    /// edges. The row itself is kept for referential history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown or inactive interest.
    pub fn delete_interest(&self, id: &InterestId) -> Result<()> {
        let mut interest = self.get_active(id)?;
        interest.is_active = false;
        self.store.update_interest(&interest)?;
        let removed = self.store.delete_edges_for(id)?;
        tracing::info!(interest_id = %id, edges_removed = removed, "Deleted interest");
        Ok(())
    }

    fn get_active(&self, id: &InterestId) -> Result<Interest> {
        self.store
            .get_interest(id)?
            .filter(|i| i.is_active)
            .ok_or_else(|| Error::NotFound {
                kind: "interest",
                id: id.to_string(),
            })
    }
}
