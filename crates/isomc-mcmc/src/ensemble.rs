use std::sync::Arc;

use isomc_core::{EnsembleRecord, ErrorInfo, IsoError, ModelParameters};

/// Append-only ensemble of one block with its burn-in marker.
#[derive(Debug, Clone, Default)]
pub struct EnsembleStore {
    records: Vec<EnsembleRecord>,
    burn_in: usize,
}

impl EnsembleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with room for `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            burn_in: 0,
        }
    }

    /// Appends the next record; iteration indices must strictly increase.
    pub fn append(&mut self, record: EnsembleRecord) -> Result<(), IsoError> {
        if let Some(last) = self.records.last() {
            if record.iteration_index <= last.iteration_index {
                return Err(IsoError::Ensemble(
                    ErrorInfo::new("out-of-order-record", "ensemble records must be appended in iteration order")
                        .with_context("last", last.iteration_index)
                        .with_context("offered", record.iteration_index),
                ));
            }
        }
        self.records.push(record);
        Ok(())
    }

    /// Appends the state produced by `iteration_index`.
    pub fn push_state(
        &mut self,
        iteration_index: usize,
        parameters: Arc<ModelParameters>,
    ) -> Result<(), IsoError> {
        self.append(EnsembleRecord {
            iteration_index,
            parameters,
        })
    }

    /// Every record in iteration order.
    pub fn snapshot(&self) -> &[EnsembleRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no record.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of leading records excluded from statistics.
    pub fn burn_in(&self) -> usize {
        self.burn_in
    }

    /// Moves the burn-in marker; it may not exceed the number of records.
    pub fn set_burn_in(&mut self, burn_in: usize) -> Result<(), IsoError> {
        if burn_in > self.records.len() {
            return Err(IsoError::Ensemble(
                ErrorInfo::new("burn-in-exceeds-ensemble", "burn-in larger than the stored ensemble")
                    .with_context("burn_in", burn_in)
                    .with_context("records", self.records.len()),
            ));
        }
        self.burn_in = burn_in;
        Ok(())
    }

    /// Records after the burn-in marker.
    pub fn usable(&self) -> &[EnsembleRecord] {
        &self.records[self.burn_in..]
    }

    /// `len() - burn_in()`.
    pub fn usable_count(&self) -> usize {
        self.records.len() - self.burn_in
    }

    /// Drops every record and resets the burn-in marker.
    pub fn clear(&mut self) {
        self.records.clear();
        self.burn_in = 0;
    }
}
