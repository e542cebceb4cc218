//! Read model trait for query-side views.

/// Query side of a projection.
pub trait ReadModel: Send + Sync {
    /// Returns the name of this read model.
    fn name(&self) -> &'static str;

    /// Number of entries, or 0 while a writer holds the model.
    fn count(&self) -> usize;
}
