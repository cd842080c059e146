/// Errors raised by a [`TableStore`](crate::TableStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A write would break a uniqueness constraint. Nothing was changed.
    #[error("unique constraint `{constraint}` violated")]
    UniqueViolation { constraint: &'static str },

    /// A row failed a structural check (type tag count, level range, ...).
    #[error("check constraint failed: {0}")]
    CheckViolation(String),

    /// A row the operation depends on doesn't exist.
    #[error("{table} row not found")]
    NotFound { table: &'static str },

    /// The store couldn't be reached. Transient; nothing was changed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_unique_violation(&self, name: &str) -> bool {
        matches!(self, Self::UniqueViolation { constraint } if *constraint == name)
    }
}
