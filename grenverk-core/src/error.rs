use thiserror::Error;

/// Failure to obtain memory for index nodes or arena objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("Arena limit of {limit} bytes exhausted")]
    ArenaExhausted { limit: usize },

    #[error("Node limit of {limit} nodes reached")]
    NodeLimit { limit: usize },

    #[error("Slab reservation of {bytes} bytes failed")]
    SlabReservation { bytes: usize },
}

/// Outcome of a failed radix trie operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadixError {
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] AllocError),

    /// A value is already registered at this exact prefix.
    #[error("Key conflict: prefix already holds a value")]
    KeyConflict,

    #[error("Prefix not found")]
    NotFound,
}
