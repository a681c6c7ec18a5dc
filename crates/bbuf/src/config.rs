/// Default number of slots.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default prefix of the lock name; a random UUID is appended per buffer.
pub const DEFAULT_NAME_PREFIX: &str = "BoundedBuffer";

/// Name of the condition producers wait on.
pub const NOT_FULL_CONDITION: &str = "isFull";

/// Name of the condition consumers wait on.
pub const NOT_EMPTY_CONDITION: &str = "isEmpty";

/// Construction parameters of a [`BoundedBuffer`](crate::BoundedBuffer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Number of slots; fixed for the lifetime of the buffer.
    pub capacity: usize,
    /// Prefix of the lock name.
    pub name_prefix: String,
}

impl BufferConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            name_prefix: DEFAULT_NAME_PREFIX.to_owned(),
        }
    }
}
