use bbuf_coord::CoordError;

/// Errors returned by [`BoundedBuffer`](crate::BoundedBuffer) operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// A buffer needs at least one slot.
    ZeroCapacity,
    /// The coordination service failed; passed through unmodified.
    Coordination(CoordError),
}

impl BufferError {
    /// The underlying coordination failure, if any.
    pub fn coordination(&self) -> Option<&CoordError> {
        match self {
            BufferError::Coordination(err) => Some(err),
            BufferError::ZeroCapacity => None,
        }
    }
}

impl From<CoordError> for BufferError {
    fn from(err: CoordError) -> Self {
        BufferError::Coordination(err)
    }
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::ZeroCapacity => write!(f, "buffer capacity must be at least 1"),
            BufferError::Coordination(err) => write!(f, "coordination failure: {err}"),
        }
    }
}

impl std::error::Error for BufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BufferError::Coordination(err) => Some(err),
            BufferError::ZeroCapacity => None,
        }
    }
}
