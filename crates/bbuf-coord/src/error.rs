/// Errors raised by a coordination service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordError {
    /// The service cannot grant or maintain the named object right now.
    Unavailable { name: String },
    /// The caller does not hold the lock the operation requires.
    NotOwner { name: String },
    /// No object was ever created under this name.
    UnknownObject { name: String },
    /// The named cell holds a value of a different type.
    TypeMismatch { name: String },
}

impl CoordError {
    /// Name of the object the error concerns.
    pub fn object_name(&self) -> &str {
        match self {
            CoordError::Unavailable { name }
            | CoordError::NotOwner { name }
            | CoordError::UnknownObject { name }
            | CoordError::TypeMismatch { name } => name,
        }
    }

    /// Whether the error reports a service outage rather than misuse.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CoordError::Unavailable { .. })
    }
}

impl std::fmt::Display for CoordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordError::Unavailable { name } => {
                write!(f, "coordination service unavailable for {name:?}")
            }
            CoordError::NotOwner { name } => {
                write!(f, "lock {name:?} is not held by the caller")
            }
            CoordError::UnknownObject { name } => write!(f, "no object named {name:?}"),
            CoordError::TypeMismatch { name } => {
                write!(f, "cell {name:?} holds a value of another type")
            }
        }
    }
}

impl std::error::Error for CoordError {}
