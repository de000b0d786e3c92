use std::fmt;

/// Outcomes of store operations that leave the state untouched.
#[derive(Debug)]
pub enum StoreError {
    /// The user dismissed the name prompt.
    Cancelled,
    /// The soundboard name was empty or whitespace.
    EmptyName,
    /// No soundboard has this id.
    SoundboardNotFound { id: String },
    /// Reading or writing the backing key-value store failed.
    Storage(anyhow::Error),
}

impl StoreError {
    /// `true` for the outcomes a UI should show as a notice rather than a failure.
    pub fn is_notice(&self) -> bool {
        !matches!(self, StoreError::Storage(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Cancelled => f.write_str("soundboard creation cancelled"),
            StoreError::EmptyName => f.write_str("soundboard name is required"),
            StoreError::SoundboardNotFound { id } => write!(f, "soundboard not found: {id}"),
            StoreError::Storage(err) => write!(f, "storage error: {err:#}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Storage(err) => Some(&**err),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Storage(err)
    }
}
