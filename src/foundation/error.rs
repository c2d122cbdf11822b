/// Convenience result type used across the booth core.
pub type BoothResult<T> = Result<T, BoothError>;

/// Top-level error taxonomy used by booth APIs.
#[derive(thiserror::Error, Debug)]
pub enum BoothError {
    /// Invalid user-provided configuration or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// An image or other resource could not be fetched or decoded.
    #[error("resource error: {0}")]
    Resource(String),

    /// A platform capability (encoder, drawing surface) is unavailable.
    #[error("capability unavailable: {0}")]
    Capability(String),

    /// Upload or other transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BoothError {
    /// Build a [`BoothError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`BoothError::Resource`] value.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Build a [`BoothError::Capability`] value.
    pub fn capability(msg: impl Into<String>) -> Self {
        Self::Capability(msg.into())
    }

    /// Build a [`BoothError::Transport`] value.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Build a [`BoothError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
