use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// A numeric setting was zero where a positive value is required.
    #[error("`{0}` must be greater than 0")]
    ZeroValue(String),
    /// A list setting was empty where at least one entry is required.
    #[error("`{0}` must contain at least one entry")]
    EmptyList(String),
    /// A required string setting was empty.
    #[error("`{0}` cannot be empty")]
    EmptyValue(String),
    /// Two definitions were registered under names that normalize to the same key.
    #[error("definition name `{0}` is declared more than once")]
    DuplicateDefinition(String),
}
