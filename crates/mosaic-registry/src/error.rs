//! Registry error types

use thiserror::Error;

/// Registry errors
///
/// All of these indicate host application programming errors and are
/// returned synchronously to the caller.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("dependency \"{0}\" already installed, check your wiring")]
    DuplicateDependency(String),

    #[error("dependency \"{0}\" is not provided to the dependency registry")]
    UnresolvedDependency(String),

    #[error("unknown-dependency resolver is not a callable resolver")]
    InvalidResolver,

    #[error("module \"{0}\" is not declared in the manifest list")]
    UnknownModule(String),

    #[error("manifest \"{0}\" is already registered")]
    DuplicateManifest(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
