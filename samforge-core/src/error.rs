//! Error types for samforge-core

use thiserror::Error;

/// Result type alias using samforge Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while synthesizing or invoking adapters
#[derive(Debug, Error)]
pub enum Error {
    /// Target type is not an interface, or does not have exactly one abstract method
    #[error("{name} is not a single-abstract-method interface: {reason}")]
    NotASamInterface { name: String, reason: String },

    /// The SAM method takes more parameters than the callable ABI supports
    #[error("{method} takes {arity} parameters, but at most {max} are supported")]
    UnsupportedArity {
        method: String,
        arity: usize,
        max: usize,
    },

    /// A value could not be boxed or unboxed to the declared primitive kind
    #[error("cannot coerce {found} to {expected}")]
    Coercion { expected: String, found: String },

    /// A value does not conform to the required reference type
    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },

    /// Arguments passed to an adapter do not match the SAM signature
    #[error("invalid arguments for {method}: {reason}")]
    InvalidArguments { method: String, reason: String },

    /// A method was invoked on an object that does not provide it
    #[error("no method {method} on {class}")]
    NoSuchMethod { class: String, method: String },

    /// The wrapped callable reported a failure
    #[error("callable failed: {0}")]
    CallableFailed(String),

    /// Generated or supplied name is not a valid class name
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Malformed field or method descriptor
    #[error("invalid descriptor {descriptor:?}: {reason}")]
    InvalidDescriptor { descriptor: String, reason: String },

    /// A referenced type could not be found by the resolver
    #[error("unresolved type: {0}")]
    UnresolvedType(String),

    /// Malformed class file
    #[error("malformed class file: {0}")]
    ClassFormat(String),

    /// Class file could not be encoded
    #[error("failed to encode class file: {0}")]
    Encoding(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_sam(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::NotASamInterface {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn bad_descriptor(descriptor: &str, reason: impl Into<String>) -> Self {
        Error::InvalidDescriptor {
            descriptor: descriptor.to_string(),
            reason: reason.into(),
        }
    }
}
