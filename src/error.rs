// src/error.rs
//! Error handling for the entire crate.
//!
//! One enum with cheap discriminant matches; allocations happen only on
//! error paths. Everything composes with `?` through the [`Result`] alias.

use thiserror::Error;

use crate::value::ValueKind;

/// Main error type. Send + Sync + 'static, so it crosses thread and
/// `anyhow` boundaries without friction.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Schema id not present in the registry.
    #[error("schema '{0}' is not registered")]
    SchemaNotFound(String),

    /// Attribute name not declared by the runtime/material it was asked of.
    #[error("attribute '{name}' not found in '{owner}'")]
    AttributeNotFound { owner: String, name: String },

    /// String-keyed resource (texture, sampler, mesh, material) missing
    /// from its store.
    #[error("{kind} '{id}' is not loaded")]
    ResourceNotFound { kind: &'static str, id: String },

    /// A `set` carried a value of a different kind than the declaration.
    #[error("type mismatch for '{name}': expected {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: ValueKind,
        got: ValueKind,
    },

    /// Uniform storage request beyond the fixed slot budget. Surfaces at
    /// schema registration or runtime instantiation, never at draw time.
    #[error("uniform capacity exceeded for '{label}': {needed} slots needed, {capacity} available")]
    CapacityExceeded {
        label: String,
        needed: u32,
        capacity: u32,
    },

    /// Stale or unknown handle (destroyed node, bad pack slot, version out
    /// of range).
    #[error("stale or unknown {0} handle")]
    InvalidHandle(&'static str),

    /// Attribute name collision rejected at registration.
    #[error("attribute '{name}' in schema '{schema}' already declared by '{previous}'")]
    DuplicateAttribute {
        schema: String,
        name: String,
        previous: String,
    },

    /// Schema rejected by registration validation.
    #[error("schema '{id}' is invalid: {reason}")]
    InvalidSchema { id: String, reason: String },

    /// JSON schema/material source failed to parse.
    #[error("definition parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Error {
    #[inline]
    pub fn attribute_not_found(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AttributeNotFound {
            owner: owner.into(),
            name: name.into(),
        }
    }

    #[inline]
    pub fn resource_not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            kind,
            id: id.into(),
        }
    }

    // === Kind checks, handy in tests and retry logic ===

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::SchemaNotFound(_)
                | Error::AttributeNotFound { .. }
                | Error::ResourceNotFound { .. }
        )
    }

    #[inline]
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Error::TypeMismatch { .. })
    }

    #[inline]
    pub fn is_capacity(&self) -> bool {
        matches!(self, Error::CapacityExceeded { .. })
    }

    #[inline]
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, Error::InvalidHandle(_))
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;
