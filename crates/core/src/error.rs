//! Error taxonomy for the Cb interpreter core.
//!
//! Every fallible operation in the core returns `CbResult<T>`. The variants
//! mirror the error kinds in the language spec's error-handling table:
//! declaration errors, type violations, access errors, arithmetic errors,
//! resource errors, and user assertions. Warnings are not part of this enum
//! — they are non-fatal and go through `tracing::warn!` instead.

use crate::ast::SourceLocation;
use std::fmt;

/// A single interpreter error, optionally located in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct CbError {
    pub kind: CbErrorKind,
    pub location: Option<SourceLocation>,
}

/// The kind of failure, matching the spec's error taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub enum CbErrorKind {
    /// Redefinition, recursive-struct-value cycles, unknown types, invalid
    /// array sizes.
    Declaration(String),
    /// Range overflow, union value not in allow-set, typedef mismatch,
    /// mixed types in an array literal.
    TypeViolation(String),
    /// Undefined variable, missing struct member, out-of-bounds index, null
    /// dereference, private member access from outside an impl.
    Access(String),
    /// Division or modulo by zero.
    Arithmetic(String),
    /// `new` allocation failure.
    Resource(String),
    /// `assert(false)`.
    Assertion(String),
}

impl CbError {
    pub fn new(kind: CbErrorKind) -> Self {
        CbError {
            kind,
            location: None,
        }
    }

    pub fn at(kind: CbErrorKind, location: SourceLocation) -> Self {
        CbError {
            kind,
            location: Some(location),
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        if self.location.is_none() {
            self.location = Some(location);
        }
        self
    }

    pub fn declaration(msg: impl Into<String>) -> Self {
        CbError::new(CbErrorKind::Declaration(msg.into()))
    }

    pub fn type_violation(msg: impl Into<String>) -> Self {
        CbError::new(CbErrorKind::TypeViolation(msg.into()))
    }

    pub fn access(msg: impl Into<String>) -> Self {
        CbError::new(CbErrorKind::Access(msg.into()))
    }

    pub fn arithmetic(msg: impl Into<String>) -> Self {
        CbError::new(CbErrorKind::Arithmetic(msg.into()))
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        CbError::new(CbErrorKind::Resource(msg.into()))
    }

    pub fn assertion(msg: impl Into<String>) -> Self {
        CbError::new(CbErrorKind::Assertion(msg.into()))
    }

    /// Message text without location, for tests that only care about content.
    pub fn message(&self) -> &str {
        match &self.kind {
            CbErrorKind::Declaration(s)
            | CbErrorKind::TypeViolation(s)
            | CbErrorKind::Access(s)
            | CbErrorKind::Arithmetic(s)
            | CbErrorKind::Resource(s)
            | CbErrorKind::Assertion(s) => s,
        }
    }
}

impl fmt::Display for CbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}: {}", loc, self.message()),
            None => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for CbError {}

pub type CbResult<T> = Result<T, CbError>;
