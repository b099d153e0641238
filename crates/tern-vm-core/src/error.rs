//! Errors raised while operating on values

use std::fmt;

use thiserror::Error;

use crate::value::Value;

/// Failure of a value-level operation
#[derive(Debug, Error)]
pub enum VmError {
    /// Wrong kind of value, e.g. calling a non-function or cloning a symbol
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Numeric argument out of range, e.g. a view outside its buffer
    #[error("RangeError: {0}")]
    RangeError(String),

    /// Engine-side failure not caused by script
    #[error("InternalError: {0}")]
    InternalError(String),

    /// Value graph nested deeper than the configured limit
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,

    /// A value thrown by script
    #[error("Uncaught {0}")]
    Exception(Box<ThrownValue>),
}

/// Script value carried by [`VmError::Exception`]
#[derive(Debug)]
pub struct ThrownValue {
    /// What was thrown
    pub value: Value,
    /// Rendering used in messages
    pub message: String,
}

impl fmt::Display for ThrownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl VmError {
    /// `TypeError` with `msg`
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// `RangeError` with `msg`
    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::RangeError(msg.into())
    }

    /// `InternalError` with `msg`
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Wrap a thrown script value
    pub fn exception(value: Value) -> Self {
        let message = value
            .as_str()
            .map_or_else(|| format!("{value:?}"), str::to_string);
        Self::Exception(Box::new(ThrownValue { value, message }))
    }

    /// Whether this is a `TypeError`
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::TypeError(_))
    }
}

/// Result alias for value-level operations
pub type VmResult<T> = Result<T, VmError>;
