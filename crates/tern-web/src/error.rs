//! Web layer error types

use tern_vm_core::VmError;
use thiserror::Error;

fn plural(count: &usize) -> &'static str {
    if *count == 1 { "" } else { "s" }
}

/// Errors raised by the web utility layer
#[derive(Debug, Error)]
pub enum WebError {
    /// Too few arguments were passed to a web API
    #[error(
        "{name} requires at least {required} argument{}, but only {length} present",
        plural(.required)
    )]
    ArgumentCount {
        /// API name as shown to script, e.g. `Window.postMessage`
        name: String,
        /// Minimum number of arguments
        required: usize,
        /// Number actually passed
        length: usize,
    },

    /// A value could not be structurally cloned
    #[error("{0}")]
    DataClone(String),

    /// A host class was constructed without the host's key
    #[error("Illegal constructor")]
    IllegalConstructor,

    /// Any other VM failure, propagated unchanged
    #[error(transparent)]
    Vm(#[from] VmError),
}

impl WebError {
    /// Create a `DataCloneError`
    pub fn data_clone(message: impl Into<String>) -> Self {
        Self::DataClone(message.into())
    }

    /// Script-visible error class
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::ArgumentCount { .. } | Self::IllegalConstructor => "TypeError",
            Self::DataClone(_) => "DOMException",
            Self::Vm(VmError::TypeError(_)) => "TypeError",
            Self::Vm(VmError::RangeError(_) | VmError::StackOverflow) => "RangeError",
            Self::Vm(VmError::InternalError(_)) => "InternalError",
            Self::Vm(VmError::Exception(_)) => "Error",
        }
    }

    /// `DOMException` name, for errors surfaced as a `DOMException`
    pub fn dom_exception_name(&self) -> Option<&'static str> {
        match self {
            Self::DataClone(_) => Some("DataCloneError"),
            _ => None,
        }
    }
}

/// Result type for web layer operations
pub type WebResult<T> = std::result::Result<T, WebError>;
