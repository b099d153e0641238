//! Argument validation and constructor guards shared by web APIs

use crate::error::{WebError, WebResult};

/// Fail with an `ArgumentCount` error when fewer than `required` arguments
/// were passed.
pub fn required_arguments(name: &str, length: usize, required: usize) -> WebResult<()> {
    if length < required {
        return Err(WebError::ArgumentCount {
            name: name.to_string(),
            required,
            length,
        });
    }
    Ok(())
}

/// Token that host code passes to its own constructors.
///
/// The field is private, so only this crate can mint one; script-side
/// construction has no key and is rejected by [`check_illegal_constructor`].
#[derive(Debug)]
pub struct IllegalConstructorKey {
    _private: (),
}

static KEY: IllegalConstructorKey = IllegalConstructorKey { _private: () };

/// The host's constructor key
pub fn illegal_constructor_key() -> &'static IllegalConstructorKey {
    &KEY
}

/// Reject construction unless the host's key was supplied
pub fn check_illegal_constructor(key: Option<&IllegalConstructorKey>) -> WebResult<()> {
    match key {
        Some(_) => Ok(()),
        None => Err(WebError::IllegalConstructor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_arguments() {
        assert!(required_arguments("structuredClone", 1, 1).is_ok());
        assert!(required_arguments("structuredClone", 3, 1).is_ok());

        let err = required_arguments("structuredClone", 0, 1).unwrap_err();
        assert!(matches!(
            err,
            WebError::ArgumentCount {
                required: 1,
                length: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_illegal_constructor() {
        assert!(check_illegal_constructor(Some(illegal_constructor_key())).is_ok());
        let err = check_illegal_constructor(None).unwrap_err();
        assert_eq!(err.to_string(), "Illegal constructor");
        assert_eq!(err.class_name(), "TypeError");
    }
}
