//! Request validation helpers shared by handlers

use crate::error::ApiError;

/// Trait for validating request payloads before any work happens.
pub trait RequestValidation {
    /// Returns `Ok(())` if validation passes, or `Err(ApiError)` with a
    /// validation error message if it fails.
    fn validate(&self) -> Result<(), ApiError>;
}

/// Validate a field with a custom predicate.
#[macro_export]
macro_rules! validate_field {
    ($field:expr, $predicate:expr, $message:expr) => {
        if !$predicate {
            return Err($crate::error::ApiError::validation($message));
        }
    };
}

/// Validate that a string field is non-empty.
#[macro_export]
macro_rules! validate_required {
    ($field:expr, $message:expr) => {
        validate_field!($field, !$field.trim().is_empty(), $message);
    };
}

/// Validate string length bounds.
#[macro_export]
macro_rules! validate_length {
    ($field:expr, $min:expr, $max:expr, $message:expr) => {
        let len = $field.len();
        validate_field!($field, len >= $min && len <= $max, $message);
    };
}

/// Validate a minimally well-formed email address.
#[macro_export]
macro_rules! validate_email {
    ($field:expr, $message:expr) => {
        validate_field!(
            $field,
            $field.contains('@') && $field.contains('.') && $field.len() <= 254,
            $message
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        name: String,
    }

    impl RequestValidation for Sample {
        fn validate(&self) -> Result<(), ApiError> {
            validate_required!(self.name, "Name is required");
            validate_length!(self.name, 2, 10, "Name must be between 2 and 10 characters");
            Ok(())
        }
    }

    #[test]
    fn rejects_empty_and_out_of_bounds() {
        assert!(Sample { name: "  ".into() }.validate().is_err());
        assert!(Sample { name: "a".into() }.validate().is_err());
        assert!(Sample { name: "abc".into() }.validate().is_ok());
    }

    struct Contact {
        email: String,
    }

    impl RequestValidation for Contact {
        fn validate(&self) -> Result<(), ApiError> {
            validate_email!(self.email, "Invalid email address");
            Ok(())
        }
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(Contact { email: "a@b.com".into() }.validate().is_ok());
        assert!(Contact { email: "not-an-email".into() }.validate().is_err());
    }
}
