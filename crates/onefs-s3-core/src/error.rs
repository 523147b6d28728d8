//! Error types for identity-name encoding and recognition.

use thiserror::Error;

/// Errors raised while building the recognition pattern or decoding a name.
#[derive(Debug, Error)]
pub enum NamingError {
    /// The recognition pattern could not be compiled for the configured prefix.
    #[error("identity name pattern failed to compile")]
    Pattern {
        /// Username prefix the pattern was built for.
        prefix: String,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// A matched name was missing a capture the pattern guarantees.
    #[error("identity name missing component")]
    MissingComponent {
        /// Identity name being decoded.
        name: String,
        /// Capture group that was absent.
        component: &'static str,
    },
    /// The embedded timestamp did not parse.
    #[error("identity name timestamp invalid")]
    Timestamp {
        /// Identity name being decoded.
        name: String,
        /// Timestamp text extracted from the name.
        value: String,
        /// Underlying chrono parse error.
        source: chrono::ParseError,
    },
    /// The embedded timestamp does not exist in the local time zone.
    #[error("identity name timestamp not representable in local time")]
    LocalTime {
        /// Identity name being decoded.
        name: String,
        /// Timestamp text extracted from the name.
        value: String,
    },
}

/// Convenience alias for naming results.
pub type NamingResult<T> = Result<T, NamingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn naming_errors_use_constant_messages() {
        let err = NamingError::MissingComponent {
            name: "vault_x".to_string(),
            component: "stamp",
        };
        assert_eq!(err.to_string(), "identity name missing component");
        assert!(err.source().is_none());

        let Err(parse) = chrono::NaiveDateTime::parse_from_str("nope", "%Y") else {
            panic!("expected parse failure");
        };
        let err = NamingError::Timestamp {
            name: "vault_x".to_string(),
            value: "nope".to_string(),
            source: parse,
        };
        assert_eq!(err.to_string(), "identity name timestamp invalid");
        assert!(err.source().is_some());
    }
}
