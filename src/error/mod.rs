//! This module defines the error type for the converter.
//!
//! Every parse-time failure is fatal to the call that raised it: the first error
//! bubbles up through the recursive descent and no partial model is returned.

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    /// The input is not well-formed XML (this includes an empty input)
    #[error("malformed document at byte {position}: {message}")]
    MalformedDocument { position: u64, message: String },

    /// An attribute value does not match the type it is declared with
    #[error("'{value}' is not valid {expected} in attribute '{attribute}' of element '{element}'")]
    InvalidAttributeValue {
        element: String,
        attribute: String,
        value: String,
        expected: &'static str,
    },

    /// An attribute the element cannot live without is absent or blank
    #[error("{message}")]
    MissingRequiredAttribute {
        element: String,
        attribute: &'static str,
        message: String,
    },

    /// Raised by process validators only; the converter itself never resolves references
    #[error("element '{element}' references unknown id '{reference}'")]
    UnresolvedReference { element: String, reference: String },

    /// The document failed the optional structural schema check
    #[error("schema violation in '{element}': {message}")]
    SchemaViolation { element: String, message: String },

    /// The caller asked for an encoding we cannot decode or encode
    #[error("unsupported encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(position: u64, message: impl Into<String>) -> Self {
        Error::MalformedDocument {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_value(
        element: &str,
        attribute: &str,
        value: &str,
        expected: &'static str,
    ) -> Self {
        Error::InvalidAttributeValue {
            element: element.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
            expected,
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        match e {
            quick_xml::Error::Io(io) => Error::Io(std::io::Error::new(io.kind(), io.to_string())),
            other => Error::malformed(0, other.to_string()),
        }
    }
}
