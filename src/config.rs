//! Options for one parse or serialize call.
//!
//! Both option sets derive serde with `#[serde(default)]`, so a partial config
//! file fills the missing fields with the defaults below.

use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Encoding label of the input, UTF-8 when absent
    pub encoding: Option<String>,
    /// Run the structural check before building the model
    pub validate_schema: bool,
    /// Hand the finished model to the registered process validator
    pub validate: bool,
}

impl ParseOptions {
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_schema_validation(mut self, validate_schema: bool) -> Self {
        self.validate_schema = validate_schema;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub(crate) fn encoding(&self) -> Result<&'static Encoding> {
        resolve_encoding(self.encoding.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    pub encoding: Option<String>,
    /// Spaces per nesting level; 0 writes everything on one line
    pub indent: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            encoding: None,
            indent: 2,
        }
    }
}

impl WriteOptions {
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub(crate) fn encoding(&self) -> Result<&'static Encoding> {
        resolve_encoding(self.encoding.as_deref())
    }
}

fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        None => Ok(UTF_8),
        Some(label) => {
            Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| Error::UnsupportedEncoding(label.to_string()))
        }
    }
}

#[cfg(test)]
mod test {
    use std::error::Error as StdError;

    use super::*;

    #[test]
    fn partial_config_uses_defaults() -> std::result::Result<(), Box<dyn StdError>> {
        let options: WriteOptions = serde_json::from_str(r#"{"encoding": "ISO-8859-1"}"#)?;
        assert_eq!(options.indent, 2);
        assert_eq!(options.encoding()?.name(), "windows-1252");

        let options: ParseOptions = serde_json::from_str(r#"{"validate": true}"#)?;
        assert_eq!(options, ParseOptions::default().with_validation(true));
        Ok(())
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let options = ParseOptions::default().with_encoding("klingon");
        assert!(matches!(options.encoding(), Err(Error::UnsupportedEncoding(label)) if label == "klingon"));
    }
}
