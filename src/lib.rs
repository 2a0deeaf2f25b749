pub mod config;
pub mod converter;
pub mod error;
pub mod model;
pub mod validation;
pub mod xml;

use tracing::{debug, warn};

pub use config::{ParseOptions, WriteOptions};
pub use error::*;
pub use model::BpmnModel;
pub use validation::ProcessValidator;

use converter::{assembler, serializer};
use encoding_rs::UTF_8;
use xml::writer::XmlWriter;
use xml::{schema, XmlDocument};

/// Converts BPMN 2.0 documents to [`BpmnModel`]s and back.
///
/// The converter itself holds no per-document state; one instance can serve
/// any number of parse and serialize calls.
#[derive(Default)]
pub struct BpmnXmlConverter {
    validator: Option<Box<dyn ProcessValidator>>,
}

impl BpmnXmlConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the validator run when [`ParseOptions::validate`] is set
    pub fn with_validator(mut self, validator: impl ProcessValidator + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Decode `bytes` and build the model they describe
    pub fn parse(&self, bytes: &[u8], options: &ParseOptions) -> Result<BpmnModel> {
        let encoding = options.encoding()?;
        let (text, used, _) = encoding.decode(bytes);
        debug!(encoding = used.name(), bytes = bytes.len(), "decoding document");
        self.parse_str(&text, options)
    }

    /// Build the model from already decoded text
    pub fn parse_str(&self, text: &str, options: &ParseOptions) -> Result<BpmnModel> {
        let document = XmlDocument::parse(text)?;
        if options.validate_schema {
            schema::check(&document)?;
        }
        let model = assembler::assemble(&document)?;
        if options.validate {
            match &self.validator {
                Some(validator) => validator.validate(&model)?,
                None => warn!("validation requested but no process validator is registered"),
            }
        }
        Ok(model)
    }

    /// Write `model` as a document in the requested encoding
    pub fn serialize(&self, model: &BpmnModel, options: &WriteOptions) -> Result<Vec<u8>> {
        let encoding = options.encoding()?.output_encoding();
        let mut writer = XmlWriter::new(options.indent);
        writer.declaration(encoding.name())?;
        serializer::write_model(model, &mut writer)?;
        let bytes = writer.into_inner()?;
        if encoding == UTF_8 {
            return Ok(bytes);
        }
        let text = String::from_utf8(bytes).map_err(|e| Error::malformed(0, e.to_string()))?;
        let (encoded, _, _) = encoding.encode(&text);
        Ok(encoded.into_owned())
    }
}
