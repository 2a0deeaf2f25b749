//! Data objects and data store references.
//!
//! A data object's `itemSubjectRef` names its value kind; the value itself is an
//! engine `value` child of its extension block, decoded with that kind.

use crate::error::{Error, Result};
use crate::model::data::{DataKind, DataValue};
use crate::model::flow::{DataObject, DataStoreReference, FlowElement};
use crate::xml::writer::{Tag, XmlWriter};
use crate::xml::{Element, MODEL_NS};

use super::common::engine_tag;
use super::{core_tag, write_core_children, write_documentation, write_extension_block, write_foreign_children};
use super::{ElementConverter, NodeReader};

pub struct DataObjectConverter;

pub static DATA_OBJECT: DataObjectConverter = DataObjectConverter;

/// Decode the textual value of a data object typed by `item_subject_ref`
fn decode_value(item_subject_ref: Option<&str>, text: &str) -> Result<DataValue> {
    match item_subject_ref.and_then(DataKind::from_structure_ref) {
        Some(kind) => kind
            .parse(text)
            .ok_or_else(|| Error::invalid_value("dataObject", "value", text, kind.name())),
        None => Ok(DataValue::String(text.to_string())),
    }
}

impl ElementConverter for DataObjectConverter {
    fn element_name(&self) -> &'static str {
        "dataObject"
    }

    fn read(&self, element: Element<'_>) -> Result<FlowElement> {
        let mut node = NodeReader::new(element)?;
        let mut core = node.core();
        let item_subject_ref = node.attrs.plain("itemSubjectRef");
        let collection = node.attrs.plain_bool("isCollection", false)?;
        let value = match node.block.value.take() {
            Some(text) => Some(decode_value(item_subject_ref.as_deref(), &text)?),
            None => None,
        };
        node.finish(&mut core, &[]);
        Ok(FlowElement::DataObject(DataObject {
            core,
            item_subject_ref,
            value,
            collection,
        }))
    }

    fn write(&self, node: &FlowElement, w: &mut XmlWriter) -> Result<()> {
        let FlowElement::DataObject(object) = node else {
            return Ok(());
        };
        let tag = core_tag(self.element_name(), &object.core).opt_attr("itemSubjectRef", object.item_subject_ref.as_ref());
        let tag = if object.collection {
            tag.attr("isCollection", "true")
        } else {
            tag
        };
        w.open(tag.extension_attrs(&object.core.extension_attributes))?;
        write_documentation(object.core.documentation.as_deref(), w)?;
        write_extension_block(
            &object.core.execution_listeners,
            &object.core.extension_elements,
            object.value.is_some(),
            |w| match &object.value {
                Some(value) => w.text_element(engine_tag("value"), &value.encode()),
                None => Ok(()),
            },
            w,
        )?;
        write_foreign_children(&object.core, w)?;
        w.close()
    }
}

pub struct DataStoreReferenceConverter;

pub static DATA_STORE_REFERENCE: DataStoreReferenceConverter = DataStoreReferenceConverter;

impl ElementConverter for DataStoreReferenceConverter {
    fn element_name(&self) -> &'static str {
        "dataStoreReference"
    }

    fn read(&self, element: Element<'_>) -> Result<FlowElement> {
        let mut node = NodeReader::new(element)?;
        let mut core = node.core();
        let reference = DataStoreReference {
            data_store_ref: node.attrs.plain("dataStoreRef"),
            item_subject_ref: node.attrs.plain("itemSubjectRef"),
            data_state: element
                .child(MODEL_NS, "dataState")
                .and_then(|state| state.attribute("name"))
                .map(str::to_string),
            ..Default::default()
        };
        node.finish(&mut core, &["dataState"]);
        Ok(FlowElement::DataStoreReference(DataStoreReference { core, ..reference }))
    }

    fn write(&self, node: &FlowElement, w: &mut XmlWriter) -> Result<()> {
        let FlowElement::DataStoreReference(reference) = node else {
            return Ok(());
        };
        let tag = core_tag(self.element_name(), &reference.core)
            .opt_attr("dataStoreRef", reference.data_store_ref.as_ref())
            .opt_attr("itemSubjectRef", reference.item_subject_ref.as_ref());
        w.open(tag.extension_attrs(&reference.core.extension_attributes))?;
        write_core_children(&reference.core, w)?;
        if let Some(state) = &reference.data_state {
            w.empty(Tag::new("dataState").attr("name", state))?;
        }
        write_foreign_children(&reference.core, w)?;
        w.close()
    }
}

#[cfg(test)]
mod test {
    use std::error::Error as StdError;

    use chrono::NaiveDate;

    use super::*;
    use crate::xml::{XmlDocument, ENGINE_NS};

    fn read_object(subject: &str, value: &str) -> Result<FlowElement> {
        let xml = format!(
            r#"<dataObject xmlns="{}" xmlns:flowable="{}" id="d" itemSubjectRef="{}">
                 <extensionElements><flowable:value>{}</flowable:value></extensionElements>
               </dataObject>"#,
            MODEL_NS, ENGINE_NS, subject, value
        );
        let doc = XmlDocument::parse(&xml)?;
        DATA_OBJECT.read(doc.root())
    }

    #[test]
    fn long_and_date_values() -> std::result::Result<(), Box<dyn StdError>> {
        let FlowElement::DataObject(long) = read_object("xsd:long", "-123456")? else {
            panic!("expected a data object");
        };
        assert_eq!(long.value, Some(DataValue::Long(-123456)));
        assert_eq!(long.value.unwrap().encode(), "-123456");

        let FlowElement::DataObject(date) = read_object("xsd:datetime", "2013-09-16T11:23:00")? else {
            panic!("expected a data object");
        };
        let expected = NaiveDate::from_ymd_opt(2013, 9, 16)
            .and_then(|d| d.and_hms_opt(11, 23, 0))
            .ok_or("bad date")?;
        assert_eq!(date.value, Some(DataValue::Date(expected)));
        Ok(())
    }

    #[test]
    fn mistyped_value_is_rejected() {
        let error = read_object("xsd:int", "twelve").unwrap_err();
        assert!(matches!(error, Error::InvalidAttributeValue { .. }));
    }

    #[test]
    fn unknown_structure_keeps_text() -> std::result::Result<(), Box<dyn StdError>> {
        let FlowElement::DataObject(object) = read_object("custom:thing", "raw")? else {
            panic!("expected a data object");
        };
        assert_eq!(object.value, Some(DataValue::String("raw".into())));
        assert_eq!(object.item_subject_ref.as_deref(), Some("custom:thing"));
        Ok(())
    }
}
