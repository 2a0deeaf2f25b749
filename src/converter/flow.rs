use crate::error::Result;
use crate::model::flow::{FlowElement, SequenceFlow};
use crate::xml::writer::{Tag, XmlWriter};
use crate::xml::{Element, MODEL_NS, XSI_NS};

use super::{core_tag, engine_attr, write_core_children, write_foreign_children, ElementConverter, NodeReader};

pub struct SequenceFlowConverter;

pub static SEQUENCE_FLOW: SequenceFlowConverter = SequenceFlowConverter;

impl ElementConverter for SequenceFlowConverter {
    fn element_name(&self) -> &'static str {
        "sequenceFlow"
    }

    fn read(&self, element: Element<'_>) -> Result<FlowElement> {
        let mut node = NodeReader::new(element)?;
        let mut core = node.core();
        let source_ref = node.attrs.plain("sourceRef").unwrap_or_default();
        let target_ref = node.attrs.plain("targetRef").unwrap_or_default();
        let skip_expression = node.attrs.engine("skipExpression");
        let condition_expression = element
            .child(MODEL_NS, "conditionExpression")
            .and_then(|c| c.trimmed_text());
        node.finish(&mut core, &["conditionExpression"]);
        Ok(FlowElement::SequenceFlow(SequenceFlow {
            core,
            source_ref,
            target_ref,
            condition_expression,
            skip_expression,
        }))
    }

    fn write(&self, node: &FlowElement, w: &mut XmlWriter) -> Result<()> {
        let FlowElement::SequenceFlow(flow) = node else {
            return Ok(());
        };
        let tag = core_tag(self.element_name(), &flow.core)
            .attr("sourceRef", &flow.source_ref)
            .attr("targetRef", &flow.target_ref);
        let tag = engine_attr(tag, "skipExpression", flow.skip_expression.as_ref());
        w.open(tag.extension_attrs(&flow.core.extension_attributes))?;
        write_core_children(&flow.core, w)?;
        if let Some(condition) = &flow.condition_expression {
            let tag = Tag::new("conditionExpression").ns_attr("xsi", XSI_NS, "type", "tFormalExpression");
            w.cdata_element(tag, condition)?;
        }
        write_foreign_children(&flow.core, w)?;
        w.close()
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::xml::XmlDocument;

    #[test]
    fn condition_round_trips() -> std::result::Result<(), Box<dyn Error>> {
        let xml = format!(
            r#"<sequenceFlow xmlns="{}" xmlns:xsi="{}" id="f" sourceRef="a" targetRef="b">
                 <conditionExpression xsi:type="tFormalExpression"><![CDATA[${{amount > 100}}]]></conditionExpression>
               </sequenceFlow>"#,
            MODEL_NS, XSI_NS
        );
        let doc = XmlDocument::parse(&xml)?;
        let element = SEQUENCE_FLOW.read(doc.root())?;

        let mut writer = XmlWriter::new(0);
        SEQUENCE_FLOW.write(&element, &mut writer)?;
        let written = String::from_utf8(writer.into_inner()?)?;
        let reparsed = XmlDocument::parse(&written.replace("<sequenceFlow ", &format!(r#"<sequenceFlow xmlns="{}" "#, MODEL_NS)))?;
        let FlowElement::SequenceFlow(flow) = SEQUENCE_FLOW.read(reparsed.root())? else {
            panic!("expected a sequence flow");
        };
        assert_eq!(flow.condition_expression.as_deref(), Some("${amount > 100}"));
        assert_eq!(flow.source_ref, "a");
        assert_eq!(FlowElement::SequenceFlow(flow), element);
        Ok(())
    }
}
