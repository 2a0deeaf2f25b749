use crate::error::Result;
use crate::model::flow::{FlowElement, Gateway};
use crate::xml::writer::XmlWriter;
use crate::xml::Element;

use super::{core_tag, engine_flag, write_core_children, write_foreign_children, ElementConverter, NodeReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GatewayKind {
    Exclusive,
    Parallel,
    Inclusive,
    Event,
    Complex,
}

pub struct GatewayConverter {
    kind: GatewayKind,
}

pub static EXCLUSIVE_GATEWAY: GatewayConverter = GatewayConverter {
    kind: GatewayKind::Exclusive,
};
pub static PARALLEL_GATEWAY: GatewayConverter = GatewayConverter {
    kind: GatewayKind::Parallel,
};
pub static INCLUSIVE_GATEWAY: GatewayConverter = GatewayConverter {
    kind: GatewayKind::Inclusive,
};
pub static EVENT_GATEWAY: GatewayConverter = GatewayConverter { kind: GatewayKind::Event };
pub static COMPLEX_GATEWAY: GatewayConverter = GatewayConverter {
    kind: GatewayKind::Complex,
};

impl ElementConverter for GatewayConverter {
    fn element_name(&self) -> &'static str {
        match self.kind {
            GatewayKind::Exclusive => "exclusiveGateway",
            GatewayKind::Parallel => "parallelGateway",
            GatewayKind::Inclusive => "inclusiveGateway",
            GatewayKind::Event => "eventBasedGateway",
            GatewayKind::Complex => "complexGateway",
        }
    }

    fn read(&self, element: Element<'_>) -> Result<FlowElement> {
        let mut node = NodeReader::new(element)?;
        let mut core = node.core();
        let default_flow = node.attrs.plain("default");
        let asynchronous = node.attrs.engine_bool("async", false)?;
        let exclusive = node.attrs.engine_bool("exclusive", true)?;
        node.finish(&mut core, &[]);
        let gateway = Gateway {
            core,
            default_flow,
            asynchronous,
            exclusive,
        };
        Ok(match self.kind {
            GatewayKind::Exclusive => FlowElement::ExclusiveGateway(gateway),
            GatewayKind::Parallel => FlowElement::ParallelGateway(gateway),
            GatewayKind::Inclusive => FlowElement::InclusiveGateway(gateway),
            GatewayKind::Event => FlowElement::EventGateway(gateway),
            GatewayKind::Complex => FlowElement::ComplexGateway(gateway),
        })
    }

    fn write(&self, node: &FlowElement, w: &mut XmlWriter) -> Result<()> {
        let gateway = match (self.kind, node) {
            (GatewayKind::Exclusive, FlowElement::ExclusiveGateway(g))
            | (GatewayKind::Parallel, FlowElement::ParallelGateway(g))
            | (GatewayKind::Inclusive, FlowElement::InclusiveGateway(g))
            | (GatewayKind::Event, FlowElement::EventGateway(g))
            | (GatewayKind::Complex, FlowElement::ComplexGateway(g)) => g,
            _ => return Ok(()),
        };
        let tag = core_tag(self.element_name(), &gateway.core).opt_attr("default", gateway.default_flow.as_ref());
        let tag = engine_flag(tag, "async", gateway.asynchronous, false);
        let tag = engine_flag(tag, "exclusive", gateway.exclusive, true);
        w.open(tag.extension_attrs(&gateway.core.extension_attributes))?;
        write_core_children(&gateway.core, w)?;
        write_foreign_children(&gateway.core, w)?;
        w.close()
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::xml::{XmlDocument, ENGINE_NS, MODEL_NS};

    #[test]
    fn default_flow_and_flags() -> std::result::Result<(), Box<dyn Error>> {
        let xml = format!(
            r#"<exclusiveGateway xmlns="{}" xmlns:flowable="{}" id="gw" default="f2" flowable:async="true"/>"#,
            MODEL_NS, ENGINE_NS
        );
        let doc = XmlDocument::parse(&xml)?;
        let FlowElement::ExclusiveGateway(gateway) = EXCLUSIVE_GATEWAY.read(doc.root())? else {
            panic!("expected an exclusive gateway");
        };
        assert_eq!(gateway.default_flow.as_deref(), Some("f2"));
        assert!(gateway.asynchronous);
        assert!(gateway.exclusive);
        assert!(gateway.core.extension_attributes.is_empty());
        Ok(())
    }

    #[test]
    fn converters_ignore_foreign_variants() -> std::result::Result<(), Box<dyn Error>> {
        let element = FlowElement::ParallelGateway(Gateway::new(Default::default()));
        let mut writer = XmlWriter::new(0);
        EXCLUSIVE_GATEWAY.write(&element, &mut writer)?;
        assert!(writer.into_inner()?.is_empty());
        Ok(())
    }
}
