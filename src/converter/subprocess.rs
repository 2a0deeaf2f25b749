//! Sub-processes, event sub-processes, transactions and ad-hoc sub-processes.
//! Each owns a nested scope that is read and written through the registry.

use crate::error::Result;
use crate::model::flow::{AdhocSubProcess, FlowElement, SubProcess};
use crate::xml::writer::{Tag, XmlWriter};
use crate::xml::{Element, MODEL_NS};

use super::{
    activity_attrs, core_tag, read_scope, write_activity_children, write_documentation, write_extension_block,
    write_foreign_children, write_scope, ElementConverter, NodeReader, ACTIVITY_CHILDREN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    SubProcess,
    Transaction,
    Adhoc,
}

pub struct SubProcessConverter {
    kind: ScopeKind,
}

pub static SUB_PROCESS: SubProcessConverter = SubProcessConverter {
    kind: ScopeKind::SubProcess,
};
pub static TRANSACTION: SubProcessConverter = SubProcessConverter {
    kind: ScopeKind::Transaction,
};
pub static ADHOC_SUB_PROCESS: SubProcessConverter = SubProcessConverter { kind: ScopeKind::Adhoc };

const ADHOC_CHILDREN: [&str; 4] = [
    "multiInstanceLoopCharacteristics",
    "dataInputAssociation",
    "dataOutputAssociation",
    "completionCondition",
];

impl ElementConverter for SubProcessConverter {
    fn element_name(&self) -> &'static str {
        match self.kind {
            ScopeKind::SubProcess => "subProcess",
            ScopeKind::Transaction => "transaction",
            ScopeKind::Adhoc => "adHocSubProcess",
        }
    }

    fn read(&self, element: Element<'_>) -> Result<FlowElement> {
        let mut node = NodeReader::new(element)?;
        let mut core = node.core();
        let activity = node.activity()?;
        let (flow_elements, artifacts) = read_scope(element)?;
        // Only plain sub-processes have an event variant; elsewhere the flag stays an extension attribute
        let triggered_by_event = match self.kind {
            ScopeKind::SubProcess => node.attrs.plain_bool("triggeredByEvent", false)?,
            _ => false,
        };

        let mut adhoc = None;
        if self.kind == ScopeKind::Adhoc {
            adhoc = Some((
                node.attrs.plain("ordering"),
                node.attrs.plain_bool("cancelRemainingInstances", true)?,
                element
                    .child(MODEL_NS, "completionCondition")
                    .and_then(|c| c.trimmed_text()),
            ));
            node.finish_scope(&mut core, &ADHOC_CHILDREN);
        } else {
            node.finish_scope(&mut core, &ACTIVITY_CHILDREN);
        }

        let sub_process = SubProcess {
            core,
            activity,
            flow_elements,
            artifacts,
        };
        Ok(match (self.kind, adhoc) {
            (_, Some((ordering, cancel_remaining_instances, completion_condition))) => {
                FlowElement::AdhocSubProcess(AdhocSubProcess {
                    sub_process,
                    ordering,
                    cancel_remaining_instances,
                    completion_condition,
                })
            }
            (ScopeKind::Transaction, None) => FlowElement::Transaction(sub_process),
            _ if triggered_by_event => FlowElement::EventSubProcess(sub_process),
            _ => FlowElement::SubProcess(sub_process),
        })
    }

    fn write(&self, node: &FlowElement, w: &mut XmlWriter) -> Result<()> {
        let (sub_process, adhoc, triggered_by_event) = match (self.kind, node) {
            (ScopeKind::SubProcess, FlowElement::SubProcess(s)) => (s, None, false),
            (ScopeKind::SubProcess, FlowElement::EventSubProcess(s)) => (s, None, true),
            (ScopeKind::Transaction, FlowElement::Transaction(s)) => (s, None, false),
            (ScopeKind::Adhoc, FlowElement::AdhocSubProcess(a)) => (&a.sub_process, Some(a), false),
            _ => return Ok(()),
        };
        let core = &sub_process.core;
        let tag = activity_attrs(core_tag(self.element_name(), core), &sub_process.activity);
        let tag = if triggered_by_event {
            tag.attr("triggeredByEvent", "true")
        } else {
            tag
        };
        let tag = match adhoc {
            Some(adhoc) => {
                let tag = tag.opt_attr("ordering", adhoc.ordering.as_ref());
                if adhoc.cancel_remaining_instances {
                    tag
                } else {
                    tag.attr("cancelRemainingInstances", "false")
                }
            }
            None => tag,
        };
        w.open(tag.extension_attrs(&core.extension_attributes))?;
        write_documentation(core.documentation.as_deref(), w)?;
        write_extension_block(&core.execution_listeners, &core.extension_elements, false, |_| Ok(()), w)?;
        write_activity_children(&sub_process.activity, w)?;
        write_scope(&sub_process.flow_elements, &sub_process.artifacts, w)?;
        if let Some(condition) = adhoc.and_then(|a| a.completion_condition.as_ref()) {
            w.text_element(Tag::new("completionCondition"), condition)?;
        }
        write_foreign_children(core, w)?;
        w.close()
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::xml::XmlDocument;

    fn read(converter: &SubProcessConverter, body: &str) -> std::result::Result<FlowElement, Box<dyn Error>> {
        let xml = format!(r#"<process xmlns="{}">{}</process>"#, MODEL_NS, body);
        let doc = XmlDocument::parse(&xml)?;
        let element = doc.root().children().next().ok_or("no element")?;
        Ok(converter.read(element)?)
    }

    #[test]
    fn nested_scopes_are_read_recursively() -> std::result::Result<(), Box<dyn Error>> {
        let element = read(
            &SUB_PROCESS,
            r#"<subProcess id="outer">
                 <startEvent id="s1"/>
                 <subProcess id="inner"><userTask id="deep"/></subProcess>
                 <sequenceFlow id="f1" sourceRef="s1" targetRef="inner"/>
                 <textAnnotation id="note"><text>hi</text></textAnnotation>
               </subProcess>"#,
        )?;
        let outer = element.sub_process().unwrap();
        assert_eq!(outer.flow_elements.len(), 3);
        assert_eq!(outer.artifacts.len(), 1);
        let inner = outer.flow_elements[1].sub_process().unwrap();
        assert_eq!(inner.flow_elements[0].id(), "deep");
        assert!(outer.core.foreign_children.is_empty());
        Ok(())
    }

    #[test]
    fn triggered_by_event_makes_an_event_sub_process() -> std::result::Result<(), Box<dyn Error>> {
        let element = read(&SUB_PROCESS, r#"<subProcess id="e" triggeredByEvent="true"/>"#)?;
        assert!(matches!(element, FlowElement::EventSubProcess(_)));
        assert_eq!(element.xml_name(), "subProcess");
        Ok(())
    }

    #[test]
    fn triggered_by_event_survives_on_transactions_and_adhoc() -> std::result::Result<(), Box<dyn Error>> {
        for (converter, body) in [
            (&TRANSACTION, r#"<transaction id="tx" triggeredByEvent="true"/>"#),
            (&ADHOC_SUB_PROCESS, r#"<adHocSubProcess id="ah" triggeredByEvent="true"/>"#),
        ] {
            let element = read(converter, body)?;
            assert!(!matches!(element, FlowElement::EventSubProcess(_)));
            let flag = element.core().extension_attributes.first("triggeredByEvent").ok_or("flag dropped")?;
            assert_eq!(flag.value, "true");

            let mut writer = XmlWriter::new(0);
            converter.write(&element, &mut writer)?;
            let xml = String::from_utf8(writer.into_inner()?)?;
            assert!(xml.contains(r#"triggeredByEvent="true""#), "{}", xml);
        }
        Ok(())
    }

    #[test]
    fn adhoc_settings() -> std::result::Result<(), Box<dyn Error>> {
        let element = read(
            &ADHOC_SUB_PROCESS,
            r#"<adHocSubProcess id="a" ordering="Sequential" cancelRemainingInstances="false">
                 <task id="t"/>
                 <completionCondition>${done}</completionCondition>
               </adHocSubProcess>"#,
        )?;
        let FlowElement::AdhocSubProcess(adhoc) = element else {
            panic!("expected an ad-hoc sub-process");
        };
        assert_eq!(adhoc.ordering.as_deref(), Some("Sequential"));
        assert!(!adhoc.cancel_remaining_instances);
        assert_eq!(adhoc.completion_condition.as_deref(), Some("${done}"));
        assert_eq!(adhoc.sub_process.flow_elements.len(), 1);
        Ok(())
    }
}
