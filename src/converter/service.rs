//! Service and send tasks.
//!
//! A `serviceTask` whose engine `type` names one of the known subtypes is read
//! into that subtype; every other type stays a plain service task and keeps
//! the type string.

use std::mem;

use crate::error::Result;
use crate::model::common::{Implementation, ImplementationType, IoParameter};
use crate::model::flow::{
    CaseServiceTask, ExternalWorkerServiceTask, FlowElement, HttpServiceTask, SendEventServiceTask, ServiceTask,
};
use crate::xml::writer::XmlWriter;
use crate::xml::{Element, ENGINE_NS};

use super::common::{write_field, write_io_parameter, write_map_exception};
use super::{
    activity_attrs, core_tag, engine_attr, engine_flag, write_activity_children, write_documentation,
    write_extension_block, write_foreign_children, ElementConverter, NodeReader, ACTIVITY_CHILDREN,
};

const HTTP: &str = "http";
const CASE: &str = "case";
const EXTERNAL_WORKER: &str = "external-worker";
const SEND_EVENT: &str = "send-event";

pub struct ServiceTaskConverter {
    send: bool,
}

pub static SERVICE_TASK: ServiceTaskConverter = ServiceTaskConverter { send: false };
pub static SEND_TASK: ServiceTaskConverter = ServiceTaskConverter { send: true };

/// Owner name the extension block of a task of `task_type` is resolved for
fn owner(send: bool, task_type: Option<&str>) -> &'static str {
    match task_type {
        _ if send => "sendTask",
        Some(HTTP) => "httpServiceTask",
        Some(CASE) => "caseServiceTask",
        Some(EXTERNAL_WORKER) => "externalWorkerServiceTask",
        Some(SEND_EVENT) => "sendEventServiceTask",
        _ => "serviceTask",
    }
}

impl ElementConverter for ServiceTaskConverter {
    fn element_name(&self) -> &'static str {
        if self.send {
            "sendTask"
        } else {
            "serviceTask"
        }
    }

    fn read(&self, element: Element<'_>) -> Result<FlowElement> {
        let declared_type = element.attribute_ns(ENGINE_NS, "type");
        let mut node = NodeReader::for_owner(element, owner(self.send, declared_type))?;
        let mut core = node.core();
        let activity = node.activity()?;
        let attrs = &mut node.attrs;
        let block = &mut node.block;

        let implementation = [
            ImplementationType::Class,
            ImplementationType::Expression,
            ImplementationType::DelegateExpression,
        ]
        .into_iter()
        .find_map(|kind| attrs.engine(kind.attribute_name()).map(|value| Implementation { kind, value }));
        let task_type = attrs.engine("type");
        let task = ServiceTask {
            activity,
            implementation,
            result_variable_name: attrs
                .engine("resultVariableName")
                .or_else(|| attrs.engine("resultVariable")),
            task_type: task_type.clone(),
            operation_ref: attrs.plain("operationRef"),
            triggerable: attrs.engine_bool("triggerable", false)?,
            field_extensions: mem::take(&mut block.fields),
            map_exceptions: mem::take(&mut block.map_exceptions),
            ..Default::default()
        };

        let mut flow_element = match task_type.as_deref() {
            _ if self.send => FlowElement::SendTask(task),
            Some(HTTP) => FlowElement::HttpServiceTask(HttpServiceTask {
                parallel_in_same_transaction: attrs.engine_opt_bool("parallelInSameTransaction")?,
                task,
            }),
            Some(CASE) => FlowElement::CaseServiceTask(CaseServiceTask {
                case_definition_key: attrs.engine("caseDefinitionKey"),
                case_instance_name: attrs.engine("caseInstanceName"),
                business_key: attrs.engine("businessKey"),
                inherit_business_key: attrs.engine_bool("inheritBusinessKey", false)?,
                same_deployment: attrs.engine_bool("sameDeployment", false)?,
                fallback_to_default_tenant: attrs.engine_bool("fallbackToDefaultTenant", false)?,
                in_parameters: mem::take(&mut block.in_parameters),
                out_parameters: mem::take(&mut block.out_parameters),
                task,
            }),
            Some(EXTERNAL_WORKER) => FlowElement::ExternalWorkerServiceTask(ExternalWorkerServiceTask {
                topic: attrs.engine("topic"),
                task,
            }),
            Some(SEND_EVENT) => FlowElement::SendEventServiceTask(SendEventServiceTask {
                event_type: attrs.engine("eventType"),
                trigger_event_type: attrs.engine("triggerEventType"),
                send_synchronously: attrs.engine_bool("sendSynchronously", false)?,
                event_in_parameters: mem::take(&mut block.event_in_parameters),
                event_out_parameters: mem::take(&mut block.event_out_parameters),
                task,
            }),
            _ => FlowElement::ServiceTask(task),
        };
        node.finish(&mut core, &ACTIVITY_CHILDREN);
        *flow_element.core_mut() = core;
        Ok(flow_element)
    }

    fn write(&self, node: &FlowElement, w: &mut XmlWriter) -> Result<()> {
        let (task, implied_type) = match (self.send, node) {
            (true, FlowElement::SendTask(task)) | (false, FlowElement::ServiceTask(task)) => (task, None),
            (false, FlowElement::HttpServiceTask(http)) => (&http.task, Some(HTTP)),
            (false, FlowElement::CaseServiceTask(case)) => (&case.task, Some(CASE)),
            (false, FlowElement::ExternalWorkerServiceTask(worker)) => (&worker.task, Some(EXTERNAL_WORKER)),
            (false, FlowElement::SendEventServiceTask(send)) => (&send.task, Some(SEND_EVENT)),
            _ => return Ok(()),
        };

        let tag = activity_attrs(core_tag(self.element_name(), &task.core), &task.activity);
        let tag = match &task.implementation {
            Some(implementation) => engine_attr(tag, implementation.kind.attribute_name(), Some(&implementation.value)),
            None => tag,
        };
        let tag = engine_attr(tag, "type", task.task_type.as_deref().or(implied_type));
        let tag = engine_attr(tag, "resultVariableName", task.result_variable_name.as_ref());
        let tag = engine_flag(tag, "triggerable", task.triggerable, false).opt_attr("operationRef", task.operation_ref.as_ref());
        let tag = match node {
            FlowElement::HttpServiceTask(http) => engine_attr(
                tag,
                "parallelInSameTransaction",
                http.parallel_in_same_transaction.map(|b| b.to_string()),
            ),
            FlowElement::CaseServiceTask(case) => {
                let tag = engine_attr(tag, "caseDefinitionKey", case.case_definition_key.as_ref());
                let tag = engine_attr(tag, "caseInstanceName", case.case_instance_name.as_ref());
                let tag = engine_attr(tag, "businessKey", case.business_key.as_ref());
                let tag = engine_flag(tag, "inheritBusinessKey", case.inherit_business_key, false);
                let tag = engine_flag(tag, "sameDeployment", case.same_deployment, false);
                engine_flag(tag, "fallbackToDefaultTenant", case.fallback_to_default_tenant, false)
            }
            FlowElement::ExternalWorkerServiceTask(worker) => engine_attr(tag, "topic", worker.topic.as_ref()),
            FlowElement::SendEventServiceTask(send) => {
                let tag = engine_attr(tag, "eventType", send.event_type.as_ref());
                let tag = engine_attr(tag, "triggerEventType", send.trigger_event_type.as_ref());
                engine_flag(tag, "sendSynchronously", send.send_synchronously, false)
            }
            _ => tag,
        };

        let (inputs, outputs, input_name, output_name): (&[IoParameter], &[IoParameter], &str, &str) = match node {
            FlowElement::CaseServiceTask(case) => (&case.in_parameters, &case.out_parameters, "in", "out"),
            FlowElement::SendEventServiceTask(send) => (
                &send.event_in_parameters,
                &send.event_out_parameters,
                "eventInParameter",
                "eventOutParameter",
            ),
            _ => (&[], &[], "in", "out"),
        };
        let has_typed = !task.field_extensions.is_empty()
            || !task.map_exceptions.is_empty()
            || !inputs.is_empty()
            || !outputs.is_empty();

        w.open(tag.extension_attrs(&task.core.extension_attributes))?;
        write_documentation(task.core.documentation.as_deref(), w)?;
        write_extension_block(
            &task.core.execution_listeners,
            &task.core.extension_elements,
            has_typed,
            |w| {
                for field in &task.field_extensions {
                    write_field(field, w)?;
                }
                for parameter in inputs {
                    write_io_parameter(input_name, parameter, w)?;
                }
                for parameter in outputs {
                    write_io_parameter(output_name, parameter, w)?;
                }
                for entry in &task.map_exceptions {
                    write_map_exception(entry, w)?;
                }
                Ok(())
            },
            w,
        )?;
        write_activity_children(&task.activity, w)?;
        write_foreign_children(&task.core, w)?;
        w.close()
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::xml::writer::XmlWriter;
    use crate::xml::{XmlDocument, MODEL_NS};

    fn read(body: &str) -> std::result::Result<FlowElement, Box<dyn Error>> {
        let xml = format!(
            r#"<process xmlns="{}" xmlns:flowable="{}">{}</process>"#,
            MODEL_NS, ENGINE_NS, body
        );
        let doc = XmlDocument::parse(&xml)?;
        let element = doc.root().children().next().ok_or("no element")?;
        Ok(SERVICE_TASK.read(element)?)
    }

    #[test]
    fn class_delegate_with_fields_and_exceptions() -> std::result::Result<(), Box<dyn Error>> {
        let element = read(
            r#"<serviceTask id="svc" flowable:class="org.example.Delegate" flowable:resultVariableName="out">
                 <extensionElements>
                   <flowable:field name="url" stringValue="http://example.org"/>
                   <flowable:mapException errorCode="E1" includeChildExceptions="true">org.example.Failure</flowable:mapException>
                   <custom:marker xmlns:custom="urn:custom"/>
                 </extensionElements>
               </serviceTask>"#,
        )?;
        let FlowElement::ServiceTask(task) = element else {
            panic!("expected a service task");
        };
        assert_eq!(task.implementation, Some(Implementation::class("org.example.Delegate")));
        assert_eq!(task.result_variable_name.as_deref(), Some("out"));
        assert_eq!(task.field_extensions[0].string_value.as_deref(), Some("http://example.org"));
        assert!(task.map_exceptions[0].has_children);
        assert_eq!(task.core.extension_elements.get("marker").len(), 1);
        Ok(())
    }

    #[test]
    fn engine_type_selects_the_subtype() -> std::result::Result<(), Box<dyn Error>> {
        let http = read(r#"<serviceTask id="h" flowable:type="http" flowable:parallelInSameTransaction="true"/>"#)?;
        let FlowElement::HttpServiceTask(http) = http else {
            panic!("expected an http task");
        };
        assert_eq!(http.parallel_in_same_transaction, Some(true));

        let worker = read(r#"<serviceTask id="w" flowable:type="external-worker" flowable:topic="orders"/>"#)?;
        assert!(matches!(
            worker,
            FlowElement::ExternalWorkerServiceTask(ExternalWorkerServiceTask { ref topic, .. }) if topic.as_deref() == Some("orders")
        ));

        let mail = read(r#"<serviceTask id="m" flowable:type="mail"/>"#)?;
        assert_eq!(mail.service_task().and_then(|t| t.task_type.as_deref()), Some("mail"));
        assert_eq!(mail.xml_name(), "serviceTask");
        Ok(())
    }

    #[test]
    fn case_task_parameters_and_written_type() -> std::result::Result<(), Box<dyn Error>> {
        let element = read(
            r#"<serviceTask id="c" flowable:type="case" flowable:caseDefinitionKey="claim">
                 <extensionElements><flowable:in source="a" target="b"/></extensionElements>
               </serviceTask>"#,
        )?;
        let FlowElement::CaseServiceTask(case) = &element else {
            panic!("expected a case task");
        };
        assert_eq!(case.case_definition_key.as_deref(), Some("claim"));
        assert_eq!(case.in_parameters.len(), 1);

        let mut writer = XmlWriter::new(0);
        SERVICE_TASK.write(&element, &mut writer)?;
        let xml = String::from_utf8(writer.into_inner()?)?;
        assert!(xml.contains(r#"flowable:type="case""#), "{}", xml);
        assert!(xml.contains(r#"<flowable:in source="a" target="b"/>"#), "{}", xml);
        Ok(())
    }
}
