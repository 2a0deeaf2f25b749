use std::mem;

use crate::error::Result;
use crate::model::event::{
    CompensateEventDefinition, EventDefinition, EventDefinitionKind, MessageEventDefinition, SignalEventDefinition,
    TimerEventDefinition,
};
use crate::model::flow::{BoundaryEvent, Event, FlowCore, FlowElement, StartEvent};
use crate::xml::writer::{Tag, XmlWriter};
use crate::xml::{Element, ENGINE_NS, MODEL_NS};

use super::common::{engine_tag, read_generic_block, write_form_property, write_generic_block};
use super::extension::write_subtree;
use super::{
    core_tag, engine_attr, engine_flag, foreign_children, write_documentation, write_extension_block,
    write_foreign_children, ElementConverter, NodeReader,
};

const DEFINITIONS: [&str; 9] = [
    "timerEventDefinition",
    "errorEventDefinition",
    "signalEventDefinition",
    "messageEventDefinition",
    "conditionalEventDefinition",
    "escalationEventDefinition",
    "compensateEventDefinition",
    "terminateEventDefinition",
    "cancelEventDefinition",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Start,
    End,
    Boundary,
    IntermediateCatch,
    IntermediateThrow,
}

pub struct EventConverter {
    kind: EventKind,
}

pub static START_EVENT: EventConverter = EventConverter { kind: EventKind::Start };
pub static END_EVENT: EventConverter = EventConverter { kind: EventKind::End };
pub static BOUNDARY_EVENT: EventConverter = EventConverter { kind: EventKind::Boundary };
pub static INTERMEDIATE_CATCH_EVENT: EventConverter = EventConverter {
    kind: EventKind::IntermediateCatch,
};
pub static INTERMEDIATE_THROW_EVENT: EventConverter = EventConverter {
    kind: EventKind::IntermediateThrow,
};

impl ElementConverter for EventConverter {
    fn element_name(&self) -> &'static str {
        match self.kind {
            EventKind::Start => "startEvent",
            EventKind::End => "endEvent",
            EventKind::Boundary => "boundaryEvent",
            EventKind::IntermediateCatch => "intermediateCatchEvent",
            EventKind::IntermediateThrow => "intermediateThrowEvent",
        }
    }

    fn read(&self, element: Element<'_>) -> Result<FlowElement> {
        let mut node = NodeReader::new(element)?;
        let mut core = node.core();
        let mut definitions = read_event_definitions(element)?;
        if let Some(listener) = node.block.variable_listener.take() {
            definitions.push(EventDefinition::new(EventDefinitionKind::VariableListener(listener)));
        }

        let flow_element = match self.kind {
            EventKind::Start => {
                let mut start = StartEvent::new(FlowCore::default());
                start.initiator = node.attrs.engine("initiator");
                start.form_key = node.attrs.engine("formKey");
                start.interrupting = node.attrs.plain_bool("isInterrupting", true)?;
                start.form_properties = mem::take(&mut node.block.form_properties);
                start.event_definitions = definitions;
                node.finish(&mut core, &DEFINITIONS);
                start.core = core;
                FlowElement::StartEvent(start)
            }
            EventKind::Boundary => {
                let attached_to_ref = node.attrs.plain("attachedToRef");
                let cancel_activity = node.attrs.plain_bool("cancelActivity", true)?;
                node.finish(&mut core, &DEFINITIONS);
                FlowElement::BoundaryEvent(BoundaryEvent {
                    core,
                    attached_to_ref,
                    cancel_activity,
                    event_definitions: definitions,
                })
            }
            kind => {
                node.finish(&mut core, &DEFINITIONS);
                let event = Event {
                    core,
                    event_definitions: definitions,
                };
                match kind {
                    EventKind::End => FlowElement::EndEvent(event),
                    EventKind::IntermediateCatch => FlowElement::IntermediateCatchEvent(event),
                    _ => FlowElement::IntermediateThrowEvent(event),
                }
            }
        };
        Ok(flow_element)
    }

    fn write(&self, node: &FlowElement, w: &mut XmlWriter) -> Result<()> {
        let name = self.element_name();
        match (self.kind, node) {
            (EventKind::Start, FlowElement::StartEvent(start)) => {
                let tag = core_tag(name, &start.core);
                let tag = engine_attr(tag, "initiator", start.initiator.as_ref());
                let tag = engine_attr(tag, "formKey", start.form_key.as_ref());
                let tag = if start.interrupting {
                    tag
                } else {
                    tag.attr("isInterrupting", "false")
                };
                w.open(tag.extension_attrs(&start.core.extension_attributes))?;
                write_documentation(start.core.documentation.as_deref(), w)?;
                let variable_listener = variable_listener(&start.event_definitions);
                write_extension_block(
                    &start.core.execution_listeners,
                    &start.core.extension_elements,
                    !start.form_properties.is_empty() || variable_listener.is_some(),
                    |w| {
                        for property in &start.form_properties {
                            write_form_property(property, w)?;
                        }
                        write_variable_listener(variable_listener, w)
                    },
                    w,
                )?;
                write_event_definitions(&start.event_definitions, w)?;
                write_foreign_children(&start.core, w)?;
                w.close()
            }
            (EventKind::Boundary, FlowElement::BoundaryEvent(boundary)) => {
                let tag = core_tag(name, &boundary.core).opt_attr("attachedToRef", boundary.attached_to_ref.as_ref());
                let tag = if boundary.cancel_activity {
                    tag
                } else {
                    tag.attr("cancelActivity", "false")
                };
                w.open(tag.extension_attrs(&boundary.core.extension_attributes))?;
                write_event_body(&boundary.core, &boundary.event_definitions, w)?;
                w.close()
            }
            (EventKind::End, FlowElement::EndEvent(event))
            | (EventKind::IntermediateCatch, FlowElement::IntermediateCatchEvent(event))
            | (EventKind::IntermediateThrow, FlowElement::IntermediateThrowEvent(event)) => {
                w.open(core_tag(name, &event.core).extension_attrs(&event.core.extension_attributes))?;
                write_event_body(&event.core, &event.event_definitions, w)?;
                w.close()
            }
            _ => Ok(()),
        }
    }
}

fn variable_listener(definitions: &[EventDefinition]) -> Option<&EventDefinition> {
    definitions
        .iter()
        .find(|d| matches!(d.kind, EventDefinitionKind::VariableListener(_)))
}

fn write_variable_listener(definition: Option<&EventDefinition>, w: &mut XmlWriter) -> Result<()> {
    if let Some(EventDefinition {
        kind: EventDefinitionKind::VariableListener(listener),
        ..
    }) = definition
    {
        w.empty(
            engine_tag("variableListenerEventDefinition")
                .opt_attr("variableName", listener.variable_name.as_ref())
                .opt_attr("variableChangeType", listener.variable_change_type.as_ref()),
        )?;
    }
    Ok(())
}

fn write_event_body(core: &FlowCore, definitions: &[EventDefinition], w: &mut XmlWriter) -> Result<()> {
    write_documentation(core.documentation.as_deref(), w)?;
    let listener = variable_listener(definitions);
    write_extension_block(
        &core.execution_listeners,
        &core.extension_elements,
        listener.is_some(),
        |w| write_variable_listener(listener, w),
        w,
    )?;
    write_event_definitions(definitions, w)?;
    write_foreign_children(core, w)
}

/// Read every model event definition child of an event, in document order
pub fn read_event_definitions(element: Element<'_>) -> Result<Vec<EventDefinition>> {
    let mut definitions = Vec::new();
    for child in element.children().filter(Element::is_model) {
        if DEFINITIONS.iter().any(|d| d.eq_ignore_ascii_case(child.local_name())) {
            definitions.push(read_event_definition(child)?);
        }
    }
    Ok(definitions)
}

fn read_event_definition(element: Element<'_>) -> Result<EventDefinition> {
    let mut attrs = element.attribute_reader();
    let child_text = |name: &str| element.child(MODEL_NS, name).and_then(|c| c.trimmed_text());
    let name = element.local_name().to_ascii_lowercase();
    let kind = match name.as_str() {
        "timereventdefinition" => EventDefinitionKind::Timer(TimerEventDefinition {
            time_date: child_text("timeDate"),
            time_duration: child_text("timeDuration"),
            time_cycle: child_text("timeCycle"),
            end_date: element
                .child(MODEL_NS, "timeCycle")
                .and_then(|c| c.attribute_ns(ENGINE_NS, "endDate"))
                .map(str::to_string),
            calendar_name: attrs.engine("businessCalendarName"),
        }),
        "erroreventdefinition" => EventDefinitionKind::Error {
            error_ref: attrs.plain("errorRef"),
        },
        "signaleventdefinition" => EventDefinitionKind::Signal(SignalEventDefinition {
            signal_ref: attrs.plain("signalRef"),
            signal_expression: attrs.engine("signalExpression"),
            asynchronous: attrs.engine_bool("async", false)?,
        }),
        "messageeventdefinition" => EventDefinitionKind::Message(MessageEventDefinition {
            message_ref: attrs.plain("messageRef"),
            message_expression: attrs.engine("messageExpression"),
        }),
        "conditionaleventdefinition" => EventDefinitionKind::Conditional {
            condition_expression: child_text("condition"),
        },
        "escalationeventdefinition" => EventDefinitionKind::Escalation {
            escalation_ref: attrs.plain("escalationRef"),
        },
        "compensateeventdefinition" => EventDefinitionKind::Compensate(CompensateEventDefinition {
            activity_ref: attrs.plain("activityRef"),
            wait_for_completion: attrs.plain_bool("waitForCompletion", true)?,
        }),
        "terminateeventdefinition" => EventDefinitionKind::Terminate {
            terminate_all: attrs.engine_bool("terminateAll", false)?,
        },
        _ => EventDefinitionKind::Cancel,
    };
    let known: &[&str] = match &kind {
        EventDefinitionKind::Timer(_) => &["timeDate", "timeDuration", "timeCycle"],
        EventDefinitionKind::Conditional { .. } => &["condition"],
        _ => &[],
    };
    Ok(EventDefinition {
        id: attrs.plain("id"),
        extension_elements: read_generic_block(element),
        foreign_children: foreign_children(element, known),
        extension_attributes: attrs.into_extensions(),
        kind,
    })
}

/// Write the model event definitions; the engine variable listener is part of the extension block
pub fn write_event_definitions(definitions: &[EventDefinition], w: &mut XmlWriter) -> Result<()> {
    for definition in definitions {
        let tag = Tag::new(definition.kind.xml_name()).opt_attr("id", definition.id.as_ref());
        let tag = match &definition.kind {
            EventDefinitionKind::VariableListener(_) => continue,
            EventDefinitionKind::Timer(timer) => engine_attr(tag, "businessCalendarName", timer.calendar_name.as_ref()),
            EventDefinitionKind::Error { error_ref } => tag.opt_attr("errorRef", error_ref.as_ref()),
            EventDefinitionKind::Signal(signal) => {
                let tag = tag.opt_attr("signalRef", signal.signal_ref.as_ref());
                let tag = engine_attr(tag, "signalExpression", signal.signal_expression.as_ref());
                engine_flag(tag, "async", signal.asynchronous, false)
            }
            EventDefinitionKind::Message(message) => {
                let tag = tag.opt_attr("messageRef", message.message_ref.as_ref());
                engine_attr(tag, "messageExpression", message.message_expression.as_ref())
            }
            EventDefinitionKind::Escalation { escalation_ref } => tag.opt_attr("escalationRef", escalation_ref.as_ref()),
            EventDefinitionKind::Compensate(compensate) => {
                let tag = tag.opt_attr("activityRef", compensate.activity_ref.as_ref());
                if compensate.wait_for_completion {
                    tag
                } else {
                    tag.attr("waitForCompletion", "false")
                }
            }
            EventDefinitionKind::Terminate { terminate_all } => engine_flag(tag, "terminateAll", *terminate_all, false),
            EventDefinitionKind::Conditional { .. } | EventDefinitionKind::Cancel => tag,
        };
        w.open(tag.extension_attrs(&definition.extension_attributes))?;
        write_generic_block(&definition.extension_elements, w)?;
        match &definition.kind {
            EventDefinitionKind::Timer(timer) => {
                if let Some(date) = &timer.time_date {
                    w.text_element(Tag::new("timeDate"), date)?;
                }
                if let Some(duration) = &timer.time_duration {
                    w.text_element(Tag::new("timeDuration"), duration)?;
                }
                if let Some(cycle) = &timer.time_cycle {
                    let tag = engine_attr(Tag::new("timeCycle"), "endDate", timer.end_date.as_ref());
                    w.text_element(tag, cycle)?;
                }
            }
            EventDefinitionKind::Conditional {
                condition_expression: Some(condition),
            } => w.text_element(Tag::new("condition"), condition)?,
            _ => {}
        }
        for child in &definition.foreign_children {
            write_subtree(child, w)?;
        }
        w.close()?;
    }
    Ok(())
}
