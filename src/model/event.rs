//! This module defines the event definitions that specialise start, end,
//! boundary and intermediate events.

use super::extension::{AttributeMap, ExtensionElement, ExtensionMap};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimerEventDefinition {
    pub time_date: Option<String>,
    pub time_duration: Option<String>,
    pub time_cycle: Option<String>,
    /// Only applies to a time cycle
    pub end_date: Option<String>,
    pub calendar_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignalEventDefinition {
    pub signal_ref: Option<String>,
    pub signal_expression: Option<String>,
    pub asynchronous: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageEventDefinition {
    pub message_ref: Option<String>,
    pub message_expression: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompensateEventDefinition {
    pub activity_ref: Option<String>,
    pub wait_for_completion: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableListenerEventDefinition {
    pub variable_name: Option<String>,
    pub variable_change_type: Option<String>,
}

/// The trigger or result attached to an event
#[derive(Debug, Clone, PartialEq)]
pub enum EventDefinitionKind {
    Timer(TimerEventDefinition),
    Error { error_ref: Option<String> },
    Signal(SignalEventDefinition),
    Message(MessageEventDefinition),
    Conditional { condition_expression: Option<String> },
    Escalation { escalation_ref: Option<String> },
    Compensate(CompensateEventDefinition),
    Terminate { terminate_all: bool },
    Cancel,
    /// Lives in the engine namespace rather than the model namespace
    VariableListener(VariableListenerEventDefinition),
}

impl EventDefinitionKind {
    /// Local name of the element the definition is written as
    pub fn xml_name(&self) -> &'static str {
        match self {
            EventDefinitionKind::Timer(_) => "timerEventDefinition",
            EventDefinitionKind::Error { .. } => "errorEventDefinition",
            EventDefinitionKind::Signal(_) => "signalEventDefinition",
            EventDefinitionKind::Message(_) => "messageEventDefinition",
            EventDefinitionKind::Conditional { .. } => "conditionalEventDefinition",
            EventDefinitionKind::Escalation { .. } => "escalationEventDefinition",
            EventDefinitionKind::Compensate(_) => "compensateEventDefinition",
            EventDefinitionKind::Terminate { .. } => "terminateEventDefinition",
            EventDefinitionKind::Cancel => "cancelEventDefinition",
            EventDefinitionKind::VariableListener(_) => "variableListenerEventDefinition",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventDefinition {
    pub id: Option<String>,
    pub kind: EventDefinitionKind,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

impl EventDefinition {
    pub fn new(kind: EventDefinitionKind) -> Self {
        EventDefinition {
            id: None,
            kind,
            extension_elements: ExtensionMap::new(),
            extension_attributes: AttributeMap::new(),
            foreign_children: Vec::new(),
        }
    }

    pub fn timer(timer: TimerEventDefinition) -> Self {
        Self::new(EventDefinitionKind::Timer(timer))
    }

    pub fn error(error_ref: impl Into<String>) -> Self {
        Self::new(EventDefinitionKind::Error { error_ref: Some(error_ref.into()) })
    }

    pub fn signal(signal_ref: impl Into<String>) -> Self {
        Self::new(EventDefinitionKind::Signal(SignalEventDefinition {
            signal_ref: Some(signal_ref.into()),
            ..Default::default()
        }))
    }

    pub fn message(message_ref: impl Into<String>) -> Self {
        Self::new(EventDefinitionKind::Message(MessageEventDefinition {
            message_ref: Some(message_ref.into()),
            message_expression: None,
        }))
    }
}
