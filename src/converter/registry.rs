//! The element registry: a read-only table from element names to converters.
//!
//! The table is built once on first use and never mutated afterwards. Flow node
//! names map to their converter directly. Engine extension children (listeners,
//! fields, parameters, ...) are overloaded by owner, so their lookup also takes the
//! name of the element whose `extensionElements` block they appear in.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::artifact::ARTIFACT_NAMES;
use super::data::{DATA_OBJECT, DATA_STORE_REFERENCE};
use super::event::{BOUNDARY_EVENT, END_EVENT, INTERMEDIATE_CATCH_EVENT, INTERMEDIATE_THROW_EVENT, START_EVENT};
use super::flow::SEQUENCE_FLOW;
use super::gateway::{COMPLEX_GATEWAY, EVENT_GATEWAY, EXCLUSIVE_GATEWAY, INCLUSIVE_GATEWAY, PARALLEL_GATEWAY};
use super::service::{SEND_TASK, SERVICE_TASK};
use super::subprocess::{ADHOC_SUB_PROCESS, SUB_PROCESS, TRANSACTION};
use super::task::{BUSINESS_RULE_TASK, CALL_ACTIVITY, MANUAL_TASK, RECEIVE_TASK, SCRIPT_TASK, TASK, USER_TASK};
use super::ElementConverter;
use crate::model::flow::FlowElement;

/// Typed engine children that may appear inside an `extensionElements` block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineChild {
    ExecutionListener,
    TaskListener,
    EventListener,
    Field,
    FormProperty,
    InParameter,
    OutParameter,
    EventInParameter,
    EventOutParameter,
    MapException,
    Value,
    VariableListener,
}

/// Owner names the service task converter uses for its engine subtypes
pub const SERVICE_OWNERS: [&str; 6] = [
    "serviceTask",
    "sendTask",
    "httpServiceTask",
    "caseServiceTask",
    "externalWorkerServiceTask",
    "sendEventServiceTask",
];

/// Allowed owners per engine child; `*` matches every owner
const ENGINE_CHILDREN: &[(&str, EngineChild, &[&str])] = &[
    ("executionListener", EngineChild::ExecutionListener, &["*"]),
    ("taskListener", EngineChild::TaskListener, &["userTask"]),
    ("eventListener", EngineChild::EventListener, &["process"]),
    ("field", EngineChild::Field, &SERVICE_OWNERS),
    ("formProperty", EngineChild::FormProperty, &["startEvent", "userTask"]),
    ("in", EngineChild::InParameter, &["callActivity", "caseServiceTask"]),
    ("out", EngineChild::OutParameter, &["callActivity", "caseServiceTask"]),
    ("eventInParameter", EngineChild::EventInParameter, &["sendEventServiceTask"]),
    ("eventOutParameter", EngineChild::EventOutParameter, &["sendEventServiceTask"]),
    ("mapException", EngineChild::MapException, &SERVICE_OWNERS),
    ("value", EngineChild::Value, &["dataObject"]),
    (
        "variableListenerEventDefinition",
        EngineChild::VariableListener,
        &["startEvent", "intermediateCatchEvent", "boundaryEvent"],
    ),
];

type ConverterMap = HashMap<String, &'static dyn ElementConverter, ahash::RandomState>;
type EngineChildMap = HashMap<String, (EngineChild, &'static [&'static str]), ahash::RandomState>;

pub struct ElementRegistry {
    converters: ConverterMap,
    engine_children: EngineChildMap,
}

static REGISTRY: Lazy<ElementRegistry> = Lazy::new(ElementRegistry::build);

/// The process-wide registry
pub fn registry() -> &'static ElementRegistry {
    &REGISTRY
}

impl ElementRegistry {
    fn build() -> Self {
        let all: [&'static dyn ElementConverter; 25] = [
            &START_EVENT,
            &END_EVENT,
            &BOUNDARY_EVENT,
            &INTERMEDIATE_CATCH_EVENT,
            &INTERMEDIATE_THROW_EVENT,
            &TASK,
            &MANUAL_TASK,
            &RECEIVE_TASK,
            &USER_TASK,
            &SCRIPT_TASK,
            &BUSINESS_RULE_TASK,
            &CALL_ACTIVITY,
            &SERVICE_TASK,
            &SEND_TASK,
            &SUB_PROCESS,
            &TRANSACTION,
            &ADHOC_SUB_PROCESS,
            &EXCLUSIVE_GATEWAY,
            &PARALLEL_GATEWAY,
            &INCLUSIVE_GATEWAY,
            &EVENT_GATEWAY,
            &COMPLEX_GATEWAY,
            &SEQUENCE_FLOW,
            &DATA_OBJECT,
            &DATA_STORE_REFERENCE,
        ];
        let converters = all
            .into_iter()
            .map(|converter| (converter.element_name().to_ascii_lowercase(), converter))
            .collect();
        let engine_children = ENGINE_CHILDREN
            .iter()
            .map(|(name, child, owners)| (name.to_ascii_lowercase(), (*child, *owners)))
            .collect();
        ElementRegistry {
            converters,
            engine_children,
        }
    }

    /// The converter for a model-namespace element, matched case-insensitively
    pub fn converter(&self, local_name: &str) -> Option<&'static dyn ElementConverter> {
        self.converters.get(&local_name.to_ascii_lowercase()).copied()
    }

    /// The converter responsible for writing `element`
    pub fn converter_for(&self, element: &FlowElement) -> Option<&'static dyn ElementConverter> {
        self.converter(element.xml_name())
    }

    pub fn is_artifact(&self, local_name: &str) -> bool {
        ARTIFACT_NAMES
            .iter()
            .any(|name| name.eq_ignore_ascii_case(local_name))
    }

    /// The typed engine child `local_name` inside the extension block of `owner`.
    ///
    /// `None` means the child is captured as a generic extension element.
    pub fn engine_child(&self, local_name: &str, owner: &str) -> Option<EngineChild> {
        let (child, owners) = self.engine_children.get(&local_name.to_ascii_lowercase())?;
        owners
            .iter()
            .any(|o| *o == "*" || o.eq_ignore_ascii_case(owner))
            .then_some(*child)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookups_are_case_insensitive() {
        let converter = registry().converter("USERTASK").unwrap();
        assert_eq!(converter.element_name(), "userTask");
        assert!(registry().converter("unknownThing").is_none());
    }

    #[test]
    fn every_flow_element_kind_has_a_writer() {
        for name in [
            "startEvent", "endEvent", "boundaryEvent", "intermediateCatchEvent", "intermediateThrowEvent",
            "task", "manualTask", "receiveTask", "userTask", "scriptTask", "businessRuleTask", "callActivity",
            "serviceTask", "sendTask", "subProcess", "transaction", "adHocSubProcess", "exclusiveGateway",
            "parallelGateway", "inclusiveGateway", "eventBasedGateway", "complexGateway", "sequenceFlow",
            "dataObject", "dataStoreReference",
        ] {
            assert!(registry().converter(name).is_some(), "{} has no converter", name);
        }
    }

    #[test]
    fn engine_children_depend_on_their_owner() {
        assert_eq!(registry().engine_child("in", "callActivity"), Some(EngineChild::InParameter));
        assert_eq!(registry().engine_child("in", "caseServiceTask"), Some(EngineChild::InParameter));
        assert_eq!(registry().engine_child("in", "userTask"), None);
        assert_eq!(
            registry().engine_child("executionListener", "anything"),
            Some(EngineChild::ExecutionListener)
        );
        assert_eq!(registry().engine_child("taskListener", "serviceTask"), None);
    }

    #[test]
    fn artifacts_are_recognised() {
        assert!(registry().is_artifact("textAnnotation"));
        assert!(registry().is_artifact("association"));
        assert!(!registry().is_artifact("userTask"));
    }
}
