//! This module defines the flow elements: every node and connection that can
//! appear inside a process or sub-process.
//!
//! Flow elements are a closed set of variants. Shared state lives in small
//! structs ([`FlowCore`], [`ActivityCore`]) that each variant embeds, and the
//! capability traits below expose that state without a class hierarchy.

use super::artifact::Artifact;
use super::common::{
    FieldExtension, FormProperty, Implementation, IoParameter, Listener, MapExceptionEntry, MultiInstance,
};
use super::data::{DataAssociation, DataKind, DataValue};
use super::event::EventDefinition;
use super::extension::{AttributeMap, ExtensionElement, ExtensionMap};

/// State every flow element carries
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlowCore {
    pub id: String,
    pub name: Option<String>,
    pub documentation: Option<String>,
    pub execution_listeners: Vec<Listener>,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    /// Unrecognised direct children, re-emitted after the typed children
    pub foreign_children: Vec<ExtensionElement>,
}

impl FlowCore {
    pub fn new(id: impl Into<String>) -> Self {
        FlowCore {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        FlowCore {
            id: id.into(),
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// State shared by tasks, call activities and sub-processes
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityCore {
    pub default_flow: Option<String>,
    pub asynchronous: bool,
    pub exclusive: bool,
    pub for_compensation: bool,
    pub skip_expression: Option<String>,
    pub multi_instance: Option<MultiInstance>,
    pub data_input_associations: Vec<DataAssociation>,
    pub data_output_associations: Vec<DataAssociation>,
    /// Ids of the boundary events attached to this activity, filled in after parsing
    pub boundary_events: Vec<String>,
}

impl Default for ActivityCore {
    fn default() -> Self {
        ActivityCore {
            default_flow: None,
            asynchronous: false,
            exclusive: true,
            for_compensation: false,
            skip_expression: None,
            multi_instance: None,
            data_input_associations: Vec::new(),
            data_output_associations: Vec::new(),
            boundary_events: Vec::new(),
        }
    }
}

// Events

#[derive(Debug, Clone, PartialEq)]
pub struct StartEvent {
    pub core: FlowCore,
    pub initiator: Option<String>,
    pub form_key: Option<String>,
    pub interrupting: bool,
    pub form_properties: Vec<FormProperty>,
    pub event_definitions: Vec<EventDefinition>,
}

impl StartEvent {
    pub fn new(core: FlowCore) -> Self {
        StartEvent {
            core,
            initiator: None,
            form_key: None,
            interrupting: true,
            form_properties: Vec::new(),
            event_definitions: Vec::new(),
        }
    }
}

/// End, intermediate catch and intermediate throw events only differ by their definitions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Event {
    pub core: FlowCore,
    pub event_definitions: Vec<EventDefinition>,
}

impl Event {
    pub fn new(core: FlowCore) -> Self {
        Event {
            core,
            event_definitions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryEvent {
    pub core: FlowCore,
    pub attached_to_ref: Option<String>,
    pub cancel_activity: bool,
    pub event_definitions: Vec<EventDefinition>,
}

impl BoundaryEvent {
    pub fn new(core: FlowCore, attached_to_ref: impl Into<String>) -> Self {
        BoundaryEvent {
            core,
            attached_to_ref: Some(attached_to_ref.into()),
            cancel_activity: true,
            event_definitions: Vec::new(),
        }
    }
}

// Activities

/// Plain, manual and receive tasks
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Task {
    pub core: FlowCore,
    pub activity: ActivityCore,
}

impl Task {
    pub fn new(core: FlowCore) -> Self {
        Task {
            core,
            activity: ActivityCore::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserTask {
    pub core: FlowCore,
    pub activity: ActivityCore,
    pub assignee: Option<String>,
    pub owner: Option<String>,
    pub candidate_users: Vec<String>,
    pub candidate_groups: Vec<String>,
    pub form_key: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub form_properties: Vec<FormProperty>,
    pub task_listeners: Vec<Listener>,
}

impl UserTask {
    pub fn new(core: FlowCore) -> Self {
        UserTask {
            core,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptTask {
    pub core: FlowCore,
    pub activity: ActivityCore,
    pub script_format: Option<String>,
    pub script: Option<String>,
    pub result_variable: Option<String>,
    pub auto_store_variables: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BusinessRuleTask {
    pub core: FlowCore,
    pub activity: ActivityCore,
    pub rule_names: Vec<String>,
    pub input_variables: Vec<String>,
    pub result_variable: Option<String>,
    pub exclude: bool,
    pub class_name: Option<String>,
}

/// Service and send tasks; also the base of the engine's service task subtypes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceTask {
    pub core: FlowCore,
    pub activity: ActivityCore,
    pub implementation: Option<Implementation>,
    pub result_variable_name: Option<String>,
    /// Engine task type, e.g. `mail` or `shell`
    pub task_type: Option<String>,
    pub operation_ref: Option<String>,
    pub triggerable: bool,
    pub field_extensions: Vec<FieldExtension>,
    pub map_exceptions: Vec<MapExceptionEntry>,
}

impl ServiceTask {
    pub fn new(core: FlowCore) -> Self {
        ServiceTask {
            core,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpServiceTask {
    pub task: ServiceTask,
    pub parallel_in_same_transaction: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaseServiceTask {
    pub task: ServiceTask,
    pub case_definition_key: Option<String>,
    pub case_instance_name: Option<String>,
    pub business_key: Option<String>,
    pub inherit_business_key: bool,
    pub same_deployment: bool,
    pub fallback_to_default_tenant: bool,
    pub in_parameters: Vec<IoParameter>,
    pub out_parameters: Vec<IoParameter>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExternalWorkerServiceTask {
    pub task: ServiceTask,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SendEventServiceTask {
    pub task: ServiceTask,
    pub event_type: Option<String>,
    pub trigger_event_type: Option<String>,
    pub send_synchronously: bool,
    pub event_in_parameters: Vec<IoParameter>,
    pub event_out_parameters: Vec<IoParameter>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallActivity {
    pub core: FlowCore,
    pub activity: ActivityCore,
    pub called_element: Option<String>,
    pub called_element_type: Option<String>,
    pub business_key: Option<String>,
    pub inherit_business_key: bool,
    pub inherit_variables: bool,
    pub same_deployment: bool,
    pub fallback_to_default_tenant: bool,
    pub process_instance_name: Option<String>,
    pub in_parameters: Vec<IoParameter>,
    pub out_parameters: Vec<IoParameter>,
}

/// A nested scope; the body of sub-processes, event sub-processes and transactions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubProcess {
    pub core: FlowCore,
    pub activity: ActivityCore,
    pub flow_elements: Vec<FlowElement>,
    pub artifacts: Vec<Artifact>,
}

impl SubProcess {
    pub fn new(core: FlowCore) -> Self {
        SubProcess {
            core,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdhocSubProcess {
    pub sub_process: SubProcess,
    pub ordering: Option<String>,
    pub cancel_remaining_instances: bool,
    pub completion_condition: Option<String>,
}

impl AdhocSubProcess {
    pub fn new(sub_process: SubProcess) -> Self {
        AdhocSubProcess {
            sub_process,
            ordering: None,
            cancel_remaining_instances: true,
            completion_condition: None,
        }
    }
}

// Gateways

#[derive(Debug, Clone, PartialEq)]
pub struct Gateway {
    pub core: FlowCore,
    pub default_flow: Option<String>,
    pub asynchronous: bool,
    pub exclusive: bool,
}

impl Gateway {
    pub fn new(core: FlowCore) -> Self {
        Gateway {
            core,
            default_flow: None,
            asynchronous: false,
            exclusive: true,
        }
    }
}

// Connections and data

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SequenceFlow {
    pub core: FlowCore,
    pub source_ref: String,
    pub target_ref: String,
    pub condition_expression: Option<String>,
    pub skip_expression: Option<String>,
}

impl SequenceFlow {
    pub fn new(id: impl Into<String>, source_ref: impl Into<String>, target_ref: impl Into<String>) -> Self {
        SequenceFlow {
            core: FlowCore::new(id),
            source_ref: source_ref.into(),
            target_ref: target_ref.into(),
            condition_expression: None,
            skip_expression: None,
        }
    }
}

/// A data object; the structure reference decides how its value is typed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataObject {
    pub core: FlowCore,
    pub item_subject_ref: Option<String>,
    pub value: Option<DataValue>,
    pub collection: bool,
}

impl DataObject {
    pub fn new(core: FlowCore, value: DataValue) -> Self {
        DataObject {
            core,
            item_subject_ref: Some(value.kind().structure_ref().to_string()),
            value: Some(value),
            collection: false,
        }
    }

    pub fn kind(&self) -> Option<DataKind> {
        self.item_subject_ref
            .as_deref()
            .and_then(DataKind::from_structure_ref)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataStoreReference {
    pub core: FlowCore,
    pub data_store_ref: Option<String>,
    pub item_subject_ref: Option<String>,
    pub data_state: Option<String>,
}

/// Every node and connection that can live inside a process scope
#[derive(Debug, Clone, PartialEq)]
pub enum FlowElement {
    StartEvent(StartEvent),
    EndEvent(Event),
    BoundaryEvent(BoundaryEvent),
    IntermediateCatchEvent(Event),
    IntermediateThrowEvent(Event),
    Task(Task),
    ManualTask(Task),
    ReceiveTask(Task),
    UserTask(UserTask),
    ScriptTask(ScriptTask),
    BusinessRuleTask(BusinessRuleTask),
    ServiceTask(ServiceTask),
    SendTask(ServiceTask),
    HttpServiceTask(HttpServiceTask),
    CaseServiceTask(CaseServiceTask),
    ExternalWorkerServiceTask(ExternalWorkerServiceTask),
    SendEventServiceTask(SendEventServiceTask),
    CallActivity(CallActivity),
    SubProcess(SubProcess),
    EventSubProcess(SubProcess),
    Transaction(SubProcess),
    AdhocSubProcess(AdhocSubProcess),
    ExclusiveGateway(Gateway),
    ParallelGateway(Gateway),
    InclusiveGateway(Gateway),
    EventGateway(Gateway),
    ComplexGateway(Gateway),
    SequenceFlow(SequenceFlow),
    DataObject(DataObject),
    DataStoreReference(DataStoreReference),
}

/// Expand `$body` once per variant with `$value` bound to the struct that owns the flow core
macro_rules! with_core {
    ($element:expr, $value:ident => $body:expr) => {
        match $element {
            FlowElement::StartEvent($value) => $body,
            FlowElement::EndEvent($value)
            | FlowElement::IntermediateCatchEvent($value)
            | FlowElement::IntermediateThrowEvent($value) => $body,
            FlowElement::BoundaryEvent($value) => $body,
            FlowElement::Task($value) | FlowElement::ManualTask($value) | FlowElement::ReceiveTask($value) => $body,
            FlowElement::UserTask($value) => $body,
            FlowElement::ScriptTask($value) => $body,
            FlowElement::BusinessRuleTask($value) => $body,
            FlowElement::ServiceTask($value)
            | FlowElement::SendTask($value)
            | FlowElement::HttpServiceTask(HttpServiceTask { task: $value, .. })
            | FlowElement::CaseServiceTask(CaseServiceTask { task: $value, .. })
            | FlowElement::ExternalWorkerServiceTask(ExternalWorkerServiceTask { task: $value, .. })
            | FlowElement::SendEventServiceTask(SendEventServiceTask { task: $value, .. }) => $body,
            FlowElement::CallActivity($value) => $body,
            FlowElement::SubProcess($value)
            | FlowElement::EventSubProcess($value)
            | FlowElement::Transaction($value)
            | FlowElement::AdhocSubProcess(AdhocSubProcess { sub_process: $value, .. }) => $body,
            FlowElement::ExclusiveGateway($value)
            | FlowElement::ParallelGateway($value)
            | FlowElement::InclusiveGateway($value)
            | FlowElement::EventGateway($value)
            | FlowElement::ComplexGateway($value) => $body,
            FlowElement::SequenceFlow($value) => $body,
            FlowElement::DataObject($value) => $body,
            FlowElement::DataStoreReference($value) => $body,
        }
    };
}

impl FlowElement {
    /// Local name of the element this variant is written as
    pub fn xml_name(&self) -> &'static str {
        match self {
            FlowElement::StartEvent(_) => "startEvent",
            FlowElement::EndEvent(_) => "endEvent",
            FlowElement::BoundaryEvent(_) => "boundaryEvent",
            FlowElement::IntermediateCatchEvent(_) => "intermediateCatchEvent",
            FlowElement::IntermediateThrowEvent(_) => "intermediateThrowEvent",
            FlowElement::Task(_) => "task",
            FlowElement::ManualTask(_) => "manualTask",
            FlowElement::ReceiveTask(_) => "receiveTask",
            FlowElement::UserTask(_) => "userTask",
            FlowElement::ScriptTask(_) => "scriptTask",
            FlowElement::BusinessRuleTask(_) => "businessRuleTask",
            FlowElement::ServiceTask(_)
            | FlowElement::HttpServiceTask(_)
            | FlowElement::CaseServiceTask(_)
            | FlowElement::ExternalWorkerServiceTask(_)
            | FlowElement::SendEventServiceTask(_) => "serviceTask",
            FlowElement::SendTask(_) => "sendTask",
            FlowElement::CallActivity(_) => "callActivity",
            FlowElement::SubProcess(_) | FlowElement::EventSubProcess(_) => "subProcess",
            FlowElement::Transaction(_) => "transaction",
            FlowElement::AdhocSubProcess(_) => "adHocSubProcess",
            FlowElement::ExclusiveGateway(_) => "exclusiveGateway",
            FlowElement::ParallelGateway(_) => "parallelGateway",
            FlowElement::InclusiveGateway(_) => "inclusiveGateway",
            FlowElement::EventGateway(_) => "eventBasedGateway",
            FlowElement::ComplexGateway(_) => "complexGateway",
            FlowElement::SequenceFlow(_) => "sequenceFlow",
            FlowElement::DataObject(_) => "dataObject",
            FlowElement::DataStoreReference(_) => "dataStoreReference",
        }
    }

    pub fn core(&self) -> &FlowCore {
        with_core!(self, e => &e.core)
    }

    pub fn core_mut(&mut self) -> &mut FlowCore {
        with_core!(self, e => &mut e.core)
    }

    pub fn id(&self) -> &str {
        &self.core().id
    }

    pub fn name(&self) -> Option<&str> {
        self.core().name.as_deref()
    }

    /// Activity state for tasks, call activities and sub-processes
    pub fn activity(&self) -> Option<&ActivityCore> {
        match self {
            FlowElement::Task(t) | FlowElement::ManualTask(t) | FlowElement::ReceiveTask(t) => Some(&t.activity),
            FlowElement::UserTask(t) => Some(&t.activity),
            FlowElement::ScriptTask(t) => Some(&t.activity),
            FlowElement::BusinessRuleTask(t) => Some(&t.activity),
            FlowElement::ServiceTask(t) | FlowElement::SendTask(t) => Some(&t.activity),
            FlowElement::HttpServiceTask(t) => Some(&t.task.activity),
            FlowElement::CaseServiceTask(t) => Some(&t.task.activity),
            FlowElement::ExternalWorkerServiceTask(t) => Some(&t.task.activity),
            FlowElement::SendEventServiceTask(t) => Some(&t.task.activity),
            FlowElement::CallActivity(t) => Some(&t.activity),
            FlowElement::SubProcess(s) | FlowElement::EventSubProcess(s) | FlowElement::Transaction(s) => {
                Some(&s.activity)
            }
            FlowElement::AdhocSubProcess(s) => Some(&s.sub_process.activity),
            _ => None,
        }
    }

    pub fn activity_mut(&mut self) -> Option<&mut ActivityCore> {
        match self {
            FlowElement::Task(t) | FlowElement::ManualTask(t) | FlowElement::ReceiveTask(t) => Some(&mut t.activity),
            FlowElement::UserTask(t) => Some(&mut t.activity),
            FlowElement::ScriptTask(t) => Some(&mut t.activity),
            FlowElement::BusinessRuleTask(t) => Some(&mut t.activity),
            FlowElement::ServiceTask(t) | FlowElement::SendTask(t) => Some(&mut t.activity),
            FlowElement::HttpServiceTask(t) => Some(&mut t.task.activity),
            FlowElement::CaseServiceTask(t) => Some(&mut t.task.activity),
            FlowElement::ExternalWorkerServiceTask(t) => Some(&mut t.task.activity),
            FlowElement::SendEventServiceTask(t) => Some(&mut t.task.activity),
            FlowElement::CallActivity(t) => Some(&mut t.activity),
            FlowElement::SubProcess(s) | FlowElement::EventSubProcess(s) | FlowElement::Transaction(s) => {
                Some(&mut s.activity)
            }
            FlowElement::AdhocSubProcess(s) => Some(&mut s.sub_process.activity),
            _ => None,
        }
    }

    /// The nested scope of sub-process variants
    pub fn sub_process(&self) -> Option<&SubProcess> {
        match self {
            FlowElement::SubProcess(s) | FlowElement::EventSubProcess(s) | FlowElement::Transaction(s) => Some(s),
            FlowElement::AdhocSubProcess(s) => Some(&s.sub_process),
            _ => None,
        }
    }

    pub fn sub_process_mut(&mut self) -> Option<&mut SubProcess> {
        match self {
            FlowElement::SubProcess(s) | FlowElement::EventSubProcess(s) | FlowElement::Transaction(s) => Some(s),
            FlowElement::AdhocSubProcess(s) => Some(&mut s.sub_process),
            _ => None,
        }
    }

    /// Event definitions of event variants; empty for everything else
    pub fn event_definitions(&self) -> &[EventDefinition] {
        match self {
            FlowElement::StartEvent(e) => &e.event_definitions,
            FlowElement::EndEvent(e) | FlowElement::IntermediateCatchEvent(e) | FlowElement::IntermediateThrowEvent(e) => {
                &e.event_definitions
            }
            FlowElement::BoundaryEvent(e) => &e.event_definitions,
            _ => &[],
        }
    }

    /// The underlying service task of the service task family
    pub fn service_task(&self) -> Option<&ServiceTask> {
        match self {
            FlowElement::ServiceTask(t) | FlowElement::SendTask(t) => Some(t),
            FlowElement::HttpServiceTask(t) => Some(&t.task),
            FlowElement::CaseServiceTask(t) => Some(&t.task),
            FlowElement::ExternalWorkerServiceTask(t) => Some(&t.task),
            FlowElement::SendEventServiceTask(t) => Some(&t.task),
            _ => None,
        }
    }
}

/// Elements that carry documentation
pub trait HasDocumentation {
    fn documentation(&self) -> Option<&str>;
    fn set_documentation(&mut self, documentation: Option<String>);
}

/// Elements that carry captured extension content
pub trait HasExtensions {
    fn extension_elements(&self) -> &ExtensionMap;
    fn extension_elements_mut(&mut self) -> &mut ExtensionMap;
    fn extension_attributes(&self) -> &AttributeMap;
    fn extension_attributes_mut(&mut self) -> &mut AttributeMap;

    fn add_extension_element(&mut self, element: ExtensionElement) {
        self.extension_elements_mut().push(element.name.clone(), element);
    }
}

/// Elements with execution listeners
pub trait HasListeners {
    fn execution_listeners(&self) -> &[Listener];
    fn execution_listeners_mut(&mut self) -> &mut Vec<Listener>;
}

/// Activities, which may carry attached boundary events
pub trait HasBoundaryEvents {
    fn boundary_events(&self) -> &[String];
}

impl HasDocumentation for FlowElement {
    fn documentation(&self) -> Option<&str> {
        self.core().documentation.as_deref()
    }

    fn set_documentation(&mut self, documentation: Option<String>) {
        self.core_mut().documentation = documentation;
    }
}

impl HasExtensions for FlowElement {
    fn extension_elements(&self) -> &ExtensionMap {
        &self.core().extension_elements
    }

    fn extension_elements_mut(&mut self) -> &mut ExtensionMap {
        &mut self.core_mut().extension_elements
    }

    fn extension_attributes(&self) -> &AttributeMap {
        &self.core().extension_attributes
    }

    fn extension_attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.core_mut().extension_attributes
    }
}

impl HasListeners for FlowElement {
    fn execution_listeners(&self) -> &[Listener] {
        &self.core().execution_listeners
    }

    fn execution_listeners_mut(&mut self) -> &mut Vec<Listener> {
        &mut self.core_mut().execution_listeners
    }
}

impl HasBoundaryEvents for FlowElement {
    fn boundary_events(&self) -> &[String] {
        self.activity().map_or(&[], |a| a.boundary_events.as_slice())
    }
}

/// Depth-first search for `id` through `elements` and every nested scope
pub fn find_flow_element<'a>(elements: &'a [FlowElement], id: &str) -> Option<&'a FlowElement> {
    for element in elements {
        if element.id() == id {
            return Some(element);
        }
        if let Some(found) = element
            .sub_process()
            .and_then(|s| find_flow_element(&s.flow_elements, id))
        {
            return Some(found);
        }
    }
    None
}

/// Mutable counterpart of [`find_flow_element`]
pub fn find_flow_element_mut<'a>(elements: &'a mut [FlowElement], id: &str) -> Option<&'a mut FlowElement> {
    for element in elements.iter_mut() {
        if element.id() == id {
            return Some(element);
        }
        if let Some(found) = element
            .sub_process_mut()
            .and_then(|s| find_flow_element_mut(&mut s.flow_elements, id))
        {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn service_task_subtypes_share_the_core() {
        let mut element = FlowElement::HttpServiceTask(HttpServiceTask {
            task: ServiceTask::new(FlowCore::named("http", "Call")),
            parallel_in_same_transaction: None,
        });
        assert_eq!(element.id(), "http");
        assert_eq!(element.xml_name(), "serviceTask");
        element.core_mut().documentation = Some("doc".into());
        assert_eq!(element.documentation(), Some("doc"));
        assert!(element.activity().is_some());
    }

    #[test]
    fn nested_elements_are_found() {
        let mut sub = SubProcess::new(FlowCore::new("sub"));
        sub.flow_elements.push(FlowElement::UserTask(UserTask::new(FlowCore::new("inner"))));
        let elements = vec![FlowElement::SubProcess(sub)];

        assert_eq!(find_flow_element(&elements, "inner").map(FlowElement::xml_name), Some("userTask"));
        assert!(find_flow_element(&elements, "missing").is_none());
    }

    #[test]
    fn gateways_have_no_activity_state() {
        let gateway = FlowElement::ExclusiveGateway(Gateway::new(FlowCore::new("gw")));
        assert!(gateway.activity().is_none());
        assert!(gateway.boundary_events().is_empty());
    }
}
