//! This module defines the in-memory process model a document converts to and from.
//!
//! A [`BpmnModel`] is the aggregate root: it owns every process, pool, root
//! definition and the diagram geometry. It is created by one parse call (or built
//! by hand), freely mutated, and consumed by serialization.

pub mod artifact;
pub mod common;
pub mod data;
pub mod diagram;
pub mod event;
pub mod extension;
pub mod flow;

use artifact::Artifact;
use common::{EventListener, Listener};
use diagram::DiagramInterchange;
use extension::{AttributeMap, ExtensionElement, ExtensionMap};
use flow::{find_flow_element, find_flow_element_mut, DataObject, FlowElement};

/// A namespace declared on the document root
#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    pub prefix: String,
    pub uri: String,
}

/// A swim lane; its flow node references are kept in declaration order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Lane {
    pub id: String,
    pub name: Option<String>,
    pub flow_references: Vec<String>,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Process {
    pub id: String,
    pub name: Option<String>,
    pub executable: bool,
    pub documentation: Option<String>,
    pub candidate_starter_users: Vec<String>,
    pub candidate_starter_groups: Vec<String>,
    pub flow_elements: Vec<FlowElement>,
    pub artifacts: Vec<Artifact>,
    pub lane_set_id: Option<String>,
    pub lanes: Vec<Lane>,
    pub execution_listeners: Vec<Listener>,
    pub event_listeners: Vec<EventListener>,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

impl Process {
    pub fn new(id: impl Into<String>) -> Self {
        Process {
            id: id.into(),
            executable: true,
            ..Default::default()
        }
    }

    /// Find a flow element by id anywhere in this process, nested scopes included
    pub fn flow_element(&self, id: &str) -> Option<&FlowElement> {
        find_flow_element(&self.flow_elements, id)
    }

    pub fn flow_element_mut(&mut self, id: &str) -> Option<&mut FlowElement> {
        find_flow_element_mut(&mut self.flow_elements, id)
    }

    /// Data objects declared directly in the process scope
    pub fn data_objects(&self) -> impl Iterator<Item = &DataObject> {
        self.flow_elements.iter().filter_map(|element| match element {
            FlowElement::DataObject(data_object) => Some(data_object),
            _ => None,
        })
    }

    pub fn add_flow_element(&mut self, element: FlowElement) {
        self.flow_elements.push(element);
    }

    pub fn artifact(&self, id: &str) -> Option<&Artifact> {
        fn search<'a>(artifacts: &'a [Artifact], elements: &'a [FlowElement], id: &str) -> Option<&'a Artifact> {
            artifacts.iter().find(|a| a.id == id).or_else(|| {
                elements
                    .iter()
                    .filter_map(FlowElement::sub_process)
                    .find_map(|s| search(&s.artifacts, &s.flow_elements, id))
            })
        }
        search(&self.artifacts, &self.flow_elements, id)
    }
}

/// A collaboration participant
#[derive(Debug, Clone, PartialEq)]
pub struct Pool {
    pub id: String,
    pub name: Option<String>,
    /// Expected, but not guaranteed, to name a declared process
    pub process_ref: Option<String>,
    pub executable: bool,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

impl Pool {
    pub fn new(id: impl Into<String>, process_ref: impl Into<String>) -> Self {
        Pool {
            id: id.into(),
            name: None,
            process_ref: Some(process_ref.into()),
            executable: true,
            extension_elements: ExtensionMap::new(),
            extension_attributes: AttributeMap::new(),
            foreign_children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageFlow {
    pub id: String,
    pub name: Option<String>,
    pub source_ref: Option<String>,
    pub target_ref: Option<String>,
    pub message_ref: Option<String>,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub id: String,
    pub name: Option<String>,
    pub item_ref: Option<String>,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signal {
    pub id: String,
    pub name: Option<String>,
    /// Engine scope: `global` or `processInstance`
    pub scope: Option<String>,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorDefinition {
    pub id: String,
    pub name: Option<String>,
    pub error_code: Option<String>,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Escalation {
    pub id: String,
    pub name: Option<String>,
    pub escalation_code: Option<String>,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataStore {
    pub id: String,
    pub name: Option<String>,
    pub item_subject_ref: Option<String>,
    pub data_state: Option<String>,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemDefinition {
    pub id: String,
    pub structure_ref: Option<String>,
    pub item_kind: Option<String>,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Import {
    pub import_type: Option<String>,
    pub location: Option<String>,
    pub namespace: Option<String>,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

/// The aggregate root of one conversion
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BpmnModel {
    pub definitions_id: Option<String>,
    pub target_namespace: Option<String>,
    pub type_language: Option<String>,
    pub expression_language: Option<String>,
    pub exporter: Option<String>,
    pub exporter_version: Option<String>,
    /// Custom namespaces declared on the root, in declaration order
    pub namespaces: Vec<Namespace>,
    pub definitions_attributes: AttributeMap,
    pub imports: Vec<Import>,
    pub item_definitions: Vec<ItemDefinition>,
    pub messages: Vec<Message>,
    pub signals: Vec<Signal>,
    pub errors: Vec<ErrorDefinition>,
    pub escalations: Vec<Escalation>,
    pub data_stores: Vec<DataStore>,
    pub collaboration_id: Option<String>,
    pub collaboration_name: Option<String>,
    pub collaboration_attributes: AttributeMap,
    pub collaboration_extension_elements: ExtensionMap,
    /// Unrecognised children of the collaboration
    pub collaboration_foreign_children: Vec<ExtensionElement>,
    pub pools: Vec<Pool>,
    pub message_flows: Vec<MessageFlow>,
    /// Artifacts declared on the collaboration rather than inside a process
    pub global_artifacts: Vec<Artifact>,
    pub processes: Vec<Process>,
    pub diagram: DiagramInterchange,
    pub extension_elements: ExtensionMap,
    /// Unrecognised children of the root element
    pub foreign_children: Vec<ExtensionElement>,
}

impl BpmnModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_namespace(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        let prefix = prefix.into();
        let uri = uri.into();
        match self.namespaces.iter_mut().find(|ns| ns.prefix == prefix) {
            Some(existing) => existing.uri = uri,
            None => self.namespaces.push(Namespace { prefix, uri }),
        }
    }

    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|ns| ns.prefix == prefix)
            .map(|ns| ns.uri.as_str())
    }

    pub fn process(&self, id: &str) -> Option<&Process> {
        self.processes.iter().find(|p| p.id == id)
    }

    pub fn process_mut(&mut self, id: &str) -> Option<&mut Process> {
        self.processes.iter_mut().find(|p| p.id == id)
    }

    pub fn pool(&self, id: &str) -> Option<&Pool> {
        self.pools.iter().find(|p| p.id == id)
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn signal(&self, id: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.id == id)
    }

    pub fn error(&self, id: &str) -> Option<&ErrorDefinition> {
        self.errors.iter().find(|e| e.id == id)
    }

    pub fn data_store(&self, id: &str) -> Option<&DataStore> {
        self.data_stores.iter().find(|d| d.id == id)
    }

    /// Find a flow element by id in any process
    pub fn flow_element(&self, id: &str) -> Option<&FlowElement> {
        self.processes.iter().find_map(|p| p.flow_element(id))
    }

    /// The process a pool stands for.
    ///
    /// A `processRef` that names a declared process wins. A broken reference
    /// falls back to the process at the pool's own position in declaration order.
    pub fn pool_process(&self, pool_index: usize) -> Option<&Process> {
        let pool = self.pools.get(pool_index)?;
        match pool.process_ref.as_deref().and_then(|r| self.process(r)) {
            Some(process) => Some(process),
            None => self.processes.get(pool_index),
        }
    }

    /// The pool associated with the process at `process_index`, if any
    fn process_pool(&self, process_index: usize) -> Option<&Pool> {
        let process = self.processes.get(process_index)?;
        self.pools
            .iter()
            .find(|pool| pool.process_ref.as_deref() == Some(process.id.as_str()))
            .or_else(|| {
                self.pools
                    .get(process_index)
                    .filter(|pool| !self.has_process_ref_match(pool))
            })
    }

    fn has_process_ref_match(&self, pool: &Pool) -> bool {
        pool.process_ref
            .as_deref()
            .is_some_and(|r| self.process(r).is_some())
    }

    /// The primary executable process.
    ///
    /// A single process is always the main one. Otherwise the first process whose
    /// associated pool (or, without a pool, the process itself) is executable
    /// wins, and the first declared process is the fallback.
    pub fn main_process(&self) -> Option<&Process> {
        if self.processes.len() <= 1 {
            return self.processes.first();
        }
        let main = (0..self.processes.len()).find(|&index| {
            match self.process_pool(index) {
                Some(pool) => pool.executable,
                None => self.processes[index].executable,
            }
        });
        let main = main.unwrap_or(0);
        tracing::debug!(process = %self.processes[main].id, "resolved main process");
        self.processes.get(main)
    }

    /// Look up shape geometry for `id` in any diagram scope
    pub fn graphic_info(&self, id: &str) -> Option<&diagram::GraphicInfo> {
        self.diagram.graphic_info(id)
    }

    pub fn flow_location(&self, id: &str) -> Option<&[diagram::GraphicInfo]> {
        self.diagram.waypoints(id)
    }

    pub fn label_graphic_info(&self, id: &str) -> Option<&diagram::GraphicInfo> {
        self.diagram.label_graphic_info(id)
    }
}
