//! Building blocks shared by several element kinds: listeners, field injections,
//! form properties, parameter mappings, exception mappings and multi-instance settings.

use super::extension::{AttributeMap, ExtensionElement, ExtensionMap};

/// How a delegate is bound to an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplementationType {
    Class,
    Expression,
    DelegateExpression,
    Script,
}

impl ImplementationType {
    /// Name of the engine attribute carrying the implementation
    pub fn attribute_name(&self) -> &'static str {
        match self {
            ImplementationType::Class => "class",
            ImplementationType::Expression => "expression",
            ImplementationType::DelegateExpression => "delegateExpression",
            ImplementationType::Script => "script",
        }
    }
}

/// A delegate reference: the kind of binding and its value
#[derive(Debug, Clone, PartialEq)]
pub struct Implementation {
    pub kind: ImplementationType,
    pub value: String,
}

impl Implementation {
    pub fn class(value: impl Into<String>) -> Self {
        Implementation { kind: ImplementationType::Class, value: value.into() }
    }

    pub fn expression(value: impl Into<String>) -> Self {
        Implementation { kind: ImplementationType::Expression, value: value.into() }
    }

    pub fn delegate_expression(value: impl Into<String>) -> Self {
        Implementation { kind: ImplementationType::DelegateExpression, value: value.into() }
    }
}

/// A value injected into a delegate field
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldExtension {
    pub name: String,
    pub string_value: Option<String>,
    pub expression: Option<String>,
}

impl FieldExtension {
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        FieldExtension {
            name: name.into(),
            string_value: Some(value.into()),
            expression: None,
        }
    }

    pub fn expression(name: impl Into<String>, expression: impl Into<String>) -> Self {
        FieldExtension {
            name: name.into(),
            string_value: None,
            expression: Some(expression.into()),
        }
    }
}

/// An execution or task listener
#[derive(Debug, Clone, PartialEq)]
pub struct Listener {
    pub event: Option<String>,
    pub implementation: Option<Implementation>,
    pub on_transaction: Option<String>,
    pub fields: Vec<FieldExtension>,
}

impl Listener {
    pub fn new(event: impl Into<String>, implementation: Implementation) -> Self {
        Listener {
            event: Some(event.into()),
            implementation: Some(implementation),
            on_transaction: None,
            fields: Vec::new(),
        }
    }
}

/// A process-level engine event listener
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventListener {
    pub events: Option<String>,
    pub implementation: Option<Implementation>,
    pub entity_type: Option<String>,
}

/// One selectable value of an enum form property
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormValue {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormProperty {
    pub id: String,
    pub name: Option<String>,
    pub property_type: Option<String>,
    pub expression: Option<String>,
    pub variable: Option<String>,
    pub default_expression: Option<String>,
    pub date_pattern: Option<String>,
    pub readable: bool,
    pub writable: bool,
    pub required: bool,
    pub form_values: Vec<FormValue>,
}

impl FormProperty {
    pub fn new(id: impl Into<String>) -> Self {
        FormProperty {
            id: id.into(),
            name: None,
            property_type: None,
            expression: None,
            variable: None,
            default_expression: None,
            date_pattern: None,
            readable: true,
            writable: true,
            required: false,
            form_values: Vec::new(),
        }
    }
}

/// A variable mapping into or out of a called element
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IoParameter {
    pub source: Option<String>,
    pub source_expression: Option<String>,
    pub target: Option<String>,
    pub target_expression: Option<String>,
    pub transient: bool,
}

impl IoParameter {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        IoParameter {
            source: Some(source.into()),
            target: Some(target.into()),
            ..Default::default()
        }
    }
}

/// Maps a delegate exception class onto a BPMN error code
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapExceptionEntry {
    pub error_code: String,
    pub class_name: Option<String>,
    pub root_cause: Option<String>,
    pub has_children: bool,
}

/// A pluggable handler that turns the collection value into a list of elements
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionHandler {
    pub implementation: Implementation,
    pub text: Option<String>,
}

/// Multi-instance loop characteristics of an activity
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiInstance {
    pub sequential: bool,
    pub loop_cardinality: Option<String>,
    /// Collection expression or variable name
    pub collection: Option<String>,
    pub collection_handler: Option<CollectionHandler>,
    pub element_variable: Option<String>,
    pub element_index_variable: Option<String>,
    pub completion_condition: Option<String>,
    pub loop_data_input_ref: Option<String>,
    pub input_data_item: Option<String>,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}
