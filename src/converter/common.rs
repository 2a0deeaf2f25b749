//! Readers and writers for the building blocks several converters share:
//! the engine children of `extensionElements`, multi-instance settings and
//! data associations.

use crate::error::{Error, Result};
use crate::model::common::{
    CollectionHandler, EventListener, FieldExtension, FormProperty, FormValue, Implementation, ImplementationType,
    IoParameter, Listener, MapExceptionEntry, MultiInstance,
};
use crate::model::data::{Assignment, DataAssociation};
use crate::model::event::VariableListenerEventDefinition;
use crate::model::extension::ExtensionMap;
use crate::xml::writer::{Tag, XmlWriter};
use crate::xml::{parse_bool, Element, ENGINE_NS, ENGINE_PREFIX, MODEL_NS};

use super::extension::{read_subtree, write_subtree};
use super::foreign_children;
use super::registry::{registry, EngineChild};

/// Model children of `multiInstanceLoopCharacteristics` read into typed fields
const MULTI_INSTANCE_CHILDREN: [&str; 4] = [
    "loopCardinality",
    "loopDataInputRef",
    "inputDataItem",
    "completionCondition",
];

/// The decoded content of an `extensionElements` block.
///
/// Converters move out the parts their element supports; what is left in
/// `generic` is kept as captured extension content.
#[derive(Debug, Default)]
pub struct ExtensionBlock {
    pub execution_listeners: Vec<Listener>,
    pub task_listeners: Vec<Listener>,
    pub event_listeners: Vec<EventListener>,
    pub fields: Vec<FieldExtension>,
    pub form_properties: Vec<FormProperty>,
    pub in_parameters: Vec<IoParameter>,
    pub out_parameters: Vec<IoParameter>,
    pub event_in_parameters: Vec<IoParameter>,
    pub event_out_parameters: Vec<IoParameter>,
    pub map_exceptions: Vec<MapExceptionEntry>,
    pub value: Option<String>,
    pub variable_listener: Option<VariableListenerEventDefinition>,
    pub generic: ExtensionMap,
}

/// Decode the `extensionElements` child of `element`, resolving engine children for `owner`
pub fn read_extension_block(element: Element<'_>, owner: &str) -> Result<ExtensionBlock> {
    let mut block = ExtensionBlock::default();
    let Some(extensions) = element.child(MODEL_NS, "extensionElements") else {
        return Ok(block);
    };
    for child in extensions.children() {
        let kind = if child.is_engine() {
            registry().engine_child(child.local_name(), owner)
        } else {
            None
        };
        match kind {
            Some(EngineChild::ExecutionListener) => block.execution_listeners.push(read_listener(child)),
            Some(EngineChild::TaskListener) => block.task_listeners.push(read_listener(child)),
            Some(EngineChild::EventListener) => block.event_listeners.push(EventListener {
                events: attr(child, "events"),
                implementation: read_implementation(child),
                entity_type: attr(child, "entityType"),
            }),
            Some(EngineChild::Field) => block.fields.push(read_field(child)),
            Some(EngineChild::FormProperty) => block.form_properties.push(read_form_property(child)?),
            Some(EngineChild::InParameter) => block.in_parameters.push(read_io_parameter(child)?),
            Some(EngineChild::OutParameter) => block.out_parameters.push(read_io_parameter(child)?),
            Some(EngineChild::EventInParameter) => block.event_in_parameters.push(read_io_parameter(child)?),
            Some(EngineChild::EventOutParameter) => block.event_out_parameters.push(read_io_parameter(child)?),
            Some(EngineChild::MapException) => block.map_exceptions.push(read_map_exception(child)?),
            Some(EngineChild::Value) => block.value = child.text(),
            Some(EngineChild::VariableListener) => {
                block.variable_listener = Some(VariableListenerEventDefinition {
                    variable_name: attr(child, "variableName"),
                    variable_change_type: attr(child, "variableChangeType"),
                })
            }
            None => {
                let captured = read_subtree(child);
                block.generic.push(captured.name.clone(), captured);
            }
        }
    }
    Ok(block)
}

fn extension_children<'a>(element: Element<'a>) -> impl Iterator<Item = Element<'a>> + 'a {
    element
        .child(MODEL_NS, "extensionElements")
        .into_iter()
        .flat_map(|extensions| extensions.children())
}

/// Capture the whole `extensionElements` block of an element that has no typed engine children
pub fn read_generic_block(element: Element<'_>) -> ExtensionMap {
    let mut generic = ExtensionMap::new();
    for child in extension_children(element) {
        let captured = read_subtree(child);
        generic.push(captured.name.clone(), captured);
    }
    generic
}

/// A non-empty attribute of an engine child; unprefixed and engine-prefixed spellings are both accepted
pub fn attr(element: Element<'_>, name: &str) -> Option<String> {
    element
        .attribute(name)
        .or_else(|| element.attribute_ns(ENGINE_NS, name))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn bool_attr(element: Element<'_>, name: &str, default: bool) -> Result<bool> {
    match attr(element, name) {
        Some(value) => parse_bool(element.local_name(), name, &value),
        None => Ok(default),
    }
}

/// The first of `class`, `expression` or `delegateExpression` present on `element`
pub fn read_implementation(element: Element<'_>) -> Option<Implementation> {
    [
        ImplementationType::Class,
        ImplementationType::Expression,
        ImplementationType::DelegateExpression,
    ]
    .into_iter()
    .find_map(|kind| {
        attr(element, kind.attribute_name()).map(|value| Implementation { kind, value })
    })
}

pub fn read_listener(element: Element<'_>) -> Listener {
    Listener {
        event: attr(element, "event"),
        implementation: read_implementation(element),
        on_transaction: attr(element, "onTransaction"),
        fields: element
            .children()
            .filter(|c| c.is(ENGINE_NS, "field"))
            .map(read_field)
            .collect(),
    }
}

pub fn read_field(element: Element<'_>) -> FieldExtension {
    let child_text = |name: &str| element.child(ENGINE_NS, name).and_then(|c| c.text());
    FieldExtension {
        name: attr(element, "name").unwrap_or_default(),
        string_value: attr(element, "stringValue").or_else(|| child_text("string")),
        expression: attr(element, "expression").or_else(|| child_text("expression")),
    }
}

fn read_form_property(element: Element<'_>) -> Result<FormProperty> {
    let mut property = FormProperty::new(attr(element, "id").unwrap_or_default());
    property.name = attr(element, "name");
    property.property_type = attr(element, "type");
    property.expression = attr(element, "expression");
    property.variable = attr(element, "variable");
    property.default_expression = attr(element, "default");
    property.date_pattern = attr(element, "datePattern");
    property.readable = bool_attr(element, "readable", true)?;
    property.writable = bool_attr(element, "writable", true)?;
    property.required = bool_attr(element, "required", false)?;
    property.form_values = element
        .children()
        .filter(|c| c.is(ENGINE_NS, "value"))
        .map(|value| FormValue {
            id: attr(value, "id").unwrap_or_default(),
            name: attr(value, "name"),
        })
        .collect();
    Ok(property)
}

fn read_io_parameter(element: Element<'_>) -> Result<IoParameter> {
    Ok(IoParameter {
        source: attr(element, "source"),
        source_expression: attr(element, "sourceExpression"),
        target: attr(element, "target"),
        target_expression: attr(element, "targetExpression"),
        transient: bool_attr(element, "transient", false)?,
    })
}

/// Read a `mapException` entry.
///
/// The child flag may be spelled `includeChildExceptions` or `hasChildren` and
/// defaults to false; the error code is mandatory.
pub fn read_map_exception(element: Element<'_>) -> Result<MapExceptionEntry> {
    let flag = ["includeChildExceptions", "hasChildren"]
        .into_iter()
        .find_map(|name| attr(element, name).map(|value| (name, value)));
    let has_children = match flag {
        Some((name, value)) => parse_bool(element.local_name(), name, &value)?,
        None => false,
    };
    let error_code = attr(element, "errorCode")
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| Error::MissingRequiredAttribute {
            element: element.local_name().to_string(),
            attribute: "errorCode",
            message: "No errorCode defined on mapException".to_string(),
        })?;
    Ok(MapExceptionEntry {
        error_code,
        class_name: element.trimmed_text(),
        root_cause: attr(element, "rootCause"),
        has_children,
    })
}

pub fn read_multi_instance(element: Element<'_>) -> Result<MultiInstance> {
    let mut attrs = element.attribute_reader();
    let mut collection = attrs.engine("collection");
    let mut collection_handler = None;
    let mut extension_elements = ExtensionMap::new();
    for child in extension_children(element) {
        if !child.is(ENGINE_NS, "collection") {
            let captured = read_subtree(child);
            extension_elements.push(captured.name.clone(), captured);
            continue;
        }
        match read_implementation(child) {
            Some(implementation) => {
                collection_handler = Some(CollectionHandler {
                    implementation,
                    text: child.trimmed_text(),
                })
            }
            None => collection = collection.or_else(|| child.trimmed_text()),
        }
    }
    let child_text = |name: &str| element.child(MODEL_NS, name).and_then(|c| c.trimmed_text());
    Ok(MultiInstance {
        sequential: attrs.plain_bool("isSequential", false)?,
        loop_cardinality: child_text("loopCardinality"),
        collection,
        collection_handler,
        element_variable: attrs.engine("elementVariable"),
        element_index_variable: attrs.engine("elementIndexVariable"),
        completion_condition: child_text("completionCondition"),
        loop_data_input_ref: child_text("loopDataInputRef"),
        input_data_item: element
            .child(MODEL_NS, "inputDataItem")
            .and_then(|item| item.attribute("name"))
            .map(str::to_string),
        extension_elements,
        foreign_children: foreign_children(element, &MULTI_INSTANCE_CHILDREN),
        extension_attributes: attrs.into_extensions(),
    })
}

pub fn read_data_association(element: Element<'_>) -> DataAssociation {
    let child_text = |name: &str| element.child(MODEL_NS, name).and_then(|c| c.trimmed_text());
    DataAssociation {
        id: element.attribute("id").map(str::to_string),
        source_ref: child_text("sourceRef"),
        target_ref: child_text("targetRef"),
        // Present but empty is kept apart from absent
        transformation: element
            .child(MODEL_NS, "transformation")
            .map(|t| t.text().unwrap_or_default()),
        assignments: element
            .children_named(MODEL_NS, "assignment")
            .map(|assignment| Assignment {
                from: assignment.child(MODEL_NS, "from").and_then(|c| c.trimmed_text()),
                to: assignment.child(MODEL_NS, "to").and_then(|c| c.trimmed_text()),
            })
            .collect(),
    }
}

// Writing

/// Write captured content as an `extensionElements` block, omitted when empty
pub fn write_generic_block(elements: &ExtensionMap, w: &mut XmlWriter) -> Result<()> {
    if elements.is_empty() {
        return Ok(());
    }
    w.open(Tag::new("extensionElements"))?;
    for element in elements.values() {
        write_subtree(element, w)?;
    }
    w.close()
}

pub fn engine_tag(name: &str) -> Tag {
    Tag::prefixed(ENGINE_PREFIX, ENGINE_NS, name)
}

fn implementation_attr(tag: Tag, implementation: Option<&Implementation>) -> Tag {
    match implementation {
        Some(implementation) => tag.attr(implementation.kind.attribute_name(), &implementation.value),
        None => tag,
    }
}

fn flag(tag: Tag, name: &str, value: bool, default: bool) -> Tag {
    if value == default {
        tag
    } else {
        tag.attr(name, value.to_string())
    }
}

pub fn write_listener(name: &str, listener: &Listener, w: &mut XmlWriter) -> Result<()> {
    let tag = engine_tag(name).opt_attr("event", listener.event.as_ref());
    let tag = implementation_attr(tag, listener.implementation.as_ref())
        .opt_attr("onTransaction", listener.on_transaction.as_ref());
    w.open(tag)?;
    for field in &listener.fields {
        write_field(field, w)?;
    }
    w.close()
}

pub fn write_event_listener(listener: &EventListener, w: &mut XmlWriter) -> Result<()> {
    let tag = engine_tag("eventListener").opt_attr("events", listener.events.as_ref());
    let tag = implementation_attr(tag, listener.implementation.as_ref())
        .opt_attr("entityType", listener.entity_type.as_ref());
    w.empty(tag)
}

pub fn write_field(field: &FieldExtension, w: &mut XmlWriter) -> Result<()> {
    w.open(engine_tag("field").attr("name", &field.name))?;
    if let Some(value) = &field.string_value {
        w.cdata_element(engine_tag("string"), value)?;
    }
    if let Some(expression) = &field.expression {
        w.cdata_element(engine_tag("expression"), expression)?;
    }
    w.close()
}

pub fn write_form_property(property: &FormProperty, w: &mut XmlWriter) -> Result<()> {
    let tag = engine_tag("formProperty")
        .attr("id", &property.id)
        .opt_attr("name", property.name.as_ref())
        .opt_attr("type", property.property_type.as_ref())
        .opt_attr("expression", property.expression.as_ref())
        .opt_attr("variable", property.variable.as_ref())
        .opt_attr("default", property.default_expression.as_ref())
        .opt_attr("datePattern", property.date_pattern.as_ref());
    let tag = flag(tag, "readable", property.readable, true);
    let tag = flag(tag, "writable", property.writable, true);
    let tag = flag(tag, "required", property.required, false);
    w.open(tag)?;
    for value in &property.form_values {
        w.empty(
            engine_tag("value")
                .attr("id", &value.id)
                .opt_attr("name", value.name.as_ref()),
        )?;
    }
    w.close()
}

pub fn write_io_parameter(name: &str, parameter: &IoParameter, w: &mut XmlWriter) -> Result<()> {
    let tag = engine_tag(name)
        .opt_attr("source", parameter.source.as_ref())
        .opt_attr("sourceExpression", parameter.source_expression.as_ref())
        .opt_attr("target", parameter.target.as_ref())
        .opt_attr("targetExpression", parameter.target_expression.as_ref());
    w.empty(flag(tag, "transient", parameter.transient, false))
}

pub fn write_map_exception(entry: &MapExceptionEntry, w: &mut XmlWriter) -> Result<()> {
    let tag = engine_tag("mapException").attr("errorCode", &entry.error_code);
    let tag = flag(tag, "includeChildExceptions", entry.has_children, false)
        .opt_attr("rootCause", entry.root_cause.as_ref());
    match &entry.class_name {
        Some(class_name) => w.text_element(tag, class_name),
        None => w.empty(tag),
    }
}

pub fn write_multi_instance(multi_instance: &MultiInstance, w: &mut XmlWriter) -> Result<()> {
    let tag = Tag::new("multiInstanceLoopCharacteristics").attr("isSequential", multi_instance.sequential.to_string());
    let tag = [
        ("collection", &multi_instance.collection),
        ("elementVariable", &multi_instance.element_variable),
        ("elementIndexVariable", &multi_instance.element_index_variable),
    ]
    .into_iter()
    .fold(tag, |tag, (name, value)| {
        tag.opt_ns_attr(ENGINE_PREFIX, ENGINE_NS, name, value.as_ref())
    });
    w.open(tag.extension_attrs(&multi_instance.extension_attributes))?;
    if multi_instance.collection_handler.is_some() || !multi_instance.extension_elements.is_empty() {
        w.open(Tag::new("extensionElements"))?;
        if let Some(handler) = &multi_instance.collection_handler {
            let tag = implementation_attr(engine_tag("collection"), Some(&handler.implementation));
            match &handler.text {
                Some(text) => w.text_element(tag, text)?,
                None => w.empty(tag)?,
            }
        }
        for element in multi_instance.extension_elements.values() {
            write_subtree(element, w)?;
        }
        w.close()?;
    }
    if let Some(cardinality) = &multi_instance.loop_cardinality {
        w.text_element(Tag::new("loopCardinality"), cardinality)?;
    }
    if let Some(input) = &multi_instance.loop_data_input_ref {
        w.text_element(Tag::new("loopDataInputRef"), input)?;
    }
    if let Some(item) = &multi_instance.input_data_item {
        w.empty(Tag::new("inputDataItem").attr("name", item))?;
    }
    if let Some(condition) = &multi_instance.completion_condition {
        w.text_element(Tag::new("completionCondition"), condition)?;
    }
    for child in &multi_instance.foreign_children {
        write_subtree(child, w)?;
    }
    w.close()
}

pub fn write_data_association(name: &str, association: &DataAssociation, w: &mut XmlWriter) -> Result<()> {
    w.open(Tag::new(name).opt_attr("id", association.id.as_ref()))?;
    if let Some(source) = &association.source_ref {
        w.text_element(Tag::new("sourceRef"), source)?;
    }
    if let Some(target) = &association.target_ref {
        w.text_element(Tag::new("targetRef"), target)?;
    }
    match association.transformation.as_deref() {
        Some("") => w.empty(Tag::new("transformation"))?,
        Some(transformation) => w.text_element(Tag::new("transformation"), transformation)?,
        None => {}
    }
    for assignment in &association.assignments {
        w.open(Tag::new("assignment"))?;
        if let Some(from) = &assignment.from {
            w.text_element(Tag::new("from"), from)?;
        }
        if let Some(to) = &assignment.to {
            w.text_element(Tag::new("to"), to)?;
        }
        w.close()?;
    }
    w.close()
}

#[cfg(test)]
mod test {
    use std::error::Error as StdError;

    use super::*;
    use crate::xml::XmlDocument;

    fn wrap(body: &str) -> String {
        format!(
            r#"<serviceTask xmlns="{}" xmlns:flowable="{}" id="task"><extensionElements>{}</extensionElements></serviceTask>"#,
            MODEL_NS, ENGINE_NS, body
        )
    }

    #[test]
    fn map_exception_defaults_to_no_children() -> std::result::Result<(), Box<dyn StdError>> {
        let doc = XmlDocument::parse(&wrap(r#"<flowable:mapException errorCode="E1">com.Ex</flowable:mapException>"#))?;
        let block = read_extension_block(doc.root(), "serviceTask")?;
        assert_eq!(block.map_exceptions.len(), 1);
        assert_eq!(block.map_exceptions[0].error_code, "E1");
        assert_eq!(block.map_exceptions[0].class_name.as_deref(), Some("com.Ex"));
        assert!(!block.map_exceptions[0].has_children);
        Ok(())
    }

    #[test]
    fn map_exception_rejects_non_boolean_flag() -> std::result::Result<(), Box<dyn StdError>> {
        let doc = XmlDocument::parse(&wrap(
            r#"<flowable:mapException errorCode="E1" hasChildren="maybe">com.Ex</flowable:mapException>"#,
        ))?;
        let error = read_extension_block(doc.root(), "serviceTask").unwrap_err();
        assert!(matches!(error, Error::InvalidAttributeValue { .. }));
        assert!(error.to_string().contains("is not valid boolean"));
        Ok(())
    }

    #[test]
    fn map_exception_requires_error_code() -> std::result::Result<(), Box<dyn StdError>> {
        let doc = XmlDocument::parse(&wrap(r#"<flowable:mapException>com.Ex</flowable:mapException>"#))?;
        let error = read_extension_block(doc.root(), "serviceTask").unwrap_err();
        assert!(matches!(error, Error::MissingRequiredAttribute { .. }));
        assert!(error.to_string().contains("No errorCode defined"));
        Ok(())
    }

    #[test]
    fn fields_keep_declaration_order() -> std::result::Result<(), Box<dyn StdError>> {
        let doc = XmlDocument::parse(&wrap(
            r#"<flowable:field name="a" stringValue="1"/>
               <flowable:field name="b"><flowable:expression>${x}</flowable:expression></flowable:field>
               <flowable:field name="c"><flowable:string>line one
line two</flowable:string></flowable:field>"#,
        ))?;
        let block = read_extension_block(doc.root(), "serviceTask")?;
        let names: Vec<_> = block.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(block.fields[1].expression.as_deref(), Some("${x}"));
        assert_eq!(block.fields[2].string_value.as_deref(), Some("line one\nline two"));
        Ok(())
    }

    #[test]
    fn engine_children_outside_their_owner_are_captured() -> std::result::Result<(), Box<dyn StdError>> {
        let doc = XmlDocument::parse(&wrap(r#"<flowable:taskListener event="create" class="a.B"/>"#))?;
        let block = read_extension_block(doc.root(), "serviceTask")?;
        assert!(block.task_listeners.is_empty());
        assert_eq!(block.generic.get("taskListener").len(), 1);
        Ok(())
    }

    #[test]
    fn transformation_presence_is_kept() -> std::result::Result<(), Box<dyn StdError>> {
        let doc = XmlDocument::parse(&format!(
            r#"<task xmlns="{}">
                 <dataInputAssociation><sourceRef>a</sourceRef><targetRef>b</targetRef><transformation/></dataInputAssociation>
                 <dataInputAssociation><sourceRef>a</sourceRef><targetRef>b</targetRef></dataInputAssociation>
               </task>"#,
            MODEL_NS
        ))?;
        let associations: Vec<_> = doc.root().children().map(read_data_association).collect();
        assert_eq!(associations[0].transformation.as_deref(), Some(""));
        assert_eq!(associations[1].transformation, None);
        Ok(())
    }
}
