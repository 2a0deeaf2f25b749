//! Converters between XML elements and the typed process model.
//!
//! Every flow element kind has one [`ElementConverter`]. A converter reads only
//! its own element: attributes, `extensionElements` and direct structural
//! children. Nested flow elements go back through the [registry](registry::registry),
//! and anything unrecognised goes to [extension capture](extension).

pub mod artifact;
pub mod assembler;
pub mod common;
pub mod data;
pub mod diagram;
pub mod event;
pub mod extension;
pub mod flow;
pub mod gateway;
pub mod registry;
pub mod serializer;
pub mod service;
pub mod subprocess;
pub mod task;

use std::mem;

use tracing::debug;

use crate::error::Result;
use crate::model::artifact::Artifact;
use crate::model::common::Listener;
use crate::model::extension::{ExtensionElement, ExtensionMap};
use crate::model::flow::{ActivityCore, FlowCore, FlowElement};
use crate::xml::writer::{Tag, XmlWriter};
use crate::xml::{AttributeReader, Element, ENGINE_NS, MODEL_NS};

use common::ExtensionBlock;
use extension::{read_subtree, write_subtree};
use registry::registry;

/// Reads one kind of flow element and writes it back
pub trait ElementConverter: Send + Sync {
    /// Canonical local name of the element, as written
    fn element_name(&self) -> &'static str;

    /// Build the typed element from its XML subtree
    fn read(&self, element: Element<'_>) -> Result<FlowElement>;

    /// Emit `node`; variants this converter does not own are ignored
    fn write(&self, node: &FlowElement, w: &mut XmlWriter) -> Result<()>;
}

/// Model children every converter handles itself
const CORE_CHILDREN: [&str; 2] = ["documentation", "extensionElements"];

/// Activity children read by [`NodeReader::activity`]
pub const ACTIVITY_CHILDREN: [&str; 3] = [
    "multiInstanceLoopCharacteristics",
    "dataInputAssociation",
    "dataOutputAssociation",
];

/// Shared reading state for one element: attribute bookkeeping and the
/// decoded `extensionElements` block
pub struct NodeReader<'a> {
    pub element: Element<'a>,
    pub attrs: AttributeReader<'a>,
    pub block: ExtensionBlock,
}

impl<'a> NodeReader<'a> {
    pub fn new(element: Element<'a>) -> Result<Self> {
        Self::for_owner(element, element.local_name())
    }

    /// Read with the extension block resolved for `owner` instead of the element's own name
    pub fn for_owner(element: Element<'a>, owner: &str) -> Result<Self> {
        Ok(NodeReader {
            element,
            attrs: element.attribute_reader(),
            block: common::read_extension_block(element, owner)?,
        })
    }

    /// Id, name, documentation and execution listeners
    pub fn core(&mut self) -> FlowCore {
        FlowCore {
            id: self.attrs.plain("id").unwrap_or_default(),
            name: self.attrs.plain("name"),
            documentation: read_documentation(self.element),
            execution_listeners: mem::take(&mut self.block.execution_listeners),
            ..Default::default()
        }
    }

    /// Attributes and children every activity shares
    pub fn activity(&mut self) -> Result<ActivityCore> {
        let element = self.element;
        let attrs = &mut self.attrs;
        let multi_instance = match element.child(MODEL_NS, "multiInstanceLoopCharacteristics") {
            Some(child) => Some(common::read_multi_instance(child)?),
            None => None,
        };
        Ok(ActivityCore {
            default_flow: attrs.plain("default"),
            asynchronous: attrs.engine_bool("async", false)?,
            exclusive: attrs.engine_bool("exclusive", true)?,
            for_compensation: attrs.plain_bool("isForCompensation", false)?,
            skip_expression: attrs.engine("skipExpression"),
            multi_instance,
            data_input_associations: element
                .children_named(MODEL_NS, "dataInputAssociation")
                .map(common::read_data_association)
                .collect(),
            data_output_associations: element
                .children_named(MODEL_NS, "dataOutputAssociation")
                .map(common::read_data_association)
                .collect(),
            boundary_events: Vec::new(),
        })
    }

    /// Hand the leftovers to `core`: unconsumed attributes, generic extension
    /// elements, and direct children not named in `known`
    pub fn finish(self, core: &mut FlowCore, known: &[&str]) {
        core.foreign_children = foreign_children(self.element, known);
        core.extension_attributes = self.attrs.into_extensions();
        core.extension_elements = self.block.generic;
    }

    /// [`Self::finish`] for elements whose body is a scope of flow elements
    pub fn finish_scope(self, core: &mut FlowCore, known: &[&str]) {
        core.foreign_children = foreign_scope_children(self.element, known);
        core.extension_attributes = self.attrs.into_extensions();
        core.extension_elements = self.block.generic;
    }
}

pub fn read_documentation(element: Element<'_>) -> Option<String> {
    element
        .child(MODEL_NS, "documentation")
        .and_then(|d| d.text())
}

/// Direct children that nothing reads, captured generically
pub fn foreign_children(element: Element<'_>, known: &[&str]) -> Vec<ExtensionElement> {
    collect_foreign(element, |name| known.iter().any(|k| k.eq_ignore_ascii_case(name)))
}

/// Like [`foreign_children`], also treating flow elements and artifacts as recognised
pub fn foreign_scope_children(element: Element<'_>, known: &[&str]) -> Vec<ExtensionElement> {
    collect_foreign(element, |name| {
        is_scope_child(name) || known.iter().any(|k| k.eq_ignore_ascii_case(name))
    })
}

fn collect_foreign(element: Element<'_>, known: impl Fn(&str) -> bool) -> Vec<ExtensionElement> {
    element
        .children()
        .filter(|child| {
            let name = child.local_name();
            let recognised = child.is_model()
                && (CORE_CHILDREN.iter().any(|c| c.eq_ignore_ascii_case(name)) || known(name));
            !recognised
        })
        .map(|child| {
            debug!(
                element = element.local_name(),
                child = child.local_name(),
                "capturing unrecognised child"
            );
            read_subtree(child)
        })
        .collect()
}

/// Read the flow elements and artifacts making up a process or sub-process body.
///
/// Children that are neither are left for [`foreign_children`].
pub fn read_scope(element: Element<'_>) -> Result<(Vec<FlowElement>, Vec<Artifact>)> {
    let mut flow_elements = Vec::new();
    let mut artifacts = Vec::new();
    for child in element.children().filter(Element::is_model) {
        if let Some(converter) = registry().converter(child.local_name()) {
            flow_elements.push(converter.read(child)?);
        } else if registry().is_artifact(child.local_name()) {
            artifacts.push(artifact::read_artifact(child)?);
        }
    }
    Ok((flow_elements, artifacts))
}

/// Whether `child` is read by [`read_scope`]
pub fn is_scope_child(local_name: &str) -> bool {
    registry().converter(local_name).is_some() || registry().is_artifact(local_name)
}

pub fn write_scope(flow_elements: &[FlowElement], artifacts: &[Artifact], w: &mut XmlWriter) -> Result<()> {
    for element in flow_elements {
        if let Some(converter) = registry().converter_for(element) {
            converter.write(element, w)?;
        }
    }
    for item in artifacts {
        artifact::write_artifact(item, w)?;
    }
    Ok(())
}

/// Start tag with id and name; callers append their own attributes before
/// [`Tag::extension_attrs`]
pub fn core_tag(name: &str, core: &FlowCore) -> Tag {
    Tag::new(name).attr("id", &core.id).opt_attr("name", core.name.as_ref())
}

pub fn engine_attr(tag: Tag, name: &str, value: Option<impl AsRef<str>>) -> Tag {
    tag.opt_ns_attr(crate::xml::ENGINE_PREFIX, ENGINE_NS, name, value)
}

/// Engine boolean attribute, written only when it differs from `default`
pub fn engine_flag(tag: Tag, name: &str, value: bool, default: bool) -> Tag {
    if value == default {
        tag
    } else {
        engine_attr(tag, name, Some(value.to_string()))
    }
}

pub fn activity_attrs(tag: Tag, activity: &ActivityCore) -> Tag {
    let tag = tag.opt_attr("default", activity.default_flow.as_ref());
    let tag = engine_flag(tag, "async", activity.asynchronous, false);
    let tag = engine_flag(tag, "exclusive", activity.exclusive, true);
    let tag = if activity.for_compensation {
        tag.attr("isForCompensation", "true")
    } else {
        tag
    };
    engine_attr(tag, "skipExpression", activity.skip_expression.as_ref())
}

pub fn write_documentation(documentation: Option<&str>, w: &mut XmlWriter) -> Result<()> {
    match documentation {
        Some(text) => w.text_element(Tag::new("documentation"), text),
        None => Ok(()),
    }
}

/// Write the `extensionElements` block: execution listeners, the typed
/// engine children written by `typed`, then captured extensions.
///
/// `has_typed` says whether `typed` will write anything; the block is
/// omitted entirely when it would be empty.
pub fn write_extension_block<F>(
    listeners: &[Listener],
    generic: &ExtensionMap,
    has_typed: bool,
    typed: F,
    w: &mut XmlWriter,
) -> Result<()>
where
    F: FnOnce(&mut XmlWriter) -> Result<()>,
{
    if listeners.is_empty() && generic.is_empty() && !has_typed {
        return Ok(());
    }
    w.open(Tag::new("extensionElements"))?;
    for listener in listeners {
        common::write_listener("executionListener", listener, w)?;
    }
    typed(w)?;
    for element in generic.values() {
        write_subtree(element, w)?;
    }
    w.close()
}

/// Write documentation and an extension block holding only listeners and captured content
pub fn write_core_children(core: &FlowCore, w: &mut XmlWriter) -> Result<()> {
    write_documentation(core.documentation.as_deref(), w)?;
    write_extension_block(&core.execution_listeners, &core.extension_elements, false, |_| Ok(()), w)
}

pub fn write_activity_children(activity: &ActivityCore, w: &mut XmlWriter) -> Result<()> {
    for association in &activity.data_input_associations {
        common::write_data_association("dataInputAssociation", association, w)?;
    }
    for association in &activity.data_output_associations {
        common::write_data_association("dataOutputAssociation", association, w)?;
    }
    if let Some(multi_instance) = &activity.multi_instance {
        common::write_multi_instance(multi_instance, w)?;
    }
    Ok(())
}

pub fn write_foreign_children(core: &FlowCore, w: &mut XmlWriter) -> Result<()> {
    for child in &core.foreign_children {
        write_subtree(child, w)?;
    }
    Ok(())
}
