//! Generic capture of XML content no converter recognises.
//!
//! An unknown subtree is copied into an [`ExtensionElement`] tree with every
//! namespace URI and prefix kept, and written back in the same shape.

use crate::error::Result;
use crate::model::extension::{ExtensionAttribute, ExtensionElement, MixedContent};
use crate::xml::writer::{Tag, XmlWriter};
use crate::xml::{Content, Element};

/// Copy `element` and everything below it into a generic tree
pub fn read_subtree(element: Element<'_>) -> ExtensionElement {
    let mut captured = ExtensionElement {
        name: element.local_name().to_string(),
        namespace: element.namespace().map(str::to_string),
        namespace_prefix: element.prefix().map(str::to_string),
        element_text: element.text(),
        ..Default::default()
    };
    for attribute in element.attributes() {
        captured.add_attribute(ExtensionAttribute {
            name: attribute.local_name.clone(),
            value: attribute.value.clone(),
            namespace: attribute.namespace.clone(),
            namespace_prefix: attribute.prefix.clone(),
        });
    }
    for child in element.children() {
        captured.add_child(read_subtree(child));
    }
    let mut seen: Vec<(&str, usize)> = Vec::new();
    for piece in element.mixed_content() {
        captured.mixed_content.push(match piece {
            Content::Text(text) => MixedContent::Text(text),
            Content::Child(child) => {
                let name = child.local_name();
                let index = match seen.iter().position(|(n, _)| *n == name) {
                    Some(slot) => {
                        seen[slot].1 += 1;
                        seen[slot].1 - 1
                    }
                    None => {
                        seen.push((name, 1));
                        0
                    }
                };
                MixedContent::Child {
                    name: name.to_string(),
                    index,
                }
            }
        });
    }
    captured
}

/// Write text and children in their recorded order, then any child the order does not mention
fn write_mixed(element: &ExtensionElement, w: &mut XmlWriter) -> Result<()> {
    let mut written: Vec<(&str, usize)> = Vec::new();
    for piece in &element.mixed_content {
        match piece {
            MixedContent::Text(text) => w.text(text)?,
            MixedContent::Child { name, index } => {
                if let Some(child) = element.child_elements.get(name).get(*index) {
                    write_subtree(child, w)?;
                    written.push((name.as_str(), *index));
                }
            }
        }
    }
    for (name, children) in element.child_elements.iter() {
        for (index, child) in children.iter().enumerate() {
            if !written.contains(&(name, index)) {
                write_subtree(child, w)?;
            }
        }
    }
    Ok(())
}

/// Emit a captured tree, re-declaring its namespace wherever the binding is not in scope
pub fn write_subtree(element: &ExtensionElement, w: &mut XmlWriter) -> Result<()> {
    let tag = Tag::qualified(
        element.namespace_prefix.as_deref(),
        element.namespace.as_deref(),
        &element.name,
    )
    .extension_attrs(&element.attributes);
    w.open(tag)?;
    if !element.mixed_content.is_empty() {
        write_mixed(element, w)?;
        return w.close();
    }
    if let Some(text) = &element.element_text {
        w.text(text)?;
    }
    for child in element.child_elements.values() {
        write_subtree(child, w)?;
    }
    w.close()
}
