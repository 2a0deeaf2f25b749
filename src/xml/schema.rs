//! A structural check run on the raw document before any model is built.
//!
//! It only looks at required structure: the root element, ids on processes and
//! flow nodes, the endpoints of sequence flows and the scope of diagram planes.

use crate::converter::registry::registry;
use crate::error::{Error, Result};

use super::{Element, XmlDocument, BPMNDI_NS, MODEL_NS};

fn violation(element: Element<'_>, message: impl Into<String>) -> Error {
    Error::SchemaViolation {
        element: element.local_name().to_string(),
        message: message.into(),
    }
}

fn require(element: Element<'_>, attribute: &str) -> Result<()> {
    match element.attribute(attribute) {
        Some(value) if !value.trim().is_empty() => Ok(()),
        _ => Err(violation(
            element,
            format!("missing attribute '{}' at byte {}", attribute, element.position()),
        )),
    }
}

/// Check the scope body of a process or sub-process, recursing into nested scopes
fn check_scope(scope: Element<'_>) -> Result<()> {
    for child in scope.children().filter(Element::is_model) {
        if registry().converter(child.local_name()).is_none() {
            continue;
        }
        require(child, "id")?;
        if child.is(MODEL_NS, "sequenceFlow") {
            require(child, "sourceRef")?;
            require(child, "targetRef")?;
        }
        check_scope(child)?;
    }
    Ok(())
}

pub fn check(document: &XmlDocument) -> Result<()> {
    let root = document.root();
    if !root.is(MODEL_NS, "definitions") {
        return Err(violation(root, "root element must be 'definitions' in the model namespace"));
    }
    for child in root.children() {
        if child.is(MODEL_NS, "process") {
            require(child, "id")?;
            check_scope(child)?;
        } else if child.is(BPMNDI_NS, "BPMNDiagram") {
            for plane in child.children_named(BPMNDI_NS, "BPMNPlane") {
                require(plane, "bpmnElement")?;
            }
        }
    }
    Ok(())
}
