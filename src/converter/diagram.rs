//! Reading and writing the diagram interchange overlay.
//!
//! Each `BPMNDiagram` holds one plane, and the plane's `bpmnElement` names the
//! scope its shapes and edges belong to. Geometry is kept per scope so that ids
//! recurring in two diagrams stay apart.

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::diagram::{DiDetails, DiagramScope, GraphicInfo};
use crate::model::extension::ExtensionElement;
use crate::xml::writer::{Tag, XmlWriter};
use crate::xml::{
    parse_bool, AttributeReader, Element, BPMNDI_NS, BPMNDI_PREFIX, ENGINE_NS, OMGDC_NS, OMGDC_PREFIX, OMGDI_NS,
    OMGDI_PREFIX,
};

use super::engine_attr;
use super::extension::{read_subtree, write_subtree};

fn number(element: Element<'_>, name: &str) -> Result<f64> {
    match element.attribute(name).map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .map_err(|_| Error::invalid_value(element.local_name(), name, value, "number")),
        None => Ok(0.0),
    }
}

fn optional_bool(element: Element<'_>, attrs: &mut AttributeReader<'_>, name: &str) -> Result<Option<bool>> {
    attrs
        .plain(name)
        .map(|value| parse_bool(element.local_name(), name, &value))
        .transpose()
}

/// Children of `element` other than `(namespace, name)` pairs in `known`
fn foreign_di_children(element: Element<'_>, known: &[(&str, &str)]) -> Vec<ExtensionElement> {
    element
        .children()
        .filter(|child| !known.iter().any(|(ns, name)| child.is(ns, name)))
        .map(read_subtree)
        .collect()
}

/// Leftovers of a shape or edge; an id matching the generated one is not kept
fn read_details(
    element: Element<'_>,
    mut attrs: AttributeReader<'_>,
    generated_id: String,
    known: &[(&str, &str)],
) -> DiDetails {
    DiDetails {
        di_id: attrs.plain("id").filter(|id| *id != generated_id),
        foreign_children: foreign_di_children(element, known),
        extension_attributes: attrs.into_extensions(),
    }
}

fn read_bounds(element: Element<'_>) -> Result<GraphicInfo> {
    match element.child(OMGDC_NS, "Bounds") {
        Some(bounds) => Ok(GraphicInfo::new(
            number(bounds, "x")?,
            number(bounds, "y")?,
            number(bounds, "width")?,
            number(bounds, "height")?,
        )),
        None => Ok(GraphicInfo::default()),
    }
}

fn read_label(element: Element<'_>) -> Result<Option<GraphicInfo>> {
    let Some(label) = element.child(BPMNDI_NS, "BPMNLabel") else {
        return Ok(None);
    };
    let mut info = read_bounds(label)?;
    if let Some(rotation) = label.attribute_ns(ENGINE_NS, "rotation") {
        info.rotation = rotation
            .trim()
            .parse()
            .map_err(|_| Error::invalid_value("BPMNLabel", "rotation", rotation, "number"))?;
    }
    Ok(Some(info))
}

/// Read one `BPMNDiagram` into the geometry of the scope its plane decorates.
///
/// Returns `None` for a diagram without a plane.
pub fn read_diagram(diagram: Element<'_>) -> Result<Option<DiagramScope>> {
    let Some(plane) = diagram.child(BPMNDI_NS, "BPMNPlane") else {
        debug!(diagram = diagram.attribute("id"), "diagram has no plane");
        return Ok(None);
    };
    let mut diagram_attrs = diagram.attribute_reader();
    let mut plane_attrs = plane.attribute_reader();
    let mut scope = DiagramScope::new(plane_attrs.plain("bpmnElement").unwrap_or_default());
    scope.diagram_id = diagram_attrs.plain("id");
    scope.plane_id = plane_attrs.plain("id");
    scope.diagram_attributes = diagram_attrs.into_extensions();
    scope.plane_attributes = plane_attrs.into_extensions();

    for child in plane.children() {
        let mut attrs = child.attribute_reader();
        let Some(element_id) = attrs.plain("bpmnElement") else {
            scope.foreign_children.push(read_subtree(child));
            continue;
        };
        let element_id = element_id.as_str();
        if child.is(BPMNDI_NS, "BPMNShape") {
            let mut info = read_bounds(child)?;
            info.expanded = optional_bool(child, &mut attrs, "isExpanded")?;
            info.horizontal = optional_bool(child, &mut attrs, "isHorizontal")?;
            scope.add_shape(element_id, info);
            let known = [(OMGDC_NS, "Bounds"), (BPMNDI_NS, "BPMNLabel")];
            let details = read_details(child, attrs, format!("BPMNShape_{}", element_id), &known);
            if !details.is_empty() {
                scope.shape_details.insert(element_id, details);
            }
        } else if child.is(BPMNDI_NS, "BPMNEdge") {
            let waypoints = child
                .children_named(OMGDI_NS, "waypoint")
                .map(|point| -> Result<GraphicInfo> {
                    Ok(GraphicInfo::point(number(point, "x")?, number(point, "y")?))
                })
                .collect::<Result<Vec<_>>>()?;
            scope.add_edge(element_id, waypoints);
            let known = [(OMGDI_NS, "waypoint"), (BPMNDI_NS, "BPMNLabel")];
            let details = read_details(child, attrs, format!("BPMNEdge_{}", element_id), &known);
            if !details.is_empty() {
                scope.edge_details.insert(element_id, details);
            }
        } else {
            scope.foreign_children.push(read_subtree(child));
            continue;
        }
        if let Some(label) = read_label(child)? {
            scope.add_label(element_id, label);
        }
    }
    Ok(Some(scope))
}

/// Coordinates keep a fractional part, `100.0` rather than `100`
fn format_number(value: f64) -> String {
    format!("{:?}", value)
}

fn bounds_tag(info: &GraphicInfo) -> Tag {
    Tag::prefixed(OMGDC_PREFIX, OMGDC_NS, "Bounds")
        .attr("height", format_number(info.height))
        .attr("width", format_number(info.width))
        .attr("x", format_number(info.x))
        .attr("y", format_number(info.y))
}

fn di_tag(name: &str) -> Tag {
    Tag::prefixed(BPMNDI_PREFIX, BPMNDI_NS, name)
}

fn write_label(info: Option<&GraphicInfo>, w: &mut XmlWriter) -> Result<()> {
    let Some(info) = info else {
        return Ok(());
    };
    let rotation = (info.rotation != 0.0).then(|| format_number(info.rotation));
    w.open(engine_attr(di_tag("BPMNLabel"), "rotation", rotation))?;
    w.empty(bounds_tag(info))?;
    w.close()
}

fn write_foreign(children: &[ExtensionElement], w: &mut XmlWriter) -> Result<()> {
    for child in children {
        write_subtree(child, w)?;
    }
    Ok(())
}

/// Write one scope as a `BPMNDiagram` with a single plane
pub fn write_diagram(scope: &DiagramScope, w: &mut XmlWriter) -> Result<()> {
    w.open(
        di_tag("BPMNDiagram")
            .opt_attr("id", scope.diagram_id.as_ref())
            .extension_attrs(&scope.diagram_attributes),
    )?;
    w.open(
        di_tag("BPMNPlane")
            .attr("bpmnElement", &scope.scope_id)
            .opt_attr("id", scope.plane_id.as_ref())
            .extension_attrs(&scope.plane_attributes),
    )?;
    let no_details = DiDetails::default();
    for (id, info) in scope.shapes.iter() {
        let details = scope.shape_details.get(id).unwrap_or(&no_details);
        let di_id = details.di_id.clone().unwrap_or_else(|| format!("BPMNShape_{}", id));
        let tag = di_tag("BPMNShape")
            .attr("bpmnElement", id)
            .attr("id", di_id)
            .opt_attr("isExpanded", info.expanded.map(|b| b.to_string()))
            .opt_attr("isHorizontal", info.horizontal.map(|b| b.to_string()));
        w.open(tag.extension_attrs(&details.extension_attributes))?;
        w.empty(bounds_tag(info))?;
        write_label(scope.labels.get(id), w)?;
        write_foreign(&details.foreign_children, w)?;
        w.close()?;
    }
    for (id, waypoints) in scope.edges.iter() {
        let details = scope.edge_details.get(id).unwrap_or(&no_details);
        let di_id = details.di_id.clone().unwrap_or_else(|| format!("BPMNEdge_{}", id));
        w.open(
            di_tag("BPMNEdge")
                .attr("bpmnElement", id)
                .attr("id", di_id)
                .extension_attrs(&details.extension_attributes),
        )?;
        for point in waypoints {
            w.empty(
                Tag::prefixed(OMGDI_PREFIX, OMGDI_NS, "waypoint")
                    .attr("x", format_number(point.x))
                    .attr("y", format_number(point.y)),
            )?;
        }
        write_label(scope.labels.get(id), w)?;
        write_foreign(&details.foreign_children, w)?;
        w.close()?;
    }
    write_foreign(&scope.foreign_children, w)?;
    w.close()?;
    w.close()
}

#[cfg(test)]
mod test {
    use std::error::Error as StdError;

    use super::*;
    use crate::xml::XmlDocument;

    const DIAGRAM: &str = r#"<bpmndi:BPMNDiagram xmlns:bpmndi="http://www.omg.org/spec/BPMN/20100524/DI"
            xmlns:omgdc="http://www.omg.org/spec/DD/20100524/DC"
            xmlns:omgdi="http://www.omg.org/spec/DD/20100524/DI"
            xmlns:flowable="http://flowable.org/bpmn" id="BPMNDiagram_process">
        <bpmndi:BPMNPlane bpmnElement="process" id="BPMNPlane_process">
            <bpmndi:BPMNShape bpmnElement="sub" id="BPMNShape_sub" isExpanded="false">
                <omgdc:Bounds height="80" width="100.5" x="10" y="20"/>
            </bpmndi:BPMNShape>
            <bpmndi:BPMNEdge bpmnElement="flow" id="BPMNEdge_flow">
                <omgdi:waypoint x="1" y="2"/>
                <omgdi:waypoint x="3" y="4"/>
                <omgdi:waypoint x="5" y="6"/>
                <bpmndi:BPMNLabel flowable:rotation="90"><omgdc:Bounds height="10" width="20" x="3" y="4"/></bpmndi:BPMNLabel>
            </bpmndi:BPMNEdge>
        </bpmndi:BPMNPlane>
    </bpmndi:BPMNDiagram>"#;

    #[test]
    fn shapes_edges_and_labels() -> std::result::Result<(), Box<dyn StdError>> {
        let doc = XmlDocument::parse(DIAGRAM)?;
        let scope = read_diagram(doc.root())?.ok_or("no plane")?;
        assert_eq!(scope.scope_id, "process");

        let shape = scope.shapes.get("sub").ok_or("no shape")?;
        assert_eq!(shape.width, 100.5);
        assert_eq!(shape.expanded, Some(false));

        let waypoints = scope.edges.get("flow").ok_or("no edge")?;
        assert_eq!(waypoints.len(), 3);
        assert_eq!(waypoints[2], GraphicInfo::point(5.0, 6.0));
        assert_eq!(scope.labels.get("flow").map(|l| l.rotation), Some(90.0));
        Ok(())
    }

    #[test]
    fn written_scope_reads_back_equal() -> std::result::Result<(), Box<dyn StdError>> {
        let doc = XmlDocument::parse(DIAGRAM)?;
        let scope = read_diagram(doc.root())?.ok_or("no plane")?;

        let mut writer = XmlWriter::new(2);
        write_diagram(&scope, &mut writer)?;
        let xml = String::from_utf8(writer.into_inner()?)?;
        assert!(xml.contains(r#"height="80.0""#), "{}", xml);

        let reparsed = XmlDocument::parse(&xml)?;
        assert_eq!(read_diagram(reparsed.root())?, Some(scope));
        Ok(())
    }

    #[test]
    fn original_ids_and_custom_di_content_survive() -> std::result::Result<(), Box<dyn StdError>> {
        let source = DIAGRAM
            .replace(r#"id="BPMNShape_sub""#, r#"id="shape-7" xmlns:c="urn:c" c:color="red""#)
            .replace(
                r#"<omgdi:waypoint x="5" y="6"/>"#,
                r#"<omgdi:waypoint x="5" y="6"/><c:style xmlns:c="urn:c">dashed</c:style>"#,
            );
        let doc = XmlDocument::parse(&source)?;
        let scope = read_diagram(doc.root())?.ok_or("no plane")?;
        let shape = scope.shape_details.get("sub").ok_or("no shape details")?;
        assert_eq!(shape.di_id.as_deref(), Some("shape-7"));
        assert_eq!(shape.extension_attributes.first("color").map(|a| a.value.as_str()), Some("red"));
        assert!(scope.edge_details.get("flow").ok_or("no edge details")?.di_id.is_none());

        let mut writer = XmlWriter::new(2);
        write_diagram(&scope, &mut writer)?;
        let xml = String::from_utf8(writer.into_inner()?)?;
        assert!(xml.contains(r#"id="shape-7""#), "{}", xml);
        assert!(xml.contains(r#"id="BPMNEdge_flow""#), "{}", xml);
        assert!(xml.contains(r#"c:color="red""#), "{}", xml);

        let reparsed = XmlDocument::parse(&xml)?;
        assert_eq!(read_diagram(reparsed.root())?, Some(scope));
        Ok(())
    }

    #[test]
    fn bad_coordinates_are_rejected() -> std::result::Result<(), Box<dyn StdError>> {
        let doc = XmlDocument::parse(&DIAGRAM.replace(r#"x="10""#, r#"x="ten""#))?;
        let error = read_diagram(doc.root()).unwrap_err();
        assert!(error.to_string().contains("'ten' is not valid number"));
        Ok(())
    }
}
