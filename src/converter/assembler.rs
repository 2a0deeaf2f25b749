//! Builds a [`BpmnModel`] from a parsed document.
//!
//! The root `definitions` element is walked once: root definitions, the
//! collaboration, processes and diagrams are read in document order. A post
//! pass then pairs pools with processes and attaches boundary events to the
//! activities they decorate.

use std::mem;

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::flow::{find_flow_element_mut, FlowElement};
use crate::model::{
    BpmnModel, DataStore, ErrorDefinition, Escalation, Import, ItemDefinition, Lane, Message, MessageFlow, Pool,
    Process, Signal,
};
use crate::xml::{split_list, Element, XmlDocument, BPMNDI_NS, MODEL_NS, XSD_NS, XSI_NS};

use super::artifact::read_artifact;
use super::common::{read_extension_block, read_generic_block};
use super::diagram::read_diagram;
use super::extension::read_subtree;
use super::registry::registry;
use super::{foreign_children, foreign_scope_children, read_documentation, read_scope};

/// Read the whole document into a model
pub fn assemble(document: &XmlDocument) -> Result<BpmnModel> {
    let root = document.root();
    let mut model = BpmnModel::new();
    read_definitions(root, &mut model)?;

    for child in root.children() {
        if child.is_model() {
            read_root_child(child, &mut model)?;
        } else if child.is(BPMNDI_NS, "BPMNDiagram") {
            if let Some(scope) = read_diagram(child)? {
                model.diagram.push_scope(scope);
            }
        } else {
            debug!(child = child.local_name(), "capturing unrecognised root child");
            model.foreign_children.push(read_subtree(child));
        }
    }

    pair_pools(&mut model);
    attach_boundary_events(&mut model);
    check_diagram_scopes(&model);
    Ok(model)
}

fn read_definitions(root: Element<'_>, model: &mut BpmnModel) -> Result<()> {
    for (prefix, uri) in root.namespace_decls() {
        if prefix.is_empty() || uri == XSI_NS || uri == XSD_NS {
            continue;
        }
        model.add_namespace(prefix.as_str(), uri.as_str());
    }
    let mut attrs = root.attribute_reader();
    model.definitions_id = attrs.plain("id");
    model.target_namespace = attrs.plain("targetNamespace");
    model.type_language = attrs.plain("typeLanguage");
    model.expression_language = attrs.plain("expressionLanguage");
    model.exporter = attrs.plain("exporter");
    model.exporter_version = attrs.plain("exporterVersion");
    model.definitions_attributes = attrs.into_extensions();
    Ok(())
}

fn owned(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Model children of the collaboration read into typed fields
const COLLABORATION_CHILDREN: [&str; 5] = ["participant", "messageFlow", "textAnnotation", "association", "group"];

fn read_root_child(element: Element<'_>, model: &mut BpmnModel) -> Result<()> {
    let mut attrs = element.attribute_reader();
    match element.local_name().to_ascii_lowercase().as_str() {
        "import" => model.imports.push(Import {
            import_type: attrs.plain("importType"),
            location: attrs.plain("location"),
            namespace: attrs.plain("namespace"),
            extension_elements: read_generic_block(element),
            foreign_children: foreign_children(element, &[]),
            extension_attributes: attrs.into_extensions(),
        }),
        "itemdefinition" => model.item_definitions.push(ItemDefinition {
            id: attrs.plain("id").unwrap_or_default(),
            structure_ref: attrs.plain("structureRef"),
            item_kind: attrs.plain("itemKind"),
            extension_elements: read_generic_block(element),
            foreign_children: foreign_children(element, &[]),
            extension_attributes: attrs.into_extensions(),
        }),
        "message" => model.messages.push(Message {
            id: attrs.plain("id").unwrap_or_default(),
            name: attrs.plain("name"),
            item_ref: attrs.plain("itemRef"),
            extension_elements: read_generic_block(element),
            foreign_children: foreign_children(element, &[]),
            extension_attributes: attrs.into_extensions(),
        }),
        "signal" => model.signals.push(Signal {
            id: attrs.plain("id").unwrap_or_default(),
            name: attrs.plain("name"),
            scope: attrs.engine("scope"),
            extension_elements: read_generic_block(element),
            foreign_children: foreign_children(element, &[]),
            extension_attributes: attrs.into_extensions(),
        }),
        "error" => model.errors.push(ErrorDefinition {
            id: attrs.plain("id").unwrap_or_default(),
            name: attrs.plain("name"),
            error_code: attrs.plain("errorCode"),
            extension_elements: read_generic_block(element),
            foreign_children: foreign_children(element, &[]),
            extension_attributes: attrs.into_extensions(),
        }),
        "escalation" => model.escalations.push(Escalation {
            id: attrs.plain("id").unwrap_or_default(),
            name: attrs.plain("name"),
            escalation_code: attrs.plain("escalationCode"),
            extension_elements: read_generic_block(element),
            foreign_children: foreign_children(element, &[]),
            extension_attributes: attrs.into_extensions(),
        }),
        "datastore" => model.data_stores.push(DataStore {
            id: attrs.plain("id").unwrap_or_default(),
            name: attrs.plain("name"),
            item_subject_ref: attrs.plain("itemSubjectRef"),
            data_state: element
                .child(MODEL_NS, "dataState")
                .and_then(|s| owned(s.attribute("name"))),
            extension_elements: read_generic_block(element),
            foreign_children: foreign_children(element, &["dataState"]),
            extension_attributes: attrs.into_extensions(),
        }),
        "collaboration" => read_collaboration(element, model)?,
        "process" => model.processes.push(read_process(element)?),
        "extensionelements" => {
            for child in element.children() {
                let captured = read_subtree(child);
                model.extension_elements.push(captured.name.clone(), captured);
            }
        }
        _ => {
            debug!(child = element.local_name(), "capturing unrecognised root child");
            model.foreign_children.push(read_subtree(element));
        }
    }
    Ok(())
}

fn read_collaboration(element: Element<'_>, model: &mut BpmnModel) -> Result<()> {
    let mut attrs = element.attribute_reader();
    model.collaboration_id = attrs.plain("id");
    model.collaboration_name = attrs.plain("name");
    model.collaboration_attributes = attrs.into_extensions();
    model.collaboration_extension_elements = read_generic_block(element);
    model.collaboration_foreign_children = foreign_children(element, &COLLABORATION_CHILDREN);
    for child in element.children().filter(Element::is_model) {
        if child.is(MODEL_NS, "participant") {
            let mut attrs = child.attribute_reader();
            model.pools.push(Pool {
                id: attrs.plain("id").unwrap_or_default(),
                name: attrs.plain("name"),
                process_ref: attrs.plain("processRef"),
                executable: true,
                extension_elements: read_generic_block(child),
                foreign_children: foreign_children(child, &[]),
                extension_attributes: attrs.into_extensions(),
            });
        } else if child.is(MODEL_NS, "messageFlow") {
            let mut attrs = child.attribute_reader();
            model.message_flows.push(MessageFlow {
                id: attrs.plain("id").unwrap_or_default(),
                name: attrs.plain("name"),
                source_ref: attrs.plain("sourceRef"),
                target_ref: attrs.plain("targetRef"),
                message_ref: attrs.plain("messageRef"),
                extension_elements: read_generic_block(child),
                foreign_children: foreign_children(child, &[]),
                extension_attributes: attrs.into_extensions(),
            });
        } else if registry().is_artifact(child.local_name()) {
            model.global_artifacts.push(read_artifact(child)?);
        }
    }
    Ok(())
}

/// Read a `process` element with its lanes and its whole scope tree
pub fn read_process(element: Element<'_>) -> Result<Process> {
    let mut attrs = element.attribute_reader();
    let mut block = read_extension_block(element, "process")?;
    let mut process = Process::new(attrs.plain("id").unwrap_or_default());
    process.name = attrs.plain("name");
    process.executable = attrs.plain_bool("isExecutable", true)?;
    process.candidate_starter_users = attrs
        .engine("candidateStarterUsers")
        .as_deref()
        .map(split_list)
        .unwrap_or_default();
    process.candidate_starter_groups = attrs
        .engine("candidateStarterGroups")
        .as_deref()
        .map(split_list)
        .unwrap_or_default();
    process.documentation = read_documentation(element);
    process.execution_listeners = mem::take(&mut block.execution_listeners);
    process.event_listeners = mem::take(&mut block.event_listeners);
    process.extension_elements = block.generic;
    process.extension_attributes = attrs.into_extensions();

    if let Some(lane_set) = element.child(MODEL_NS, "laneSet") {
        process.lane_set_id = owned(lane_set.attribute("id"));
        for lane in lane_set.children_named(MODEL_NS, "lane") {
            let mut attrs = lane.attribute_reader();
            process.lanes.push(Lane {
                id: attrs.plain("id").unwrap_or_default(),
                name: attrs.plain("name"),
                flow_references: lane
                    .children_named(MODEL_NS, "flowNodeRef")
                    .filter_map(|r| r.trimmed_text())
                    .collect(),
                extension_elements: read_generic_block(lane),
                foreign_children: foreign_children(lane, &["flowNodeRef"]),
                extension_attributes: attrs.into_extensions(),
            });
        }
    }

    let (flow_elements, artifacts) = read_scope(element)?;
    process.flow_elements = flow_elements;
    process.artifacts = artifacts;
    process.foreign_children = foreign_scope_children(element, &["laneSet"]);
    Ok(process)
}

/// Give every pool the executable flag of the process it stands for.
///
/// A `processRef` naming a declared process is authoritative; a broken one
/// pairs the pool with the process at the same position.
fn pair_pools(model: &mut BpmnModel) {
    let flags: Vec<Option<bool>> = (0..model.pools.len())
        .map(|index| {
            let pool = &model.pools[index];
            let matched = pool.process_ref.as_deref().and_then(|r| model.process(r));
            if matched.is_none() {
                warn!(
                    pool = %pool.id,
                    process_ref = pool.process_ref.as_deref().unwrap_or_default(),
                    "pool references no declared process, pairing by position"
                );
            }
            model.pool_process(index).map(|process| process.executable)
        })
        .collect();
    for (pool, executable) in model.pools.iter_mut().zip(flags) {
        if let Some(executable) = executable {
            pool.executable = executable;
        }
    }
}

fn collect_attachments(elements: &[FlowElement], attachments: &mut Vec<(String, String)>) {
    for element in elements {
        match element {
            FlowElement::BoundaryEvent(boundary) => {
                if let Some(activity) = &boundary.attached_to_ref {
                    attachments.push((activity.clone(), boundary.core.id.clone()));
                }
            }
            other => {
                if let Some(sub_process) = other.sub_process() {
                    collect_attachments(&sub_process.flow_elements, attachments);
                }
            }
        }
    }
}

/// Record each boundary event on the activity it is attached to
fn attach_boundary_events(model: &mut BpmnModel) {
    for process in &mut model.processes {
        let mut attachments = Vec::new();
        collect_attachments(&process.flow_elements, &mut attachments);
        for (activity_id, boundary_id) in attachments {
            match find_flow_element_mut(&mut process.flow_elements, &activity_id).and_then(FlowElement::activity_mut) {
                Some(activity) => activity.boundary_events.push(boundary_id),
                None => debug!(boundary = %boundary_id, activity = %activity_id, "boundary event target is not an activity"),
            }
        }
    }
}

fn check_diagram_scopes(model: &BpmnModel) {
    for scope in model.diagram.scopes() {
        let id = scope.scope_id.as_str();
        let resolved = model.collaboration_id.as_deref() == Some(id)
            || model.process(id).is_some()
            || model.flow_element(id).is_some_and(|e| e.sub_process().is_some());
        if !resolved {
            debug!(scope = id, "diagram plane decorates no known process or sub-process");
        }
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::model::flow::HasBoundaryEvents;

    fn assemble_str(xml: &str) -> std::result::Result<BpmnModel, Box<dyn Error>> {
        Ok(assemble(&XmlDocument::parse(xml)?)?)
    }

    #[test]
    fn boundary_events_are_attached_to_their_activity() -> std::result::Result<(), Box<dyn Error>> {
        let model = assemble_str(&format!(
            r#"<definitions xmlns="{}">
                 <process id="p">
                   <subProcess id="sub">
                     <userTask id="inner"/>
                     <boundaryEvent id="timer" attachedToRef="inner"/>
                   </subProcess>
                   <boundaryEvent id="error" attachedToRef="sub"/>
                 </process>
               </definitions>"#,
            MODEL_NS
        ))?;
        let process = &model.processes[0];
        assert_eq!(process.flow_element("inner").unwrap().boundary_events(), ["timer"]);
        assert_eq!(process.flow_element("sub").unwrap().boundary_events(), ["error"]);
        Ok(())
    }

    #[test]
    fn pools_take_the_flag_of_their_positional_process() -> std::result::Result<(), Box<dyn Error>> {
        let model = assemble_str(&format!(
            r#"<definitions xmlns="{}">
                 <collaboration id="c">
                   <participant id="pool1" processRef="missing1"/>
                   <participant id="pool2" processRef="missing2"/>
                 </collaboration>
                 <process id="first" isExecutable="false"><task id="t1"/></process>
                 <process id="second"><task id="t2"/><task id="t3"/><task id="t4"/></process>
               </definitions>"#,
            MODEL_NS
        ))?;
        assert!(!model.pools[0].executable);
        assert!(model.pools[1].executable);
        let main = model.main_process().ok_or("no main process")?;
        assert_eq!(main.id, "second");
        assert_eq!(main.flow_elements.len(), 3);
        Ok(())
    }

    #[test]
    fn lanes_and_root_definitions() -> std::result::Result<(), Box<dyn Error>> {
        let model = assemble_str(&format!(
            r#"<definitions xmlns="{}" xmlns:flowable="http://flowable.org/bpmn" id="defs" targetNamespace="urn:test">
                 <signal id="alert" name="Alert" flowable:scope="global"/>
                 <message id="msg" name="Msg"/>
                 <error id="err" errorCode="E42"/>
                 <process id="p">
                   <laneSet id="ls">
                     <lane id="l1" name="Sales"><flowNodeRef>a</flowNodeRef><flowNodeRef>b</flowNodeRef></lane>
                   </laneSet>
                   <task id="a"/><task id="b"/>
                 </process>
                 <custom xmlns="urn:other"/>
               </definitions>"#,
            MODEL_NS
        ))?;
        assert_eq!(model.definitions_id.as_deref(), Some("defs"));
        assert_eq!(model.signal("alert").and_then(|s| s.scope.as_deref()), Some("global"));
        assert_eq!(model.error("err").and_then(|e| e.error_code.as_deref()), Some("E42"));
        assert_eq!(model.processes[0].lanes[0].flow_references, ["a", "b"]);
        assert!(model.processes[0].foreign_children.is_empty());
        assert_eq!(model.foreign_children[0].namespace.as_deref(), Some("urn:other"));
        assert_eq!(model.namespace("flowable"), Some("http://flowable.org/bpmn"));
        Ok(())
    }
}
