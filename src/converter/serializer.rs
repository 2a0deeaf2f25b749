//! Writes a [`BpmnModel`] back to a document.
//!
//! Emission order is fixed: root definitions, the collaboration, processes,
//! then one diagram per geometry scope. Re-writing an unmodified model gives
//! the same bytes every time.

use crate::error::Result;
use crate::model::extension::{ExtensionElement, ExtensionMap};
use crate::model::{BpmnModel, Lane, Process};
use crate::xml::writer::{Tag, XmlWriter};
use crate::xml::{MODEL_NS, STANDARD_NAMESPACES};

use super::artifact::write_artifact;
use super::common::{write_event_listener, write_generic_block, write_listener};
use super::diagram::write_diagram;
use super::extension::write_subtree;
use super::{engine_attr, write_documentation, write_scope};

/// Target namespace written when the model has none
pub const DEFAULT_TARGET_NAMESPACE: &str = "http://www.flowable.org/processdef";

fn root_tag(model: &BpmnModel) -> Tag {
    let mut tag = Tag::new("definitions").declare("", MODEL_NS);
    for (prefix, uri) in STANDARD_NAMESPACES {
        tag = tag.declare(prefix, uri);
    }
    for namespace in &model.namespaces {
        let standard = STANDARD_NAMESPACES.iter().any(|(prefix, _)| *prefix == namespace.prefix);
        if !standard {
            tag = tag.declare(&namespace.prefix, &namespace.uri);
        }
    }
    tag.opt_attr("id", model.definitions_id.as_ref())
        .opt_attr("typeLanguage", model.type_language.as_ref())
        .opt_attr("expressionLanguage", model.expression_language.as_ref())
        .attr(
            "targetNamespace",
            model.target_namespace.as_deref().unwrap_or(DEFAULT_TARGET_NAMESPACE),
        )
        .opt_attr("exporter", model.exporter.as_ref())
        .opt_attr("exporterVersion", model.exporter_version.as_ref())
        .extension_attrs(&model.definitions_attributes)
}

/// Write the captured extension block, the typed children written by `body`,
/// then unrecognised children, and close the element
fn finish_element<F>(elements: &ExtensionMap, foreign: &[ExtensionElement], body: F, w: &mut XmlWriter) -> Result<()>
where
    F: FnOnce(&mut XmlWriter) -> Result<()>,
{
    write_generic_block(elements, w)?;
    body(w)?;
    for child in foreign {
        write_subtree(child, w)?;
    }
    w.close()
}

fn write_root_definitions(model: &BpmnModel, w: &mut XmlWriter) -> Result<()> {
    for import in &model.imports {
        w.open(
            Tag::new("import")
                .opt_attr("importType", import.import_type.as_ref())
                .opt_attr("location", import.location.as_ref())
                .opt_attr("namespace", import.namespace.as_ref())
                .extension_attrs(&import.extension_attributes),
        )?;
        finish_element(&import.extension_elements, &import.foreign_children, |_| Ok(()), w)?;
    }
    for item in &model.item_definitions {
        w.open(
            Tag::new("itemDefinition")
                .attr("id", &item.id)
                .opt_attr("structureRef", item.structure_ref.as_ref())
                .opt_attr("itemKind", item.item_kind.as_ref())
                .extension_attrs(&item.extension_attributes),
        )?;
        finish_element(&item.extension_elements, &item.foreign_children, |_| Ok(()), w)?;
    }
    for signal in &model.signals {
        let tag = Tag::new("signal")
            .attr("id", &signal.id)
            .opt_attr("name", signal.name.as_ref());
        w.open(engine_attr(tag, "scope", signal.scope.as_ref()).extension_attrs(&signal.extension_attributes))?;
        finish_element(&signal.extension_elements, &signal.foreign_children, |_| Ok(()), w)?;
    }
    for message in &model.messages {
        w.open(
            Tag::new("message")
                .attr("id", &message.id)
                .opt_attr("name", message.name.as_ref())
                .opt_attr("itemRef", message.item_ref.as_ref())
                .extension_attrs(&message.extension_attributes),
        )?;
        finish_element(&message.extension_elements, &message.foreign_children, |_| Ok(()), w)?;
    }
    for error in &model.errors {
        w.open(
            Tag::new("error")
                .attr("id", &error.id)
                .opt_attr("name", error.name.as_ref())
                .opt_attr("errorCode", error.error_code.as_ref())
                .extension_attrs(&error.extension_attributes),
        )?;
        finish_element(&error.extension_elements, &error.foreign_children, |_| Ok(()), w)?;
    }
    for escalation in &model.escalations {
        w.open(
            Tag::new("escalation")
                .attr("id", &escalation.id)
                .opt_attr("name", escalation.name.as_ref())
                .opt_attr("escalationCode", escalation.escalation_code.as_ref())
                .extension_attrs(&escalation.extension_attributes),
        )?;
        finish_element(&escalation.extension_elements, &escalation.foreign_children, |_| Ok(()), w)?;
    }
    for store in &model.data_stores {
        w.open(
            Tag::new("dataStore")
                .attr("id", &store.id)
                .opt_attr("name", store.name.as_ref())
                .opt_attr("itemSubjectRef", store.item_subject_ref.as_ref())
                .extension_attrs(&store.extension_attributes),
        )?;
        finish_element(
            &store.extension_elements,
            &store.foreign_children,
            |w| match &store.data_state {
                Some(state) => w.empty(Tag::new("dataState").attr("name", state)),
                None => Ok(()),
            },
            w,
        )?;
    }
    write_generic_block(&model.extension_elements, w)?;
    for child in &model.foreign_children {
        write_subtree(child, w)?;
    }
    Ok(())
}

fn write_collaboration(model: &BpmnModel, w: &mut XmlWriter) -> Result<()> {
    let present = model.collaboration_id.is_some()
        || !model.pools.is_empty()
        || !model.message_flows.is_empty()
        || !model.global_artifacts.is_empty();
    if !present {
        return Ok(());
    }
    let id = model.collaboration_id.as_deref().unwrap_or("Collaboration");
    w.open(
        Tag::new("collaboration")
            .attr("id", id)
            .opt_attr("name", model.collaboration_name.as_ref())
            .extension_attrs(&model.collaboration_attributes),
    )?;
    finish_element(
        &model.collaboration_extension_elements,
        &model.collaboration_foreign_children,
        |w| {
            for pool in &model.pools {
                w.open(
                    Tag::new("participant")
                        .attr("id", &pool.id)
                        .opt_attr("name", pool.name.as_ref())
                        .opt_attr("processRef", pool.process_ref.as_ref())
                        .extension_attrs(&pool.extension_attributes),
                )?;
                finish_element(&pool.extension_elements, &pool.foreign_children, |_| Ok(()), w)?;
            }
            for flow in &model.message_flows {
                w.open(
                    Tag::new("messageFlow")
                        .attr("id", &flow.id)
                        .opt_attr("name", flow.name.as_ref())
                        .opt_attr("sourceRef", flow.source_ref.as_ref())
                        .opt_attr("targetRef", flow.target_ref.as_ref())
                        .opt_attr("messageRef", flow.message_ref.as_ref())
                        .extension_attrs(&flow.extension_attributes),
                )?;
                finish_element(&flow.extension_elements, &flow.foreign_children, |_| Ok(()), w)?;
            }
            for artifact in &model.global_artifacts {
                write_artifact(artifact, w)?;
            }
            Ok(())
        },
        w,
    )
}

fn write_lane(lane: &Lane, w: &mut XmlWriter) -> Result<()> {
    w.open(
        Tag::new("lane")
            .attr("id", &lane.id)
            .opt_attr("name", lane.name.as_ref())
            .extension_attrs(&lane.extension_attributes),
    )?;
    finish_element(
        &lane.extension_elements,
        &lane.foreign_children,
        |w| {
            for reference in &lane.flow_references {
                w.text_element(Tag::new("flowNodeRef"), reference)?;
            }
            Ok(())
        },
        w,
    )
}

/// Write one process with its lanes and whole scope tree
pub fn write_process(process: &Process, w: &mut XmlWriter) -> Result<()> {
    let tag = Tag::new("process")
        .attr("id", &process.id)
        .opt_attr("name", process.name.as_ref())
        .attr("isExecutable", process.executable.to_string());
    let users = (!process.candidate_starter_users.is_empty()).then(|| process.candidate_starter_users.join(","));
    let groups = (!process.candidate_starter_groups.is_empty()).then(|| process.candidate_starter_groups.join(","));
    let tag = engine_attr(tag, "candidateStarterUsers", users);
    let tag = engine_attr(tag, "candidateStarterGroups", groups);
    w.open(tag.extension_attrs(&process.extension_attributes))?;
    write_documentation(process.documentation.as_deref(), w)?;

    let has_extensions = !process.execution_listeners.is_empty()
        || !process.event_listeners.is_empty()
        || !process.extension_elements.is_empty();
    if has_extensions {
        w.open(Tag::new("extensionElements"))?;
        for listener in &process.execution_listeners {
            write_listener("executionListener", listener, w)?;
        }
        for listener in &process.event_listeners {
            write_event_listener(listener, w)?;
        }
        for element in process.extension_elements.values() {
            write_subtree(element, w)?;
        }
        w.close()?;
    }

    if !process.lanes.is_empty() {
        let id = process
            .lane_set_id
            .clone()
            .unwrap_or_else(|| format!("laneSet_{}", process.id));
        w.open(Tag::new("laneSet").attr("id", id))?;
        for lane in &process.lanes {
            write_lane(lane, w)?;
        }
        w.close()?;
    }

    write_scope(&process.flow_elements, &process.artifacts, w)?;
    for child in &process.foreign_children {
        write_subtree(child, w)?;
    }
    w.close()
}

/// Write the whole model as a `definitions` document body
pub fn write_model(model: &BpmnModel, w: &mut XmlWriter) -> Result<()> {
    w.open(root_tag(model))?;
    write_root_definitions(model, w)?;
    write_collaboration(model, w)?;
    for process in &model.processes {
        write_process(process, w)?;
    }
    for scope in model.diagram.scopes() {
        write_diagram(scope, w)?;
    }
    w.close()
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::converter::assembler::assemble;
    use crate::model::diagram::{DiagramScope, GraphicInfo};
    use crate::model::flow::{FlowCore, FlowElement, SequenceFlow, Task};
    use crate::xml::{XmlDocument, ENGINE_NS};

    fn render(model: &BpmnModel) -> std::result::Result<String, Box<dyn Error>> {
        let mut writer = XmlWriter::new(2);
        write_model(model, &mut writer)?;
        Ok(String::from_utf8(writer.into_inner()?)?)
    }

    fn sample() -> BpmnModel {
        let mut model = BpmnModel::new();
        let mut process = Process::new("order");
        process.name = Some("Order – handling".into());
        process.candidate_starter_groups = vec!["sales".into(), "management".into()];
        process.add_flow_element(FlowElement::Task(Task::new(FlowCore::named("check", "Check – stock"))));
        process.add_flow_element(FlowElement::Task(Task::new(FlowCore::new("ship"))));
        process.add_flow_element(FlowElement::SequenceFlow(SequenceFlow::new("flow", "check", "ship")));
        model.processes.push(process);

        let mut scope = DiagramScope::new("order");
        scope.add_shape("check", GraphicInfo::new(10.0, 10.0, 100.0, 80.0));
        scope.add_edge("flow", vec![GraphicInfo::point(110.0, 50.0), GraphicInfo::point(200.0, 50.0)]);
        model.diagram.push_scope(scope);
        model
    }

    #[test]
    fn hand_built_model_reads_back_equal() -> std::result::Result<(), Box<dyn Error>> {
        let model = sample();
        let xml = render(&model)?;
        assert!(xml.contains(r#"flowable:candidateStarterGroups="sales,management""#), "{}", xml);

        let parsed = assemble(&XmlDocument::parse(&xml)?)?;
        assert_eq!(parsed.processes, model.processes);
        assert_eq!(parsed.diagram, model.diagram);
        Ok(())
    }

    #[test]
    fn rewriting_is_stable() -> std::result::Result<(), Box<dyn Error>> {
        let first = render(&sample())?;
        let second = render(&assemble(&XmlDocument::parse(&first)?)?)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn custom_namespaces_are_declared_once() -> std::result::Result<(), Box<dyn Error>> {
        let mut model = sample();
        model.add_namespace("custom", "urn:custom");
        model.add_namespace("flowable", ENGINE_NS);
        let xml = render(&model)?;
        assert_eq!(xml.matches("xmlns:custom=").count(), 1);
        assert_eq!(xml.matches("xmlns:flowable=").count(), 1);
        assert!(xml.contains(&format!(r#"targetNamespace="{}""#, DEFAULT_TARGET_NAMESPACE)));
        Ok(())
    }
}
