use std::error::Error;
use std::fs;

use bpmn_converter::model::data::DataValue;
use bpmn_converter::model::extension::{AttributeMap, ExtensionElement};
use bpmn_converter::model::flow::FlowElement;
use bpmn_converter::{BpmnModel, BpmnXmlConverter, ParseOptions, WriteOptions};
use pretty_assertions::assert_eq;

type TestResult = std::result::Result<(), Box<dyn Error>>;

fn load() -> std::result::Result<BpmnModel, Box<dyn Error>> {
    let bytes = fs::read("tests/resources/extension_fidelity.bpmn")?;
    let options = ParseOptions::default().with_schema_validation(true);
    Ok(BpmnXmlConverter::new().parse(&bytes, &options)?)
}

fn write(model: &BpmnModel) -> std::result::Result<String, Box<dyn Error>> {
    let bytes = BpmnXmlConverter::new().serialize(model, &WriteOptions::default())?;
    Ok(String::from_utf8(bytes)?)
}

fn value<'a>(attributes: &'a AttributeMap, name: &str) -> Option<&'a str> {
    attributes.first(name).map(|a| a.value.as_str())
}

fn names(children: &[ExtensionElement]) -> Vec<&str> {
    children.iter().map(|c| c.name.as_str()).collect()
}

#[test]
fn every_extension_survives_a_round_trip() -> TestResult {
    let model = load()?;
    let written = write(&model)?;
    let reparsed = BpmnXmlConverter::new().parse_str(&written, &ParseOptions::default())?;
    assert_eq!(reparsed, model);
    assert_eq!(write(&reparsed)?, written);
    Ok(())
}

#[test]
fn root_definitions_keep_custom_attributes_and_content() -> TestResult {
    let model = load()?;

    let signal = model.signal("reviewSignal").ok_or("signal")?;
    assert_eq!(value(&signal.extension_attributes, "sigAttr"), Some("s"));
    let extension = signal.extension_elements.first("sigExt").ok_or("sigExt")?;
    assert_eq!(extension.attribute_value("level"), Some("1"));
    assert_eq!(names(&signal.foreign_children), vec!["sigNote"]);

    let error = model.error("reviewError").ok_or("error")?;
    assert_eq!(value(&error.extension_attributes, "errAttr"), Some("e"));
    assert_eq!(value(&model.escalations[0].extension_attributes, "escAttr"), Some("l"));
    let message = model.message("reviewMessage").ok_or("message")?;
    assert_eq!(value(&message.extension_attributes, "msgAttr"), Some("m"));
    assert_eq!(value(&model.item_definitions[0].extension_attributes, "itemAttr"), Some("x"));
    assert_eq!(value(&model.imports[0].extension_attributes, "importAttr"), Some("i"));

    let written = write(&model)?;
    for expected in [
        r#"custom:sigAttr="s""#,
        r#"<custom:sigExt level="1"/>"#,
        "<custom:sigNote>kept</custom:sigNote>",
        r#"custom:errAttr="e""#,
        r#"custom:escAttr="l""#,
        r#"custom:msgAttr="m""#,
        r#"custom:itemAttr="x""#,
        r#"custom:importAttr="i""#,
    ] {
        assert!(written.contains(expected), "missing {}", expected);
    }
    Ok(())
}

#[test]
fn collaboration_lanes_and_message_flows_keep_their_extensions() -> TestResult {
    let model = load()?;
    assert_eq!(value(&model.collaboration_attributes, "collabAttr"), Some("c"));
    let extension = model.collaboration_extension_elements.first("collabExt").ok_or("collabExt")?;
    assert_eq!(extension.attribute_value("owner"), Some("board"));
    assert_eq!(names(&model.collaboration_foreign_children), vec!["note"]);
    assert_eq!(value(&model.message_flows[0].extension_attributes, "flowAttr"), Some("f"));
    let process = model.process("reviewProcess").ok_or("process")?;
    assert_eq!(value(&process.lanes[0].extension_attributes, "laneAttr"), Some("r"));

    let written = write(&model)?;
    for expected in [
        r#"custom:collabAttr="c""#,
        r#"<custom:collabExt owner="board"/>"#,
        "<custom:note>collaboration note</custom:note>",
        r#"custom:flowAttr="f""#,
        r#"custom:laneAttr="r""#,
    ] {
        assert!(written.contains(expected), "missing {}", expected);
    }
    Ok(())
}

#[test]
fn timer_definition_keeps_listener_and_foreign_content() -> TestResult {
    let model = load()?;
    let start = model.flow_element("start").ok_or("start")?;
    let definition = &start.event_definitions()[0];
    assert_eq!(value(&definition.extension_attributes, "timerAttr"), Some("t"));
    let listener = definition
        .extension_elements
        .first("executionListener")
        .ok_or("executionListener")?;
    assert_eq!(listener.attribute_value("class"), Some("com.example.TimerListener"));
    assert_eq!(names(&definition.foreign_children), vec!["timerNote"]);

    let written = write(&model)?;
    assert!(written.contains(r#"custom:timerAttr="t""#));
    assert!(written.contains(r#"<flowable:executionListener event="start" class="com.example.TimerListener"/>"#));
    assert!(written.contains("<custom:timerNote>kept</custom:timerNote>"));
    Ok(())
}

#[test]
fn multi_instance_keeps_custom_content() -> TestResult {
    let model = load()?;
    let review = model.flow_element("review").ok_or("review")?;
    let multi = review
        .activity()
        .and_then(|a| a.multi_instance.as_ref())
        .ok_or("multi instance")?;
    assert_eq!(multi.collection.as_deref(), Some("${reviewers}"));
    assert_eq!(multi.completion_condition.as_deref(), Some("${done}"));
    assert_eq!(value(&multi.extension_attributes, "miAttr"), Some("m"));
    assert!(multi.extension_elements.first("miExt").is_some());
    assert_eq!(names(&multi.foreign_children), vec!["miNote"]);

    let written = write(&model)?;
    assert!(written.contains(r#"custom:miAttr="m""#));
    assert!(written.contains("<custom:miExt/>"));
    assert!(written.contains("<custom:miNote>kept</custom:miNote>"));
    Ok(())
}

#[test]
fn json_values_keep_their_key_order() -> TestResult {
    let original = r#"{"b":1,"a":{"z":true,"y":[2,1]}}"#;
    let model = load()?;
    let reparsed = BpmnXmlConverter::new().parse_str(&write(&model)?, &ParseOptions::default())?;
    for model in [&model, &reparsed] {
        let Some(FlowElement::DataObject(settings)) = model.flow_element("settings") else {
            return Err("settings is not a data object".into());
        };
        let Some(DataValue::Json(value)) = &settings.value else {
            return Err("settings is not json".into());
        };
        assert_eq!(serde_json::to_string(value)?, original);
    }
    Ok(())
}

#[test]
fn same_named_attributes_in_nested_extensions_keep_their_namespaces() -> TestResult {
    let model = load()?;
    let review = model.flow_element("review").ok_or("review")?;
    let outer = review.core().extension_elements.first("entry").ok_or("entry")?;
    let inner = outer.child_elements.first("entry").ok_or("nested entry")?;
    for (element, expected) in [(outer, ["a", "b"]), (inner, ["c", "d"])] {
        let keys = element.attributes.get("key");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].namespace.as_deref(), Some("http://example.com/custom"));
        assert_eq!(keys[0].value, expected[0]);
        assert_eq!(keys[1].namespace.as_deref(), Some("http://example.com/other"));
        assert_eq!(keys[1].value, expected[1]);
    }

    let written = write(&model)?;
    assert!(written.contains(r#"<custom:entry custom:key="c" other:key="d"/>"#));
    Ok(())
}

#[test]
fn transaction_keeps_triggered_by_event() -> TestResult {
    let model = load()?;
    let Some(FlowElement::Transaction(settle)) = model.flow_element("settle") else {
        return Err("settle is not a transaction".into());
    };
    assert_eq!(value(&settle.core.extension_attributes, "triggeredByEvent"), Some("true"));
    assert!(write(&model)?.contains(r#"triggeredByEvent="true""#));
    Ok(())
}

#[test]
fn mixed_extension_content_keeps_its_order() -> TestResult {
    let model = load()?;
    let written = write(&model)?;
    assert!(written.contains("<custom:text>before <custom:em>middle</custom:em> after</custom:text>"));
    Ok(())
}

#[test]
fn custom_shape_ids_and_attributes_are_kept() -> TestResult {
    let model = load()?;
    let scope = model.diagram.scope("reviewCollaboration").ok_or("plane")?;
    let details = scope.shape_details.get("review").ok_or("review details")?;
    assert_eq!(details.di_id.as_deref(), Some("shape-review"));
    assert_eq!(value(&details.extension_attributes, "color"), Some("blue"));
    assert!(scope.shape_details.get("start").is_none());

    let written = write(&model)?;
    assert!(written.contains(r#"<bpmndi:BPMNShape bpmnElement="review" id="shape-review" custom:color="blue">"#));
    assert!(written.contains(r#"<bpmndi:BPMNShape bpmnElement="start" id="BPMNShape_start">"#));
    Ok(())
}
