use std::error::Error;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bpmn_converter::validation::SequenceFlowReferences;
use bpmn_converter::{BpmnModel, BpmnXmlConverter, Error as ConvertError, ParseOptions};
use pretty_assertions::assert_eq;

type TestResult = std::result::Result<(), Box<dyn Error>>;

fn read(name: &str) -> std::io::Result<Vec<u8>> {
    fs::read(format!("tests/resources/{}", name))
}

#[test]
fn broken_pools_fall_back_to_position() -> TestResult {
    let model = BpmnXmlConverter::new().parse(&read("broken_pools.bpmn")?, &ParseOptions::default())?;
    assert_eq!(model.pools.len(), 2);
    assert!(!model.pools[0].executable);
    assert!(model.pools[1].executable);

    let main = model.main_process().ok_or("no main process")?;
    assert_eq!(main.id, "secondProcess");
    assert_eq!(main.flow_elements.len(), 3);
    Ok(())
}

#[test]
fn empty_input_is_malformed() {
    let result = BpmnXmlConverter::new().parse(b"", &ParseOptions::default());
    assert!(matches!(result, Err(ConvertError::MalformedDocument { .. })));
}

#[test]
fn map_exception_without_error_code_is_rejected() -> TestResult {
    let result = BpmnXmlConverter::new().parse(&read("missing_error_code.bpmn")?, &ParseOptions::default());
    let Err(error) = result else {
        panic!("expected an error");
    };
    assert!(matches!(error, ConvertError::MissingRequiredAttribute { .. }));
    assert_eq!(error.to_string(), "No errorCode defined on mapException");
    Ok(())
}

#[test]
fn bad_boolean_names_value_and_type() -> TestResult {
    let xml = r#"<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
                   <process id="p" isExecutable="perhaps"/>
                 </definitions>"#;
    let error = BpmnXmlConverter::new()
        .parse(xml.as_bytes(), &ParseOptions::default())
        .err()
        .ok_or("expected an error")?;
    let message = error.to_string();
    assert!(message.contains("'perhaps'"), "{}", message);
    assert!(message.contains("boolean"), "{}", message);
    Ok(())
}

#[test]
fn registered_validator_runs_on_request() -> TestResult {
    let xml = r#"<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
                   <process id="p"><task id="a"/><sequenceFlow id="f" sourceRef="a" targetRef="ghost"/></process>
                 </definitions>"#;
    let converter = BpmnXmlConverter::new().with_validator(SequenceFlowReferences);
    assert!(converter.parse(xml.as_bytes(), &ParseOptions::default()).is_ok());

    let result = converter.parse(xml.as_bytes(), &ParseOptions::default().with_validation(true));
    assert!(matches!(result, Err(ConvertError::UnresolvedReference { reference, .. }) if reference == "ghost"));
    Ok(())
}

#[test]
fn validation_without_validator_is_skipped() -> TestResult {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let counting = BpmnXmlConverter::new().with_validator(move |_: &BpmnModel| -> bpmn_converter::Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let options = ParseOptions::default().with_validation(true);
    counting.parse(&read("broken_pools.bpmn")?, &options)?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let model = BpmnXmlConverter::new().parse(&read("broken_pools.bpmn")?, &options)?;
    assert_eq!(model.processes.len(), 2);
    Ok(())
}

#[test]
fn schema_check_rejects_missing_ids() {
    let xml = r#"<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
                   <process id="p"><userTask name="no id"/></process>
                 </definitions>"#;
    let options = ParseOptions::default().with_schema_validation(true);
    let result = BpmnXmlConverter::new().parse(xml.as_bytes(), &options);
    assert!(matches!(result, Err(ConvertError::SchemaViolation { element, .. }) if element == "userTask"));
}
