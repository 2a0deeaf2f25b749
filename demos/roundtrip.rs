use std::fs;

use bpmn_converter::{BpmnXmlConverter, Error, ParseOptions, WriteOptions};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Read the input file from the command line arguments
    let input_file = std::env::args()
        .nth(1)
        .ok_or_else(|| Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "no input file given")))?;
    let bytes = fs::read(&input_file)?;

    // Parse with the structural check on, then write the model back out
    let converter = BpmnXmlConverter::new();
    let model = converter.parse(&bytes, &ParseOptions::default().with_schema_validation(true))?;
    if let Some(main) = model.main_process() {
        eprintln!("main process: {} ({} flow elements)", main.id, main.flow_elements.len());
    }
    let output = converter.serialize(&model, &WriteOptions::default())?;
    println!("{}", String::from_utf8_lossy(&output));

    Ok(())
}
