//! The seam for semantic process validation.
//!
//! The converter never resolves references itself. Callers that want a
//! semantic check register a [`ProcessValidator`] on the converter.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::flow::FlowElement;
use crate::model::BpmnModel;

pub trait ProcessValidator: Send + Sync {
    /// Accept the model or report the first problem found
    fn validate(&self, model: &BpmnModel) -> Result<()>;
}

impl<F> ProcessValidator for F
where
    F: Fn(&BpmnModel) -> Result<()> + Send + Sync,
{
    fn validate(&self, model: &BpmnModel) -> Result<()> {
        self(model)
    }
}

/// Checks that every sequence flow connects elements of its own scope
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceFlowReferences;

fn check_scope(elements: &[FlowElement]) -> Result<()> {
    let ids: HashSet<&str> = elements.iter().map(FlowElement::id).collect();
    for element in elements {
        match element {
            FlowElement::SequenceFlow(flow) => {
                for reference in [&flow.source_ref, &flow.target_ref] {
                    if !ids.contains(reference.as_str()) {
                        return Err(Error::UnresolvedReference {
                            element: flow.core.id.clone(),
                            reference: reference.clone(),
                        });
                    }
                }
            }
            other => {
                if let Some(sub_process) = other.sub_process() {
                    check_scope(&sub_process.flow_elements)?;
                }
            }
        }
    }
    Ok(())
}

impl ProcessValidator for SequenceFlowReferences {
    fn validate(&self, model: &BpmnModel) -> Result<()> {
        model
            .processes
            .iter()
            .try_for_each(|process| check_scope(&process.flow_elements))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::flow::{FlowCore, SequenceFlow, Task};
    use crate::model::Process;

    #[test]
    fn dangling_sequence_flow_is_reported() {
        let mut process = Process::new("p");
        process.add_flow_element(FlowElement::Task(Task::new(FlowCore::new("a"))));
        process.add_flow_element(FlowElement::SequenceFlow(SequenceFlow::new("f", "a", "missing")));
        let mut model = BpmnModel::new();
        model.processes.push(process);

        let error = SequenceFlowReferences.validate(&model).unwrap_err();
        assert!(matches!(error, Error::UnresolvedReference { reference, .. } if reference == "missing"));
    }

    #[test]
    fn closures_are_validators() {
        let reject_empty = |model: &BpmnModel| -> Result<()> {
            if model.processes.is_empty() {
                Err(Error::UnresolvedReference {
                    element: "definitions".into(),
                    reference: "process".into(),
                })
            } else {
                Ok(())
            }
        };
        assert!(reject_empty.validate(&BpmnModel::new()).is_err());
    }
}
