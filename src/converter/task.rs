//! Converters for the task kinds without a delegate implementation, and for call activities.

use std::mem;

use crate::error::Result;
use crate::model::flow::{BusinessRuleTask, CallActivity, FlowElement, ScriptTask, Task, UserTask};
use crate::xml::writer::{Tag, XmlWriter};
use crate::xml::{split_list, Element, MODEL_NS};

use super::common::{write_form_property, write_io_parameter, write_listener};
use super::{
    activity_attrs, core_tag, engine_attr, engine_flag, write_activity_children, write_documentation,
    write_extension_block, write_foreign_children, ElementConverter, NodeReader, ACTIVITY_CHILDREN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Plain,
    Manual,
    Receive,
}

/// `task`, `manualTask` and `receiveTask`: activities with no settings of their own
pub struct TaskConverter {
    kind: TaskKind,
}

pub static TASK: TaskConverter = TaskConverter { kind: TaskKind::Plain };
pub static MANUAL_TASK: TaskConverter = TaskConverter { kind: TaskKind::Manual };
pub static RECEIVE_TASK: TaskConverter = TaskConverter { kind: TaskKind::Receive };

impl ElementConverter for TaskConverter {
    fn element_name(&self) -> &'static str {
        match self.kind {
            TaskKind::Plain => "task",
            TaskKind::Manual => "manualTask",
            TaskKind::Receive => "receiveTask",
        }
    }

    fn read(&self, element: Element<'_>) -> Result<FlowElement> {
        let mut node = NodeReader::new(element)?;
        let mut core = node.core();
        let activity = node.activity()?;
        node.finish(&mut core, &ACTIVITY_CHILDREN);
        let task = Task { core, activity };
        Ok(match self.kind {
            TaskKind::Plain => FlowElement::Task(task),
            TaskKind::Manual => FlowElement::ManualTask(task),
            TaskKind::Receive => FlowElement::ReceiveTask(task),
        })
    }

    fn write(&self, node: &FlowElement, w: &mut XmlWriter) -> Result<()> {
        let task = match (self.kind, node) {
            (TaskKind::Plain, FlowElement::Task(task))
            | (TaskKind::Manual, FlowElement::ManualTask(task))
            | (TaskKind::Receive, FlowElement::ReceiveTask(task)) => task,
            _ => return Ok(()),
        };
        let tag = activity_attrs(core_tag(self.element_name(), &task.core), &task.activity);
        w.open(tag.extension_attrs(&task.core.extension_attributes))?;
        write_documentation(task.core.documentation.as_deref(), w)?;
        write_extension_block(
            &task.core.execution_listeners,
            &task.core.extension_elements,
            false,
            |_| Ok(()),
            w,
        )?;
        write_activity_children(&task.activity, w)?;
        write_foreign_children(&task.core, w)?;
        w.close()
    }
}

pub struct UserTaskConverter;

pub static USER_TASK: UserTaskConverter = UserTaskConverter;

impl ElementConverter for UserTaskConverter {
    fn element_name(&self) -> &'static str {
        "userTask"
    }

    fn read(&self, element: Element<'_>) -> Result<FlowElement> {
        let mut node = NodeReader::new(element)?;
        let mut core = node.core();
        let activity = node.activity()?;
        let attrs = &mut node.attrs;
        let mut task = UserTask {
            activity,
            assignee: attrs.engine("assignee"),
            owner: attrs.engine("owner"),
            candidate_users: attrs.engine("candidateUsers").as_deref().map(split_list).unwrap_or_default(),
            candidate_groups: attrs.engine("candidateGroups").as_deref().map(split_list).unwrap_or_default(),
            form_key: attrs.engine("formKey"),
            due_date: attrs.engine("dueDate"),
            priority: attrs.engine("priority"),
            category: attrs.engine("category"),
            form_properties: mem::take(&mut node.block.form_properties),
            task_listeners: mem::take(&mut node.block.task_listeners),
            ..Default::default()
        };
        node.finish(&mut core, &ACTIVITY_CHILDREN);
        task.core = core;
        Ok(FlowElement::UserTask(task))
    }

    fn write(&self, node: &FlowElement, w: &mut XmlWriter) -> Result<()> {
        let FlowElement::UserTask(task) = node else {
            return Ok(());
        };
        let list = |values: &[String]| (!values.is_empty()).then(|| values.join(","));
        let tag = activity_attrs(core_tag(self.element_name(), &task.core), &task.activity);
        let tag = [
            ("assignee", task.assignee.clone()),
            ("owner", task.owner.clone()),
            ("candidateUsers", list(&task.candidate_users)),
            ("candidateGroups", list(&task.candidate_groups)),
            ("formKey", task.form_key.clone()),
            ("dueDate", task.due_date.clone()),
            ("priority", task.priority.clone()),
            ("category", task.category.clone()),
        ]
        .into_iter()
        .fold(tag, |tag, (name, value)| engine_attr(tag, name, value));
        w.open(tag.extension_attrs(&task.core.extension_attributes))?;
        write_documentation(task.core.documentation.as_deref(), w)?;
        write_extension_block(
            &task.core.execution_listeners,
            &task.core.extension_elements,
            !task.task_listeners.is_empty() || !task.form_properties.is_empty(),
            |w| {
                for listener in &task.task_listeners {
                    write_listener("taskListener", listener, w)?;
                }
                for property in &task.form_properties {
                    write_form_property(property, w)?;
                }
                Ok(())
            },
            w,
        )?;
        write_activity_children(&task.activity, w)?;
        write_foreign_children(&task.core, w)?;
        w.close()
    }
}

pub struct ScriptTaskConverter;

pub static SCRIPT_TASK: ScriptTaskConverter = ScriptTaskConverter;

const SCRIPT_TASK_CHILDREN: [&str; 4] = [
    "multiInstanceLoopCharacteristics",
    "dataInputAssociation",
    "dataOutputAssociation",
    "script",
];

impl ElementConverter for ScriptTaskConverter {
    fn element_name(&self) -> &'static str {
        "scriptTask"
    }

    fn read(&self, element: Element<'_>) -> Result<FlowElement> {
        let mut node = NodeReader::new(element)?;
        let mut core = node.core();
        let activity = node.activity()?;
        let mut task = ScriptTask {
            activity,
            script_format: node.attrs.plain("scriptFormat"),
            script: element.child(MODEL_NS, "script").and_then(|s| s.text()),
            result_variable: node.attrs.engine("resultVariable"),
            auto_store_variables: node.attrs.engine_bool("autoStoreVariables", false)?,
            ..Default::default()
        };
        node.finish(&mut core, &SCRIPT_TASK_CHILDREN);
        task.core = core;
        Ok(FlowElement::ScriptTask(task))
    }

    fn write(&self, node: &FlowElement, w: &mut XmlWriter) -> Result<()> {
        let FlowElement::ScriptTask(task) = node else {
            return Ok(());
        };
        let tag = activity_attrs(core_tag(self.element_name(), &task.core), &task.activity)
            .opt_attr("scriptFormat", task.script_format.as_ref());
        let tag = engine_attr(tag, "resultVariable", task.result_variable.as_ref());
        let tag = engine_flag(tag, "autoStoreVariables", task.auto_store_variables, false);
        w.open(tag.extension_attrs(&task.core.extension_attributes))?;
        write_documentation(task.core.documentation.as_deref(), w)?;
        write_extension_block(
            &task.core.execution_listeners,
            &task.core.extension_elements,
            false,
            |_| Ok(()),
            w,
        )?;
        write_activity_children(&task.activity, w)?;
        if let Some(script) = &task.script {
            w.cdata_element(Tag::new("script"), script)?;
        }
        write_foreign_children(&task.core, w)?;
        w.close()
    }
}

pub struct BusinessRuleTaskConverter;

pub static BUSINESS_RULE_TASK: BusinessRuleTaskConverter = BusinessRuleTaskConverter;

impl ElementConverter for BusinessRuleTaskConverter {
    fn element_name(&self) -> &'static str {
        "businessRuleTask"
    }

    fn read(&self, element: Element<'_>) -> Result<FlowElement> {
        let mut node = NodeReader::new(element)?;
        let mut core = node.core();
        let activity = node.activity()?;
        let attrs = &mut node.attrs;
        let mut task = BusinessRuleTask {
            activity,
            rule_names: attrs.engine("rules").as_deref().map(split_list).unwrap_or_default(),
            input_variables: attrs
                .engine("ruleVariablesInput")
                .as_deref()
                .map(split_list)
                .unwrap_or_default(),
            result_variable: attrs.engine("resultVariable"),
            exclude: attrs.engine_bool("exclude", false)?,
            class_name: attrs.engine("class"),
            ..Default::default()
        };
        node.finish(&mut core, &ACTIVITY_CHILDREN);
        task.core = core;
        Ok(FlowElement::BusinessRuleTask(task))
    }

    fn write(&self, node: &FlowElement, w: &mut XmlWriter) -> Result<()> {
        let FlowElement::BusinessRuleTask(task) = node else {
            return Ok(());
        };
        let list = |values: &[String]| (!values.is_empty()).then(|| values.join(","));
        let tag = activity_attrs(core_tag(self.element_name(), &task.core), &task.activity);
        let tag = engine_attr(tag, "ruleVariablesInput", list(&task.input_variables));
        let tag = engine_attr(tag, "rules", list(&task.rule_names));
        let tag = engine_attr(tag, "resultVariable", task.result_variable.as_ref());
        let tag = engine_flag(tag, "exclude", task.exclude, false);
        let tag = engine_attr(tag, "class", task.class_name.as_ref());
        w.open(tag.extension_attrs(&task.core.extension_attributes))?;
        write_documentation(task.core.documentation.as_deref(), w)?;
        write_extension_block(
            &task.core.execution_listeners,
            &task.core.extension_elements,
            false,
            |_| Ok(()),
            w,
        )?;
        write_activity_children(&task.activity, w)?;
        write_foreign_children(&task.core, w)?;
        w.close()
    }
}

pub struct CallActivityConverter;

pub static CALL_ACTIVITY: CallActivityConverter = CallActivityConverter;

impl ElementConverter for CallActivityConverter {
    fn element_name(&self) -> &'static str {
        "callActivity"
    }

    fn read(&self, element: Element<'_>) -> Result<FlowElement> {
        let mut node = NodeReader::new(element)?;
        let mut core = node.core();
        let activity = node.activity()?;
        let attrs = &mut node.attrs;
        let mut call = CallActivity {
            activity,
            called_element: attrs.plain("calledElement"),
            called_element_type: attrs.engine("calledElementType"),
            business_key: attrs.engine("businessKey"),
            inherit_business_key: attrs.engine_bool("inheritBusinessKey", false)?,
            inherit_variables: attrs.engine_bool("inheritVariables", false)?,
            same_deployment: attrs.engine_bool("sameDeployment", false)?,
            fallback_to_default_tenant: attrs.engine_bool("fallbackToDefaultTenant", false)?,
            process_instance_name: attrs.engine("processInstanceName"),
            in_parameters: mem::take(&mut node.block.in_parameters),
            out_parameters: mem::take(&mut node.block.out_parameters),
            ..Default::default()
        };
        node.finish(&mut core, &ACTIVITY_CHILDREN);
        call.core = core;
        Ok(FlowElement::CallActivity(call))
    }

    fn write(&self, node: &FlowElement, w: &mut XmlWriter) -> Result<()> {
        let FlowElement::CallActivity(call) = node else {
            return Ok(());
        };
        let tag = activity_attrs(core_tag(self.element_name(), &call.core), &call.activity)
            .opt_attr("calledElement", call.called_element.as_ref());
        let tag = engine_attr(tag, "calledElementType", call.called_element_type.as_ref());
        let tag = engine_attr(tag, "businessKey", call.business_key.as_ref());
        let tag = engine_flag(tag, "inheritBusinessKey", call.inherit_business_key, false);
        let tag = engine_flag(tag, "inheritVariables", call.inherit_variables, false);
        let tag = engine_flag(tag, "sameDeployment", call.same_deployment, false);
        let tag = engine_flag(tag, "fallbackToDefaultTenant", call.fallback_to_default_tenant, false);
        let tag = engine_attr(tag, "processInstanceName", call.process_instance_name.as_ref());
        w.open(tag.extension_attrs(&call.core.extension_attributes))?;
        write_documentation(call.core.documentation.as_deref(), w)?;
        write_extension_block(
            &call.core.execution_listeners,
            &call.core.extension_elements,
            !call.in_parameters.is_empty() || !call.out_parameters.is_empty(),
            |w| {
                for parameter in &call.in_parameters {
                    write_io_parameter("in", parameter, w)?;
                }
                for parameter in &call.out_parameters {
                    write_io_parameter("out", parameter, w)?;
                }
                Ok(())
            },
            w,
        )?;
        write_activity_children(&call.activity, w)?;
        write_foreign_children(&call.core, w)?;
        w.close()
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::model::common::ImplementationType;
    use crate::xml::{XmlDocument, ENGINE_NS};

    fn read(converter: &dyn ElementConverter, body: &str) -> std::result::Result<FlowElement, Box<dyn Error>> {
        let xml = format!(
            r#"<process xmlns="{}" xmlns:flowable="{}">{}</process>"#,
            MODEL_NS, ENGINE_NS, body
        );
        let doc = XmlDocument::parse(&xml)?;
        let element = doc.root().children().next().ok_or("no element")?;
        Ok(converter.read(element)?)
    }

    #[test]
    fn user_task_settings_and_listeners() -> std::result::Result<(), Box<dyn Error>> {
        let element = read(
            &USER_TASK,
            r#"<userTask id="approve" name="Approve" flowable:assignee="${initiator}" flowable:candidateGroups="management, sales" flowable:async="true">
                 <documentation>Check the request</documentation>
                 <extensionElements>
                   <flowable:taskListener event="create" class="org.example.First"/>
                   <flowable:taskListener event="complete" expression="${done}"/>
                   <flowable:formProperty id="amount" type="long" required="true"/>
                 </extensionElements>
                 <multiInstanceLoopCharacteristics isSequential="true" flowable:collection="${reviewers}" flowable:elementVariable="reviewer">
                   <completionCondition>${nrOfCompletedInstances == 2}</completionCondition>
                 </multiInstanceLoopCharacteristics>
               </userTask>"#,
        )?;
        let FlowElement::UserTask(task) = element else {
            panic!("expected a user task");
        };
        assert_eq!(task.core.documentation.as_deref(), Some("Check the request"));
        assert_eq!(task.assignee.as_deref(), Some("${initiator}"));
        assert_eq!(task.candidate_groups, ["management", "sales"]);
        assert!(task.activity.asynchronous);
        assert_eq!(task.task_listeners.len(), 2);
        let second = task.task_listeners[1].implementation.as_ref().unwrap();
        assert_eq!(second.kind, ImplementationType::Expression);
        assert!(task.form_properties[0].required);

        let multi_instance = task.activity.multi_instance.unwrap();
        assert!(multi_instance.sequential);
        assert_eq!(multi_instance.collection.as_deref(), Some("${reviewers}"));
        assert_eq!(multi_instance.element_variable.as_deref(), Some("reviewer"));
        assert_eq!(
            multi_instance.completion_condition.as_deref(),
            Some("${nrOfCompletedInstances == 2}")
        );
        Ok(())
    }

    #[test]
    fn script_keeps_line_breaks() -> std::result::Result<(), Box<dyn Error>> {
        let element = read(
            &SCRIPT_TASK,
            "<scriptTask id=\"s\" scriptFormat=\"groovy\"><script><![CDATA[a = 1\nb = a < 2]]></script></scriptTask>",
        )?;
        let FlowElement::ScriptTask(task) = element else {
            panic!("expected a script task");
        };
        assert_eq!(task.script.as_deref(), Some("a = 1\nb = a < 2"));
        assert!(task.core.foreign_children.is_empty());
        Ok(())
    }

    #[test]
    fn call_activity_parameters_keep_order() -> std::result::Result<(), Box<dyn Error>> {
        let element = read(
            &CALL_ACTIVITY,
            r#"<callActivity id="call" calledElement="child" flowable:inheritVariables="true">
                 <extensionElements>
                   <flowable:in source="a" target="x"/>
                   <flowable:in sourceExpression="${b}" target="y"/>
                   <flowable:out source="z" target="c"/>
                 </extensionElements>
               </callActivity>"#,
        )?;
        let FlowElement::CallActivity(call) = element else {
            panic!("expected a call activity");
        };
        assert_eq!(call.called_element.as_deref(), Some("child"));
        assert!(call.inherit_variables);
        let targets: Vec<_> = call.in_parameters.iter().filter_map(|p| p.target.as_deref()).collect();
        assert_eq!(targets, ["x", "y"]);
        assert_eq!(call.out_parameters.len(), 1);
        Ok(())
    }

    #[test]
    fn unknown_children_are_foreign() -> std::result::Result<(), Box<dyn Error>> {
        let element = read(
            &TASK,
            r#"<task id="t"><ioSpecification id="io"/><incoming>flow1</incoming></task>"#,
        )?;
        let names: Vec<_> = element.core().foreign_children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["ioSpecification", "incoming"]);
        Ok(())
    }
}
