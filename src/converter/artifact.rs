use crate::error::Result;
use crate::model::artifact::{Artifact, ArtifactKind, Association, AssociationDirection, Group, TextAnnotation};
use crate::xml::writer::{Tag, XmlWriter};
use crate::xml::{Element, MODEL_NS};

use super::common::{read_generic_block, write_generic_block};
use super::extension::write_subtree;
use super::{foreign_children, read_documentation, write_documentation};

pub const ARTIFACT_NAMES: [&str; 3] = ["textAnnotation", "association", "group"];

pub fn read_artifact(element: Element<'_>) -> Result<Artifact> {
    let mut attrs = element.attribute_reader();
    let id = attrs.plain("id").unwrap_or_default();
    let kind = match element.local_name().to_ascii_lowercase().as_str() {
        "textannotation" => ArtifactKind::TextAnnotation(TextAnnotation {
            text: element.child(MODEL_NS, "text").and_then(|t| t.text()),
            text_format: attrs.plain("textFormat"),
        }),
        "association" => ArtifactKind::Association(Association {
            source_ref: attrs.plain("sourceRef"),
            target_ref: attrs.plain("targetRef"),
            direction: attrs
                .plain("associationDirection")
                .as_deref()
                .and_then(AssociationDirection::parse)
                .unwrap_or_default(),
        }),
        _ => ArtifactKind::Group(Group {
            category_value_ref: attrs.plain("categoryValueRef"),
        }),
    };
    Ok(Artifact {
        id,
        documentation: read_documentation(element),
        kind,
        extension_elements: read_generic_block(element),
        extension_attributes: attrs.into_extensions(),
        foreign_children: foreign_children(element, &["text"]),
    })
}

pub fn write_artifact(artifact: &Artifact, w: &mut XmlWriter) -> Result<()> {
    let tag = Tag::new(artifact.kind.xml_name()).attr("id", &artifact.id);
    let tag = match &artifact.kind {
        ArtifactKind::TextAnnotation(annotation) => tag.opt_attr("textFormat", annotation.text_format.as_ref()),
        ArtifactKind::Association(association) => {
            let tag = tag
                .opt_attr("sourceRef", association.source_ref.as_ref())
                .opt_attr("targetRef", association.target_ref.as_ref());
            match association.direction {
                AssociationDirection::None => tag,
                direction => tag.attr("associationDirection", direction.as_str()),
            }
        }
        ArtifactKind::Group(group) => tag.opt_attr("categoryValueRef", group.category_value_ref.as_ref()),
    };
    w.open(tag.extension_attrs(&artifact.extension_attributes))?;
    write_documentation(artifact.documentation.as_deref(), w)?;
    write_generic_block(&artifact.extension_elements, w)?;
    if let ArtifactKind::TextAnnotation(TextAnnotation { text: Some(text), .. }) = &artifact.kind {
        w.text_element(Tag::new("text"), text)?;
    }
    for child in &artifact.foreign_children {
        write_subtree(child, w)?;
    }
    w.close()
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::xml::XmlDocument;

    #[test]
    fn association_direction() -> std::result::Result<(), Box<dyn Error>> {
        let xml = format!(
            r#"<association xmlns="{}" id="a" sourceRef="note" targetRef="task" associationDirection="Both"/>"#,
            MODEL_NS
        );
        let doc = XmlDocument::parse(&xml)?;
        let artifact = read_artifact(doc.root())?;
        let ArtifactKind::Association(association) = &artifact.kind else {
            panic!("expected an association");
        };
        assert_eq!(association.direction, AssociationDirection::Both);
        assert_eq!(association.target_ref.as_deref(), Some("task"));
        Ok(())
    }

    #[test]
    fn annotation_text_keeps_newlines() -> std::result::Result<(), Box<dyn Error>> {
        let xml = format!(
            "<textAnnotation xmlns=\"{}\" id=\"n\"><text>first line\nsecond – line</text></textAnnotation>",
            MODEL_NS
        );
        let doc = XmlDocument::parse(&xml)?;
        let artifact = read_artifact(doc.root())?;
        assert_eq!(artifact, Artifact::text_annotation("n", "first line\nsecond – line"));
        Ok(())
    }
}
