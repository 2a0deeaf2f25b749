//! Artifacts: annotations, associations and groups.

use super::extension::{AttributeMap, ExtensionElement, ExtensionMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssociationDirection {
    #[default]
    None,
    One,
    Both,
}

impl AssociationDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Some(AssociationDirection::None),
            "one" => Some(AssociationDirection::One),
            "both" => Some(AssociationDirection::Both),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationDirection::None => "None",
            AssociationDirection::One => "One",
            AssociationDirection::Both => "Both",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextAnnotation {
    pub text: Option<String>,
    pub text_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Association {
    pub source_ref: Option<String>,
    pub target_ref: Option<String>,
    pub direction: AssociationDirection,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub category_value_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactKind {
    TextAnnotation(TextAnnotation),
    Association(Association),
    Group(Group),
}

impl ArtifactKind {
    pub fn xml_name(&self) -> &'static str {
        match self {
            ArtifactKind::TextAnnotation(_) => "textAnnotation",
            ArtifactKind::Association(_) => "association",
            ArtifactKind::Group(_) => "group",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: String,
    pub documentation: Option<String>,
    pub kind: ArtifactKind,
    pub extension_elements: ExtensionMap,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

impl Artifact {
    pub fn new(id: impl Into<String>, kind: ArtifactKind) -> Self {
        Artifact {
            id: id.into(),
            documentation: None,
            kind,
            extension_elements: ExtensionMap::new(),
            extension_attributes: AttributeMap::new(),
            foreign_children: Vec::new(),
        }
    }

    pub fn text_annotation(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            id,
            ArtifactKind::TextAnnotation(TextAnnotation {
                text: Some(text.into()),
                text_format: None,
            }),
        )
    }

    pub fn association(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            id,
            ArtifactKind::Association(Association {
                source_ref: Some(source.into()),
                target_ref: Some(target.into()),
                direction: AssociationDirection::None,
            }),
        )
    }
}
