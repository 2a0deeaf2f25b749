//! This module defines the generic containers for content the core model does not understand.
//!
//! Extension elements and attributes are kept as plain data so a document with
//! foreign namespaces survives a round trip untouched.

/// An ordered multimap from a local name to every entry registered under it.
///
/// Names keep the order in which they were first seen, and entries under one
/// name keep their insertion order. Looking up an absent name yields an empty slice.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedMap<T> {
    entries: Vec<(String, Vec<T>)>,
}

impl<T> Default for GroupedMap<T> {
    fn default() -> Self {
        GroupedMap { entries: Vec::new() }
    }
}

impl<T> GroupedMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry under `name`
    pub fn push(&mut self, name: impl Into<String>, value: T) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// All entries registered under `name`, in insertion order
    pub fn get(&self, name: &str) -> &[T] {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<T>> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, values)| values)
    }

    /// The first entry registered under `name`
    pub fn first(&self, name: &str) -> Option<&T> {
        self.get(name).first()
    }

    pub fn remove(&mut self, name: &str) -> Vec<T> {
        match self.entries.iter().position(|(key, _)| key == name) {
            Some(index) => self.entries.remove(index).1,
            None => Vec::new(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Every entry, grouped by name in first-seen order
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().flat_map(|(_, values)| values.iter())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// Number of distinct names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A namespace-qualified attribute the owning converter did not consume
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtensionAttribute {
    pub name: String,
    pub value: String,
    pub namespace: Option<String>,
    pub namespace_prefix: Option<String>,
}

impl ExtensionAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        ExtensionAttribute {
            name: name.into(),
            value: value.into(),
            namespace: None,
            namespace_prefix: None,
        }
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.namespace_prefix = Some(prefix.into());
        self.namespace = Some(namespace.into());
        self
    }
}

pub type AttributeMap = GroupedMap<ExtensionAttribute>;
pub type ExtensionMap = GroupedMap<ExtensionElement>;

/// One piece of mixed content: a text run, or the `index`th child called `name`
#[derive(Debug, Clone, PartialEq)]
pub enum MixedContent {
    Text(String),
    Child { name: String, index: usize },
}

/// A generic element tree captured from unrecognised XML content
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtensionElement {
    pub name: String,
    pub namespace: Option<String>,
    pub namespace_prefix: Option<String>,
    pub element_text: Option<String>,
    pub attributes: AttributeMap,
    pub child_elements: ExtensionMap,
    /// Document order of text and children; empty unless the element mixes both
    pub mixed_content: Vec<MixedContent>,
}

impl ExtensionElement {
    pub fn new(name: impl Into<String>) -> Self {
        ExtensionElement {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.namespace_prefix = Some(prefix.into());
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.element_text = Some(text.into());
        self
    }

    pub fn add_attribute(&mut self, attribute: ExtensionAttribute) {
        self.attributes.push(attribute.name.clone(), attribute);
    }

    pub fn add_child(&mut self, child: ExtensionElement) {
        self.child_elements.push(child.name.clone(), child);
    }

    /// Value of the first attribute called `name`, whatever its namespace
    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attributes.first(name).map(|a| a.value.as_str())
    }
}
