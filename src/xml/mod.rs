//! This module turns raw document text into an arena of XML nodes and provides
//! the read cursor the converters walk.
//!
//! Nodes are stored in a flat vector and refer to each other by [`NodeId`]. The
//! tokenizer keeps an explicit stack of open elements and of namespace scopes, so
//! "read until the end of element X" is plain depth tracking and prefix
//! redefinitions at deeper levels resolve to the right URI.

pub mod schema;
pub mod writer;

use std::borrow::Cow;
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::model::extension::{AttributeMap, ExtensionAttribute};

pub const MODEL_NS: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
pub const BPMNDI_NS: &str = "http://www.omg.org/spec/BPMN/20100524/DI";
pub const OMGDC_NS: &str = "http://www.omg.org/spec/DD/20100524/DC";
pub const OMGDI_NS: &str = "http://www.omg.org/spec/DD/20100524/DI";
pub const ENGINE_NS: &str = "http://flowable.org/bpmn";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

pub const ENGINE_PREFIX: &str = "flowable";
pub const BPMNDI_PREFIX: &str = "bpmndi";
pub const OMGDC_PREFIX: &str = "omgdc";
pub const OMGDI_PREFIX: &str = "omgdi";

/// Namespaces every written document declares, in emission order
pub const STANDARD_NAMESPACES: [(&str, &str); 6] = [
    ("xsi", XSI_NS),
    ("xsd", XSD_NS),
    (ENGINE_PREFIX, ENGINE_NS),
    (BPMNDI_PREFIX, BPMNDI_NS),
    (OMGDC_PREFIX, OMGDC_NS),
    (OMGDI_PREFIX, OMGDI_NS),
];

/// Index of a node inside an [`XmlDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone)]
struct XmlNode {
    prefix: Option<String>,
    local_name: String,
    namespace: Option<String>,
    attributes: Vec<XmlAttribute>,
    /// `xmlns` declarations made on this element; the default namespace has an empty prefix
    namespace_decls: Vec<(String, String)>,
    /// Text runs, each with the number of child elements that precede it
    text_segments: Vec<(usize, String)>,
    children: Vec<NodeId>,
    position: u64,
}

/// A parsed document: every element in one arena
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<XmlNode>,
    root: NodeId,
}

impl XmlDocument {
    /// Tokenize `text` into an element arena.
    ///
    /// An input without a root element, with unbalanced tags, or with an
    /// undeclared namespace prefix is rejected as malformed.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut nodes: Vec<XmlNode> = Vec::new();
        let mut open: Vec<NodeId> = Vec::new();
        let mut scopes: Vec<Vec<(String, String)>> = Vec::new();
        let mut root = None;

        loop {
            let position = reader.buffer_position() as u64;
            let event = reader
                .read_event()
                .map_err(|e| Error::malformed(position, e.to_string()))?;
            match event {
                Event::Start(start) | Event::Empty(start) if root.is_some() && open.is_empty() => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    return Err(Error::malformed(position, format!("second root element '{}'", name)));
                }
                Event::Start(start) => {
                    let id = open_node(&mut nodes, &mut scopes, &start, position)?;
                    attach(&mut nodes, &open, id, &mut root);
                    open.push(id);
                }
                Event::Empty(start) => {
                    let id = open_node(&mut nodes, &mut scopes, &start, position)?;
                    attach(&mut nodes, &open, id, &mut root);
                    scopes.pop();
                }
                Event::End(_) => {
                    open.pop();
                    scopes.pop();
                }
                Event::Text(text) => {
                    if let Some(&current) = open.last() {
                        let text = text
                            .unescape()
                            .map_err(|e| Error::malformed(position, e.to_string()))?;
                        let node = &mut nodes[current.0];
                        node.text_segments.push((node.children.len(), text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    if let Some(&current) = open.last() {
                        let data = data.into_inner();
                        let text = str::from_utf8(&data)
                            .map_err(|e| Error::malformed(position, e.to_string()))?;
                        let node = &mut nodes[current.0];
                        node.text_segments.push((node.children.len(), text.to_string()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(&unclosed) = open.last() {
            let node = &nodes[unclosed.0];
            return Err(Error::malformed(
                node.position,
                format!("element '{}' is never closed", node.local_name),
            ));
        }
        let root = root.ok_or_else(|| Error::malformed(0, "document has no root element"))?;
        Ok(XmlDocument { nodes, root })
    }

    pub fn root(&self) -> Element<'_> {
        Element { document: self, id: self.root }
    }

    pub fn element(&self, id: NodeId) -> Element<'_> {
        Element { document: self, id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn attach(nodes: &mut [XmlNode], open: &[NodeId], id: NodeId, root: &mut Option<NodeId>) {
    match open.last() {
        Some(parent) => nodes[parent.0].children.push(id),
        None => *root = Some(id),
    }
}

fn split_name(qualified: &str) -> (Option<&str>, &str) {
    match qualified.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qualified),
    }
}

fn resolve<'s>(scopes: &'s [Vec<(String, String)>], prefix: &str) -> Option<&'s str> {
    scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.iter().rev())
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.as_str())
}

/// Create the node for a start tag and push its namespace scope
fn open_node(
    nodes: &mut Vec<XmlNode>,
    scopes: &mut Vec<Vec<(String, String)>>,
    start: &BytesStart<'_>,
    position: u64,
) -> Result<NodeId> {
    let qualified = str::from_utf8(start.name().as_ref())
        .map_err(|e| Error::malformed(position, e.to_string()))?
        .to_string();

    let mut raw_attributes = Vec::new();
    let mut declarations = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| Error::malformed(position, e.to_string()))?;
        let key = str::from_utf8(attribute.key.as_ref())
            .map_err(|e| Error::malformed(position, e.to_string()))?
            .to_string();
        let value: Cow<'_, str> = attribute
            .unescape_value()
            .map_err(|e| Error::malformed(position, e.to_string()))?;
        if key == "xmlns" {
            declarations.push((String::new(), value.into_owned()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.push((prefix.to_string(), value.into_owned()));
        } else {
            raw_attributes.push((key, value.into_owned()));
        }
    }
    scopes.push(declarations.clone());

    let (prefix, local_name) = split_name(&qualified);
    let namespace = match prefix {
        Some("xml") => Some(XML_NS.to_string()),
        Some(prefix) => Some(
            resolve(scopes, prefix)
                .ok_or_else(|| Error::malformed(position, format!("undeclared namespace prefix '{}'", prefix)))?
                .to_string(),
        ),
        None => resolve(scopes, "").filter(|uri| !uri.is_empty()).map(str::to_string),
    };

    let mut attributes = Vec::with_capacity(raw_attributes.len());
    for (key, value) in raw_attributes {
        let (attribute_prefix, attribute_local) = split_name(&key);
        // Unprefixed attributes are in no namespace, whatever the default namespace is
        let attribute_namespace = match attribute_prefix {
            Some("xml") => Some(XML_NS.to_string()),
            Some(p) => Some(
                resolve(scopes, p)
                    .ok_or_else(|| Error::malformed(position, format!("undeclared namespace prefix '{}'", p)))?
                    .to_string(),
            ),
            None => None,
        };
        attributes.push(XmlAttribute {
            prefix: attribute_prefix.map(str::to_string),
            local_name: attribute_local.to_string(),
            namespace: attribute_namespace,
            value,
        });
    }

    let id = NodeId(nodes.len());
    nodes.push(XmlNode {
        prefix: prefix.map(str::to_string),
        local_name: local_name.to_string(),
        namespace,
        attributes,
        namespace_decls: declarations,
        text_segments: Vec::new(),
        children: Vec::new(),
        position,
    });
    Ok(id)
}

/// One piece of an element's mixed content
#[derive(Debug, Clone)]
pub enum Content<'a> {
    Text(String),
    Child(Element<'a>),
}

/// A borrowed view of one element in a document
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    document: &'a XmlDocument,
    id: NodeId,
}

impl<'a> Element<'a> {
    fn node(&self) -> &'a XmlNode {
        &self.document.nodes[self.id.0]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn local_name(&self) -> &'a str {
        &self.node().local_name
    }

    pub fn prefix(&self) -> Option<&'a str> {
        self.node().prefix.as_deref()
    }

    pub fn namespace(&self) -> Option<&'a str> {
        self.node().namespace.as_deref()
    }

    /// Byte offset of the start tag in the decoded input
    pub fn position(&self) -> u64 {
        self.node().position
    }

    /// Whether this element is `local_name` (case-insensitively) in namespace `ns`
    pub fn is(&self, ns: &str, local_name: &str) -> bool {
        self.namespace() == Some(ns) && self.local_name().eq_ignore_ascii_case(local_name)
    }

    /// Whether this element lives in the process model namespace
    pub fn is_model(&self) -> bool {
        self.namespace() == Some(MODEL_NS)
    }

    pub fn is_engine(&self) -> bool {
        self.namespace() == Some(ENGINE_NS)
    }

    pub fn namespace_decls(&self) -> &'a [(String, String)] {
        &self.node().namespace_decls
    }

    pub fn attributes(&self) -> &'a [XmlAttribute] {
        &self.node().attributes
    }

    /// Value of an attribute in no namespace, matched case-insensitively
    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.attributes()
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// Value of an attribute in namespace `ns`, matched case-insensitively
    pub fn attribute_ns(&self, ns: &str, name: &str) -> Option<&'a str> {
        self.attributes()
            .iter()
            .find(|a| a.namespace.as_deref() == Some(ns) && a.local_name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    pub fn children(&self) -> impl Iterator<Item = Element<'a>> + 'a {
        let document = self.document;
        self.node()
            .children
            .iter()
            .map(move |&id| Element { document, id })
    }

    pub fn has_children(&self) -> bool {
        !self.node().children.is_empty()
    }

    /// First child called `local_name` in namespace `ns`
    pub fn child(&self, ns: &str, local_name: &str) -> Option<Element<'a>> {
        self.children().find(|c| c.is(ns, local_name))
    }

    pub fn children_named<'s>(&self, ns: &'s str, local_name: &'s str) -> impl Iterator<Item = Element<'a>> + 's
    where
        'a: 's,
    {
        self.children().filter(move |c| c.is(ns, local_name))
    }

    /// Character content of the element.
    ///
    /// Leaf elements keep their text verbatim. In elements with children only the
    /// non-blank text runs count, each trimmed, so indentation is not content.
    pub fn text(&self) -> Option<String> {
        let node = self.node();
        let text = if node.children.is_empty() {
            node.text_segments.iter().map(|(_, s)| s.as_str()).collect::<String>()
        } else {
            node.text_segments
                .iter()
                .map(|(_, s)| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("")
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Text runs and child elements in document order.
    ///
    /// Blank runs are left out, adjacent runs (text next to CDATA) are merged.
    /// Returns an empty list unless the element has both children and text.
    pub fn mixed_content(&self) -> Vec<Content<'a>> {
        let node = self.node();
        let has_text = node.text_segments.iter().any(|(_, s)| !s.trim().is_empty());
        if node.children.is_empty() || !has_text {
            return Vec::new();
        }
        let mut content = Vec::new();
        let mut runs = node.text_segments.iter().peekable();
        for position in 0..=node.children.len() {
            let mut text = String::new();
            while let Some((_, run)) = runs.next_if(|(before, _)| *before == position) {
                text.push_str(run);
            }
            if !text.trim().is_empty() {
                content.push(Content::Text(text));
            }
            if let Some(&id) = node.children.get(position) {
                content.push(Content::Child(self.document.element(id)));
            }
        }
        content
    }

    /// Character content with surrounding whitespace removed
    pub fn trimmed_text(&self) -> Option<String> {
        self.text().map(|t| t.trim().to_string())
    }

    /// Start reading this element's attributes, tracking which ones are consumed
    pub fn attribute_reader(&self) -> AttributeReader<'a> {
        AttributeReader {
            element: *self,
            consumed: vec![false; self.attributes().len()],
        }
    }
}

/// Reads the known attributes of an element and hands back the rest as extension attributes
#[derive(Debug)]
pub struct AttributeReader<'a> {
    element: Element<'a>,
    consumed: Vec<bool>,
}

impl<'a> AttributeReader<'a> {
    fn take(&mut self, ns: Option<&str>, name: &str) -> Option<String> {
        let position = self
            .element
            .attributes()
            .iter()
            .position(|a| a.namespace.as_deref() == ns && a.local_name.eq_ignore_ascii_case(name))?;
        self.consumed[position] = true;
        Some(self.element.attributes()[position].value.clone())
    }

    /// A non-empty attribute in no namespace
    pub fn plain(&mut self, name: &str) -> Option<String> {
        self.take(None, name).filter(|v| !v.is_empty())
    }

    /// A non-empty attribute in the engine namespace
    pub fn engine(&mut self, name: &str) -> Option<String> {
        self.take(Some(ENGINE_NS), name).filter(|v| !v.is_empty())
    }

    /// A non-empty attribute in `ns`
    pub fn namespaced(&mut self, ns: &str, name: &str) -> Option<String> {
        self.take(Some(ns), name).filter(|v| !v.is_empty())
    }

    pub fn plain_bool(&mut self, name: &str, default: bool) -> Result<bool> {
        let value = self.plain(name);
        self.to_bool(name, value, default)
    }

    pub fn engine_bool(&mut self, name: &str, default: bool) -> Result<bool> {
        let value = self.engine(name);
        self.to_bool(name, value, default)
    }

    /// Like [`Self::engine_bool`] but keeps the difference between absent and set
    pub fn engine_opt_bool(&mut self, name: &str) -> Result<Option<bool>> {
        match self.engine(name) {
            Some(value) => parse_bool(self.element.local_name(), name, &value).map(Some),
            None => Ok(None),
        }
    }

    fn to_bool(&self, name: &str, value: Option<String>, default: bool) -> Result<bool> {
        match value {
            Some(value) => parse_bool(self.element.local_name(), name, &value),
            None => Ok(default),
        }
    }

    /// Every attribute nobody consumed, as extension attributes
    pub fn into_extensions(self) -> AttributeMap {
        let mut extensions = AttributeMap::new();
        for (attribute, consumed) in self.element.attributes().iter().zip(self.consumed) {
            if consumed {
                continue;
            }
            extensions.push(
                attribute.local_name.clone(),
                ExtensionAttribute {
                    name: attribute.local_name.clone(),
                    value: attribute.value.clone(),
                    namespace: attribute.namespace.clone(),
                    namespace_prefix: attribute.prefix.clone(),
                },
            );
        }
        extensions
    }
}

/// Parse a boolean attribute value; anything but `true`/`false` is an error
pub fn parse_bool(element: &str, attribute: &str, value: &str) -> Result<bool> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(Error::invalid_value(element, attribute, value, "boolean"))
    }
}

/// Split a comma separated attribute into trimmed, non-empty entries
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod test {
    use std::error::Error as StdError;

    use super::*;

    #[test]
    fn empty_input_is_malformed() {
        assert!(matches!(XmlDocument::parse(""), Err(Error::MalformedDocument { .. })));
        assert!(matches!(XmlDocument::parse("   \n"), Err(Error::MalformedDocument { .. })));
    }

    #[test]
    fn unclosed_element_is_malformed() {
        let result = XmlDocument::parse("<a><b></b>");
        assert!(matches!(result, Err(Error::MalformedDocument { .. })));
    }

    #[test]
    fn prefixes_resolve_per_scope() -> std::result::Result<(), Box<dyn StdError>> {
        let doc = XmlDocument::parse(
            r#"<root xmlns="urn:default" xmlns:a="urn:one">
                 <a:item a:attr="1"/>
                 <inner xmlns:a="urn:two"><a:item a:attr="2"/></inner>
               </root>"#,
        )?;
        let root = doc.root();
        assert_eq!(root.namespace(), Some("urn:default"));

        let outer = root.children().next().unwrap();
        assert_eq!(outer.namespace(), Some("urn:one"));
        assert_eq!(outer.attribute_ns("urn:one", "attr"), Some("1"));

        let inner = root.child("urn:default", "inner").unwrap();
        let item = inner.children().next().unwrap();
        assert_eq!(item.namespace(), Some("urn:two"));
        assert_eq!(item.prefix(), Some("a"));
        assert_eq!(item.attribute_ns("urn:two", "attr"), Some("2"));
        Ok(())
    }

    #[test]
    fn text_ignores_indentation_between_children() -> std::result::Result<(), Box<dyn StdError>> {
        let doc = XmlDocument::parse("<a>\n  value<b/>\n</a>")?;
        assert_eq!(doc.root().text().as_deref(), Some("value"));
        let doc = XmlDocument::parse("<a><![CDATA[x < y]]></a>")?;
        assert_eq!(doc.root().text().as_deref(), Some("x < y"));
        Ok(())
    }

    #[test]
    fn mixed_content_keeps_text_between_children() -> std::result::Result<(), Box<dyn StdError>> {
        let doc = XmlDocument::parse("<a>\n  one <b/> two<![CDATA[ & three]]>\n  <c/>\n</a>")?;
        let content = doc.root().mixed_content();
        assert_eq!(content.len(), 4);
        assert!(matches!(&content[0], Content::Text(t) if t == "\n  one "));
        assert!(matches!(&content[1], Content::Child(b) if b.local_name() == "b"));
        assert!(matches!(&content[2], Content::Text(t) if t == " two & three\n  "));
        assert!(matches!(&content[3], Content::Child(c) if c.local_name() == "c"));

        let doc = XmlDocument::parse("<a>\n  <b/>\n</a>")?;
        assert!(doc.root().mixed_content().is_empty());
        Ok(())
    }

    #[test]
    fn attribute_reader_returns_leftovers() -> std::result::Result<(), Box<dyn StdError>> {
        let doc = XmlDocument::parse(r#"<a xmlns:c="urn:custom" id="x" c:version="9" other="y"/>"#)?;
        let mut reader = doc.root().attribute_reader();
        assert_eq!(reader.plain("ID").as_deref(), Some("x"));
        let extensions = reader.into_extensions();
        assert_eq!(extensions.len(), 2);
        let version = extensions.first("version").unwrap();
        assert_eq!(version.namespace.as_deref(), Some("urn:custom"));
        assert_eq!(version.namespace_prefix.as_deref(), Some("c"));
        assert_eq!(version.value, "9");
        Ok(())
    }

    #[test]
    fn booleans_are_validated() {
        assert!(parse_bool("e", "a", "TRUE").unwrap());
        let error = parse_bool("e", "a", "yes").unwrap_err();
        assert!(error.to_string().contains("is not valid boolean"));
    }
}
