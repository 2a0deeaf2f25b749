//! The write side of the XML layer: a thin wrapper over `quick_xml::Writer`
//! that tracks namespace bindings per open element and decides between empty
//! and start/end tags once the content of an element is known.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::Result;
use crate::model::extension::AttributeMap;

/// A start tag under construction
#[derive(Debug, Clone)]
pub struct Tag {
    name: String,
    attributes: Vec<(String, String)>,
    /// Namespace bindings the tag needs in scope: `(prefix, uri)`
    required: Vec<(String, String)>,
}

impl Tag {
    /// A tag in the default (process model) namespace
    pub fn new(name: &str) -> Self {
        Tag {
            name: name.to_string(),
            attributes: Vec::new(),
            required: Vec::new(),
        }
    }

    /// A tag bound to `prefix`, which must resolve to `uri`
    pub fn prefixed(prefix: &str, uri: &str, name: &str) -> Self {
        Tag {
            name: format!("{}:{}", prefix, name),
            attributes: Vec::new(),
            required: vec![(prefix.to_string(), uri.to_string())],
        }
    }

    /// A tag with an optional prefix and namespace, as captured from a document
    pub fn qualified(prefix: Option<&str>, uri: Option<&str>, name: &str) -> Self {
        match (prefix, uri) {
            (Some(prefix), Some(uri)) if !prefix.is_empty() => Tag::prefixed(prefix, uri, name),
            (_, Some(uri)) => {
                let mut tag = Tag::new(name);
                tag.required.push((String::new(), uri.to_string()));
                tag
            }
            _ => Tag::new(name),
        }
    }

    pub fn attr(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.attributes.push((name.to_string(), value.as_ref().to_string()));
        self
    }

    pub fn opt_attr(self, name: &str, value: Option<impl AsRef<str>>) -> Self {
        match value {
            Some(value) => self.attr(name, value),
            None => self,
        }
    }

    /// An attribute bound to `prefix`/`uri`
    pub fn ns_attr(mut self, prefix: &str, uri: &str, name: &str, value: impl AsRef<str>) -> Self {
        self.attributes
            .push((format!("{}:{}", prefix, name), value.as_ref().to_string()));
        self.required.push((prefix.to_string(), uri.to_string()));
        self
    }

    pub fn opt_ns_attr(self, prefix: &str, uri: &str, name: &str, value: Option<impl AsRef<str>>) -> Self {
        match value {
            Some(value) => self.ns_attr(prefix, uri, name, value),
            None => self,
        }
    }

    /// An explicit namespace declaration, emitted whether or not it is already in scope
    pub fn declare(mut self, prefix: &str, uri: &str) -> Self {
        let name = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{}", prefix)
        };
        self.attributes.push((name, uri.to_string()));
        self
    }

    /// Append captured extension attributes in their original order
    pub fn extension_attrs(mut self, attributes: &AttributeMap) -> Self {
        for attribute in attributes.values() {
            self = match (&attribute.namespace_prefix, &attribute.namespace) {
                (Some(prefix), Some(uri)) if !prefix.is_empty() => {
                    self.ns_attr(prefix, uri, &attribute.name, &attribute.value)
                }
                _ => self.attr(&attribute.name, &attribute.value),
            };
        }
        self
    }
}

/// Namespace-aware XML emitter
pub struct XmlWriter {
    writer: Writer<Vec<u8>>,
    pending: Option<BytesStart<'static>>,
    open: Vec<String>,
    /// Bindings introduced by each open element
    scopes: Vec<Vec<(String, String)>>,
}

impl XmlWriter {
    pub fn new(indent: usize) -> Self {
        let writer = if indent == 0 {
            Writer::new(Vec::new())
        } else {
            Writer::new_with_indent(Vec::new(), b' ', indent)
        };
        XmlWriter {
            writer,
            pending: None,
            open: Vec::new(),
            scopes: Vec::new(),
        }
    }

    pub fn declaration(&mut self, encoding: &str) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some(encoding), None)))?;
        Ok(())
    }

    fn is_bound(&self, prefix: &str, uri: &str) -> bool {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(p, _)| p == prefix)
            .is_some_and(|(_, bound)| bound == uri)
    }

    fn flush_pending(&mut self) -> Result<()> {
        if let Some(start) = self.pending.take() {
            self.writer.write_event(Event::Start(start))?;
        }
        Ok(())
    }

    /// Open an element; namespace bindings it needs but does not have are declared on it
    pub fn open(&mut self, tag: Tag) -> Result<()> {
        self.flush_pending()?;
        let mut start = BytesStart::new(tag.name.clone());
        let mut scope: Vec<(String, String)> = Vec::new();

        for (name, value) in &tag.attributes {
            let declared = if name == "xmlns" {
                Some(String::new())
            } else {
                name.strip_prefix("xmlns:").map(str::to_string)
            };
            if let Some(prefix) = declared {
                scope.push((prefix, value.clone()));
            }
        }
        for (prefix, uri) in &tag.required {
            let in_scope = scope.iter().any(|(p, u)| p == prefix && u == uri) || self.is_bound(prefix, uri);
            if !in_scope {
                let name = if prefix.is_empty() {
                    "xmlns".to_string()
                } else {
                    format!("xmlns:{}", prefix)
                };
                start.push_attribute((name.as_str(), uri.as_str()));
                scope.push((prefix.clone(), uri.clone()));
            }
        }
        for (name, value) in &tag.attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }

        self.pending = Some(start);
        self.open.push(tag.name);
        self.scopes.push(scope);
        Ok(())
    }

    /// Escaped character content
    pub fn text(&mut self, text: &str) -> Result<()> {
        self.flush_pending()?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    /// Character content in a CDATA section, falling back to escaped text when
    /// the content itself contains a section terminator
    pub fn cdata(&mut self, text: &str) -> Result<()> {
        if text.contains("]]>") {
            return self.text(text);
        }
        self.flush_pending()?;
        self.writer.write_event(Event::CData(BytesCData::new(text)))?;
        Ok(())
    }

    /// Close the innermost open element
    pub fn close(&mut self) -> Result<()> {
        let name = self.open.pop();
        self.scopes.pop();
        match (self.pending.take(), name) {
            (Some(start), _) => self.writer.write_event(Event::Empty(start))?,
            (None, Some(name)) => self.writer.write_event(Event::End(BytesEnd::new(name)))?,
            (None, None) => {}
        }
        Ok(())
    }

    /// Write `<tag>text</tag>` with escaped text
    pub fn text_element(&mut self, tag: Tag, text: &str) -> Result<()> {
        self.open(tag)?;
        self.text(text)?;
        self.close()
    }

    /// Write `<tag><![CDATA[text]]></tag>`
    pub fn cdata_element(&mut self, tag: Tag, text: &str) -> Result<()> {
        self.open(tag)?;
        self.cdata(text)?;
        self.close()
    }

    /// Write an element without content
    pub fn empty(&mut self, tag: Tag) -> Result<()> {
        self.open(tag)?;
        self.close()
    }

    pub fn into_inner(mut self) -> Result<Vec<u8>> {
        while !self.open.is_empty() {
            self.close()?;
        }
        Ok(self.writer.into_inner())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn render(build: impl FnOnce(&mut XmlWriter) -> Result<()>) -> String {
        let mut writer = XmlWriter::new(0);
        build(&mut writer).unwrap();
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn elements_without_content_are_self_closing() {
        let xml = render(|w| w.empty(Tag::new("a").attr("id", "x")));
        assert_eq!(xml, r#"<a id="x"/>"#);
    }

    #[test]
    fn undeclared_prefixes_are_declared_once() {
        let xml = render(|w| {
            w.open(Tag::new("root").declare("c", "urn:c"))?;
            w.empty(Tag::prefixed("c", "urn:c", "inner"))?;
            w.empty(Tag::prefixed("d", "urn:d", "other"))?;
            w.close()
        });
        assert_eq!(
            xml,
            r#"<root xmlns:c="urn:c"><c:inner/><d:other xmlns:d="urn:d"/></root>"#
        );
    }

    #[test]
    fn rebound_prefixes_are_redeclared() {
        let xml = render(|w| {
            w.open(Tag::new("root").declare("c", "urn:one"))?;
            w.empty(Tag::prefixed("c", "urn:two", "inner"))?;
            w.close()
        });
        assert_eq!(xml, r#"<root xmlns:c="urn:one"><c:inner xmlns:c="urn:two"/></root>"#);
    }

    #[test]
    fn text_is_escaped_and_cdata_is_not() {
        let xml = render(|w| {
            w.text_element(Tag::new("a"), "x < y & z")?;
            w.cdata_element(Tag::new("b"), "x < y")
        });
        assert_eq!(xml, "<a>x &lt; y &amp; z</a><b><![CDATA[x < y]]></b>");
    }
}
