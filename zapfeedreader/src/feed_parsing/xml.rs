use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};

/// A parsed XML element. The feed formats are small enough that folding the
/// quick-xml event stream into a tree keeps all four parsers straightforward.
#[derive(Debug, Clone)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `content:encoded`.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl XmlElement {
    /// Local part of the qualified name.
    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    fn matches(&self, name: &str) -> bool {
        if name.contains(':') {
            self.name == name
        } else {
            self.local_name() == name
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name || k.split_once(':').map(|(_, l)| l) == Some(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// First direct child element with the given (qualified or local) name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|el| el.matches(name))
    }

    /// Direct child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.child_elements().filter(move |el| el.matches(name))
    }

    /// All descendant elements with the given name, in document order.
    pub fn descendants<'a>(&'a self, name: &'a str) -> Vec<&'a XmlElement> {
        let mut out = Vec::new();
        self.collect_descendants(name, &mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlElement>) {
        for el in self.child_elements() {
            if el.matches(name) {
                out.push(el);
            }
            el.collect_descendants(name, out);
        }
    }

    /// Concatenated text of this element and all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(el) => el.collect_text(out),
            }
        }
    }

    /// Text of the first child element with the given name, or "".
    pub fn child_text(&self, name: &str) -> String {
        self.child(name).map(|el| el.text()).unwrap_or_default()
    }

    /// Serialised markup of the element's children: child elements are written
    /// back as XML, text and CDATA nodes verbatim. This mirrors how embedded
    /// HTML rides inside `description` / `content:encoded` elements.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(el) => el.write_xml(&mut out),
            }
        }
        out
    }

    pub fn inner_xml_of(&self, name: &str) -> String {
        self.child(name).map(|el| el.inner_xml()).unwrap_or_default()
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attributes {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape_attr(v));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str(" />");
            return;
        }
        out.push('>');
        for node in &self.children {
            match node {
                XmlNode::Text(t) => out.push_str(&escape_text(t)),
                XmlNode::Element(el) => el.write_xml(out),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

/// Parses a complete XML document and returns its document element.
pub fn parse_document(data: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(data);
    reader.trim_text(false);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                stack.push(element_from_start(&e)?);
            }
            Ok(Event::Empty(e)) => {
                let el = element_from_start(&e)?;
                attach(&mut stack, &mut root, el)?;
            }
            Ok(Event::End(_)) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| Error::Parse("Unbalanced closing tag".into()))?;
                attach(&mut stack, &mut root, el)?;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::Parse(e.to_string()))?
                    .into_owned();
                if let Some(parent) = stack.last_mut() {
                    if !text.is_empty() {
                        parent.children.push(XmlNode::Text(text));
                    }
                }
            }
            Ok(Event::CData(t)) => {
                let text = String::from_utf8_lossy(&t).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(text));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {} // declarations, comments, processing instructions
            Err(e) => return Err(Error::Parse(e.to_string())),
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(Error::Parse("Unexpected end of XML document".into()));
    }
    root.ok_or_else(|| Error::Parse("Empty XML document".into()))
}

fn element_from_start(e: &quick_xml::events::BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Parse(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, el: XmlElement) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(el));
    } else if root.is_none() {
        *root = Some(el);
    } else {
        return Err(Error::Parse("Multiple document elements".into()));
    }
    Ok(())
}
