//! Owned XML tree over `quick-xml` events
//!
//! Text and attribute values are kept exactly as they appear in the source
//! (still escaped), so a parse/serialize cycle only normalizes quoting and
//! empty-element syntax. Values coming from outside the document must go
//! through [`escape`] before they are stored.

use crate::error::ReportError;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;

/// One node of the tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Escaped character data
    Text(String),
    /// Declarations, comments, processing instructions and CDATA, verbatim
    Raw(String),
}

impl Node {
    /// Text node from unescaped content
    pub fn text(content: &str) -> Self {
        Node::Text(escape(content).into_owned())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Qualified name, e.g. `table:table`
    pub name: String,
    /// Attributes in document order, values escaped
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute from an unescaped value
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Unescaped attribute value
    pub fn attr(&self, name: &str) -> Option<Cow<'_, str>> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| unescape(v).unwrap_or(Cow::Borrowed(v.as_str())))
    }

    /// Set an attribute from an unescaped value, replacing any existing one
    pub fn set_attr(&mut self, name: &str, value: &str) {
        let escaped = escape(value).into_owned();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = escaped,
            None => self.attrs.push((name.to_string(), escaped)),
        }
    }

    /// Whether this is a `name` element with attribute `attr` equal to `value`
    pub fn matches(&self, name: &str, attr: &str, value: &str) -> bool {
        self.is(name) && self.attr(attr).as_deref() == Some(value)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First element in depth-first order, including `self`
    pub fn find<P>(&self, pred: &P) -> Option<&Element>
    where
        P: Fn(&Element) -> bool,
    {
        if pred(self) {
            return Some(self);
        }
        self.child_elements().find_map(|c| c.find(pred))
    }

    pub fn find_mut<P>(&mut self, pred: &P) -> Option<&mut Element>
    where
        P: Fn(&Element) -> bool,
    {
        if pred(self) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find_map(|c| c.find_mut(pred))
    }

    pub fn find_named(&self, name: &str) -> Option<&Element> {
        self.find(&|e: &Element| e.is(name))
    }

    pub fn find_named_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.find_mut(&|e: &Element| e.is(name))
    }

    /// Replace the first matching descendant (not `self`) with `replacement`
    pub fn replace_first<P>(&mut self, pred: &P, replacement: Element) -> Result<(), Element>
    where
        P: Fn(&Element) -> bool,
    {
        let mut replacement = Some(replacement);
        self.replace_first_inner(pred, &mut replacement);
        match replacement {
            None => Ok(()),
            Some(unused) => Err(unused),
        }
    }

    fn replace_first_inner<P>(&mut self, pred: &P, replacement: &mut Option<Element>)
    where
        P: Fn(&Element) -> bool,
    {
        for child in &mut self.children {
            let Node::Element(e) = child else { continue };
            if pred(e) {
                if let Some(new) = replacement.take() {
                    *e = new;
                }
                return;
            }
            e.replace_first_inner(pred, replacement);
            if replacement.is_none() {
                return;
            }
        }
    }

    /// Remove every matching descendant, returning how many were removed
    pub fn remove_all<P>(&mut self, pred: &P) -> usize
    where
        P: Fn(&Element) -> bool,
    {
        let before = self.children.len();
        self.children
            .retain(|c| !matches!(c, Node::Element(e) if pred(e)));
        let mut removed = before - self.children.len();
        for child in self.children.iter_mut().filter_map(Node::as_element_mut) {
            removed += child.remove_all(pred);
        }
        removed
    }

    /// Visit `self` and every descendant element
    pub fn visit_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Element),
    {
        f(self);
        for child in self.children.iter_mut().filter_map(Node::as_element_mut) {
            child.visit_mut(f);
        }
    }

    /// Replace `from` with the escaped form of `to` in every text node and
    /// attribute value of this subtree
    pub fn replace_in_text(&mut self, from: &str, to: &str) -> usize {
        if from.is_empty() {
            return 0;
        }
        let to = escape(to);
        let mut hits = 0;
        self.replace_in_text_inner(from, &to, &mut hits);
        hits
    }

    fn replace_in_text_inner(&mut self, from: &str, to: &str, hits: &mut usize) {
        for (_, value) in &mut self.attrs {
            replace_counted(value, from, to, hits);
        }
        for child in &mut self.children {
            match child {
                Node::Element(e) => e.replace_in_text_inner(from, to, hits),
                Node::Text(t) => replace_counted(t, from, to, hits),
                Node::Raw(_) => {}
            }
        }
    }

    /// Insert `node` right before the first direct child named `anchor`, or at
    /// the end
    pub fn insert_before_child(&mut self, anchor: &str, node: Node) {
        let at = self
            .children
            .iter()
            .position(|c| matches!(c, Node::Element(e) if e.is(anchor)))
            .unwrap_or(self.children.len());
        self.children.insert(at, node);
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            if v.contains('"') {
                out.push_str(&v.replace('"', "&quot;"));
            } else {
                out.push_str(v);
            }
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            write_node(child, out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn replace_counted(value: &mut String, from: &str, to: &str, hits: &mut usize) {
    let n = value.matches(from).count();
    if n > 0 {
        *value = value.replace(from, to);
        *hits += n;
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Element(e) => e.write_to(out),
        Node::Text(t) | Node::Raw(t) => out.push_str(t),
    }
}

/// A parsed XML entry of the archive
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Declaration, comments and whitespace before the root
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

impl Document {
    /// Parse `text`; `entry` names the archive entry in errors
    pub fn parse(text: &str, entry: &str) -> Result<Self, ReportError> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut top: Vec<Node> = Vec::new();

        loop {
            let event = reader
                .read_event()
                .map_err(|e| ReportError::xml(entry, format!("at byte {}: {}", reader.buffer_position(), e)))?;

            let node = match event {
                Event::Start(e) => {
                    stack.push(element_from(&e, entry)?);
                    continue;
                }
                Event::End(_) => match stack.pop() {
                    Some(e) => Node::Element(e),
                    None => return Err(ReportError::xml(entry, "unbalanced end tag")),
                },
                Event::Empty(e) => Node::Element(element_from(&e, entry)?),
                Event::Text(t) => Node::Text(String::from_utf8_lossy(&t).into_owned()),
                Event::CData(t) => Node::Raw(format!("<![CDATA[{}]]>", String::from_utf8_lossy(&t))),
                Event::Comment(t) => Node::Raw(format!("<!--{}-->", String::from_utf8_lossy(&t))),
                Event::Decl(d) => Node::Raw(format!("<?{}?>", String::from_utf8_lossy(&d))),
                Event::PI(p) => Node::Raw(format!("<?{}?>", String::from_utf8_lossy(&p))),
                Event::DocType(t) => Node::Raw(format!("<!DOCTYPE {}>", String::from_utf8_lossy(&t))),
                Event::Eof => break,
            };

            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => top.push(node),
            }
        }

        if let Some(open) = stack.last() {
            return Err(ReportError::xml(entry, format!("unclosed element <{}>", open.name)));
        }

        let Some(at) = top.iter().position(|n| matches!(n, Node::Element(_))) else {
            return Err(ReportError::xml(entry, "no root element"));
        };
        let epilog = top.split_off(at + 1);
        let root = match top.pop() {
            Some(Node::Element(root)) => root,
            _ => return Err(ReportError::xml(entry, "no root element")),
        };

        Ok(Self { prolog: top, root, epilog })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Whether the root element declares namespace prefix `prefix`
    pub fn declares_prefix(&self, prefix: &str) -> bool {
        let attr = format!("xmlns:{}", prefix);
        self.root().attrs.iter().any(|(k, _)| *k == attr)
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        for node in &self.prolog {
            write_node(node, &mut out);
        }
        self.root.write_to(&mut out);
        for node in &self.epilog {
            write_node(node, &mut out);
        }
        out
    }
}

fn element_from(start: &BytesStart<'_>, entry: &str) -> Result<Element, ReportError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ReportError::xml(entry, e))?;
        element.attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            String::from_utf8_lossy(&attr.value).into_owned(),
        ));
    }
    Ok(element)
}
