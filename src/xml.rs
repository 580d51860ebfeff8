//! Document adapter over the backing XML tree.
//!
//! The project descriptor dialect is loosely schematized, so the document is
//! treated as a semi-structured tree rather than a fixed record: everything
//! parsed (known or unknown elements, attributes in order, text, comments)
//! is retained and written back out. The adapter exposes only a narrow
//! capability set (query, create, attach, replace, serialize); the node store
//! itself is private, so a collaborator holding a [`Document`] cannot reach
//! around the contract.
//!
//! ## Structure
//!
//! ```text
//! Document
//! ├── nodes: Vec<NodeData>     (arena; NodeId indexes into it)
//! ├── root: NodeId             (the single document root element)
//! └── decl: Option<XmlDecl>    (XML declaration, preserved from parse)
//! ```
//!
//! Detached nodes (e.g. the old side of a `replace_child`) stay in the arena
//! unreferenced; the arena never shrinks during a document's lifetime.

use std::io::Cursor;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::ProjectError;

/// Handle to one node in a [`Document`]'s arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
enum NodeData {
    Element {
        name: String,
        /// Attribute order is preserved from the source document.
        attributes: Vec<(String, String)>,
        children: Vec<NodeId>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct XmlDecl {
    version: String,
    encoding: Option<String>,
    standalone: Option<String>,
}

/// An owned XML tree with full-fidelity round-tripping.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    decl: Option<XmlDecl>,
}

impl Document {
    // ── Parsing ─────────────────────────────────────────────────────

    /// Parse a byte slice into a tree. Whitespace-only text is dropped;
    /// everything else is kept verbatim.
    pub fn parse(input: &[u8]) -> Result<Self, ProjectError> {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(true);

        let mut nodes: Vec<NodeData> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root: Option<NodeId> = None;
        let mut decl: Option<XmlDecl> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Decl(ref d)) => {
                    decl = Some(read_decl(d)?);
                }
                Ok(Event::Start(ref e)) => {
                    let id = push_element(&mut nodes, e)?;
                    attach(&mut nodes, &stack, &mut root, id)?;
                    stack.push(id);
                }
                Ok(Event::Empty(ref e)) => {
                    let id = push_element(&mut nodes, e)?;
                    attach(&mut nodes, &stack, &mut root, id)?;
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                Ok(Event::Text(ref e)) => {
                    let text = e
                        .unescape()
                        .map_err(|e| ProjectError::xml(format!("text error: {e}")))?
                        .into_owned();
                    let id = NodeId(nodes.len());
                    nodes.push(NodeData::Text(text));
                    attach(&mut nodes, &stack, &mut root, id)?;
                }
                Ok(Event::CData(ref e)) => {
                    let text = std::str::from_utf8(e.as_ref())
                        .map_err(|e| ProjectError::xml(format!("CDATA error: {e}")))?
                        .to_string();
                    let id = NodeId(nodes.len());
                    nodes.push(NodeData::Text(text));
                    attach(&mut nodes, &stack, &mut root, id)?;
                }
                Ok(Event::Comment(ref e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    let id = NodeId(nodes.len());
                    nodes.push(NodeData::Comment(text));
                    attach(&mut nodes, &stack, &mut root, id)?;
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ProjectError::xml(format!(
                        "XML parse error at position {}: {e}",
                        reader.error_position()
                    )));
                }
                _ => {}
            }
            buf.clear();
        }

        let root = root.ok_or_else(|| ProjectError::xml("document has no root element"))?;
        Ok(Self { nodes, root, decl })
    }

    // ── Query ───────────────────────────────────────────────────────

    /// The document root element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Tag name of an element node.
    pub fn name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0] {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// All elements with the given tag name under `node`, recursive,
    /// in document order. `node` itself is not included.
    pub fn find_all(&self, node: NodeId, tag: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(node, tag, &mut out);
        out
    }

    fn walk(&self, node: NodeId, tag: &str, out: &mut Vec<NodeId>) {
        if let NodeData::Element { children, .. } = &self.nodes[node.0] {
            for &child in children {
                if self.name(child) == Some(tag) {
                    out.push(child);
                }
                self.walk(child, tag, out);
            }
        }
    }

    /// Direct element children of `node` with the given tag name.
    pub fn find_children(&self, node: NodeId, tag: &str) -> Vec<NodeId> {
        match &self.nodes[node.0] {
            NodeData::Element { children, .. } => children
                .iter()
                .copied()
                .filter(|&c| self.name(c) == Some(tag))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// An attribute value on an element node.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0] {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Concatenated text content of an element's direct text children.
    /// `None` when the element has no text children at all.
    pub fn text_of(&self, node: NodeId) -> Option<String> {
        let NodeData::Element { children, .. } = &self.nodes[node.0] else {
            return None;
        };
        let mut found = false;
        let mut out = String::new();
        for &child in children {
            if let NodeData::Text(t) = &self.nodes[child.0] {
                found = true;
                out.push_str(t);
            }
        }
        found.then_some(out)
    }

    // ── Mutation ────────────────────────────────────────────────────

    /// Create a detached element node.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::Element {
            name: tag.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        });
        id
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, value: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::Text(value.to_string()));
        id
    }

    /// Set (or replace) an attribute on an element node.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attributes, .. } = &mut self.nodes[node.0] {
            if let Some(entry) = attributes.iter_mut().find(|(k, _)| k == name) {
                entry.1 = value.to_string();
            } else {
                attributes.push((name.to_string(), value.to_string()));
            }
        }
    }

    /// Append a child to an element node.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let NodeData::Element { children, .. } = &mut self.nodes[parent.0] {
            children.push(child);
        }
    }

    /// Replace an element's text content with a single text child. Element
    /// children are kept in place.
    pub fn set_text(&mut self, node: NodeId, value: &str) {
        let NodeData::Element { children, .. } = &self.nodes[node.0] else {
            return;
        };
        let kept: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|c| !matches!(self.nodes[c.0], NodeData::Text(_)))
            .collect();
        let text = self.create_text(value);
        if let NodeData::Element { children, .. } = &mut self.nodes[node.0] {
            *children = kept;
            children.push(text);
        }
    }

    /// Replace `old` with `new` in `parent`'s child list, keeping its
    /// position. Returns `false` when `old` is not a child of `parent`.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> bool {
        if let NodeData::Element { children, .. } = &mut self.nodes[parent.0] {
            if let Some(slot) = children.iter_mut().find(|c| **c == old) {
                *slot = new;
                return true;
            }
        }
        false
    }

    // ── Serialization ───────────────────────────────────────────────

    /// Serialize the tree back to bytes, two-space indented, with the XML
    /// declaration preserved from the original parse.
    pub fn serialize(&self) -> Result<Vec<u8>, ProjectError> {
        let mut buffer = Cursor::new(Vec::new());
        let mut writer = Writer::new_with_indent(&mut buffer, b' ', 2);

        if let Some(decl) = &self.decl {
            writer
                .write_event(Event::Decl(BytesDecl::new(
                    &decl.version,
                    decl.encoding.as_deref(),
                    decl.standalone.as_deref(),
                )))
                .map_err(|e| ProjectError::xml(format!("write error: {e}")))?;
        }

        self.write_node(&mut writer, self.root)?;

        let mut output = buffer.into_inner();
        output.push(b'\n');
        Ok(output)
    }

    fn write_node<W: std::io::Write>(
        &self,
        writer: &mut Writer<W>,
        node: NodeId,
    ) -> Result<(), ProjectError> {
        match &self.nodes[node.0] {
            NodeData::Element {
                name,
                attributes,
                children,
            } => {
                let mut start = BytesStart::new(name);
                for (k, v) in attributes {
                    start.push_attribute((k.as_str(), v.as_str()));
                }
                if children.is_empty() {
                    writer
                        .write_event(Event::Empty(start))
                        .map_err(|e| ProjectError::xml(format!("write error: {e}")))?;
                } else {
                    writer
                        .write_event(Event::Start(start))
                        .map_err(|e| ProjectError::xml(format!("write error: {e}")))?;
                    for &child in children {
                        self.write_node(writer, child)?;
                    }
                    writer
                        .write_event(Event::End(BytesEnd::new(name)))
                        .map_err(|e| ProjectError::xml(format!("write error: {e}")))?;
                }
            }
            NodeData::Text(text) => {
                writer
                    .write_event(Event::Text(BytesText::new(text)))
                    .map_err(|e| ProjectError::xml(format!("write error: {e}")))?;
            }
            NodeData::Comment(text) => {
                writer
                    .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                    .map_err(|e| ProjectError::xml(format!("write error: {e}")))?;
            }
        }
        Ok(())
    }
}

fn read_decl(d: &BytesDecl<'_>) -> Result<XmlDecl, ProjectError> {
    let version = d
        .version()
        .map_err(|e| ProjectError::xml(format!("declaration error: {e}")))?;
    let encoding = match d.encoding() {
        Some(Ok(enc)) => Some(String::from_utf8_lossy(&enc).into_owned()),
        Some(Err(e)) => return Err(ProjectError::xml(format!("declaration error: {e}"))),
        None => None,
    };
    let standalone = match d.standalone() {
        Some(Ok(s)) => Some(String::from_utf8_lossy(&s).into_owned()),
        Some(Err(e)) => return Err(ProjectError::xml(format!("declaration error: {e}"))),
        None => None,
    };
    Ok(XmlDecl {
        version: String::from_utf8_lossy(&version).into_owned(),
        encoding,
        standalone,
    })
}

fn push_element(nodes: &mut Vec<NodeData>, e: &BytesStart<'_>) -> Result<NodeId, ProjectError> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|e| ProjectError::xml(format!("invalid tag name: {e}")))?
        .to_string();

    let mut attributes = Vec::new();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| ProjectError::xml(format!("attribute error: {e}")))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| ProjectError::xml(format!("attribute key error: {e}")))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| ProjectError::xml(format!("attribute value error: {e}")))?
            .into_owned();
        attributes.push((key, value));
    }

    let id = NodeId(nodes.len());
    nodes.push(NodeData::Element {
        name,
        attributes,
        children: Vec::new(),
    });
    Ok(id)
}

/// Hang `id` off the top of the open-element stack, or install it as the
/// document root when the stack is empty.
fn attach(
    nodes: &mut [NodeData],
    stack: &[NodeId],
    root: &mut Option<NodeId>,
    id: NodeId,
) -> Result<(), ProjectError> {
    match stack.last() {
        Some(&parent) => {
            if let NodeData::Element { children, .. } = &mut nodes[parent.0] {
                children.push(id);
            }
            Ok(())
        }
        None => {
            if matches!(nodes[id.0], NodeData::Element { .. }) {
                if root.is_some() {
                    return Err(ProjectError::xml("document has multiple root elements"));
                }
                *root = Some(id);
            }
            // Top-level text/comments outside the root are dropped.
            Ok(())
        }
    }
}
