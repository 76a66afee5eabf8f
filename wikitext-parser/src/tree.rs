//! Syntax tree arena
//!
//!     A parsed document is a flat vector of nodes in document (preorder) order. Every node
//!     records its absolute byte span in the source text, its parent and its children, so
//!     consumers can walk the tree in either direction without reference counting.
//!
//!     The tree is immutable once built. Language server features capture it behind an `Arc`
//!     and keep using it even after a newer parse has replaced it.
//!
//!     Node handles ([`Node`]) borrow the tree and are `Copy`, which keeps traversal code free
//!     of lifetimes beyond the tree itself.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;

/// Structural category of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Root,
    Text,
    Comment,
    Heading,
    HeadingTitle,
    Template,
    TemplateName,
    MagicWord,
    MagicWordName,
    Parameter,
    ParameterKey,
    ParameterValue,
    Arg,
    ArgName,
    ArgDefault,
    Link,
    FileLink,
    LinkTarget,
    LinkText,
    ImageParameter,
    ExtLink,
    ExtLinkUrl,
    ExtLinkText,
    FreeExtLink,
    MagicLink,
    Html,
    Ext,
    ExtInner,
    Attribute,
    AttrKey,
    AttrValue,
    DoubleUnderscore,
    Table,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Text => "text",
            NodeKind::Comment => "comment",
            NodeKind::Heading => "heading",
            NodeKind::HeadingTitle => "heading-title",
            NodeKind::Template => "template",
            NodeKind::TemplateName => "template-name",
            NodeKind::MagicWord => "magic-word",
            NodeKind::MagicWordName => "magic-word-name",
            NodeKind::Parameter => "parameter",
            NodeKind::ParameterKey => "parameter-key",
            NodeKind::ParameterValue => "parameter-value",
            NodeKind::Arg => "arg",
            NodeKind::ArgName => "arg-name",
            NodeKind::ArgDefault => "arg-default",
            NodeKind::Link => "link",
            NodeKind::FileLink => "file",
            NodeKind::LinkTarget => "link-target",
            NodeKind::LinkText => "link-text",
            NodeKind::ImageParameter => "image-parameter",
            NodeKind::ExtLink => "ext-link",
            NodeKind::ExtLinkUrl => "ext-link-url",
            NodeKind::ExtLinkText => "ext-link-text",
            NodeKind::FreeExtLink => "free-ext-link",
            NodeKind::MagicLink => "magic-link",
            NodeKind::Html => "html",
            NodeKind::Ext => "ext",
            NodeKind::ExtInner => "ext-inner",
            NodeKind::Attribute => "attr",
            NodeKind::AttrKey => "attr-key",
            NodeKind::AttrValue => "attr-value",
            NodeKind::DoubleUnderscore => "double-underscore",
            NodeKind::Table => "table",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of a node inside its [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    kind: NodeKind,
    span: Range<usize>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    name: Option<String>,
    level: u8,
    flags: Flags,
}

/// Per-node markers set by the parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Flags {
    /// The construct has its terminator (`-->`, `</ref>`, `|}`).
    pub closed: bool,
    /// `</tag>` form.
    pub closing: bool,
    /// `<tag/>` form.
    pub selfclosing: bool,
    /// A template parameter without an explicit key.
    pub anonymous: bool,
}

/// Node under construction. The parser builds a nested draft and
/// [`SyntaxTree::from_draft`] flattens it into the arena.
#[derive(Debug, Clone)]
pub(crate) struct Draft {
    pub kind: NodeKind,
    pub span: Range<usize>,
    pub name: Option<String>,
    pub level: u8,
    pub flags: Flags,
    pub children: Vec<Draft>,
}

impl Draft {
    pub fn new(kind: NodeKind, span: Range<usize>) -> Self {
        Self {
            kind,
            span,
            name: None,
            level: 0,
            flags: Flags {
                closed: true,
                ..Flags::default()
            },
            children: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Draft>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    text: Arc<str>,
    nodes: Vec<NodeData>,
}

impl SyntaxTree {
    pub(crate) fn from_draft(text: Arc<str>, root: Draft) -> Self {
        let mut nodes: Vec<NodeData> = Vec::new();
        let mut stack = vec![(root, None::<NodeId>)];
        while let Some((draft, parent)) = stack.pop() {
            let id = NodeId(nodes.len());
            if let Some(parent) = parent {
                nodes[parent.0].children.push(id);
            }
            let Draft {
                kind,
                span,
                name,
                level,
                flags,
                children,
            } = draft;
            nodes.push(NodeData {
                kind,
                span,
                parent,
                children: Vec::with_capacity(children.len()),
                name,
                level,
                flags,
            });
            stack.extend(children.into_iter().rev().map(|child| (child, Some(id))));
        }
        Self { text, nodes }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    pub fn root(&self) -> Node<'_> {
        Node {
            tree: self,
            id: NodeId(0),
        }
    }

    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node { tree: self, id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node in document order.
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> {
        (0..self.nodes.len()).map(move |idx| self.node(NodeId(idx)))
    }

    /// Every node of `kind` in document order.
    pub fn query(&self, kind: NodeKind) -> impl Iterator<Item = Node<'_>> {
        self.nodes().filter(move |node| node.kind() == kind)
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }
}

/// Borrowed handle to one node of a [`SyntaxTree`].
#[derive(Clone, Copy)]
pub struct Node<'a> {
    tree: &'a SyntaxTree,
    id: NodeId,
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind())
            .field("span", &self.span())
            .field("name", &self.name())
            .finish()
    }
}

impl<'a> Node<'a> {
    fn data(&self) -> &'a NodeData {
        self.tree.data(self.id)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a SyntaxTree {
        self.tree
    }

    pub fn kind(&self) -> NodeKind {
        self.data().kind
    }

    pub fn is(&self, kind: NodeKind) -> bool {
        self.kind() == kind
    }

    /// Absolute byte offset of the first byte.
    pub fn start(&self) -> usize {
        self.data().span.start
    }

    pub fn end(&self) -> usize {
        self.data().span.end
    }

    pub fn len(&self) -> usize {
        self.end() - self.start()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn span(&self) -> Range<usize> {
        self.data().span.clone()
    }

    /// Offset from the start of the parent, zero for the root.
    pub fn relative_start(&self) -> usize {
        self.parent()
            .map_or(0, |parent| self.start() - parent.start())
    }

    pub fn text(&self) -> &'a str {
        &self.tree.text[self.data().span.clone()]
    }

    /// Normalized name: page title for links and templates, canonical magic word,
    /// lowercase tag or attribute name, parameter key.
    pub fn name(&self) -> Option<&'a str> {
        self.data().name.as_deref()
    }

    /// Heading level, zero for everything else.
    pub fn level(&self) -> u8 {
        self.data().level
    }

    pub fn is_closed(&self) -> bool {
        self.data().flags.closed
    }

    pub fn is_closing(&self) -> bool {
        self.data().flags.closing
    }

    pub fn is_selfclosing(&self) -> bool {
        self.data().flags.selfclosing
    }

    pub fn is_anonymous(&self) -> bool {
        self.data().flags.anonymous
    }

    pub fn parent(&self) -> Option<Node<'a>> {
        self.data().parent.map(|id| self.tree.node(id))
    }

    pub fn ancestors(&self) -> impl Iterator<Item = Node<'a>> {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = Node<'a>> + ExactSizeIterator {
        let tree = self.tree;
        self.data().children.iter().map(move |id| tree.node(*id))
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    pub fn child(&self, index: usize) -> Option<Node<'a>> {
        self.data()
            .children
            .get(index)
            .map(|id| self.tree.node(*id))
    }

    pub fn first_child(&self) -> Option<Node<'a>> {
        self.child(0)
    }

    pub fn last_child(&self) -> Option<Node<'a>> {
        self.data()
            .children
            .last()
            .map(|id| self.tree.node(*id))
    }

    pub fn find_child(&self, kind: NodeKind) -> Option<Node<'a>> {
        self.children().find(|child| child.kind() == kind)
    }

    /// Position among the parent's children.
    pub fn index(&self) -> usize {
        self.parent()
            .and_then(|parent| parent.data().children.iter().position(|id| *id == self.id))
            .unwrap_or(0)
    }

    /// Strict descendants in document order.
    pub fn descendants(&self) -> impl Iterator<Item = Node<'a>> {
        let tree = self.tree;
        let end = self.subtree_end();
        (self.id.0 + 1..end).map(move |idx| tree.node(NodeId(idx)))
    }

    // Preorder storage keeps every subtree contiguous.
    fn subtree_end(&self) -> usize {
        let mut node = *self;
        loop {
            if let Some(last) = node.last_child() {
                node = last;
            } else {
                return node.id.0 + 1;
            }
        }
    }

    /// Source text with comments removed.
    pub fn plain_text(&self) -> String {
        let mut out = String::with_capacity(self.len());
        let mut cursor = self.start();
        for comment in self.descendants().filter(|node| node.is(NodeKind::Comment)) {
            if comment.start() < cursor {
                continue;
            }
            out.push_str(&self.tree.text[cursor..comment.start()]);
            cursor = comment.end();
        }
        out.push_str(&self.tree.text[cursor..self.end()]);
        out
    }

    /// Inner text of an extension tag, `None` for other nodes and self-closed tags.
    pub fn inner(&self) -> Option<Node<'a>> {
        if self.is(NodeKind::Ext) {
            self.find_child(NodeKind::ExtInner)
        } else {
            None
        }
    }

    /// Attribute value by key, for html tags, extension tags and tables.
    pub fn attribute(&self, key: &str) -> Option<Node<'a>> {
        self.children()
            .filter(|child| child.is(NodeKind::Attribute))
            .find(|attr| attr.name() == Some(key))
            .and_then(|attr| attr.find_child(NodeKind::AttrValue))
    }
}
