//! Instruction trees.
//!
//! A template is built once (by the loader, or by `learn` at runtime) and is
//! never mutated afterwards; matches hand out `Arc<Template>` so concurrent
//! requests share it. Elements carry their attributes as sub-trees, so an
//! attribute value may itself be computed (`<get><name><star/></name></get>`).

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Star,
    ThatStar,
    TopicStar,
    Srai,
    Sr,
    Think,
    Get,
    Set,
    Bot,
    Condition,
    Li,
    Loop,
    Random,
    Input,
    That,
    Request,
    Response,
    Date,
    Uppercase,
    Lowercase,
    Formal,
    Sentence,
    Explode,
    Normalize,
    Denormalize,
    Person,
    Person2,
    Gender,
    Map,
    Id,
    Size,
    Vocabulary,
    Program,
    Learn,
    Learnf,
    Eval,
    Category,
    Pattern,
    Template,
    Topic,
    AddTriple,
    DeleteTriple,
    Uniq,
    Select,
    Vars,
    Q,
    NotQ,
    Subj,
    Pred,
    Obj,
    First,
    Rest,
    Test,
    /// Dispatched through the bot's extension registry.
    Custom(String),
}

const NAMED: [(&str, Tag); 53] = [
    ("star", Tag::Star),
    ("thatstar", Tag::ThatStar),
    ("topicstar", Tag::TopicStar),
    ("srai", Tag::Srai),
    ("sr", Tag::Sr),
    ("think", Tag::Think),
    ("get", Tag::Get),
    ("set", Tag::Set),
    ("bot", Tag::Bot),
    ("condition", Tag::Condition),
    ("li", Tag::Li),
    ("loop", Tag::Loop),
    ("random", Tag::Random),
    ("input", Tag::Input),
    ("that", Tag::That),
    ("request", Tag::Request),
    ("response", Tag::Response),
    ("date", Tag::Date),
    ("uppercase", Tag::Uppercase),
    ("lowercase", Tag::Lowercase),
    ("formal", Tag::Formal),
    ("sentence", Tag::Sentence),
    ("explode", Tag::Explode),
    ("normalize", Tag::Normalize),
    ("denormalize", Tag::Denormalize),
    ("person", Tag::Person),
    ("person2", Tag::Person2),
    ("gender", Tag::Gender),
    ("map", Tag::Map),
    ("id", Tag::Id),
    ("size", Tag::Size),
    ("vocabulary", Tag::Vocabulary),
    ("program", Tag::Program),
    ("learn", Tag::Learn),
    ("learnf", Tag::Learnf),
    ("eval", Tag::Eval),
    ("category", Tag::Category),
    ("pattern", Tag::Pattern),
    ("template", Tag::Template),
    ("topic", Tag::Topic),
    ("addtriple", Tag::AddTriple),
    ("deletetriple", Tag::DeleteTriple),
    ("uniq", Tag::Uniq),
    ("select", Tag::Select),
    ("vars", Tag::Vars),
    ("q", Tag::Q),
    ("notq", Tag::NotQ),
    ("subj", Tag::Subj),
    ("pred", Tag::Pred),
    ("obj", Tag::Obj),
    ("first", Tag::First),
    ("rest", Tag::Rest),
    ("test", Tag::Test),
];

impl Tag {
    /// Markup name to tag; unknown names become `Custom`.
    pub fn from_name(name: &str) -> Tag {
        let lower = name.to_lowercase();
        NAMED
            .iter()
            .find(|(n, _)| *n == lower)
            .map(|(_, t)| t.clone())
            .unwrap_or(Tag::Custom(lower))
    }
    pub fn name(&self) -> &str {
        match self {
            Tag::Custom(name) => name,
            tag => NAMED
                .iter()
                .find(|(_, t)| t == tag)
                .map(|(n, _)| *n)
                .unwrap_or("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Element(Element),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Node {
        Node::Text(text.into())
    }
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: Tag,
    pub attributes: Vec<(String, Vec<Node>)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: Tag) -> Self {
        Self { tag, attributes: Vec::new(), children: Vec::new() }
    }
    pub fn named(name: &str) -> Self {
        Self::new(Tag::from_name(name))
    }
    /// Literal attribute.
    pub fn attr(self, name: &str, value: impl Into<String>) -> Self {
        self.attr_nodes(name, vec![Node::Text(value.into())])
    }
    /// Computed attribute.
    pub fn attr_nodes(mut self, name: &str, value: Vec<Node>) -> Self {
        self.attributes.push((name.to_lowercase(), value));
        self
    }
    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }
    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(Node::Text(text.into()))
    }
    pub fn attribute(&self, name: &str) -> Option<&[Node]> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }
    /// Child elements with the given tag, in order.
    pub fn elements<'a>(&'a self, tag: &Tag) -> impl Iterator<Item = &'a Element> + use<'a> {
        let tag = tag.clone();
        self.children
            .iter()
            .filter_map(Node::as_element)
            .filter(move |e| e.tag == tag)
    }
    pub fn element(&self, tag: &Tag) -> Option<&Element> {
        self.elements(tag).next()
    }
    pub fn has_child(&self, tag: &Tag) -> bool {
        self.element(tag).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![Node::Text(text.into())])
    }
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
    pub fn shared(self) -> Arc<Template> {
        Arc::new(self)
    }
}

impl From<Vec<Node>> for Template {
    fn from(nodes: Vec<Node>) -> Self {
        Self::new(nodes)
    }
}

impl From<Element> for Template {
    fn from(element: Element) -> Self {
        Self::new(vec![Node::Element(element)])
    }
}

// ------------- Markup -------------
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn render(nodes: &[Node]) -> String {
    nodes.iter().map(|n| n.to_string()).collect()
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Node::Text(text) => write!(f, "{}", escape(text)),
            Node::Element(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = self.tag.name();
        write!(f, "<{}", name)?;
        // plain text attributes stay attributes, computed ones become sub-elements
        let mut computed = Vec::new();
        for (key, value) in &self.attributes {
            match value.as_slice() {
                [Node::Text(text)] => write!(f, " {}=\"{}\"", key, escape(text).replace('"', "&quot;"))?,
                _ => computed.push((key, value)),
            }
        }
        if computed.is_empty() && self.children.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">")?;
        for (key, value) in computed {
            write!(f, "<{}>{}</{}>", key, render(value), key)?;
        }
        write!(f, "{}</{}>", render(&self.children), name)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", render(&self.nodes))
    }
}
