//! Read-only board descriptor tree.
//!
//! Every node has a name, a value and ordered children; attributes such as
//! `id`, `name` or `size` are simply children carrying a value. Lookups that
//! miss return a shared empty node whose [`Node::exists`] is `false`, so
//! chained lookups like `root["server"]["address"]` never fail.

use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::error::Result;

static MISSING: Node = Node::missing();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(skip, default = "present")]
    present: bool,
}

fn present() -> bool {
    true
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: String::new(),
            children: Vec::new(),
            present: true,
        }
    }

    pub fn with_data(name: impl Into<String>, data: impl Into<String>) -> Self {
        let mut node = Self::new(name);
        node.data = data.into();
        node
    }

    const fn missing() -> Self {
        Self {
            name: String::new(),
            data: String::new(),
            children: Vec::new(),
            present: false,
        }
    }

    /// Parses a descriptor document from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Appends a value child (`name=value`).
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.children.push(Node::with_data(name, value));
        self
    }

    /// Appends a nested child node.
    pub fn child(mut self, node: Node) -> Self {
        self.children.push(node);
        self
    }

    pub fn exists(&self) -> bool {
        self.present
    }

    pub fn text(&self) -> &str {
        &self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.children.iter()
    }

    /// Children with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |node| node.name == name)
    }

    /// Resolves a `/`-separated path of selectors. Each selector is a child
    /// name, optionally followed by a predicate on one of that child's
    /// values: `rom(id=program)` or `rom(id!=data)`. The first matching
    /// child wins.
    pub fn find(&self, path: &str) -> &Node {
        let mut node = self;
        for selector in path.split('/').filter(|s| !s.is_empty()) {
            node = node.select(selector);
            if !node.exists() {
                return &MISSING;
            }
        }
        node
    }

    fn select(&self, selector: &str) -> &Node {
        let (name, predicate) = match selector.split_once('(') {
            Some((name, rest)) => (name, rest.strip_suffix(')').map(Predicate::parse)),
            None => (selector, None),
        };

        self.children
            .iter()
            .filter(|child| child.name == name)
            .find(|child| predicate.as_ref().map_or(true, |p| p.matches(child)))
            .unwrap_or(&MISSING)
    }
}

impl Index<&str> for Node {
    type Output = Node;

    fn index(&self, path: &str) -> &Node {
        self.find(path)
    }
}

impl<'a> IntoIterator for &'a Node {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}

struct Predicate<'a> {
    key: &'a str,
    value: &'a str,
    negate: bool,
}

impl<'a> Predicate<'a> {
    fn parse(text: &'a str) -> Self {
        if let Some((key, value)) = text.split_once("!=") {
            Predicate { key, value, negate: true }
        } else if let Some((key, value)) = text.split_once('=') {
            Predicate { key, value, negate: false }
        } else {
            Predicate { key: text, value: "", negate: false }
        }
    }

    fn matches(&self, node: &Node) -> bool {
        (node.find(self.key).data == self.value) != self.negate
    }
}
