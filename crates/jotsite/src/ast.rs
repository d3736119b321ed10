/// A node of a parsed djot document.
///
/// The tree is built once by [`crate::parsing::parse`] and is consumed by
/// rendering: overrides strip one-shot attributes and detach citation links
/// while they walk it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub attributes: Attributes,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Section,
    Heading { level: u16 },
    Paragraph,
    BlockQuote,
    Div,
    CodeBlock { text: String, lang: Option<String> },
    BulletList,
    OrderedList { style: String, start: u64 },
    ListItem,
    DescriptionList,
    Term,
    Definition,
    ThematicBreak,
    Table,
    TableRow,
    TableCell { head: bool },
    Caption,
    RawBlock { format: String, text: String },
    Str { text: String },
    SoftBreak,
    HardBreak,
    Span,
    Emphasis,
    Strong,
    Mark,
    Insert,
    Delete,
    Superscript,
    Subscript,
    Verbatim { text: String },
    Math { display: bool, text: String },
    RawInline { format: String, text: String },
    Symbol { name: String },
    Link { destination: String },
    Url { destination: String },
    Image { destination: Option<String> },
    FootnoteReference { number: usize },
    /// End-of-document list of notes, in order of first reference.
    Footnotes,
    Footnote { number: usize },
}

impl NodeKind {
    pub fn is_image(&self) -> bool {
        matches!(self, NodeKind::Image { .. })
    }

    pub fn is_link(&self) -> bool {
        matches!(self, NodeKind::Link { .. } | NodeKind::Url { .. })
    }
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: Attributes::default(),
            children: Vec::new(),
        }
    }

    pub fn with_children(kind: NodeKind, children: Vec<Node>) -> Self {
        Self {
            kind,
            attributes: Attributes::default(),
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(NodeKind::Str { text: text.into() })
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key, value);
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attributes.has_class(class)
    }

    pub fn add_class(&mut self, class: &str) {
        self.attributes.add_class(class);
    }

    pub fn first_child(&self, predicate: impl Fn(&NodeKind) -> bool) -> Option<&Node> {
        self.children.iter().find(|child| predicate(&child.kind))
    }
}

/// Attribute map of a node. Keys keep their insertion order so rendered
/// attributes come out in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(name, _)| name == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let position = self.entries.iter().position(|(name, _)| name == key)?;
        Some(self.entries.remove(position).1)
    }

    /// Consumes a one-shot attribute: the value is returned once and the key
    /// is gone afterwards.
    pub fn take(&mut self, key: &str) -> Option<String> {
        self.remove(key).filter(|value| !value.is_empty())
    }

    pub fn take_caption(&mut self) -> Option<String> {
        self.take("cap")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get("class")
            .map(|classes| classes.split_whitespace().any(|token| token == class))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, class: &str) {
        let merged = match self.get("class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.insert("class", &merged);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// Concatenated text content of a subtree, ignoring all markup. Breaks
/// contribute a newline. Nothing is escaped.
pub fn flatten_text(node: &Node) -> String {
    let mut buffer = String::new();
    push_text(node, &mut buffer);
    buffer
}

fn push_text(node: &Node, buffer: &mut String) {
    match &node.kind {
        NodeKind::Str { text }
        | NodeKind::Verbatim { text }
        | NodeKind::Math { text, .. }
        | NodeKind::RawInline { text, .. }
        | NodeKind::RawBlock { text, .. }
        | NodeKind::CodeBlock { text, .. } => buffer.push_str(text),
        NodeKind::Url { destination } => buffer.push_str(destination),
        NodeKind::SoftBreak | NodeKind::HardBreak => buffer.push('\n'),
        _ => {
            for child in &node.children {
                push_text(child, buffer);
            }
        }
    }
}
