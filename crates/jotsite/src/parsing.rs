use crate::ast::{Node, NodeKind};
use crate::types::Lang;
use chrono::NaiveDate;
use jotdown::{
    Attributes, Container, Event, LinkType, ListKind, OrderedListNumbering, OrderedListStyle,
};

pub const SOURCE_EXTENSION: &str = "dj";

enum Frame {
    Open { node: Node, tight: bool },
    Note { label: String, node: Node },
    Splice,
    Discard,
}

/// Builds an owned [`Node`] tree out of the flat event stream of the djot
/// parser. Every `Start` pushes exactly one frame and every `End` pops one.
struct TreeBuilder {
    stack: Vec<Frame>,
    discarding: usize,
    /// Footnote labels in order of first reference. A note's number is its
    /// position here plus one.
    note_labels: Vec<String>,
    notes: Vec<(String, Node)>,
}

pub fn parse(source: &str) -> Node {
    let mut builder = TreeBuilder::new();
    for event in jotdown::Parser::new(source) {
        builder.push(event);
    }
    builder.finish()
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame::Open {
                node: Node::new(NodeKind::Document),
                tight: false,
            }],
            discarding: 0,
            note_labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn note_number(&mut self, label: &str) -> usize {
        match self.note_labels.iter().position(|known| known == label) {
            Some(index) => index + 1,
            None => {
                self.note_labels.push(label.to_string());
                self.note_labels.len()
            }
        }
    }

    fn push(&mut self, event: Event<'_>) {
        match event {
            Event::Start(container, attributes) => self.start(container, attributes),
            Event::End { .. } => self.end(),
            _ if self.discarding > 0 => {}
            Event::Str(text) => self.attach(Node::text(&*text)),
            Event::Symbol(name) => self.attach(Node::new(NodeKind::Symbol {
                name: name.to_string(),
            })),
            Event::LeftSingleQuote => self.attach(Node::text("\u{2018}")),
            Event::RightSingleQuote => self.attach(Node::text("\u{2019}")),
            Event::LeftDoubleQuote => self.attach(Node::text("\u{201c}")),
            Event::RightDoubleQuote => self.attach(Node::text("\u{201d}")),
            Event::Ellipsis => self.attach(Node::text("\u{2026}")),
            Event::EnDash => self.attach(Node::text("\u{2013}")),
            Event::EmDash => self.attach(Node::text("\u{2014}")),
            Event::NonBreakingSpace => self.attach(Node::text("\u{a0}")),
            Event::Softbreak => self.attach(Node::new(NodeKind::SoftBreak)),
            Event::Hardbreak => self.attach(Node::new(NodeKind::HardBreak)),
            Event::FootnoteReference(label) => {
                let number = self.note_number(&label);
                self.attach(Node::new(NodeKind::FootnoteReference { number }));
            }
            Event::ThematicBreak(attributes) => {
                let mut node = Node::new(NodeKind::ThematicBreak);
                merge_attributes(&mut node, &attributes);
                self.attach(node);
            }
            _ => {}
        }
    }

    fn start(&mut self, container: Container<'_>, attributes: Attributes<'_>) {
        if self.discarding > 0 {
            self.discarding += 1;
            self.stack.push(Frame::Discard);
            return;
        }

        let mut tight = false;
        let mut node = match container {
            Container::Blockquote => Node::new(NodeKind::BlockQuote),
            Container::List { kind, tight: is_tight } => {
                tight = is_tight;
                match kind {
                    ListKind::Ordered {
                        numbering,
                        style,
                        start,
                    } => Node::new(NodeKind::OrderedList {
                        style: list_marker(numbering, style),
                        start,
                    }),
                    _ => Node::new(NodeKind::BulletList),
                }
            }
            Container::ListItem | Container::TaskListItem { .. } => Node::new(NodeKind::ListItem),
            Container::DescriptionList => Node::new(NodeKind::DescriptionList),
            Container::DescriptionTerm => Node::new(NodeKind::Term),
            Container::DescriptionDetails => Node::new(NodeKind::Definition),
            Container::Table => Node::new(NodeKind::Table),
            Container::TableRow { .. } => Node::new(NodeKind::TableRow),
            Container::TableCell { head, .. } => Node::new(NodeKind::TableCell { head }),
            Container::Caption => Node::new(NodeKind::Caption),
            Container::Section { id } => Node::new(NodeKind::Section).attr("id", &id),
            Container::Div { class } => {
                let mut node = Node::new(NodeKind::Div);
                if !class.is_empty() {
                    node.add_class(&class);
                }
                node
            }
            Container::Paragraph => Node::new(NodeKind::Paragraph),
            Container::Heading {
                level,
                has_section,
                id,
            } => {
                let node = Node::new(NodeKind::Heading { level });
                if !has_section && !id.is_empty() {
                    node.attr("id", &id)
                } else {
                    node
                }
            }
            Container::CodeBlock { language } => Node::new(NodeKind::CodeBlock {
                text: String::new(),
                lang: Some(language.to_string()).filter(|lang| !lang.is_empty()),
            }),
            Container::RawBlock { format } => Node::new(NodeKind::RawBlock {
                format: format.to_string(),
                text: String::new(),
            }),
            Container::Span => Node::new(NodeKind::Span),
            Container::Link(destination, LinkType::AutoLink) => Node::new(NodeKind::Url {
                destination: destination.to_string(),
            }),
            Container::Link(destination, LinkType::Email) => Node::new(NodeKind::Link {
                destination: format!("mailto:{destination}"),
            }),
            Container::Link(destination, LinkType::Span(_)) => Node::new(NodeKind::Link {
                destination: destination.to_string(),
            }),
            Container::Image(destination, _) => Node::new(NodeKind::Image {
                destination: Some(destination.to_string()).filter(|dst| !dst.is_empty()),
            }),
            Container::Verbatim => Node::new(NodeKind::Verbatim {
                text: String::new(),
            }),
            Container::Math { display } => Node::new(NodeKind::Math {
                display,
                text: String::new(),
            }),
            Container::RawInline { format } => Node::new(NodeKind::RawInline {
                format: format.to_string(),
                text: String::new(),
            }),
            Container::Subscript => Node::new(NodeKind::Subscript),
            Container::Superscript => Node::new(NodeKind::Superscript),
            Container::Insert => Node::new(NodeKind::Insert),
            Container::Delete => Node::new(NodeKind::Delete),
            Container::Strong => Node::new(NodeKind::Strong),
            Container::Emphasis => Node::new(NodeKind::Emphasis),
            Container::Mark => Node::new(NodeKind::Mark),
            Container::Footnote { label } => {
                let mut node = Node::new(NodeKind::Footnote { number: 0 });
                merge_attributes(&mut node, &attributes);
                self.stack.push(Frame::Note {
                    label: label.to_string(),
                    node,
                });
                return;
            }
            Container::LinkDefinition { .. } => {
                self.discarding += 1;
                self.stack.push(Frame::Discard);
                return;
            }
            _ => {
                self.stack.push(Frame::Splice);
                return;
            }
        };

        merge_attributes(&mut node, &attributes);
        self.stack.push(Frame::Open { node, tight });
    }

    fn end(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        match self.stack.pop() {
            Some(Frame::Open { mut node, tight }) => {
                if tight {
                    unwrap_tight_items(&mut node);
                }
                if let NodeKind::Url { .. } = node.kind {
                    node.children.clear();
                }
                self.attach(node);
            }
            Some(Frame::Note { label, node }) => self.notes.push((label, node)),
            Some(Frame::Discard) => self.discarding -= 1,
            Some(Frame::Splice) | None => {}
        }
    }

    fn attach(&mut self, child: Node) {
        let Some(parent) = self.stack.iter_mut().rev().find_map(|frame| match frame {
            Frame::Open { node, .. } | Frame::Note { node, .. } => Some(node),
            _ => None,
        }) else {
            return;
        };

        if let NodeKind::Str { text: piece } = &child.kind {
            match &mut parent.kind {
                NodeKind::CodeBlock { text, .. }
                | NodeKind::Verbatim { text }
                | NodeKind::Math { text, .. }
                | NodeKind::RawBlock { text, .. }
                | NodeKind::RawInline { text, .. } => {
                    text.push_str(piece);
                    return;
                }
                _ => {}
            }
            if child.attributes.is_empty()
                && let Some(Node {
                    kind: NodeKind::Str { text },
                    attributes,
                    ..
                }) = parent.children.last_mut()
                && attributes.is_empty()
            {
                text.push_str(piece);
                return;
            }
        }

        parent.children.push(child);
    }

    fn finish(mut self) -> Node {
        while self.stack.len() > 1 {
            self.end();
        }
        let mut document = match self.stack.pop() {
            Some(Frame::Open { node, .. }) => node,
            _ => Node::new(NodeKind::Document),
        };

        if !self.note_labels.is_empty() {
            let mut notes = Vec::with_capacity(self.note_labels.len());
            for (index, label) in self.note_labels.iter().enumerate() {
                let number = index + 1;
                let note = match self.notes.iter().position(|(known, _)| known == label) {
                    Some(position) => {
                        let (_, mut note) = self.notes.swap_remove(position);
                        note.kind = NodeKind::Footnote { number };
                        note
                    }
                    None => Node::new(NodeKind::Footnote { number }),
                };
                notes.push(note);
            }
            document
                .children
                .push(Node::with_children(NodeKind::Footnotes, notes));
        }

        document
    }
}

fn merge_attributes(node: &mut Node, attributes: &Attributes<'_>) {
    for (key, value) in attributes.unique_pairs() {
        let value = value.to_string();
        if key == "class" {
            for class in value.split_whitespace() {
                node.add_class(class);
            }
        } else {
            node.attributes.insert(key, &value);
        }
    }
}

fn list_marker(numbering: OrderedListNumbering, style: OrderedListStyle) -> String {
    let number = match numbering {
        OrderedListNumbering::Decimal => "1",
        OrderedListNumbering::AlphaLower => "a",
        OrderedListNumbering::AlphaUpper => "A",
        OrderedListNumbering::RomanLower => "i",
        OrderedListNumbering::RomanUpper => "I",
    };
    match style {
        OrderedListStyle::Period => format!("{number}."),
        OrderedListStyle::Paren => format!("{number})"),
        OrderedListStyle::ParenParen => format!("({number})"),
    }
}

fn unwrap_tight_items(list: &mut Node) {
    for item in &mut list.children {
        let children = std::mem::take(&mut item.children);
        for child in children {
            if child.kind == NodeKind::Paragraph {
                item.children.extend(child.children);
            } else {
                item.children.push(child);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostName {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub slug: String,
    pub lang: Lang,
}

impl PostName {
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

/// Recognises `YYYY-MM-DD-slug[.lang].dj` naming a real calendar date. A
/// missing language suffix means English.
pub fn parse_post_filename(filename: &str) -> Option<PostName> {
    post_shape(filename).filter(|name| name.date().is_some())
}

/// True when `filename` is laid out like a post, whether or not its date
/// exists.
pub fn has_post_shape(filename: &str) -> bool {
    post_shape(filename).is_some()
}

fn post_shape(filename: &str) -> Option<PostName> {
    let name = filename.strip_suffix(&format!(".{SOURCE_EXTENSION}"))?;

    let (name, lang) = if let Some(stem) = name.strip_suffix(".zh") {
        (stem, Lang::Zh)
    } else if let Some(stem) = name.strip_suffix(".en") {
        (stem, Lang::En)
    } else {
        (name, Lang::En)
    };

    let bytes = name.as_bytes();
    if bytes.len() < 12 {
        return None;
    }

    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    if !digits(0..4) || !digits(5..7) || !digits(8..10) {
        return None;
    }
    if bytes[4] != b'-' || bytes[7] != b'-' || bytes[10] != b'-' {
        return None;
    }

    Some(PostName {
        year: name[..4].parse().ok()?,
        month: name[5..7].parse().ok()?,
        day: name[8..10].parse().ok()?,
        slug: name[11..].to_string(),
        lang,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::flatten_text;

    #[test]
    fn test_parse_post_filename() {
        assert_eq!(
            parse_post_filename("2024-03-10-hello.dj"),
            Some(PostName {
                year: 2024,
                month: 3,
                day: 10,
                slug: "hello".to_string(),
                lang: Lang::En,
            })
        );
    }

    #[test]
    fn test_parse_post_filename_language_suffix() {
        let zh = parse_post_filename("2024-03-10-hello.zh.dj").unwrap();
        assert_eq!(zh.lang, Lang::Zh);
        assert_eq!(zh.slug, "hello");

        let en = parse_post_filename("2024-03-10-hello.en.dj").unwrap();
        assert_eq!(en.lang, Lang::En);
        assert_eq!(en.slug, "hello");
    }

    #[test]
    fn test_parse_post_filename_rejects() {
        assert_eq!(parse_post_filename("about.dj"), None);
        assert_eq!(parse_post_filename("2024-03-10-hello.md"), None);
        assert_eq!(parse_post_filename("2024-03-10-.dj"), None);
        assert_eq!(parse_post_filename("2024-3-10-hello.dj"), None);
        assert_eq!(parse_post_filename("2024-02-30-leap.dj"), None);
    }

    #[test]
    fn test_impossible_date_keeps_post_shape() {
        assert!(has_post_shape("2024-02-30-leap.dj"));
        assert!(has_post_shape("2024-13-01-month.zh.dj"));
        assert!(!has_post_shape("about.dj"));
        assert!(!has_post_shape("2024-3-10-hello.dj"));
    }

    #[test]
    fn test_parse_heading_and_paragraph() {
        let doc = parse("# Hello\n\nWorld.\n");
        assert_eq!(doc.kind, NodeKind::Document);

        let section = &doc.children[0];
        assert_eq!(section.kind, NodeKind::Section);
        assert!(section.attributes.get("id").is_some());

        let heading = &section.children[0];
        assert_eq!(heading.kind, NodeKind::Heading { level: 1 });
        assert_eq!(flatten_text(heading), "Hello");

        let paragraph = &section.children[1];
        assert_eq!(paragraph.kind, NodeKind::Paragraph);
        assert_eq!(flatten_text(paragraph), "World.");
    }

    #[test]
    fn test_parse_div_class_becomes_attribute() {
        let doc = parse("::: note\nCareful.\n:::\n");
        let div = &doc.children[0];
        assert_eq!(div.kind, NodeKind::Div);
        assert!(div.has_class("note"));
    }

    #[test]
    fn test_parse_paren_ordered_list() {
        let doc = parse("1) one\n2) two\n");
        let list = &doc.children[0];
        assert_eq!(
            list.kind,
            NodeKind::OrderedList {
                style: "1)".to_string(),
                start: 1
            }
        );
    }

    #[test]
    fn test_parse_autolink_becomes_url() {
        let doc = parse("<https://example.com>\n");
        let paragraph = &doc.children[0];
        assert_eq!(
            paragraph.children[0].kind,
            NodeKind::Url {
                destination: "https://example.com".to_string()
            }
        );
    }

    #[test]
    fn test_parse_code_block_collects_text() {
        let doc = parse("``` rust\nfn main() {}\n```\n");
        match &doc.children[0].kind {
            NodeKind::CodeBlock { text, lang } => {
                assert_eq!(text, "fn main() {}\n");
                assert_eq!(lang.as_deref(), Some("rust"));
            }
            other => panic!("expected code block, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_footnotes_numbered_by_first_reference() {
        let doc = parse("One[^b] two[^a] again[^b].\n\n[^a]: Alpha.\n\n[^b]: Beta.\n");

        let paragraph = &doc.children[0];
        let numbers: Vec<_> = paragraph
            .children
            .iter()
            .filter_map(|child| match child.kind {
                NodeKind::FootnoteReference { number } => Some(number),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![1, 2, 1]);

        let notes = doc.children.last().unwrap();
        assert_eq!(notes.kind, NodeKind::Footnotes);
        assert_eq!(notes.children.len(), 2);
        assert_eq!(notes.children[0].kind, NodeKind::Footnote { number: 1 });
        assert_eq!(flatten_text(&notes.children[0]), "Beta.");
        assert_eq!(flatten_text(&notes.children[1]), "Alpha.");
    }

    #[test]
    fn test_parse_without_references_has_no_notes() {
        let doc = parse("Plain.\n\n[^x]: Unused.\n");
        assert!(doc.children.iter().all(|child| child.kind != NodeKind::Footnotes));
    }

    #[test]
    fn test_parse_description_list() {
        let doc = parse(": apple\n\n  red fruit\n");
        let list = &doc.children[0];
        assert_eq!(list.kind, NodeKind::DescriptionList);
        assert_eq!(list.children[0].kind, NodeKind::Term);
        assert_eq!(flatten_text(&list.children[0]), "apple");
        assert_eq!(list.children[1].kind, NodeKind::Definition);
        assert_eq!(flatten_text(&list.children[1]), "red fruit");
    }

    #[test]
    fn test_parse_email_autolink_gets_mailto() {
        let doc = parse("<me@example.com>\n");
        let link = &doc.children[0].children[0];
        assert_eq!(
            link.kind,
            NodeKind::Link {
                destination: "mailto:me@example.com".to_string()
            }
        );
        assert_eq!(flatten_text(link), "me@example.com");
    }
}
