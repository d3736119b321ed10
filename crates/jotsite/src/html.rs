use crate::ast::{Attributes, Node, NodeKind, flatten_text};
use crate::error::Result;
use std::fmt::Write;

/// Dispatch hook consulted for every node visited by the default mapping.
/// The default rendering of a container routes each child back through
/// `render_node`, so overrides apply at every depth.
pub trait NodeRenderer {
    fn render_node(&mut self, node: &mut Node) -> Result<String>;
}

pub fn render_children<R: NodeRenderer + ?Sized>(
    renderer: &mut R,
    node: &mut Node,
) -> Result<String> {
    let mut output = String::new();
    for child in &mut node.children {
        output.push_str(&renderer.render_node(child)?);
    }
    Ok(output)
}

/// Serializes attributes as ` key="value"` pairs. Extra attributes are
/// merged in; an extra `class` is appended to the node's class list.
pub fn render_attributes(attributes: &Attributes, extra: &[(&str, &str)]) -> String {
    let mut merged = attributes.clone();
    for (key, value) in extra {
        if *key == "class" {
            merged.add_class(value);
        } else {
            merged.insert(key, value);
        }
    }

    let mut output = String::new();
    for (key, value) in merged.iter() {
        let _ = write!(output, r#" {}="{}""#, key, escape_attr(value));
    }
    output
}

pub fn render_default<R: NodeRenderer + ?Sized>(renderer: &mut R, node: &mut Node) -> Result<String> {
    let children = render_children(renderer, node)?;
    let attrs = render_attributes(&node.attributes, &[]);

    let html = match &node.kind {
        NodeKind::Document => children,
        NodeKind::Section => format!("<section{attrs}>\n{children}</section>\n"),
        NodeKind::Heading { level } => format!("<h{level}{attrs}>{children}</h{level}>\n"),
        NodeKind::Paragraph => format!("<p{attrs}>{children}</p>\n"),
        NodeKind::BlockQuote => format!("<blockquote{attrs}>\n{children}</blockquote>\n"),
        NodeKind::Div => format!("<div{attrs}>\n{children}</div>\n"),
        NodeKind::CodeBlock { text, lang } => {
            let class = lang
                .as_deref()
                .map(|lang| format!(r#" class="language-{}""#, escape_attr(lang)))
                .unwrap_or_default();
            format!("<pre{attrs}><code{class}>{}</code></pre>\n", escape_html(text))
        }
        NodeKind::BulletList => format!("<ul{attrs}>\n{children}</ul>\n"),
        NodeKind::OrderedList { style, start } => {
            let mut list_attrs = attrs;
            if *start != 1 {
                let _ = write!(list_attrs, r#" start="{start}""#);
            }
            if let Some(kind) = style.chars().find(|&c| matches!(c,'a' | 'A' | 'i' | 'I')) {
                let _ = write!(list_attrs, r#" type="{kind}""#);
            }
            format!("<ol{list_attrs}>\n{children}</ol>\n")
        }
        NodeKind::ListItem => {
            if children.ends_with('\n') {
                format!("<li{attrs}>\n{children}</li>\n")
            } else {
                format!("<li{attrs}>\n{children}\n</li>\n")
            }
        }
        NodeKind::DescriptionList => format!("<dl{attrs}>\n{children}</dl>\n"),
        NodeKind::Term => format!("<dt{attrs}>{children}</dt>\n"),
        NodeKind::Definition => format!("<dd{attrs}>\n{children}</dd>\n"),
        NodeKind::ThematicBreak => format!("<hr{attrs}>\n"),
        NodeKind::Table => format!("<table{attrs}>\n{children}</table>\n"),
        NodeKind::TableRow => format!("<tr{attrs}>\n{children}</tr>\n"),
        NodeKind::TableCell { head: true } => format!("<th{attrs}>{children}</th>\n"),
        NodeKind::TableCell { head: false } => format!("<td{attrs}>{children}</td>\n"),
        NodeKind::Caption => format!("<caption{attrs}>{children}</caption>\n"),
        NodeKind::RawBlock { format, text } | NodeKind::RawInline { format, text } => {
            if format == "html" {
                text.clone()
            } else {
                String::new()
            }
        }
        NodeKind::Str { text } => escape_html(text),
        NodeKind::SoftBreak => "\n".to_string(),
        NodeKind::HardBreak => "<br>\n".to_string(),
        NodeKind::Span => format!("<span{attrs}>{children}</span>"),
        NodeKind::Emphasis => format!("<em{attrs}>{children}</em>"),
        NodeKind::Strong => format!("<strong{attrs}>{children}</strong>"),
        NodeKind::Mark => format!("<mark{attrs}>{children}</mark>"),
        NodeKind::Insert => format!("<ins{attrs}>{children}</ins>"),
        NodeKind::Delete => format!("<del{attrs}>{children}</del>"),
        NodeKind::Superscript => format!("<sup{attrs}>{children}</sup>"),
        NodeKind::Subscript => format!("<sub{attrs}>{children}</sub>"),
        NodeKind::Verbatim { text } => format!("<code{attrs}>{}</code>", escape_html(text)),
        NodeKind::Math { display, text } => {
            let (class, open, close) = if *display {
                ("display", r"\[", r"\]")
            } else {
                ("inline", r"\(", r"\)")
            };
            format!(
                r#"<span class="math {class}">{open}{}{close}</span>"#,
                escape_html(text)
            )
        }
        NodeKind::Symbol { name } => format!(":{name}:"),
        NodeKind::Link { destination } => format!(
            r#"<a href="{}"{attrs}>{children}</a>"#,
            escape_attr(destination)
        ),
        NodeKind::Url { destination } => format!(
            r#"<a href="{}"{attrs}>{}</a>"#,
            escape_attr(destination),
            escape_html(destination)
        ),
        NodeKind::Image { destination } => {
            let src = destination
                .as_deref()
                .map(|dst| format!(r#" src="{}""#, escape_attr(dst)))
                .unwrap_or_default();
            format!(
                r#"<img alt="{}"{src}{attrs}>"#,
                escape_attr(&flatten_text(node))
            )
        }
        NodeKind::FootnoteReference { number } => format!(
            r##"<a id="fnref{number}" href="#fn{number}" role="doc-noteref"><sup>{number}</sup></a>"##
        ),
        NodeKind::Footnotes => {
            format!("<section role=\"doc-endnotes\">\n<hr>\n<ol>\n{children}</ol>\n</section>\n")
        }
        NodeKind::Footnote { number } => {
            let backlink = format!(
                "<a href=\"#fnref{number}\" role=\"doc-backlink\">\u{21a9}\u{fe0e}</a>"
            );
            let body = match children.strip_suffix("</p>\n") {
                Some(body) => format!("{body}{backlink}</p>\n"),
                None => format!("{children}<p>{backlink}</p>\n"),
            };
            format!("<li id=\"fn{number}\">\n{body}</li>\n")
        }
    };

    Ok(html)
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(input: &str) -> String {
    escape_html(input).replace('"', "&quot;")
}
