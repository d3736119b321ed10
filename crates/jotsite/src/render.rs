use crate::ast::{Node, NodeKind, flatten_text};
use crate::error::{Result, SiteError};
use crate::highlight::Highlighter;
use crate::html::{NodeRenderer, escape_attr, escape_html, render_attributes, render_children, render_default};
use chrono::{DateTime, Utc};

const ADMONITIONS: [(&str, &str); 3] = [
    ("note", "info"),
    ("quiz", "question"),
    ("warn", "exclamation"),
];

/// Side channel of a single document render. `date` is an input; `title`
/// and `summary` are filled in by the first level-1 heading and the first
/// prose paragraph respectively.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub date: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub summary: Option<String>,
}

impl RenderContext {
    pub fn with_date(date: DateTime<Utc>) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }
}

/// Renders a parsed document to HTML. The tree is consumed: overrides
/// remove one-shot attributes and detach citation links while walking it.
pub fn render(mut doc: Node, ctx: &mut RenderContext, highlighter: &Highlighter) -> Result<String> {
    let mut renderer = Renderer {
        ctx,
        highlighter,
        section_id: None,
    };
    renderer.render_node(&mut doc)
}

pub fn time(date: DateTime<Utc>, class: Option<&str>) -> String {
    let class = class
        .map(|class| format!(r#" class="{}""#, escape_attr(class)))
        .unwrap_or_default();
    format!(
        r#"<time{class} datetime="{}">{}</time>"#,
        date.format("%Y-%m-%d"),
        human_date(date)
    )
}

pub fn human_date(date: DateTime<Utc>) -> String {
    date.format("%b %-d, %Y").to_string()
}

struct Renderer<'a> {
    ctx: &'a mut RenderContext,
    highlighter: &'a Highlighter,
    // id of the innermost enclosing section, swapped in and out around each
    // section's subtree
    section_id: Option<String>,
}

impl NodeRenderer for Renderer<'_> {
    fn render_node(&mut self, node: &mut Node) -> Result<String> {
        match &node.kind {
            NodeKind::Section => self.section(node),
            NodeKind::Heading { level } => {
                let level = *level;
                self.heading(node, level)
            }
            NodeKind::OrderedList { style, .. } => {
                let callout = style == "1)";
                if callout {
                    node.add_class("callout");
                }
                render_default(self, node)
            }
            NodeKind::Paragraph => self.paragraph(node),
            NodeKind::BlockQuote => self.block_quote(node),
            NodeKind::Div => self.div(node),
            NodeKind::CodeBlock { text, lang } => {
                let (text, lang) = (text.clone(), lang.clone());
                self.code_block(node, &text, lang.as_deref())
            }
            NodeKind::Image { destination } => {
                let destination = destination.clone();
                self.image(node, destination)
            }
            NodeKind::Span => self.span(node),
            NodeKind::Str { text } => {
                if node.has_class("dfn") {
                    Ok(format!("<dfn>{}</dfn>", escape_html(text)))
                } else {
                    render_default(self, node)
                }
            }
            NodeKind::Url { .. } => {
                node.add_class("url");
                render_default(self, node)
            }
            NodeKind::Document
            | NodeKind::BulletList
            | NodeKind::ListItem
            | NodeKind::DescriptionList
            | NodeKind::Term
            | NodeKind::Definition
            | NodeKind::ThematicBreak
            | NodeKind::Table
            | NodeKind::TableRow
            | NodeKind::TableCell { .. }
            | NodeKind::Caption
            | NodeKind::RawBlock { .. }
            | NodeKind::SoftBreak
            | NodeKind::HardBreak
            | NodeKind::Emphasis
            | NodeKind::Strong
            | NodeKind::Mark
            | NodeKind::Insert
            | NodeKind::Delete
            | NodeKind::Superscript
            | NodeKind::Subscript
            | NodeKind::Verbatim { .. }
            | NodeKind::Math { .. }
            | NodeKind::RawInline { .. }
            | NodeKind::Symbol { .. }
            | NodeKind::Link { .. }
            | NodeKind::FootnoteReference { .. }
            | NodeKind::Footnotes
            | NodeKind::Footnote { .. } => render_default(self, node),
        }
    }
}

impl Renderer<'_> {
    fn section(&mut self, node: &mut Node) -> Result<String> {
        let id = node
            .attributes
            .get("id")
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let previous = std::mem::replace(&mut self.section_id, id);

        let top_level = node
            .first_child(|kind| matches!(kind, NodeKind::Heading { .. }))
            .is_some_and(|heading| heading.kind == NodeKind::Heading { level: 1 });
        let result = if top_level {
            render_children(self, node)
        } else {
            render_default(self, node)
        };

        self.section_id = previous;
        result
    }

    fn heading(&mut self, node: &mut Node, level: u16) -> Result<String> {
        let date = match self.ctx.date {
            Some(date) if level == 1 => format!(" {}", time(date, Some("meta"))),
            _ => String::new(),
        };
        let children = render_children(self, node)?;
        if level == 1 && self.ctx.title.is_none() {
            self.ctx.title = Some(flatten_text(node));
        }

        let attrs = render_attributes(&node.attributes, &[]);
        match self.section_id.as_deref() {
            Some(id) if level > 1 => Ok(format!(
                "\n<h{level}{attrs}>\n<a href=\"#{}\">{children}{date}</a>\n</h{level}>\n",
                escape_attr(id)
            )),
            _ => Ok(format!("\n<h{level}{attrs}>{children}{date}</h{level}>\n")),
        }
    }

    fn paragraph(&mut self, node: &mut Node) -> Result<String> {
        if let [only] = node.children.as_slice()
            && only.kind.is_image()
        {
            let caption = node
                .attributes
                .take_caption()
                .map(|caption| format!("<figcaption class=\"title\">{caption}</figcaption>\n"))
                .unwrap_or_default();
            let attrs = render_attributes(&node.attributes, &[]);
            let image = render_children(self, node)?;
            return Ok(format!("<figure{attrs}>\n{caption}{image}\n</figure>\n"));
        }

        let html = render_default(self, node)?;
        if self.ctx.summary.is_none() {
            self.ctx.summary = Some(flatten_text(node));
        }
        Ok(html)
    }

    fn block_quote(&mut self, node: &mut Node) -> Result<String> {
        let cites_source = node.children.last().is_some_and(|last| {
            last.kind != NodeKind::ThematicBreak
                && matches!(last.children.as_slice(), [only] if only.kind.is_link())
        });
        let source = if cites_source {
            node.children.pop().and_then(|mut last| last.children.pop())
        } else {
            None
        };

        let quote = render_children(self, node)?;
        let cite = match source {
            Some(mut link) => format!(
                "<figcaption><cite>{}</cite></figcaption>\n",
                self.render_node(&mut link)?
            ),
            None => String::new(),
        };

        Ok(format!(
            "<figure class=\"blockquote\">\n<blockquote>\n{quote}</blockquote>\n{cite}</figure>\n"
        ))
    }

    fn div(&mut self, node: &mut Node) -> Result<String> {
        let admonition = ADMONITIONS
            .iter()
            .find(|(class, _)| node.has_class(class))
            .map(|(_, icon)| *icon);

        if let Some(icon) = admonition {
            let attrs = render_attributes(&node.attributes, &[("class", "admn")]);
            let children = render_children(self, node)?;
            return Ok(format!(
                "<aside{attrs}>\n<svg class=\"icon\"><use href=\"/assets/icons.svg#{icon}\"/></svg>\n<div>{children}</div>\n</aside>\n"
            ));
        }

        if node.has_class("block") {
            let caption = node
                .attributes
                .take_caption()
                .map(|caption| format!("<div class=\"title\">{caption}</div>\n"))
                .unwrap_or_default();
            let attrs = render_attributes(&node.attributes, &[]);
            let children = render_children(self, node)?;
            return Ok(format!("<aside{attrs}>\n{caption}{children}</aside>\n"));
        }

        if node.has_class("details") {
            let caption = node.attributes.take_caption().unwrap_or_default();
            let children = render_children(self, node)?;
            return Ok(format!(
                "<details>\n<summary>{caption}</summary>\n{children}</details>\n"
            ));
        }

        render_default(self, node)
    }

    fn code_block(&mut self, node: &mut Node, text: &str, lang: Option<&str>) -> Result<String> {
        let caption = node
            .attributes
            .take_caption()
            .map(|caption| format!("<figcaption class=\"title\">{caption}</figcaption>\n"))
            .unwrap_or_default();
        let highlighted =
            self.highlighter
                .highlight(text, lang, node.attributes.get("highlight"))?;

        Ok(format!(
            "<figure class=\"code-block\">\n{caption}{highlighted}\n</figure>\n"
        ))
    }

    fn image(&mut self, node: &mut Node, destination: Option<String>) -> Result<String> {
        if node.has_class("video") {
            let src = escape_attr(&destination.ok_or(SiteError::MissingDestination)?);
            if node.has_class("loop") {
                return Ok(format!(r#"<video src="{src}" autoplay muted loop></video>"#));
            }
            return Ok(format!(r#"<video src="{src}" controls muted></video>"#));
        }
        render_default(self, node)
    }

    fn span(&mut self, node: &mut Node) -> Result<String> {
        if node.has_class("code") {
            let children = render_children(self, node)?;
            return Ok(format!("<code>{children}</code>"));
        }
        if node.has_class("dfn") {
            let children = render_children(self, node)?;
            return Ok(format!("<dfn>{children}</dfn>"));
        }
        if node.has_class("kbd") {
            let keys = flatten_text(node)
                .split('+')
                .map(|key| format!("<kbd>{}</kbd>", escape_html(key)))
                .collect::<Vec<_>>()
                .join("+");
            return Ok(format!("<kbd>{keys}</kbd>"));
        }
        if node.has_class("menu") {
            return Ok(render_default(self, node)?.replace("&gt;", "\u{203a}"));
        }
        render_default(self, node)
    }
}
