use crate::error::Result;
use crate::html::{escape_attr, escape_html};
use std::ops::RangeInclusive;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{IncludeBackground, styled_line_to_highlighted_html};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

pub const DEFAULT_THEME: &str = "InspiredGitHub";

pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter {
    pub fn new() -> Self {
        Self::with_theme(DEFAULT_THEME)
    }

    pub fn with_theme(theme_name: &str) -> Self {
        let mut theme_set = ThemeSet::load_defaults();
        let theme = match theme_set.themes.remove(theme_name) {
            Some(theme) => theme,
            None => {
                tracing::warn!(theme = theme_name, "unknown syntax theme, using {DEFAULT_THEME}");
                theme_set.themes.remove(DEFAULT_THEME).unwrap_or_default()
            }
        };

        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
        }
    }

    /// Highlights `text` as `lang`. `spec` selects lines to emphasise, e.g.
    /// `"1,3-5"`; selected lines are wrapped in `<mark>`.
    pub fn highlight(&self, text: &str, lang: Option<&str>, spec: Option<&str>) -> Result<String> {
        let marked = spec.map(parse_line_spec).unwrap_or_default();
        let is_marked = |line: usize| marked.iter().any(|range| range.contains(&line));

        let class = lang
            .map(|lang| format!(r#" class="language-{}""#, escape_attr(lang)))
            .unwrap_or_default();
        let mut output = format!("<pre><code{class}>");

        let syntax = lang.and_then(|lang| self.syntax_set.find_syntax_by_token(lang));
        let mut highlighter = syntax.map(|syntax| HighlightLines::new(syntax, &self.theme));

        for (index, line) in LinesWithEndings::from(text).enumerate() {
            let rendered = match highlighter.as_mut() {
                Some(highlighter) => {
                    let regions = highlighter.highlight_line(line, &self.syntax_set)?;
                    let trimmed: Vec<_> = regions
                        .into_iter()
                        .map(|(style, piece)| (style, piece.trim_end_matches(['\n', '\r'])))
                        .collect();
                    styled_line_to_highlighted_html(&trimmed[..], IncludeBackground::No)?
                }
                None => escape_html(line.trim_end_matches(['\n', '\r'])),
            };

            if is_marked(index + 1) {
                output.push_str("<mark>");
                output.push_str(&rendered);
                output.push_str("</mark>\n");
            } else {
                output.push_str(&rendered);
                output.push('\n');
            }
        }

        output.push_str("</code></pre>");
        Ok(output)
    }
}

fn parse_line_spec(spec: &str) -> Vec<RangeInclusive<usize>> {
    spec.split(',')
        .filter_map(|part| {
            let part = part.trim();
            match part.split_once('-') {
                Some((start, end)) => {
                    let start = start.trim().parse().ok()?;
                    let end = end.trim().parse().ok()?;
                    Some(start..=end)
                }
                None => {
                    let line = part.parse().ok()?;
                    Some(line..=line)
                }
            }
        })
        .collect()
}
