use crate::error::{IoContext, Result, SiteError};
use crate::types::FeedEntry;
use crate::xml::decode_entity;
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use ureq::Agent;

pub const ENTRIES_PER_FEED: usize = 3;

/// Reads the feed list, one URL per line. Blank lines and `#` comments are
/// ignored.
pub fn read_sources(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).io_context("reading blogroll", path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Fetches every source and merges their newest entries, newest first.
/// A source that cannot be fetched or parsed is logged and left out.
pub fn fetch_blogroll(sources: &[String]) -> Vec<FeedEntry> {
    let agent = Agent::new_with_defaults();

    let mut entries: Vec<FeedEntry> = sources
        .par_iter()
        .flat_map_iter(|url| match fetch_feed(&agent, url) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(%url, %error, "skipping blogroll source");
                Vec::new()
            }
        })
        .collect();

    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries
}

fn fetch_feed(agent: &Agent, url: &str) -> Result<Vec<FeedEntry>> {
    let fetch_error = |error: ureq::Error| SiteError::FeedFetch {
        url: url.to_string(),
        message: error.to_string(),
    };

    let response = agent.get(url).call().map_err(fetch_error)?;
    let xml = response.into_body().read_to_string().map_err(fetch_error)?;

    let mut entries = parse_feed(url, &xml)?;
    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries.truncate(ENTRIES_PER_FEED);
    Ok(entries)
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    Date,
}

#[derive(Default)]
struct PartialEntry {
    title: Option<String>,
    link: Option<String>,
    date: Option<String>,
}

impl PartialEntry {
    fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Date => &mut self.date,
        };
        if slot.is_none() {
            *slot = Some(value.trim().to_string());
        }
    }

    fn finish(self) -> FeedEntry {
        FeedEntry {
            title: self.title.unwrap_or_default(),
            url: self.link.unwrap_or_default(),
            date: self
                .date
                .as_deref()
                .and_then(parse_date)
                .unwrap_or_else(Utc::now),
        }
    }
}

/// Parses an RSS 2.0 or Atom document into its entries, in document order.
pub fn parse_feed(url: &str, xml: &str) -> Result<Vec<FeedEntry>> {
    let parse_error = |message: String| SiteError::FeedParse {
        url: url.to_string(),
        message,
    };

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut entries = Vec::new();
    let mut entry: Option<PartialEntry> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event().map_err(|error| parse_error(error.to_string()))? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "item" || name == "entry" {
                    entry = Some(PartialEntry::default());
                } else if let Some(current) = entry.as_mut() {
                    if name == "link"
                        && let Some(href) = alternate_href(&e)
                    {
                        current.set(Field::Link, href);
                    }
                    field = field_for(&name);
                    text.clear();
                }
            }
            Event::Empty(e) => {
                if let Some(current) = entry.as_mut()
                    && local_name(&e) == "link"
                    && let Some(href) = alternate_href(&e)
                {
                    current.set(Field::Link, href);
                }
            }
            Event::Text(e) => {
                if field.is_some() {
                    let decoded = reader
                        .decoder()
                        .decode(&e)
                        .map_err(|error| parse_error(error.to_string()))?;
                    text.push_str(&decoded);
                }
            }
            Event::GeneralRef(e) => {
                if field.is_some() {
                    let name = reader
                        .decoder()
                        .decode(&e)
                        .map_err(|error| parse_error(error.to_string()))?;
                    match decode_entity(&name) {
                        Some(character) => text.push(character),
                        None => {
                            text.push('&');
                            text.push_str(&name);
                            text.push(';');
                        }
                    }
                }
            }
            Event::CData(e) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                let name = reader
                    .decoder()
                    .decode(local.as_ref())
                    .map_err(|error| parse_error(error.to_string()))?;
                if name == "item" || name == "entry" {
                    if let Some(finished) = entry.take() {
                        entries.push(finished.finish());
                    }
                } else if let (Some(current), Some(active)) = (entry.as_mut(), field) {
                    if field_for(&name) == Some(active) {
                        current.set(active, std::mem::take(&mut text));
                    }
                    field = None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn field_for(name: &str) -> Option<Field> {
    match name {
        "title" => Some(Field::Title),
        "link" => Some(Field::Link),
        "pubDate" | "published" | "updated" | "date" => Some(Field::Date),
        _ => None,
    }
}

fn alternate_href(e: &BytesStart) -> Option<String> {
    let mut href = None;
    let mut rel = None;
    for attr in e.attributes().flatten() {
        let value = attr
            .unescape_value()
            .map(|value| value.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value),
            b"rel" => rel = Some(value),
            _ => {}
        }
    }
    match rel.as_deref() {
        None | Some("alternate") => href,
        Some(_) => None,
    }
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|date| date.with_timezone(&Utc))
        .ok()
}
