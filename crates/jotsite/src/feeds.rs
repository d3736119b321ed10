use crate::error::Result;
use crate::theme::post_title;
use crate::types::{Lang, Post, SiteConfig};
use crate::xml::{cdata, escape};
use chrono::Utc;

pub const FEED_ENTRIES: usize = 10;

/// Builds the Atom feed for one language. `posts` must be restricted to
/// `lang` and ordered newest first; only the first ten are included.
pub fn generate_atom(config: &SiteConfig, lang: Lang, posts: &[&Post]) -> Result<String> {
    let base_url = format!("{}{}", config.site_url.trim_end_matches('/'), lang.prefix());

    let updated = posts
        .first()
        .map(|post| post.date.to_rfc3339())
        .unwrap_or_else(|| Utc::now().to_rfc3339());

    let author = if config.author.is_empty() {
        &config.title
    } else {
        &config.author
    };

    let mut entries = String::new();
    for post in posts.iter().take(FEED_ENTRIES) {
        let title = escape(post_title(post)?);
        let url = escape(&format!("{base_url}{}", post.path));
        let id = escape(&format!(
            "{base_url}{}",
            post.path.strip_suffix(".html").unwrap_or(&post.path)
        ));
        let date = post.date.format("%Y-%m-%dT00:00:00+00:00");

        entries.push_str(&format!(
            r#"  <entry>
    <title type="text">{title}</title>
    <link href="{url}" rel="alternate" type="text/html" title="{title}"/>
    <published>{date}</published>
    <updated>{date}</updated>
    <id>{id}</id>
    <author><name>{author}</name></author>
    <summary type="html">{summary}</summary>
    <content type="html" xml:base="{url}">{content}</content>
  </entry>
"#,
            author = escape(author),
            summary = cdata(post.summary.as_deref().unwrap_or_default()),
            content = cdata(&post.content),
        ));
    }

    Ok(format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <link href="{base_url}/feed.xml" rel="self" type="application/atom+xml"/>
  <link href="{base_url}/" rel="alternate" type="text/html"/>
  <updated>{updated}</updated>
  <id>{base_url}/feed.xml</id>
  <title type="html">{title}</title>
  <subtitle>{description}</subtitle>
  <author><name>{author}</name></author>
{entries}</feed>
"#,
        base_url = escape(&base_url),
        title = escape(&config.title),
        description = escape(&config.description),
        author = escape(author),
    ))
}
