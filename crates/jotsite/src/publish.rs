use crate::error::{IoContext, Result, SiteError};
use crate::feeds::generate_atom;
use crate::highlight::Highlighter;
use crate::parsing::SOURCE_EXTENSION;
use crate::site::{posts_in, render_source};
use crate::theme::ThemeEngine;
use crate::types::{FeedEntry, Lang, Post, SiteConfig};
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Replaces `path` with `content` through a temporary file in the same
/// directory, so readers see either the old file or the new one. Empty
/// content leaves the destination untouched.
pub fn update_file(path: &Path, content: &[u8]) -> Result<()> {
    if content.is_empty() {
        return Ok(());
    }

    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent).io_context("creating directory", parent)?;

    let mut temp = NamedTempFile::new_in(parent).io_context("creating temporary file in", parent)?;
    temp.write_all(content).io_context("writing", temp.path())?;
    temp.flush().io_context("flushing", temp.path())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .io_context("setting permissions on", temp.path())?;
    }

    temp.persist(path).map_err(|error| SiteError::Io {
        action: "replacing",
        path: path.to_path_buf(),
        source: error.error,
    })?;

    Ok(())
}

pub fn clean_output_dir(output_dir: &Path) -> Result<()> {
    if output_dir.exists() {
        fs::remove_dir_all(output_dir).io_context("removing", output_dir)?;
    }
    fs::create_dir_all(output_dir).io_context("creating directory", output_dir)?;
    Ok(())
}

/// Copies static assets from `content_dir` into `output_dir`. A spec ending
/// in `/*` selects every file directly inside that directory. Missing
/// sources are logged and skipped. Returns the number of files written.
pub fn mirror_assets(content_dir: &Path, output_dir: &Path, specs: &[String]) -> usize {
    let mut files: Vec<PathBuf> = Vec::new();

    for spec in specs {
        let Some(dir) = spec.strip_suffix('*') else {
            files.push(PathBuf::from(spec));
            continue;
        };

        let dir = dir.trim_end_matches('/');
        let source_dir = content_dir.join(dir);
        let entries = match fs::read_dir(&source_dir) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(path = %source_dir.display(), %error, "skipping asset directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            if entry.file_type().is_ok_and(|kind| kind.is_file()) {
                files.push(Path::new(dir).join(entry.file_name()));
            }
        }
    }

    files
        .par_iter()
        .filter(|relative| {
            let source = content_dir.join(relative);
            let copied = fs::read(&source)
                .io_context("reading asset", &source)
                .and_then(|bytes| update_file(&output_dir.join(relative), &bytes));
            match copied {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!(%error, "skipping asset");
                    false
                }
            }
        })
        .count()
}

pub struct Publisher<'a> {
    site_root: &'a Path,
    config: &'a SiteConfig,
    output_dir: PathBuf,
    theme: &'a ThemeEngine,
    highlighter: &'a Highlighter,
    blogroll: Option<&'a [FeedEntry]>,
    spell: bool,
}

impl<'a> Publisher<'a> {
    pub fn new(
        site_root: &'a Path,
        config: &'a SiteConfig,
        theme: &'a ThemeEngine,
        highlighter: &'a Highlighter,
    ) -> Self {
        Self {
            site_root,
            config,
            output_dir: site_root.join(&config.output_dir),
            theme,
            highlighter,
            blogroll: None,
            spell: false,
        }
    }

    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn blogroll(mut self, entries: Option<&'a [FeedEntry]>) -> Self {
        self.blogroll = entries;
        self
    }

    pub fn spell(mut self, spell: bool) -> Self {
        self.spell = spell;
        self
    }

    pub fn language_root(&self, lang: Lang) -> PathBuf {
        self.output_dir.join(lang.prefix().trim_start_matches('/'))
    }

    /// Writes every page of one language: index, feed, posts, static pages
    /// and, when entries were supplied, the blogroll.
    pub fn publish(&self, posts: &[Post], lang: Lang) -> Result<()> {
        let root = self.language_root(lang);
        let posts: Vec<&Post> = posts_in(posts, lang).collect();

        let index = self.theme.render_index(self.config, lang, &posts)?;
        update_file(&root.join("index.html"), index.as_bytes())?;

        let feed = generate_atom(self.config, lang, &posts)?;
        update_file(&root.join("feed.xml"), feed.as_bytes())?;

        for post in &posts {
            let html = self.theme.render_post(self.config, post, self.spell)?;
            update_file(&root.join(post.path.trim_start_matches('/')), html.as_bytes())?;
        }

        for page in &self.config.pages {
            self.publish_page(&root, lang, page)?;
        }

        if let Some(entries) = self.blogroll {
            let written = self
                .theme
                .render_blogroll(self.config, lang, entries)
                .and_then(|html| update_file(&root.join("blogroll.html"), html.as_bytes()));
            match written {
                Ok(()) => tracing::info!(lang = lang.as_str(), entries = entries.len(), "generated blogroll"),
                Err(error) => tracing::error!(lang = lang.as_str(), %error, "failed to generate blogroll"),
            }
        }

        tracing::debug!(lang = lang.as_str(), posts = posts.len(), root = %root.display(), "published");
        Ok(())
    }

    fn publish_page(&self, root: &Path, lang: Lang, name: &str) -> Result<()> {
        let content_dir = self.site_root.join(&self.config.content_dir);
        let localized = content_dir.join(format!("{name}{}.{SOURCE_EXTENSION}", lang.source_suffix()));
        let source_path = if localized.exists() {
            localized
        } else {
            content_dir.join(format!("{name}.{SOURCE_EXTENSION}"))
        };

        let source = fs::read_to_string(&source_path).io_context("reading page", &source_path)?;
        let (content, ctx) = render_source(&source, None, self.highlighter)?;
        let html = self
            .theme
            .render_page(self.config, lang, name, ctx.title.as_deref(), &content)?;

        update_file(&root.join(format!("{name}.html")), html.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use tempfile::TempDir;

    fn sample_post(lang: Lang, day: u32) -> Post {
        Post {
            year: 2024,
            month: 3,
            day,
            slug: "hello".to_string(),
            lang,
            date: Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap(),
            title: Some(format!("Hello {}", lang.as_str())),
            summary: Some("World.".to_string()),
            content: "<p>World.</p>\n".to_string(),
            path: format!("/2024/03/{day:02}/hello.html"),
            src: format!("content/posts/2024-03-{day:02}-hello{}.dj", lang.source_suffix()),
        }
    }

    fn site_with_about() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        fs::write(dir.path().join("content/about.dj"), "# About\n\nMe.\n").unwrap();
        dir
    }

    #[test]
    fn test_update_file_writes_and_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.html");

        update_file(&path, b"first").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");

        update_file(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");

        let leftovers = fs::read_dir(dir.path().join("a/b")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_update_file_ignores_empty_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.html");

        update_file(&path, b"").unwrap();
        assert!(!path.exists());

        update_file(&path, b"kept").unwrap();
        update_file(&path, b"").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "kept");
    }

    #[cfg(unix)]
    #[test]
    fn test_update_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.html");
        update_file(&path, b"x").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_update_file_readers_never_see_partial_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feed.xml");
        let old = vec![b'a'; 64 * 1024];
        let new = vec![b'b'; 256 * 1024];
        update_file(&path, &old).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let path = path.clone();
            let done = Arc::clone(&done);
            let (old_len, new_len) = (old.len(), new.len());
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    if let Ok(bytes) = fs::read(&path) {
                        assert!(bytes.len() == old_len || bytes.len() == new_len);
                    }
                }
            })
        };

        for round in 0..20 {
            let content = if round % 2 == 0 { &new } else { &old };
            update_file(&path, content).unwrap();
        }
        done.store(true, Ordering::Relaxed);
        reader.join().unwrap();
    }

    #[test]
    fn test_clean_output_dir() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out");
        fs::create_dir_all(output.join("old")).unwrap();
        fs::write(output.join("old/stale.html"), "stale").unwrap();

        clean_output_dir(&output).unwrap();
        assert!(output.exists());
        assert_eq!(fs::read_dir(&output).unwrap().count(), 0);
    }

    #[test]
    fn test_mirror_assets() {
        let dir = TempDir::new().unwrap();
        let content = dir.path().join("content");
        let output = dir.path().join("out");
        fs::create_dir_all(content.join("css/fonts")).unwrap();
        fs::write(content.join("favicon.svg"), "<svg/>").unwrap();
        fs::write(content.join("css/main.css"), "body {}").unwrap();
        fs::write(content.join("css/print.css"), "@media print {}").unwrap();
        fs::write(content.join("css/fonts/font.woff2"), "font").unwrap();

        let specs = vec![
            "favicon.svg".to_string(),
            "favicon.png".to_string(),
            "css/*".to_string(),
            "missing/*".to_string(),
        ];
        let copied = mirror_assets(&content, &output, &specs);

        assert_eq!(copied, 3);
        assert_eq!(fs::read_to_string(output.join("favicon.svg")).unwrap(), "<svg/>");
        assert_eq!(fs::read_to_string(output.join("css/main.css")).unwrap(), "body {}");
        assert!(output.join("css/print.css").exists());
        assert!(!output.join("css/fonts").exists());
    }

    #[test]
    fn test_publish_language_trees() {
        let dir = site_with_about();
        let config = SiteConfig::default();
        let theme = ThemeEngine::new().unwrap();
        let highlighter = Highlighter::new();
        let posts = vec![sample_post(Lang::En, 10), sample_post(Lang::Zh, 9)];

        let publisher = Publisher::new(dir.path(), &config, &theme, &highlighter);
        publisher.publish(&posts, Lang::En).unwrap();
        publisher.publish(&posts, Lang::Zh).unwrap();

        let out = dir.path().join("out/www");
        assert!(out.join("2024/03/10/hello.html").exists());
        assert!(out.join("CN/2024/03/09/hello.html").exists());
        assert!(!out.join("2024/03/09/hello.html").exists());
        assert!(out.join("about.html").exists());
        assert!(out.join("CN/about.html").exists());
        assert!(!out.join("blogroll.html").exists());

        let index = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(index.contains("Hello en"));
        assert!(!index.contains("Hello zh"));

        let zh_feed = fs::read_to_string(out.join("CN/feed.xml")).unwrap();
        assert!(zh_feed.contains("/CN/2024/03/09/hello.html"));
    }

    #[test]
    fn test_publish_prefers_localized_static_page() {
        let dir = site_with_about();
        fs::write(dir.path().join("content/about.zh.dj"), "# 关于\n\n我。\n").unwrap();
        let config = SiteConfig::default();
        let theme = ThemeEngine::new().unwrap();
        let highlighter = Highlighter::new();

        Publisher::new(dir.path(), &config, &theme, &highlighter)
            .publish(&[], Lang::Zh)
            .unwrap();

        let about = fs::read_to_string(dir.path().join("out/www/CN/about.html")).unwrap();
        assert!(about.contains("<title>关于</title>"));
    }

    #[test]
    fn test_publish_missing_static_page_fails() {
        let dir = TempDir::new().unwrap();
        let config = SiteConfig::default();
        let theme = ThemeEngine::new().unwrap();
        let highlighter = Highlighter::new();

        let result = Publisher::new(dir.path(), &config, &theme, &highlighter).publish(&[], Lang::En);
        assert!(matches!(result, Err(SiteError::Io { .. })));
    }

    #[test]
    fn test_publish_untitled_post_fails() {
        let dir = site_with_about();
        let config = SiteConfig::default();
        let theme = ThemeEngine::new().unwrap();
        let highlighter = Highlighter::new();
        let mut post = sample_post(Lang::En, 10);
        post.title = None;

        let result = Publisher::new(dir.path(), &config, &theme, &highlighter).publish(&[post], Lang::En);
        assert!(matches!(result, Err(SiteError::MissingTitle { .. })));
    }

    #[test]
    fn test_publish_blogroll_and_spellcheck() {
        let dir = site_with_about();
        let config = SiteConfig::default();
        let theme = ThemeEngine::new().unwrap();
        let highlighter = Highlighter::new();
        let entries = vec![FeedEntry {
            title: "Elsewhere".to_string(),
            url: "https://example.org/post".to_string(),
            date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }];

        Publisher::new(dir.path(), &config, &theme, &highlighter)
            .output_dir(dir.path().join("public"))
            .blogroll(Some(&entries))
            .spell(true)
            .publish(&[sample_post(Lang::En, 10)], Lang::En)
            .unwrap();

        let blogroll = fs::read_to_string(dir.path().join("public/blogroll.html")).unwrap();
        assert!(blogroll.contains("Elsewhere"));
        let post = fs::read_to_string(dir.path().join("public/2024/03/10/hello.html")).unwrap();
        assert!(post.contains("contenteditable=\"true\""));
    }
}
