use crate::error::{IoContext, Result, SiteError};
use crate::highlight::Highlighter;
use crate::parsing::{PostName, has_post_shape, parse, parse_post_filename};
use crate::render::{RenderContext, render};
use crate::types::{BuildContext, Lang, Post, SiteConfig};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

pub const CONFIG_FILE: &str = "jotsite.toml";

pub fn load_config(site_root: &Path) -> Result<SiteConfig> {
    let config_path = site_root.join(CONFIG_FILE);

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "no config file, using defaults");
        return Ok(SiteConfig::default());
    }

    let content = fs::read_to_string(&config_path).io_context("reading config", &config_path)?;
    let mut config: SiteConfig = toml::from_str(&content).map_err(|error| SiteError::TomlParse {
        path: config_path.clone(),
        message: error.to_string(),
    })?;

    config.site_url = config.site_url.trim_end_matches('/').to_string();

    Ok(config)
}

/// Parses and renders one djot source. Returns the HTML together with the
/// context the renderer filled in.
pub fn render_source(
    source: &str,
    date: Option<DateTime<Utc>>,
    highlighter: &Highlighter,
) -> Result<(String, RenderContext)> {
    let mut ctx = RenderContext {
        date,
        ..RenderContext::default()
    };
    let html = render(parse(source), &mut ctx, highlighter)?;
    Ok((html, ctx))
}

pub fn post_path(name: &PostName) -> String {
    format!(
        "/{:04}/{:02}/{:02}/{}.html",
        name.year, name.month, name.day, name.slug
    )
}

pub struct PostCollector {
    site_root: PathBuf,
    posts_dir: PathBuf,
    filter: Option<String>,
}

impl PostCollector {
    /// `posts_dir` is resolved against `site_root`.
    pub fn new(site_root: impl AsRef<Path>, posts_dir: impl AsRef<Path>) -> Self {
        Self {
            site_root: site_root.as_ref().to_path_buf(),
            posts_dir: posts_dir.as_ref().to_path_buf(),
            filter: None,
        }
    }

    pub fn filter(mut self, filter: Option<&str>) -> Self {
        self.filter = filter.filter(|f| !f.is_empty()).map(str::to_string);
        self
    }

    pub fn collect(&self, highlighter: &Highlighter) -> Result<(Vec<Post>, BuildContext)> {
        let started = Instant::now();
        let posts_dir = self.site_root.join(&self.posts_dir);
        let mut context = BuildContext::default();
        let mut posts = Vec::new();

        if !posts_dir.exists() {
            tracing::warn!(path = %posts_dir.display(), "posts directory does not exist");
            return Ok((posts, context));
        }

        for entry in WalkDir::new(&posts_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
        {
            let entry = entry.map_err(|error| SiteError::WalkDir {
                path: posts_dir.clone(),
                message: error.to_string(),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let filename = entry.file_name().to_string_lossy();
            let Some(name) = parse_post_filename(&filename) else {
                if has_post_shape(&filename) {
                    tracing::warn!(file = %filename, "skipping post with an invalid date");
                } else {
                    tracing::debug!(file = %filename, "skipping non-post file");
                }
                continue;
            };

            if let Some(filter) = &self.filter
                && !filename.contains(filter.as_str())
            {
                tracing::debug!(file = %filename, filter = %filter, "filtered out");
                continue;
            }

            posts.push(self.collect_post(entry.path(), name, highlighter, &mut context)?);
        }

        posts.sort_by(|a, b| b.path.cmp(&a.path));

        context.collect_ms = elapsed_ms(started);
        Ok((posts, context))
    }

    fn collect_post(
        &self,
        path: &Path,
        name: PostName,
        highlighter: &Highlighter,
        context: &mut BuildContext,
    ) -> Result<Post> {
        let phase = Instant::now();
        let source = fs::read_to_string(path).io_context("reading post", path)?;
        context.read_ms += elapsed_ms(phase);

        let phase = Instant::now();
        let doc = parse(&source);
        context.parse_ms += elapsed_ms(phase);

        let date = name
            .date()
            .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
            .unwrap_or_default();

        let phase = Instant::now();
        let mut ctx = RenderContext::with_date(date);
        let content = render(doc, &mut ctx, highlighter)?;
        context.render_ms += elapsed_ms(phase);

        tracing::debug!(file = %path.display(), "rendered post");

        Ok(Post {
            year: name.year,
            month: name.month,
            day: name.day,
            path: post_path(&name),
            src: self.source_path(path, &name),
            slug: name.slug,
            lang: name.lang,
            date,
            title: ctx.title,
            summary: ctx.summary,
            content,
        })
    }

    fn source_path(&self, path: &Path, name: &PostName) -> String {
        let relative = path.strip_prefix(&self.site_root).unwrap_or(path);
        let dir = relative
            .parent()
            .map(|dir| dir.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();

        let filename = format!(
            "{:04}-{:02}-{:02}-{}{}.{}",
            name.year,
            name.month,
            name.day,
            name.slug,
            name.lang.source_suffix(),
            crate::parsing::SOURCE_EXTENSION
        );

        if dir.is_empty() {
            filename
        } else {
            format!("{dir}/{filename}")
        }
    }
}

pub fn posts_in(posts: &[Post], lang: Lang) -> impl Iterator<Item = &Post> {
    posts.iter().filter(move |post| post.lang == lang)
}

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
