use crate::blogroll::{fetch_blogroll, read_sources};
use crate::error::Result;
use crate::highlight::Highlighter;
use crate::publish::{Publisher, clean_output_dir, mirror_assets};
use crate::site::{PostCollector, elapsed_ms, load_config};
use crate::theme::ThemeEngine;
use crate::types::{BuildContext, FeedEntry, Lang, SiteConfig};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub clean: bool,
    pub blogroll: bool,
    pub spell: bool,
    pub filter: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            clean: true,
            blogroll: false,
            spell: false,
            filter: None,
        }
    }
}

/// A loaded site: configuration plus the long-lived theme and highlighter
/// shared by every build cycle.
pub struct Site {
    root: PathBuf,
    config: SiteConfig,
    output_dir: PathBuf,
    theme: ThemeEngine,
    highlighter: Highlighter,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub posts: usize,
    pub assets: usize,
    pub context: BuildContext,
}

impl Site {
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let config = load_config(&root)?;
        let output_dir = root.join(&config.output_dir);

        Ok(Self {
            highlighter: Highlighter::with_theme(&config.syntax_theme),
            theme: ThemeEngine::new()?,
            output_dir,
            config,
            root,
        })
    }

    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn output_path(&self) -> &Path {
        &self.output_dir
    }

    pub fn content_path(&self) -> PathBuf {
        self.root.join(&self.config.content_dir)
    }

    /// Runs one full cycle: optional clean, collect, publish both languages,
    /// then mirror static assets.
    pub fn build(&self, options: &BuildOptions) -> Result<BuildReport> {
        let started = Instant::now();

        if options.clean {
            clean_output_dir(&self.output_dir)?;
        }

        let (posts, mut context) = PostCollector::new(&self.root, &self.config.posts_dir)
            .filter(options.filter.as_deref())
            .collect(&self.highlighter)?;

        let blogroll = if options.blogroll {
            Some(self.load_blogroll())
        } else {
            None
        };

        let publisher = Publisher::new(&self.root, &self.config, &self.theme, &self.highlighter)
            .output_dir(&self.output_dir)
            .blogroll(blogroll.as_deref())
            .spell(options.spell);

        for lang in Lang::ALL {
            publisher.publish(&posts, lang)?;
        }

        let assets = mirror_assets(&self.content_path(), &self.output_dir, &self.config.assets);

        context.total_ms = elapsed_ms(started);
        tracing::info!(
            posts = posts.len(),
            assets,
            total_ms = context.total_ms,
            "build finished"
        );

        Ok(BuildReport {
            posts: posts.len(),
            assets,
            context,
        })
    }

    fn load_blogroll(&self) -> Vec<FeedEntry> {
        let path = self.root.join(&self.config.blogroll_file);
        match read_sources(&path) {
            Ok(sources) => {
                let entries = fetch_blogroll(&sources);
                tracing::info!(sources = sources.len(), entries = entries.len(), "fetched blogroll");
                entries
            }
            Err(error) => {
                tracing::error!(%error, "failed to read blogroll sources");
                Vec::new()
            }
        }
    }
}
