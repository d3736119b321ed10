use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("IO error while {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parse error in {path}: {message}")]
    TomlParse { path: PathBuf, message: String },

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Directory walk error in {path}: {message}")]
    WalkDir { path: PathBuf, message: String },

    #[error("Video image without a destination")]
    MissingDestination,

    #[error("Post {src} has no level-1 heading to take a title from")]
    MissingTitle { src: String },

    #[error("Highlighting error: {0}")]
    Highlight(#[from] syntect::Error),

    #[error("Failed to fetch feed {url}: {message}")]
    FeedFetch { url: String, message: String },

    #[error("Failed to parse feed {url}: {message}")]
    FeedParse { url: String, message: String },

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, SiteError>;

pub trait IoContext<T> {
    fn io_context(self, action: &'static str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context(self, action: &'static str, path: &Path) -> Result<T> {
        self.map_err(|source| SiteError::Io {
            action,
            path: path.to_path_buf(),
            source,
        })
    }
}
