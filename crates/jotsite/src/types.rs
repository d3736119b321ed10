use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    En,
    Zh,
}

impl Lang {
    pub const ALL: [Lang; 2] = [Lang::En, Lang::Zh];

    pub fn as_str(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Zh => "zh",
        }
    }

    /// Output path prefix. English is the default language and lives at the
    /// root of the output tree.
    pub fn prefix(self) -> &'static str {
        match self {
            Lang::En => "",
            Lang::Zh => "/CN",
        }
    }

    /// Marker kept in source file names of non-default languages.
    pub fn source_suffix(self) -> &'static str {
        match self {
            Lang::En => "",
            Lang::Zh => ".zh",
        }
    }

    pub fn html_lang(self) -> &'static str {
        match self {
            Lang::En => "en-US",
            Lang::Zh => "zh-CN",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub slug: String,
    pub lang: Lang,
    pub date: DateTime<Utc>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: String,
    pub path: String,
    pub src: String,
}

/// Accumulated phase timings of one build cycle, in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildContext {
    pub read_ms: f64,
    pub parse_ms: f64,
    pub render_ms: f64,
    pub collect_ms: f64,
    pub total_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    pub title: String,
    pub url: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub description: String,
    pub author: String,
    pub site_url: String,
    pub edit_url: Option<String>,
    pub content_dir: PathBuf,
    pub posts_dir: PathBuf,
    pub output_dir: PathBuf,
    pub pages: Vec<String>,
    pub assets: Vec<String>,
    pub blogroll_file: PathBuf,
    pub syntax_theme: String,
    pub debounce_ms: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "My Blog".to_string(),
            description: String::new(),
            author: String::new(),
            site_url: "http://localhost:3000".to_string(),
            edit_url: None,
            content_dir: PathBuf::from("content"),
            posts_dir: PathBuf::from("content/posts"),
            output_dir: PathBuf::from("out/www"),
            pages: vec!["about".to_string()],
            assets: vec![
                "favicon.svg".to_string(),
                "favicon.png".to_string(),
                "css/*".to_string(),
                "assets/*".to_string(),
            ],
            blogroll_file: PathBuf::from("content/blogroll.txt"),
            syntax_theme: "InspiredGitHub".to_string(),
            debounce_ms: 16,
        }
    }
}
