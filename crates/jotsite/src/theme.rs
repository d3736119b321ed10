use crate::error::{Result, SiteError};
use crate::html::escape_attr;
use crate::render::time;
use crate::types::{FeedEntry, Lang, Post, SiteConfig};
use serde::Serialize;
use tera::{Context, Tera};

const BASE_TEMPLATE: &str = include_str!("../themes/default/templates/base.html");
const INDEX_TEMPLATE: &str = include_str!("../themes/default/templates/index.html");
const POST_TEMPLATE: &str = include_str!("../themes/default/templates/post.html");
const PAGE_TEMPLATE: &str = include_str!("../themes/default/templates/page.html");
const BLOGROLL_TEMPLATE: &str = include_str!("../themes/default/templates/blogroll.html");

#[derive(Serialize)]
struct Nav {
    home: &'static str,
    about: &'static str,
    blogroll: &'static str,
    switch_lang: &'static str,
    edit: &'static str,
    subscribe: &'static str,
}

fn nav(lang: Lang) -> Nav {
    match lang {
        Lang::En => Nav {
            home: "Home",
            about: "About",
            blogroll: "Blogroll",
            switch_lang: "中",
            edit: "Fix typo",
            subscribe: "Subscribe",
        },
        Lang::Zh => Nav {
            home: "首页",
            about: "关于",
            blogroll: "博客列表",
            switch_lang: "EN",
            edit: "修正错误",
            subscribe: "订阅",
        },
    }
}

#[derive(Serialize)]
struct PageMeta<'a> {
    title: &'a str,
    description: &'a str,
    path: &'a str,
    src: &'a str,
    lang_switch: Option<&'static str>,
}

#[derive(Serialize)]
struct PostItem<'a> {
    time: String,
    url: String,
    title: &'a str,
}

#[derive(Serialize)]
struct BlogrollItem<'a> {
    time: String,
    url: String,
    title: &'a str,
    domain: String,
}

pub struct ThemeEngine {
    tera: Tera,
}

impl ThemeEngine {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_template("base.html", BASE_TEMPLATE)?;
        tera.add_raw_template("index.html", INDEX_TEMPLATE)?;
        tera.add_raw_template("post.html", POST_TEMPLATE)?;
        tera.add_raw_template("page.html", PAGE_TEMPLATE)?;
        tera.add_raw_template("blogroll.html", BLOGROLL_TEMPLATE)?;

        Ok(Self { tera })
    }

    fn base_context(&self, config: &SiteConfig, lang: Lang, page: &PageMeta) -> Context {
        let mut context = Context::new();
        context.insert("site", config);
        context.insert("lang", &lang);
        context.insert("html_lang", lang.html_lang());
        context.insert("prefix", lang.prefix());
        context.insert("nav", &nav(lang));
        context.insert("page", page);
        context
    }

    /// `posts` must already be restricted to `lang` and ordered newest first.
    pub fn render_index(&self, config: &SiteConfig, lang: Lang, posts: &[&Post]) -> Result<String> {
        let items = posts
            .iter()
            .map(|post| {
                Ok(PostItem {
                    time: time(post.date, Some("meta")),
                    url: format!("{}{}", lang.prefix(), post.path),
                    title: post_title(post)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let page = PageMeta {
            title: &config.title,
            description: &config.description,
            path: "/",
            src: "",
            lang_switch: Some(match lang {
                Lang::En => "/CN/",
                Lang::Zh => "/",
            }),
        };

        let mut context = self.base_context(config, lang, &page);
        context.insert("items", &items);

        Ok(self.tera.render("index.html", &context)?)
    }

    pub fn render_post(&self, config: &SiteConfig, post: &Post, spell: bool) -> Result<String> {
        let page = PageMeta {
            title: post_title(post)?,
            description: post.summary.as_deref().unwrap_or_default(),
            path: &post.path,
            src: &post.src,
            lang_switch: None,
        };

        let mut context = self.base_context(config, post.lang, &page);
        context.insert("content", &post.content);
        context.insert("spell", &spell);

        Ok(self.tera.render("post.html", &context)?)
    }

    pub fn render_page(
        &self,
        config: &SiteConfig,
        lang: Lang,
        name: &str,
        title: Option<&str>,
        content: &str,
    ) -> Result<String> {
        let path = format!("/{name}.html");
        let src = format!(
            "{}/{name}.{}",
            config.content_dir.to_string_lossy().replace('\\', "/"),
            crate::parsing::SOURCE_EXTENSION
        );
        let page = PageMeta {
            title: title.unwrap_or(&config.title),
            description: &config.description,
            path: &path,
            src: &src,
            lang_switch: None,
        };

        let mut context = self.base_context(config, lang, &page);
        context.insert("content", content);

        Ok(self.tera.render("page.html", &context)?)
    }

    pub fn render_blogroll(&self, config: &SiteConfig, lang: Lang, entries: &[FeedEntry]) -> Result<String> {
        let items: Vec<_> = entries
            .iter()
            .map(|entry| BlogrollItem {
                time: time(entry.date, None),
                url: escape_attr(&entry.url),
                title: &entry.title,
                domain: domain(&entry.url),
            })
            .collect();

        let page = PageMeta {
            title: &config.title,
            description: &config.description,
            path: "/blogroll.html",
            src: "",
            lang_switch: None,
        };

        let mut context = self.base_context(config, lang, &page);
        context.insert("items", &items);

        Ok(self.tera.render("blogroll.html", &context)?)
    }
}

pub(crate) fn post_title(post: &Post) -> Result<&str> {
    post.title.as_deref().ok_or_else(|| SiteError::MissingTitle {
        src: post.src.clone(),
    })
}

fn domain(url: &str) -> String {
    url.parse::<ureq::http::Uri>()
        .ok()
        .and_then(|uri| uri.host().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
