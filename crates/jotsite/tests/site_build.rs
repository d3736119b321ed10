use jotsite::{BuildOptions, Highlighter, Lang, PostCollector, Site};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn create_site() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    write(
        root,
        "jotsite.toml",
        "title = \"Notes\"\nsite_url = \"https://notes.example.com\"\n",
    );
    write(root, "content/about.dj", "# About\n\nWho writes this.\n");
    write(root, "content/favicon.svg", "<svg/>");
    write(root, "content/posts/2024-03-10-hello.dj", "# Hello\n\nWorld.\n");
    write(root, "content/posts/2024-03-10-hello.zh.dj", "# 你好\n\n世界。\n");
    write(
        root,
        "content/posts/2023-12-31-clips.dj",
        "# Clips\n\nSome motion.\n\n![](clip.mp4){.video .loop}\n",
    );

    dir
}

#[test]
fn test_collects_scenario_post() {
    let dir = create_site();
    let (posts, _) = PostCollector::new(dir.path(), "content/posts")
        .collect(&Highlighter::new())
        .unwrap();

    let hello = posts
        .iter()
        .find(|post| post.slug == "hello" && post.lang == Lang::En)
        .unwrap();
    assert_eq!(hello.path, "/2024/03/10/hello.html");
    assert_eq!(hello.title.as_deref(), Some("Hello"));
    assert_eq!(hello.summary.as_deref(), Some("World."));

    let zh = posts.iter().find(|post| post.lang == Lang::Zh).unwrap();
    assert_eq!(zh.path, "/2024/03/10/hello.html");

    let newest_first: Vec<_> = posts.iter().map(|post| post.date).collect();
    assert!(newest_first.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[test]
fn test_builds_both_language_trees() {
    let dir = create_site();
    let site = Site::load(dir.path()).unwrap();
    let report = site.build(&BuildOptions::default()).unwrap();
    assert_eq!(report.posts, 3);

    let out = dir.path().join("out/www");
    let en_index = fs::read_to_string(out.join("index.html")).unwrap();
    let zh_index = fs::read_to_string(out.join("CN/index.html")).unwrap();

    assert!(en_index.contains("/2024/03/10/hello.html"));
    assert!(!en_index.contains("你好"));
    assert!(zh_index.contains("/CN/2024/03/10/hello.html"));
    assert!(zh_index.contains("你好"));

    let zh_post = fs::read_to_string(out.join("CN/2024/03/10/hello.html")).unwrap();
    assert!(zh_post.contains("<html lang='zh-CN'>"));

    let feed = fs::read_to_string(out.join("feed.xml")).unwrap();
    assert!(feed.contains("<id>https://notes.example.com/2024/03/10/hello</id>"));

    assert_eq!(
        fs::read_to_string(out.join("favicon.svg")).unwrap(),
        "<svg/>"
    );
}

#[test]
fn test_video_loop_renders_without_controls() {
    let dir = create_site();
    let site = Site::load(dir.path()).unwrap();
    site.build(&BuildOptions::default()).unwrap();

    let clips = fs::read_to_string(dir.path().join("out/www/2023/12/31/clips.html")).unwrap();
    assert!(clips.contains(r#"<video src="clip.mp4" autoplay muted loop></video>"#));
    assert!(!clips.contains("controls"));
}
