use axum::Router;
use chrono::Utc;
use jotsite::{BuildOptions, Lang, RebuildScheduler, SOURCE_EXTENSION, Site, SourceWatcher, load_config};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;

fn load_site(input: Option<&Path>, output: Option<&Path>) -> Result<Site, Box<dyn std::error::Error>> {
    let site = Site::load(input.unwrap_or(Path::new(".")))?;
    Ok(match output {
        Some(output) => site.output_dir(output),
        None => site,
    })
}

pub fn build_site(
    input: Option<&Path>,
    output: Option<&Path>,
    options: &BuildOptions,
    profile: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let site = load_site(input, output)?;

    println!("Building site...");
    let report = site.build(options)?;

    println!(
        "Built {} posts to {} in {:.2}ms",
        report.posts,
        site.output_path().display(),
        report.context.total_ms
    );

    if profile {
        println!("{}", serde_json::to_string(&report.context)?);
    }

    Ok(())
}

pub async fn watch_site(
    input: Option<&Path>,
    output: Option<&Path>,
    filter: Option<String>,
    blogroll: bool,
    port: u16,
    open_browser: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let site = load_site(input, output)?;
    let output_dir = site.output_path().to_path_buf();

    println!("Building site...");
    let initial = BuildOptions {
        blogroll,
        filter: filter.clone(),
        ..BuildOptions::default()
    };
    if let Err(error) = site.build(&initial) {
        tracing::error!(%error, "initial build failed");
    }

    let (reload_tx, _) = broadcast::channel::<()>(16);
    let reload_tx_clone = reload_tx.clone();

    let (event_tx, event_rx) = channel();
    let content_dir = site.content_path();
    let watcher = SourceWatcher::new(&[content_dir.as_path()], event_tx)?;
    let debounce = Duration::from_millis(site.config().debounce_ms);

    let incremental = BuildOptions {
        clean: false,
        blogroll: false,
        filter,
        ..BuildOptions::default()
    };

    std::thread::spawn(move || {
        let _watcher = watcher;
        let mut scheduler = RebuildScheduler::new(debounce);

        scheduler.run(&event_rx, |cycle| {
            rebuild_cycle(&site, &incremental, &reload_tx_clone, cycle);
        });
        tracing::info!(cycles = scheduler.cycles(), "file watcher stopped");
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("Serving at http://{addr}");
    println!("Press Ctrl+C to stop");

    if open_browser {
        let url = format!("http://localhost:{port}");
        if let Err(error) = open::that(&url) {
            eprintln!("Failed to open browser: {error}");
        }
    }

    let livereload = tower_livereload::LiveReloadLayer::new();
    let reloader = livereload.reloader();

    let mut reload_rx = reload_tx.subscribe();
    tokio::spawn(async move {
        loop {
            if reload_rx.recv().await.is_ok() {
                reloader.reload();
            }
        }
    });

    let serve_dir = ServeDir::new(output_dir).append_index_html_on_directories(true);

    let app = Router::new().fallback_service(serve_dir).layer(livereload);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// One watch-triggered build. Success pushes a reload to connected
/// browsers; failure is logged and leaves the watch loop running.
fn rebuild_cycle(
    site: &Site,
    options: &BuildOptions,
    reload: &broadcast::Sender<()>,
    cycle: u64,
) {
    println!("Changes detected, rebuilding...");

    match site.build(options) {
        Ok(report) => {
            println!(
                "Rebuilt {} posts in {:.2}ms",
                report.posts, report.context.total_ms
            );
            let _ = reload.send(());
        }
        Err(error) => tracing::error!(cycle, %error, "rebuild failed"),
    }
}

pub fn touch_post(
    input: Option<&Path>,
    slug: &str,
    lang: Lang,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if slug.is_empty() || slug.contains(['/', '\\', '.']) {
        return Err(format!("invalid slug: {slug:?}").into());
    }

    let root = input.unwrap_or(Path::new("."));
    let config = load_config(root)?;
    let filename = format!(
        "{}-{slug}{}.{SOURCE_EXTENSION}",
        Utc::now().format("%Y-%m-%d"),
        lang.source_suffix()
    );
    let posts_dir = root.join(&config.posts_dir);
    let path = posts_dir.join(filename);

    fs::create_dir_all(&posts_dir)?;
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(b"#\n")?;

    println!("Created {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jotsite::parse_post_filename;
    use tempfile::TempDir;

    #[test]
    fn test_touch_post_creates_dated_file() {
        let dir = TempDir::new().unwrap();
        let path = touch_post(Some(dir.path()), "first-post", Lang::En).unwrap();

        assert!(path.starts_with(dir.path().join("content/posts")));
        assert_eq!(fs::read_to_string(&path).unwrap(), "#\n");

        let filename = path.file_name().unwrap().to_string_lossy();
        let name = parse_post_filename(&filename).unwrap();
        assert_eq!(name.slug, "first-post");
        assert_eq!(name.lang, Lang::En);
    }

    #[test]
    fn test_touch_post_appends() {
        let dir = TempDir::new().unwrap();
        touch_post(Some(dir.path()), "again", Lang::Zh).unwrap();
        let path = touch_post(Some(dir.path()), "again", Lang::Zh).unwrap();

        assert!(path.to_string_lossy().ends_with("-again.zh.dj"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "#\n#\n");
    }

    #[test]
    fn test_touch_post_rejects_bad_slugs() {
        let dir = TempDir::new().unwrap();
        assert!(touch_post(Some(dir.path()), "", Lang::En).is_err());
        assert!(touch_post(Some(dir.path()), "../escape", Lang::En).is_err());
    }

    #[test]
    fn test_build_site_writes_output() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("content/posts")).unwrap();
        fs::write(dir.path().join("content/about.dj"), "# About\n").unwrap();
        fs::write(
            dir.path().join("content/posts/2024-03-10-hello.dj"),
            "# Hello\n\nWorld.\n",
        )
        .unwrap();

        let output = dir.path().join("site");
        build_site(Some(dir.path()), Some(&output), &BuildOptions::default(), true).unwrap();

        assert!(output.join("index.html").exists());
        assert!(output.join("2024/03/10/hello.html").exists());
    }

    fn watched_site(dir: &TempDir) -> Site {
        fs::create_dir_all(dir.path().join("content/posts")).unwrap();
        fs::write(dir.path().join("content/about.dj"), "# About\n").unwrap();
        fs::write(
            dir.path().join("content/posts/2024-03-10-hello.dj"),
            "# Hello\n\nWorld.\n",
        )
        .unwrap();
        Site::load(dir.path()).unwrap().output_dir(dir.path().join("site"))
    }

    fn incremental() -> BuildOptions {
        BuildOptions {
            clean: false,
            ..BuildOptions::default()
        }
    }

    #[test]
    fn test_rebuild_cycle_sends_one_reload() {
        let dir = TempDir::new().unwrap();
        let site = watched_site(&dir);
        let (reload_tx, mut reload_rx) = broadcast::channel(16);

        rebuild_cycle(&site, &incremental(), &reload_tx, 1);

        assert!(reload_rx.try_recv().is_ok());
        assert!(reload_rx.try_recv().is_err());
        assert!(dir.path().join("site/2024/03/10/hello.html").exists());
    }

    #[test]
    fn test_failed_rebuild_sends_no_reload() {
        let dir = TempDir::new().unwrap();
        let site = watched_site(&dir);
        fs::remove_file(dir.path().join("content/about.dj")).unwrap();
        let (reload_tx, mut reload_rx) = broadcast::channel(16);

        rebuild_cycle(&site, &incremental(), &reload_tx, 1);

        assert!(reload_rx.try_recv().is_err());
    }

    #[test]
    fn test_rebuild_recovers_after_failure() {
        let dir = TempDir::new().unwrap();
        let site = watched_site(&dir);
        let (reload_tx, mut reload_rx) = broadcast::channel(16);

        fs::remove_file(dir.path().join("content/about.dj")).unwrap();
        rebuild_cycle(&site, &incremental(), &reload_tx, 1);
        assert!(reload_rx.try_recv().is_err());

        fs::write(dir.path().join("content/about.dj"), "# About\n").unwrap();
        rebuild_cycle(&site, &incremental(), &reload_tx, 2);
        assert!(reload_rx.try_recv().is_ok());
    }
}
