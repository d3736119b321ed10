mod commands;

use clap::{Parser, Subcommand};
use jotsite::{BuildOptions, Lang};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jotsite")]
#[command(about = "A static blog generator for djot documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Build {
        #[arg(long, short)]
        input: Option<PathBuf>,

        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Only build posts whose file name contains this string
        #[arg(long)]
        filter: Option<String>,

        /// Fetch the feeds listed in the blogroll file
        #[arg(long)]
        blogroll: bool,

        /// Print phase timings as JSON
        #[arg(long)]
        profile: bool,

        /// Make post bodies editable in the browser for spell checking
        #[arg(long)]
        spell: bool,

        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        clean: bool,
    },
    Watch {
        #[arg(long, short)]
        input: Option<PathBuf>,

        #[arg(long, short)]
        output: Option<PathBuf>,

        #[arg(long)]
        filter: Option<String>,

        #[arg(long)]
        blogroll: bool,

        #[arg(long, default_value = "3000")]
        port: u16,

        #[arg(long)]
        open: bool,
    },
    /// Create an empty post dated today
    Touch {
        slug: String,

        #[arg(long, short)]
        input: Option<PathBuf>,

        #[arg(long, default_value = "en", value_parser = ["en", "zh"])]
        lang: String,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build {
            input,
            output,
            filter,
            blogroll,
            profile,
            spell,
            clean,
        } => commands::build_site(
            input.as_deref(),
            output.as_deref(),
            &BuildOptions {
                clean,
                blogroll,
                spell,
                filter,
            },
            profile,
        ),
        Commands::Watch {
            input,
            output,
            filter,
            blogroll,
            port,
            open,
        } => {
            commands::watch_site(input.as_deref(), output.as_deref(), filter, blogroll, port, open)
                .await
        }
        Commands::Touch { slug, input, lang } => {
            let lang = if lang == "zh" { Lang::Zh } else { Lang::En };
            commands::touch_post(input.as_deref(), &slug, lang).map(|_| ())
        }
    };

    if let Err(error) = result {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}
