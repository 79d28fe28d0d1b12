mod file;
mod download;
mod options;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use download::collection::{PartSelection, PromptPicker};
use download::naming::OutputTarget;
use download::pipeline::{Pipeline, RunSummary};
use download::remux::Ffmpeg;
use download::DownloadClient;

#[derive(Parser, Debug)]
#[command(version, about)]
#[command(group(ArgGroup::new("source").required(true).args(["url", "file"])))]
struct Args {
    #[clap(value_parser = url_parser)]
    /// provide a video page link
    url: Option<String>,

    #[clap(short, long)]
    /// download every page link listed in a json file
    file: Option<PathBuf>,

    #[clap(short, long)]
    /// output directory, or output file for a single video (a new path with an extension is a file)
    output: Option<PathBuf>,

    #[clap(short, long)]
    /// download every part of a collection
    all: bool,

    #[clap(short, long)]
    /// comma separated, 1-based list of parts to download
    indices: Option<String>,

    #[clap(long, env = "BILIDL_FFMPEG", default_value = "ffmpeg")]
    /// ffmpeg binary used to merge video and audio
    ffmpeg: PathBuf,

    #[clap(long, env = "BILIDL_USER_AGENT", default_value = options::DEFAULT_USER_AGENT)]
    /// user agent sent with every request
    user_agent: String,

    #[clap(long, default_value = "debug.html")]
    /// where to save the page when no video info can be found in it
    dump: PathBuf,

    #[clap(short, long)]
    /// log debug output
    verbose: bool,

    #[clap(short, long, conflicts_with = "verbose")]
    /// only log errors
    quiet: bool,
}

fn url_parser(url: &str) -> Result<String, String> {
    if url.starts_with("http") {
        Ok(url.to_string())
    } else {
        Err("URL must start with http or https".to_string())
    }
}

fn log_filter(verbose: bool, quiet: bool, rust_log: Option<&str>) -> EnvFilter {
    if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        rust_log
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::registry()
        .with(log_filter(verbose, quiet, rust_log.as_deref()))
        .with(fmt::layer().with_target(false))
        .init();
}

async fn run(args: Args) -> error::Result<RunSummary> {
    let options = options::Options {
        output: OutputTarget::resolve(args.output.as_deref()),
        selection: PartSelection::from_flags(args.all, args.indices.as_deref()),
        ffmpeg: args.ffmpeg,
        user_agent: args.user_agent,
        dump_path: args.dump,
    };

    tracing::debug!("Options: {:?}", options);

    let client = DownloadClient::new(&options.user_agent)?;
    let ffmpeg = Ffmpeg::new(options.ffmpeg.clone());
    let pipeline = Pipeline::new(&client, &ffmpeg, &PromptPicker, &options);

    match (args.file, args.url) {
        (Some(file), _) => file::download_file(&file, &pipeline, &options).await,
        (None, Some(url)) => pipeline.run(&url).await,
        (None, None) => Ok(RunSummary::default()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(args).await {
        Ok(summary) => {
            info!(
                "Finished: {} downloaded, {} skipped, {} failed",
                summary.downloaded, summary.skipped, summary.failed
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("An error occurred: {}", err);
            ExitCode::FAILURE
        }
    }
}
