//! Main entry point for the kvsget CLI

use anyhow::{anyhow, Context};
use clap::Parser;
use kvsget::cli::output::{create_progress_callback, OutputFormatter};
use kvsget::cli::{Args, VerbosityLevel};
use kvsget::core::resolver::{Resolved, Resolver};
use kvsget::core::video_info::{FormatSelector, Listing, VideoMetadata};
use kvsget::download::downloader::MediaDownloader;
use kvsget::platform::client::HttpFetcher;
use kvsget::platform::formats::select_format;
use kvsget::utils::url::is_supported_url;
use kvsget::utils::filename::{resolve_listing_output_path, resolve_output_path, video_filename};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbosity_level())?;
    debug!("Starting kvsget with args: {:?}", args);

    let formatter = Arc::new(
        OutputFormatter::new(args.verbosity_level()).with_progress(!args.no_progress),
    );
    let selector = args
        .format_selector()
        .map_err(|e| anyhow!("invalid --format: {}", e))?;

    let fetcher = Arc::new(
        HttpFetcher::with_config(args.http_config()).context("failed to build HTTP client")?,
    );
    let resolver = Resolver::new(fetcher.clone()).with_options(args.resolver_options());
    let downloader = build_downloader(&args, &fetcher, formatter.clone());

    if !is_supported_url(&args.url) {
        return Err(anyhow!(
            "{} is not a ThisVid video, embed, member or playlist URL",
            args.url
        ));
    }

    let resolved = match resolver.resolve_any(&args.url, args.listing_limit()).await {
        Ok(resolved) => resolved,
        Err(e) if e.is_extraction_error() => {
            warn!("Player data on {} was not recognised: {}", args.url, e);
            return Err(anyhow::Error::new(e).context(format!(
                "{} does not carry a usable player configuration",
                args.url
            )));
        }
        Err(e) => return Err(e).with_context(|| format!("failed to resolve {}", args.url)),
    };

    match resolved {
        Resolved::Video(video) => {
            handle_video(&video, &args, &selector, &downloader, &formatter, false).await
        }
        Resolved::Listing(listing) => {
            handle_listing(&listing, &args, &selector, &resolver, &downloader, &formatter).await
        }
    }
}

fn build_downloader(
    args: &Args,
    fetcher: &HttpFetcher,
    formatter: Arc<OutputFormatter>,
) -> MediaDownloader {
    let mut downloader =
        MediaDownloader::new(fetcher.client().clone()).with_max_retries(args.retries);
    if let Some(rate_limit) = args.parse_rate_limit() {
        downloader = downloader.with_rate_limit(rate_limit);
    }
    if !args.no_progress {
        downloader = downloader.with_progress_callback(create_progress_callback(formatter));
    }
    downloader
}

/// Print, list or download one resolved video
async fn handle_video(
    video: &VideoMetadata,
    args: &Args,
    selector: &FormatSelector,
    downloader: &MediaDownloader,
    formatter: &OutputFormatter,
    in_listing: bool,
) -> anyhow::Result<()> {
    if args.dump_json {
        println!("{}", serde_json::to_string_pretty(video)?);
        return Ok(());
    }
    if args.list_formats {
        formatter.print_video_info(video);
        formatter.print_formats(&video.formats);
        return Ok(());
    }

    let format = select_format(&video.formats, selector)
        .with_context(|| format!("no format matches '{}'", args.format))?;
    if args.print_url {
        println!("{}", format.url);
        return Ok(());
    }

    formatter.print_video_info(video);
    let filename = video_filename(&video.title, &video.id, &format.ext);
    let output_path = if in_listing {
        resolve_listing_output_path(args.output.as_deref(), &filename)
    } else {
        resolve_output_path(args.output.as_deref(), &filename)
    }
    .context("failed to choose output path")?;
    let shown_path = output_path.display().to_string();
    formatter.print_download_start(format, &shown_path);

    let start_time = Instant::now();
    let result = downloader.download(format, &output_path).await;
    match result {
        Ok(bytes) => {
            formatter.finish_progress("done");
            info!("Saved {} ({} bytes)", shown_path, bytes);
            formatter.print_download_complete(&shown_path, bytes, start_time.elapsed());
            Ok(())
        }
        Err(e) => {
            formatter.finish_progress("failed");
            Err(e).with_context(|| format!("download of {} failed", format.format_id))
        }
    }
}

/// Print or download every entry of a member or playlist listing
async fn handle_listing(
    listing: &Listing,
    args: &Args,
    selector: &FormatSelector,
    resolver: &Resolver,
    downloader: &MediaDownloader,
    formatter: &OutputFormatter,
) -> anyhow::Result<()> {
    if args.dump_json {
        println!("{}", serde_json::to_string_pretty(listing)?);
        return Ok(());
    }
    if args.print_url && !args.list_formats {
        for entry in &listing.entries {
            println!("{}", entry);
        }
        return Ok(());
    }

    formatter.print_listing(listing, args.listing_limit());
    let start_time = Instant::now();
    let total = listing.entries.len();
    let mut failures = 0usize;

    for (index, entry) in listing.entries.iter().enumerate() {
        formatter.print_listing_item(index, total, entry);
        let outcome = match resolver.resolve(entry).await {
            Ok(video) => {
                handle_video(&video, args, selector, downloader, formatter, true).await
            }
            Err(e) => Err(e.into()),
        };
        if let Err(e) = outcome {
            failures += 1;
            warn!("Skipping {}: {:#}", entry, e);
            formatter.warning(&format!("{}: {:#}", entry, e));
        }
    }

    if failures == total && total > 0 {
        return Err(anyhow!("all {} listing entries failed", total));
    }
    formatter.success(&format!(
        "Processed {} of {} videos in {}",
        total - failures,
        total,
        kvsget::core::progress::format_duration(start_time.elapsed())
    ));
    Ok(())
}

/// Initialize logging system
fn init_logging(verbosity: VerbosityLevel) -> anyhow::Result<()> {
    let default_level = match verbosity {
        VerbosityLevel::Quiet => "error",
        VerbosityLevel::Normal => "info",
        VerbosityLevel::Verbose => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {}", e))
}
