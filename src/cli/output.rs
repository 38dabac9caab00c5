//! Output formatting and progress display

use crate::cli::args::VerbosityLevel;
use crate::core::progress::{format_bytes, format_bytes_per_second, format_duration, Progress};
use crate::core::video_info::{FormatCandidate, Listing, VideoMetadata};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {bytes} {msg}";

/// Output formatter for kvsget
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
    show_progress: bool,
    progress_bar: Mutex<Option<ProgressBar>>,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_progress: verbosity != VerbosityLevel::Quiet,
            progress_bar: Mutex::new(None),
        }
    }

    /// Enable or disable the progress bar
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress && self.verbosity != VerbosityLevel::Quiet;
        self
    }

    /// Start a progress bar for one download; `total_size` of 0 shows a spinner
    pub fn create_progress_bar(&self, total_size: u64) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let (progress_bar, template) = if total_size > 0 {
            (ProgressBar::new(total_size), BAR_TEMPLATE)
        } else {
            (ProgressBar::new_spinner(), SPINNER_TEMPLATE)
        };
        let style = ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        progress_bar.set_style(style);
        progress_bar.set_message("Downloading...");
        progress_bar.enable_steady_tick(Duration::from_millis(120));

        if let Ok(mut slot) = self.progress_bar.lock() {
            *slot = Some(progress_bar.clone());
        }
        Some(progress_bar)
    }

    /// Update progress bar, creating it on the first update
    pub fn update_progress(&self, progress: &Progress) {
        let existing = self.progress_bar.lock().ok().and_then(|slot| slot.clone());
        let progress_bar = match existing {
            Some(progress_bar) => progress_bar,
            None => match self.create_progress_bar(progress.total_size) {
                Some(progress_bar) => progress_bar,
                None => return,
            },
        };

        if progress.total_size > 0 {
            progress_bar.set_length(progress.total_size);
        }
        progress_bar.set_position(progress.downloaded_size);
        if let Some(speed) = progress.speed {
            progress_bar.set_message(format_bytes_per_second(speed));
        }
    }

    /// Finish and detach the current progress bar
    pub fn finish_progress(&self, message: &str) {
        let finished = self.progress_bar.lock().ok().and_then(|mut slot| slot.take());
        if let Some(progress_bar) = finished {
            progress_bar.finish_with_message(message.to_string());
        }
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("ℹ️  {}", message);
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("✅ {}", message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("⚠️  {}", message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("❌ {}", message);
    }

    /// Print debug message
    pub fn debug(&self, message: &str) {
        if self.verbosity == VerbosityLevel::Verbose {
            println!("🐛 {}", message);
        }
    }

    /// Print video information
    pub fn print_video_info(&self, video: &VideoMetadata) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        println!("📹 {}", video.title);
        println!("🆔 {}", video.id);
        if let Some(uploader) = &video.uploader {
            println!("👤 {}", uploader);
        }
        println!("🔞 age limit {}", video.age_limit());
        println!("📊 {} formats available", video.formats.len());
        println!();
    }

    /// Print the format table shown by `--list-formats`
    pub fn print_formats(&self, formats: &[FormatCandidate]) {
        println!("{}", format_table(formats));
    }

    /// Print listing summary and entries
    pub fn print_listing(&self, listing: &Listing, limit: Option<usize>) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        match &listing.title {
            Some(title) => println!("📋 {} ({})", title, listing.id),
            None => println!("📋 {}", listing.id),
        }
        match limit {
            Some(limit) => println!("📊 Items: {} (limited to {})", listing.entries.len(), limit),
            None => println!("📊 Items: {}", listing.entries.len()),
        }
        println!();
    }

    /// Print listing item progress
    pub fn print_listing_item(&self, index: usize, total: usize, url: &str) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        println!("📥 [{}/{}] {}", index + 1, total, url);
    }

    /// Print download start message
    pub fn print_download_start(&self, format: &FormatCandidate, output_path: &str) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        println!("🚀 Starting download of {} ({})", format.format_id, format.resolution_string());
        self.debug(&format!("URL: {}", format.url));
        println!("💾 Output: {}", output_path);
    }

    /// Print download complete message
    pub fn print_download_complete(&self, output_path: &str, bytes: u64, duration: Duration) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        println!("✅ Download completed: {}", format_bytes(bytes));
        println!("💾 Saved to: {}", output_path);
        println!("⏱️  Time: {}", format_duration(duration));
    }
}

/// Render formats as a fixed-width table, best first
pub fn format_table(formats: &[FormatCandidate]) -> String {
    let mut lines = vec![format!(
        "{:<12} {:<12} {:<5} {}",
        "ID", "RESOLUTION", "EXT", "SOURCE"
    )];
    for format in formats {
        lines.push(format!(
            "{:<12} {:<12} {:<5} {}",
            format.format_id,
            format.resolution_string(),
            format.ext,
            format.key
        ));
    }
    lines.join("\n")
}

/// Create a progress callback for the downloader
pub fn create_progress_callback(
    formatter: Arc<OutputFormatter>,
) -> impl Fn(Progress) + Send + Sync + 'static {
    move |progress: Progress| {
        formatter.update_progress(&progress);
    }
}
