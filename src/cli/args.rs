//! Command line argument parsing

use crate::core::resolver::ResolverOptions;
use crate::core::video_info::{FormatSelector, QualitySelector};
use crate::platform::client::HttpClientConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// kvsget - resolve and download videos from KVS-powered ThisVid pages
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Video, embed, member or playlist page URL
    pub url: String,

    /// Format selector (e.g. 'best', 'worst', '720p', 'height<=480', 'id=video_alt_url')
    #[arg(short, long, value_name = "FORMAT", default_value = "best")]
    pub format: String,

    /// Output path (file or directory)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// HTTP timeout (e.g., 30s, 1m)
    #[arg(long, value_name = "DURATION", default_value = "30s")]
    pub timeout: humantime::Duration,

    /// HTTP retries for transient errors
    #[arg(long, default_value = "3")]
    pub retries: u32,

    /// Delay before the first retry, doubled on each attempt (e.g., 200ms, 1s)
    #[arg(long, value_name = "DURATION", default_value = "200ms")]
    pub retry_delay: humantime::Duration,

    /// Download rate limit (e.g., 2MiB/s, 500KiB/s)
    #[arg(long, value_name = "RATE")]
    pub rate_limit: Option<String>,

    /// Override User-Agent header
    #[arg(long, value_name = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// Proxy URL (http/https/socks)
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Print the selected media URL and exit (no download)
    #[arg(short = 'g', long)]
    pub print_url: bool,

    /// Print resolved metadata as JSON and exit
    #[arg(short = 'j', long)]
    pub dump_json: bool,

    /// List available formats and exit
    #[arg(short = 'F', long)]
    pub list_formats: bool,

    /// For playlist URLs, download only the featured video
    #[arg(long)]
    pub no_playlist: bool,

    /// Max listing entries to process (0 means all)
    #[arg(long, default_value = "0")]
    pub limit: usize,

    /// Max listing pages to walk
    #[arg(long, default_value = "50")]
    pub max_pages: usize,

    /// Disable progress output
    #[arg(long)]
    pub no_progress: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Get HTTP timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        self.timeout.into()
    }

    /// Parse rate limit string to bytes per second
    pub fn parse_rate_limit(&self) -> Option<u64> {
        self.rate_limit.as_deref().and_then(parse_rate_limit)
    }

    /// Listing entry limit, `None` for all
    pub fn listing_limit(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.limit)
    }

    /// Parse the `--format` selector
    pub fn format_selector(&self) -> Result<FormatSelector, String> {
        let quality: QualitySelector = self.format.parse()?;
        Ok(FormatSelector::new(quality))
    }

    /// HTTP client configuration from the network flags
    pub fn http_config(&self) -> HttpClientConfig {
        let mut config = HttpClientConfig::default()
            .with_timeout(self.timeout_duration())
            .with_max_retries(self.retries)
            .with_retry_delay(self.retry_delay.into());
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent.clone());
        }
        if let Some(proxy) = &self.proxy {
            config = config.with_proxy(proxy.clone());
        }
        config
    }

    /// Resolver options from the listing flags
    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            noplaylist: self.no_playlist,
            max_listing_pages: self.max_pages.max(1),
        }
    }

    /// Check if nothing should be downloaded
    pub fn is_simulation(&self) -> bool {
        self.print_url || self.dump_json || self.list_formats
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

impl Default for Args {
    fn default() -> Self {
        Self {
            url: String::new(),
            format: "best".to_string(),
            output: None,
            timeout: humantime::Duration::from(Duration::from_secs(30)),
            retries: 3,
            retry_delay: humantime::Duration::from(Duration::from_millis(200)),
            rate_limit: None,
            user_agent: None,
            proxy: None,
            print_url: false,
            dump_json: false,
            list_formats: false,
            no_playlist: false,
            limit: 0,
            max_pages: 50,
            no_progress: false,
            verbose: false,
            quiet: false,
        }
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}

/// Parse rate limit string to bytes per second
pub fn parse_rate_limit(rate: &str) -> Option<u64> {
    let rate = rate.trim().to_uppercase();
    let rate = rate.trim_end_matches("/S");
    if rate.is_empty() {
        return None;
    }

    let number_end = rate
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map_or(rate.len(), |(i, _)| i);
    if number_end == 0 {
        return None;
    }

    let number: f64 = rate[..number_end].parse().ok()?;
    if number <= 0.0 {
        return None;
    }

    let multiplier: u64 = match rate[number_end..].trim() {
        "B" | "" => 1,
        "KB" | "K" => 1000,
        "KIB" => 1024,
        "MB" | "M" => 1000 * 1000,
        "MIB" => 1024 * 1024,
        "GB" | "G" => 1000 * 1000 * 1000,
        "GIB" => 1024 * 1024 * 1024,
        _ => return None,
    };

    Some((number * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate_limit() {
        assert_eq!(parse_rate_limit("1MB/s"), Some(1000 * 1000));
        assert_eq!(parse_rate_limit("1MiB/s"), Some(1024 * 1024));
        assert_eq!(parse_rate_limit("500KiB"), Some(500 * 1024));
        assert_eq!(parse_rate_limit("1.5M"), Some(1500 * 1000));
        assert_eq!(parse_rate_limit(" 1mb/s "), Some(1000 * 1000));
        assert_eq!(parse_rate_limit("1024"), Some(1024));
        assert_eq!(parse_rate_limit("0"), None);
        assert_eq!(parse_rate_limit("-1MB"), None);
        assert_eq!(parse_rate_limit(""), None);
        assert_eq!(parse_rate_limit("1XB"), None);
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::parse_from([
            "kvsget",
            "-F",
            "--no-playlist",
            "--timeout",
            "1m",
            "--limit",
            "5",
            "--retry-delay",
            "2s",
            "https://thisvid.com/playlist/6615/video/big-italian-booty-28/",
        ]);
        assert!(args.list_formats);
        assert!(args.is_simulation());
        assert!(args.resolver_options().noplaylist);
        assert_eq!(args.timeout_duration(), Duration::from_secs(60));
        assert_eq!(args.listing_limit(), Some(5));
        assert_eq!(args.http_config().retry_delay, Duration::from_secs(2));
        assert_eq!(args.format, "best");
    }

    #[test]
    fn test_args_verbosity_level() {
        let args = Args {
            quiet: true,
            verbose: true,
            ..Default::default()
        };
        assert_eq!(args.verbosity_level(), VerbosityLevel::Quiet);

        let args = Args {
            verbose: true,
            ..Default::default()
        };
        assert_eq!(args.verbosity_level(), VerbosityLevel::Verbose);
        assert_eq!(Args::default().verbosity_level(), VerbosityLevel::Normal);
    }

    #[test]
    fn test_http_config() {
        let args = Args {
            retries: 5,
            retry_delay: humantime::Duration::from(Duration::from_secs(1)),
            user_agent: Some("Custom Agent".to_string()),
            proxy: Some("http://proxy:8080".to_string()),
            ..Default::default()
        };
        let config = args.http_config();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.user_agent.as_deref(), Some("Custom Agent"));
        assert_eq!(config.proxy_url.as_deref(), Some("http://proxy:8080"));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_format_selector() {
        let args = Args {
            format: "height<=720".to_string(),
            ..Default::default()
        };
        assert_eq!(
            args.format_selector().unwrap().quality,
            QualitySelector::HeightLessOrEqual(720)
        );

        let args = Args {
            format: "height<=tall".to_string(),
            ..Default::default()
        };
        assert!(args.format_selector().is_err());
    }

    #[test]
    fn test_listing_defaults() {
        let args = Args::default();
        assert_eq!(args.listing_limit(), None);
        assert_eq!(args.resolver_options().max_listing_pages, 50);
        assert!(!args.is_simulation());
    }
}
