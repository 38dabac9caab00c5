//! Download progress reporting

use std::time::{Duration, Instant};

/// Progress of one media download
#[derive(Debug, Clone)]
pub struct Progress {
    /// Size announced by the server, `0` when unknown
    pub total_size: u64,
    /// Bytes written so far
    pub downloaded_size: u64,
    /// Bytes per second since the download started
    pub speed: Option<f64>,
    /// Estimated time remaining; needs a known total
    pub eta: Option<Duration>,
    /// Time when download started
    pub start_time: Instant,
}

impl Progress {
    /// Start tracking a download of `total_size` bytes (`0` if unknown)
    pub fn new(total_size: u64) -> Self {
        Self {
            total_size,
            downloaded_size: 0,
            speed: None,
            eta: None,
            start_time: Instant::now(),
        }
    }

    /// Record the new byte count
    pub fn update(&mut self, downloaded_size: u64) {
        self.downloaded_size = downloaded_size;

        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        let speed = downloaded_size as f64 / elapsed;
        self.speed = Some(speed);
        self.eta = match self.total_size.checked_sub(downloaded_size) {
            Some(remaining) if speed > 0.0 && self.total_size > 0 => {
                Some(Duration::from_secs_f64(remaining as f64 / speed))
            }
            _ => None,
        };
    }

    /// Completion percentage, when the total is known
    pub fn percent(&self) -> Option<f64> {
        if self.total_size == 0 {
            return None;
        }
        Some((self.downloaded_size as f64 / self.total_size as f64 * 100.0).min(100.0))
    }

    /// Check if download is complete
    pub fn is_complete(&self) -> bool {
        self.total_size > 0 && self.downloaded_size >= self.total_size
    }

    /// One-line summary, e.g. `1.5 MB / 3.0 MB at 512.0 KB/s, ETA 3s`
    pub fn summary(&self) -> String {
        let mut line = format_bytes(self.downloaded_size);
        if self.total_size > 0 {
            line.push_str(&format!(" / {}", format_bytes(self.total_size)));
        }
        if let Some(speed) = self.speed {
            line.push_str(&format!(" at {}", format_bytes_per_second(speed)));
        }
        if let Some(eta) = self.eta {
            line.push_str(&format!(", ETA {}", format_duration(eta)));
        }
        line
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exp = ((bytes_f64.ln() / THRESHOLD.ln()).floor() as usize).min(UNITS.len() - 1);
    if exp == 0 {
        return format!("{} B", bytes);
    }
    format!("{:.1} {}", bytes_f64 / THRESHOLD.powi(exp as i32), UNITS[exp])
}

/// Format bytes per second as human-readable string
pub fn format_bytes_per_second(bytes_per_second: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_second as u64))
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let (hours, minutes, seconds) = (
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
    );

    match (hours, minutes, seconds) {
        (0, 0, s) => format!("{}s", s),
        (0, m, 0) => format!("{}m", m),
        (0, m, s) => format!("{}m {}s", m, s),
        (h, 0, _) => format!("{}h", h),
        (h, m, _) => format!("{}h {}m", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_progress_known_total() {
        let mut progress = Progress::new(1000);
        assert_eq!(progress.percent(), Some(0.0));
        assert!(!progress.is_complete());

        thread::sleep(Duration::from_millis(20));
        progress.update(500);
        assert_eq!(progress.percent(), Some(50.0));
        assert!(progress.speed.unwrap() > 0.0);
        assert!(progress.eta.is_some());

        progress.update(1000);
        assert!(progress.is_complete());
        assert_eq!(progress.percent(), Some(100.0));
    }

    #[test]
    fn test_progress_unknown_total() {
        let mut progress = Progress::new(0);
        thread::sleep(Duration::from_millis(20));
        progress.update(2048);
        assert_eq!(progress.percent(), None);
        assert!(progress.eta.is_none());
        assert!(!progress.is_complete());
        assert!(progress.summary().starts_with("2.0 KB at "));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(3660)), "1h 1m");
    }
}
