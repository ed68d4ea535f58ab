use crate::extractor::ExtractionProgress;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(120);

/// Terminal feedback while acquisitions are read.
///
/// Bars draw on stderr so stdout stays clean for the report. When disabled,
/// every bar handed out is hidden and updates cost nothing.
pub struct ProgressManager {
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn scan_spinner(&self, data_dir: &Path, pattern: &str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::with_template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Looking for {} in {}", pattern, data_dir.display()));
        pb.enable_steady_tick(TICK);
        pb
    }

    /// Bar measured in bytes, since acquisition sizes vary by orders of magnitude.
    pub fn acquisition_bar(&self, total_bytes: u64) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::with_draw_target(Some(total_bytes), ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.blue} [{bar:32.blue/white}] {binary_bytes}/{binary_total_bytes} {wide_msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );
        pb.enable_steady_tick(TICK);
        pb
    }
}

/// Reflect the extractor's position on the bar.
pub fn track(pb: &ProgressBar, progress: &ExtractionProgress) {
    pb.set_position(progress.bytes_processed);
    match progress.current_file {
        Some(ref name) => pb.set_message(format!(
            "{} ({}/{})",
            name,
            progress.files_processed + 1,
            progress.total_files
        )),
        None => pb.set_message(format!("{} rows", progress.rows_extracted)),
    }
}

pub fn finish(pb: &ProgressBar, progress: &ExtractionProgress) {
    pb.finish_with_message(format!(
        "{} files, {} rows in {}",
        progress.files_processed,
        progress.rows_extracted,
        format_duration(progress.elapsed())
    ));
}

/// Leave the bar on screen pointing at the file that failed.
pub fn stop(pb: &ProgressBar, progress: &ExtractionProgress) {
    let at = progress.current_file.as_deref().unwrap_or("start");
    pb.abandon_with_message(format!("stopped at {}", at));
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0 => format!("{}ms", duration.as_millis()),
        1..=59 => format!("{}s", secs),
        _ => format!("{}m {:02}s", secs / 60, secs % 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_manager_hides_bars() {
        let manager = ProgressManager::new(false);
        assert!(!manager.is_enabled());
        assert!(manager.scan_spinner(Path::new("."), "*.json").is_hidden());
        assert!(manager.acquisition_bar(4096).is_hidden());
    }

    #[test]
    fn test_track_follows_bytes() {
        let pb = ProgressBar::hidden();
        pb.set_length(3000);

        let mut progress = ExtractionProgress::new(3, 3000);
        progress.start_file("D20180718-T020310.json".to_string());
        track(&pb, &progress);
        assert_eq!(pb.position(), 0);
        assert_eq!(pb.message(), "D20180718-T020310.json (1/3)");

        progress.finish_file(1000, 2);
        progress.start_file("D20180718-T030310.json".to_string());
        track(&pb, &progress);
        assert_eq!(pb.position(), 1000);
        assert_eq!(pb.message(), "D20180718-T030310.json (2/3)");

        progress.current_file = None;
        track(&pb, &progress);
        assert_eq!(pb.message(), "2 rows");
    }

    #[test]
    fn test_stop_names_failing_file() {
        let pb = ProgressBar::hidden();
        let mut progress = ExtractionProgress::new(2, 2000);
        progress.start_file("broken.json".to_string());
        stop(&pb, &progress);
        assert_eq!(pb.message(), "stopped at broken.json");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(450)), "450ms");
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
    }
}
