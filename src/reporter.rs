use console::style;
use drive_sweep::ProgressReporter;
use drive_sweep::ScanEvent;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress using indicatif.
///
/// - Discovery: spinner (total unknown until the walker finishes)
/// - Processing, hashing and deletion: progress bar
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar.lock();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    pub fn finish_bar(&self) {
        if let Some(pb) = self.bar.lock().take() {
            pb.finish_and_clear();
        }
    }

    fn spinner(&self, message: &str) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars(TICK_CHARS),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn bar(&self, label: &str, total: usize) {
        let template = format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} files ({{eta}} remaining)",
            label
        );
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template(&template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("━╸─")
                .tick_chars(TICK_CHARS),
        );
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn update(&self, done: usize, total: usize) {
        let guard = self.bar.lock();
        if let Some(pb) = guard.as_ref() {
            if pb.length() != Some(total as u64) {
                pb.set_length(total as u64);
            }
            pb.set_position(done as u64);
        }
    }

    pub fn on_scan_start(&self) {
        self.spinner("Collecting files...");
    }

    /// Render one scan event. `FileDiscovered` is left to the caller.
    pub fn on_scan_event(&self, event: &ScanEvent) {
        match event {
            ScanEvent::DiscoveryProgress {
                discovered,
                estimated_total,
            } => {
                if let Some(pb) = self.bar.lock().as_ref() {
                    pb.set_message(format!(
                        "Collecting files... {} queued of ~{}",
                        discovered, estimated_total
                    ));
                }
            }
            ScanEvent::ProcessingProgress {
                processed, total, ..
            } => {
                let is_spinner = self
                    .bar
                    .lock()
                    .as_ref()
                    .map_or(true, |pb| pb.length().is_none());
                if is_spinner {
                    self.bar("Filtering", *total);
                }
                self.update(*processed, *total);
            }
            ScanEvent::StatusMessage(message) => {
                if let Some(pb) = self.bar.lock().as_ref() {
                    pb.println(format!("  {}", message));
                }
            }
            ScanEvent::ScanComplete {
                total_bytes,
                file_count,
            } => {
                self.finish_bar();
                eprintln!(
                    "  {} Scan complete: {} files, {}",
                    style("✓").green(),
                    file_count,
                    HumanBytes(*total_bytes)
                );
            }
            ScanEvent::ScanAborted {
                total_bytes,
                file_count,
            } => {
                self.finish_bar();
                eprintln!(
                    "  {} Scan aborted: {} files, {} so far",
                    style("!").yellow(),
                    file_count,
                    HumanBytes(*total_bytes)
                );
            }
            ScanEvent::FileDiscovered(_) => {}
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_size_pass_progress(&self, files_checked: usize, total_files: usize) {
        if files_checked == 1 {
            self.bar("Sizing", total_files);
        }
        self.update(files_checked, total_files);
    }

    fn on_hash_start(&self, total_files: usize) {
        self.bar("Hashing", total_files);
    }

    fn on_hash_progress(&self, files_hashed: usize, total_files: usize) {
        self.update(files_hashed, total_files);
    }

    fn on_hash_complete(&self, total_groups: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Hash complete: {} duplicate groups in {:.2}s",
            style("✓").green(),
            total_groups, duration_secs
        );
    }

    fn on_delete_progress(&self, files_done: usize, total_files: usize) {
        if files_done == 1 {
            self.bar("Deleting", total_files);
        }
        self.update(files_done, total_files);
        if files_done == total_files {
            self.finish_bar();
        }
    }
}
