//! Per-download progress bars

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::util::truncate_title;

const TITLE_WIDTH: usize = 32;

/// Progress display shared by all downloads in a run
#[derive(Clone)]
pub struct DownloadProgress {
    /// None when running quiet
    multi: Option<MultiProgress>,
}

impl DownloadProgress {
    /// Bars drawn to stderr unless `quiet`
    pub fn new(quiet: bool) -> Self {
        if quiet {
            Self::hidden()
        } else {
            Self {
                multi: Some(MultiProgress::with_draw_target(ProgressDrawTarget::stderr())),
            }
        }
    }

    /// No output at all
    pub fn hidden() -> Self {
        Self { multi: None }
    }

    /// Start a bar for one download. `total_bytes` of 0 means unknown length
    /// and shows a byte counter instead of a bar.
    pub fn start(&self, title: &str, total_bytes: u64) -> ProgressBar {
        let Some(multi) = &self.multi else {
            return ProgressBar::hidden();
        };

        let bar = if total_bytes > 0 {
            let pb = ProgressBar::new(total_bytes);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{msg:32} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg:32} {bytes} ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        };

        let bar = multi.add(bar);
        bar.set_message(truncate_title(title, TITLE_WIDTH));
        bar
    }
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::hidden()
    }
}
